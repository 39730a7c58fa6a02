use sha2::{Digest, Sha256};

/// "Fingerprint format": first 16 hex chars of
/// SHA-256(UTF-8 bytes of `"<alertName>:<context>:<chart>"`).
pub fn issue_fingerprint(alert_name: &str, context: &str, chart: &str) -> String {
    let input = format!("{alert_name}:{context}:{chart}");
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(digest)[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s3_fingerprint_scenario() {
        // S3: (alertName="cpu_usage_alert", context="system.cpu", chart="cpu")
        let fp = issue_fingerprint("cpu_usage_alert", "system.cpu", "cpu");
        assert_eq!(fp.len(), 16);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

        let expected_full = hex::encode(Sha256::digest(b"cpu_usage_alert:system.cpu:cpu"));
        assert_eq!(fp, expected_full[..16]);
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let a = issue_fingerprint("a", "b", "c");
        let b = issue_fingerprint("a", "b", "c");
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_distinguishes_inputs() {
        let a = issue_fingerprint("a", "b", "c");
        let b = issue_fingerprint("a", "b", "d");
        assert_ne!(a, b);
    }
}
