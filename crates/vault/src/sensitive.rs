const SENSITIVE_MARKERS: &[&str] = &[
    "password",
    "secret",
    "token",
    "key",
    "credential",
    "connectionstring",
    "authtoken",
    "apikey",
];

/// A field is sensitive if its name contains any of password, secret,
/// token, key, credential, connectionString, authToken, apiKey
/// (case-insensitive).
pub fn is_sensitive_field(name: &str) -> bool {
    let lower = name.to_lowercase();
    SENSITIVE_MARKERS.iter().any(|m| lower.contains(m))
}

/// Masked view of a plaintext value for logs/audit entries: a
/// short prefix plus up to 8 stars, or `[ENCRYPTED]` when nothing of the
/// original plaintext should be echoed at all.
pub fn mask_value(value: &str) -> String {
    if value.is_empty() {
        return "[ENCRYPTED]".to_string();
    }
    let prefix_len = value.chars().count().min(3);
    let prefix: String = value.chars().take(prefix_len).collect();
    let stars = "*".repeat((value.chars().count() - prefix_len).min(8).max(1));
    format!("{prefix}{stars}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_sensitive_field_names() {
        assert!(is_sensitive_field("password"));
        assert!(is_sensitive_field("dbPassword"));
        assert!(is_sensitive_field("apiKey"));
        assert!(is_sensitive_field("connectionString"));
        assert!(is_sensitive_field("authToken"));
        assert!(!is_sensitive_field("host"));
        assert!(!is_sensitive_field("port"));
    }

    #[test]
    fn masks_short_values() {
        assert_eq!(mask_value(""), "[ENCRYPTED]");
        assert_eq!(mask_value("ab"), "ab*");
    }

    #[test]
    fn masks_long_values_capped_at_eight_stars() {
        let masked = mask_value("hunter2hunter2hunter2");
        assert!(masked.starts_with("hun"));
        assert_eq!(masked.len(), 3 + 8);
    }
}
