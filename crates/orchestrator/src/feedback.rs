use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm::{LlmClient, LlmError, ToolDefinition};
use crate::types::{ChatMessage, ChatRole};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackResponse {
    pub analysis: String,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub feedback_acknowledgment: Option<String>,
}

/// Extract the first balanced `{...}` span from `text`, accounting for
/// braces inside quoted strings so a recommendation string like
/// `"use { } blocks"` doesn't close the span early.
fn extract_first_json_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let start = text.find('{')?;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse an LLM reply into a `FeedbackResponse`, robust against chatty
/// non-JSON wrapping text: extract the first balanced JSON
/// object and parse that; on any failure, fall back to treating the raw
/// text as the analysis with no recommendations.
pub fn parse_feedback_response(raw: &str) -> FeedbackResponse {
    extract_first_json_object(raw)
        .and_then(|candidate| serde_json::from_str::<FeedbackResponse>(candidate).ok())
        .unwrap_or_else(|| FeedbackResponse {
            analysis: raw.to_string(),
            recommendations: Vec::new(),
            feedback_acknowledgment: None,
        })
}

pub struct FeedbackRequest {
    pub issue_context: Value,
    pub timeline: Vec<Value>,
    pub feedback: String,
}

fn build_prompt(req: &FeedbackRequest) -> String {
    format!(
        "An operator reviewed an automated issue and left feedback. Respond with a JSON object \
         shaped exactly as {{\"analysis\": string, \"recommendations\": string[], \
         \"feedbackAcknowledgment\": string}}.\n\nIssue context:\n{}\n\nTimeline:\n{}\n\nFeedback:\n{}",
        req.issue_context,
        Value::Array(req.timeline.clone()),
        req.feedback
    )
}

pub async fn run_feedback_followup(
    llm: &dyn LlmClient,
    req: FeedbackRequest,
) -> Result<FeedbackResponse, LlmError> {
    let prompt = build_prompt(&req);
    let message = ChatMessage {
        id: String::new(),
        session_id: String::new(),
        role: ChatRole::User,
        content: prompt,
        tool_calls: None,
        tool_results: None,
        metadata: None,
        created_at: chrono::Utc::now(),
    };
    let response = llm.chat(&[message], &[] as &[ToolDefinition]).await?;
    Ok(parse_feedback_response(&response.content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_clean_json_response() {
        let raw = r#"{"analysis":"CPU spike was transient","recommendations":["add a cooldown"],"feedbackAcknowledgment":"noted"}"#;
        let parsed = parse_feedback_response(raw);
        assert_eq!(parsed.analysis, "CPU spike was transient");
        assert_eq!(parsed.recommendations, vec!["add a cooldown".to_string()]);
    }

    #[test]
    fn extracts_json_from_chatty_wrapper_text() {
        let raw = "Sure, here's my assessment:\n{\"analysis\":\"ok\",\"recommendations\":[]}\nHope that helps!";
        let parsed = parse_feedback_response(raw);
        assert_eq!(parsed.analysis, "ok");
    }

    #[test]
    fn braces_inside_string_values_do_not_break_extraction() {
        let raw = r#"{"analysis":"use { } blocks carefully","recommendations":[]}"#;
        let parsed = parse_feedback_response(raw);
        assert_eq!(parsed.analysis, "use { } blocks carefully");
    }

    #[test]
    fn falls_back_to_raw_text_on_non_json_response() {
        let raw = "I don't have enough information to analyze this.";
        let parsed = parse_feedback_response(raw);
        assert_eq!(parsed.analysis, raw);
        assert!(parsed.recommendations.is_empty());
    }
}
