use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Pre-decode guard on the raw data URI length.
pub const MAX_IMAGE_INPUT_LEN: usize = 5 * 1024 * 1024;
pub const MAX_SESSION_ID_LEN: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Image,
    Session,
}

fn session_pattern() -> &'static Regex {
    static SESSION_ID: OnceLock<Regex> = OnceLock::new();
    SESSION_ID.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid session id pattern"))
}

/// Cheap shape checks run before any decoding or model work.
pub fn validate(input: &Value, kind: InputKind) -> bool {
    let Some(s) = input.as_str() else {
        return false;
    };

    match kind {
        InputKind::Image => s.starts_with("data:image/") && s.len() <= MAX_IMAGE_INPUT_LEN,
        InputKind::Session => {
            s.chars().count() <= MAX_SESSION_ID_LEN && session_pattern().is_match(s)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_image_validation() {
        assert!(validate(&json!("data:image/jpeg;base64,/9j/"), InputKind::Image));
        assert!(!validate(&json!("data:text/plain;base64,aGk="), InputKind::Image));
        assert!(!validate(&json!(42), InputKind::Image));
        assert!(!validate(&Value::Null, InputKind::Image));

        let oversized = format!("data:image/png;base64,{}", "A".repeat(MAX_IMAGE_INPUT_LEN));
        assert!(!validate(&json!(oversized), InputKind::Image));
    }

    #[test]
    fn test_session_validation() {
        assert!(validate(&json!("session_01-abc"), InputKind::Session));
        assert!(!validate(&json!("bad session!"), InputKind::Session));
        assert!(!validate(&json!("<script>abc"), InputKind::Session));
        assert!(!validate(&json!(""), InputKind::Session));
        assert!(!validate(&json!("a".repeat(101)), InputKind::Session));
        assert!(validate(&json!("a".repeat(100)), InputKind::Session));
        assert!(!validate(&json!(["abc"]), InputKind::Session));
    }
}
