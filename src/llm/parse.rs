use serde::de::DeserializeOwned;
use serde_json::Value;

use super::LlmError;

/// Pull a JSON object out of a model reply.
///
/// Accepts a bare object, a ```json fenced block, or an object embedded in
/// surrounding prose (first `{` to last `}`).
pub fn extract_json_object(reply: &str) -> Result<Value, LlmError> {
    let candidate = fenced_block(reply).unwrap_or_else(|| braced_span(reply).unwrap_or(reply));

    let value: Value = serde_json::from_str(candidate.trim())
        .map_err(|e| LlmError::MalformedResponse(format!("invalid JSON: {e}")))?;

    if !value.is_object() {
        return Err(LlmError::MalformedResponse("expected a JSON object".into()));
    }
    Ok(value)
}

/// Extract and deserialize in one step.
pub fn parse_reply<T: DeserializeOwned>(reply: &str) -> Result<T, LlmError> {
    let value = extract_json_object(reply)?;
    serde_json::from_value(value).map_err(|e| LlmError::MalformedResponse(e.to_string()))
}

fn fenced_block(reply: &str) -> Option<&str> {
    let start = reply.find("```json")? + "```json".len();
    let end = reply[start..].find("```")?;
    Some(&reply[start..start + end])
}

fn braced_span(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (end > start).then(|| &reply[start..=end])
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[test]
    fn bare_object_parses() {
        let value = extract_json_object(r#"{"is_safe": true}"#).unwrap();
        assert_eq!(value["is_safe"], true);
    }

    #[test]
    fn fenced_block_parses() {
        let reply = "Here you go:\n```json\n{\"issues\": [\"a\"]}\n```\nThanks";
        let value = extract_json_object(reply).unwrap();
        assert_eq!(value["issues"][0], "a");
    }

    #[test]
    fn object_inside_prose_parses() {
        let reply = "Sure! {\"confidence\": 0.8} Hope this helps.";
        let value = extract_json_object(reply).unwrap();
        assert_eq!(value["confidence"], 0.8);
    }

    #[test]
    fn no_json_is_malformed() {
        assert!(matches!(
            extract_json_object("I cannot help with that."),
            Err(LlmError::MalformedResponse(_))
        ));
    }

    #[test]
    fn array_is_rejected() {
        assert!(extract_json_object("[1, 2, 3]").is_err());
    }

    #[test]
    fn parse_reply_deserializes_typed() {
        #[derive(Deserialize)]
        struct Verdict {
            is_safe: bool,
        }
        let verdict: Verdict = parse_reply("```json\n{\"is_safe\": false}\n```").unwrap();
        assert!(!verdict.is_safe);
    }

    #[test]
    fn parse_reply_reports_shape_errors() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Verdict {
            is_safe: bool,
        }
        assert!(parse_reply::<Verdict>(r#"{"is_safe": "maybe"}"#).is_err());
    }
}
