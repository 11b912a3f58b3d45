//! Tolerant parsing of free-text proposer replies.

use serde_json::Value;

use super::{Assignment, ProposerError};

fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    let after = after.strip_prefix("json").unwrap_or(after);
    let end = after.find("```")?;
    Some(after[..end].trim())
}

fn outer_span(text: &str) -> Option<&str> {
    let brace = text.find('{');
    let bracket = text.find('[');
    let (start, close) = match (brace, bracket) {
        (None, None) => return None,
        (Some(b), Some(k)) if k < b => (k, ']'),
        (None, Some(k)) => (k, ']'),
        (Some(b), _) => (b, '}'),
    };
    let end = text.rfind(close)?;
    (end >= start).then(|| &text[start..=end])
}

/// Pulls a JSON value out of free text.
///
/// A fenced code block (optionally tagged `json`) wins; otherwise the span
/// from the first `{` or `[` (whichever comes first) to the matching last
/// closer is tried. Returns `None` when nothing parses.
///
/// # Examples
///
/// ```
/// use timetable_core::proposer::extract_reply_json;
///
/// let text = "Sure!\n```json\n{\"course_id\": \"C1\", \"time_slot\": \"1-2\"}\n```";
/// let value = extract_reply_json(text).unwrap();
/// assert_eq!(value["time_slot"], "1-2");
///
/// assert!(extract_reply_json("no json here").is_none());
/// ```
pub fn extract_reply_json(text: &str) -> Option<Value> {
    let candidate = fenced_block(text).or_else(|| outer_span(text))?;
    serde_json::from_str(candidate).ok()
}

/// Reads assignments from a reply value: a single object, an array of
/// objects, or an object with a `schedules` array. Array entries that do not
/// deserialize are skipped.
pub fn parse_assignments(value: Value) -> Result<Vec<Assignment>, ProposerError> {
    match value {
        Value::Array(items) => Ok(items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<Assignment>(item) {
                Ok(a) => Some(a),
                Err(e) => {
                    log::debug!("Skipping malformed assignment: {}", e);
                    None
                }
            })
            .collect()),
        Value::Object(mut map) => match map.remove("schedules") {
            Some(inner @ Value::Array(_)) => parse_assignments(inner),
            Some(other) => {
                map.insert("schedules".to_string(), other);
                single(Value::Object(map))
            }
            None => single(Value::Object(map)),
        },
        other => Err(ProposerError::MalformedReply(format!(
            "expected an object or array, found {}",
            other
        ))),
    }
}

fn single(value: Value) -> Result<Vec<Assignment>, ProposerError> {
    serde_json::from_value::<Assignment>(value)
        .map(|a| vec![a])
        .map_err(|e| ProposerError::MalformedReply(e.to_string()))
}

/// [`extract_reply_json`] followed by [`parse_assignments`].
pub fn parse_reply_text(text: &str) -> Result<Vec<Assignment>, ProposerError> {
    let value = extract_reply_json(text)
        .ok_or_else(|| ProposerError::MalformedReply("no JSON found in reply".to_string()))?;
    parse_assignments(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_block_wins() {
        let text = "Here {not json} ```\n[{\"course_id\": \"A\", \"time_slot\": \"1-1\", \"room_id\": \"R\"}]\n``` trailing }";
        let assignments = parse_reply_text(text).unwrap();
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].course_id, "A");
    }

    #[test]
    fn test_outer_span_fallback() {
        let text = r#"I think {"course_id": 12, "time_slot": "2-3", "room_id": 508} works."#;
        let assignments = parse_reply_text(text).unwrap();
        assert_eq!(assignments[0].course_id, "12");
        assert_eq!(assignments[0].room_id.as_deref(), Some("508"));
    }

    #[test]
    fn test_array_before_object() {
        let value = extract_reply_json(r#"x [{"course_id": "A"}] y"#).unwrap();
        assert!(value.is_array());
    }

    #[test]
    fn test_schedules_wrapper_and_bad_entries() {
        let value = serde_json::json!({
            "schedules": [
                {"course_id": "A", "time_slot": "1-1", "room_id": "R1"},
                {"time_slot": "1-2"},
                {"course_id": "B", "time_slot": "NO_FIX_FOUND"}
            ]
        });
        let assignments = parse_assignments(value).unwrap();
        assert_eq!(assignments.len(), 2);
        assert!(assignments[0].is_usable());
        assert!(!assignments[1].is_usable());
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(
            parse_reply_text("sorry, I cannot help"),
            Err(ProposerError::MalformedReply(_))
        ));
        assert!(matches!(
            parse_reply_text("{broken json"),
            Err(ProposerError::MalformedReply(_))
        ));
        assert!(parse_assignments(serde_json::json!(42)).is_err());
    }
}
