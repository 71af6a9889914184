use chronicle_core::increment::Increment;

/// Defensive parse of a raw generation response into an [`Increment`].
///
/// The producer is unreliable: responses arrive wrapped in markdown code
/// fences, prefixed with prose, or occasionally truncated. Recovery order:
///
/// 1. strip leading/trailing code-fence markers and whitespace;
/// 2. direct JSON parse;
/// 3. parse the substring between the first `{` and the last `}`.
///
/// Returns `None` when no strategy yields valid JSON — the caller treats
/// that as a recoverable validation failure with no state mutation.
pub fn parse_increment(raw: &str) -> Option<Increment> {
    let cleaned = strip_fences(raw);
    if cleaned.is_empty() {
        return None;
    }

    if let Ok(inc) = serde_json::from_str::<Increment>(cleaned) {
        return Some(inc);
    }

    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Increment>(&cleaned[start..=end]).ok()
}

/// Remove a leading ``` / ```json marker and a trailing ``` marker.
fn strip_fences(raw: &str) -> &str {
    let mut s = raw.trim();

    if let Some(rest) = s.strip_prefix("```") {
        let rest = rest
            .strip_prefix("json")
            .or_else(|| rest.strip_prefix("JSON"))
            .unwrap_or(rest);
        s = rest.trim_start();
    }

    if let Some(rest) = s.strip_suffix("```") {
        s = rest.trim_end();
    }

    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_json_parses() {
        let inc = parse_increment(r#"{"keywords":[{"text":"oath","weight":"core"}]}"#).unwrap();
        assert_eq!(inc.keywords.len(), 1);
        assert_eq!(inc.keywords[0].text, "oath");
    }

    #[test]
    fn fenced_json_parses() {
        // Scenario: fenced response with surrounding whitespace.
        let raw = "  ```json\n{\"keywords\":[]}\n```  ";
        let inc = parse_increment(raw).unwrap();
        assert!(inc.keywords.is_empty());
        assert!(inc.is_empty());
    }

    #[test]
    fn bare_fence_parses() {
        let raw = "```\n{\"events\":[]}\n```";
        assert!(parse_increment(raw).is_some());
    }

    #[test]
    fn prose_wrapped_json_parses_via_brace_window() {
        let raw = "Here is the extraction you asked for:\n{\"newCharacters\":[\"Mira\"]}\nHope that helps!";
        let inc = parse_increment(raw).unwrap();
        assert_eq!(inc.new_characters, vec!["Mira".to_string()]);
    }

    #[test]
    fn garbage_fails() {
        assert!(parse_increment("the model refused to answer").is_none());
    }

    #[test]
    fn empty_fails() {
        assert!(parse_increment("").is_none());
        assert!(parse_increment("   \n  ").is_none());
    }

    #[test]
    fn truncated_json_fails() {
        assert!(parse_increment(r#"{"events":[{"id":"evt-1","#).is_none());
    }

    #[test]
    fn reversed_braces_fail() {
        assert!(parse_increment("} not json {").is_none());
    }

    #[test]
    fn uppercase_fence_marker() {
        let raw = "```JSON\n{\"keywords\":[]}\n```";
        assert!(parse_increment(raw).is_some());
    }
}
