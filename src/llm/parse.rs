use serde::de::DeserializeOwned;

/// Strip a leading Markdown code fence (optionally tagged `json`) from model output.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = match rest.find("```") {
        Some(end) => &rest[..end],
        None => rest,
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.trim()
}

/// Parse a JSON object out of model output.
///
/// Tries the fence-stripped text first, then the outermost `{...}` span.
pub fn parse_json_object<T: DeserializeOwned>(text: &str) -> Option<T> {
    let cleaned = strip_code_fence(text);
    if let Ok(v) = serde_json::from_str::<T>(cleaned) {
        return Some(v);
    }

    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<T>(&cleaned[start..=end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn fenced_json_is_unwrapped() {
        let text = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fence(text), "{\"a\": 1}");
        let v: Value = parse_json_object(text).unwrap();
        assert_eq!(v["a"], 1);
    }

    #[test]
    fn falls_back_to_outermost_braces() {
        let text = "Sure! Here you go: {\"metrics\": [{\"key\": \"cpu_util\"}]} Hope that helps.";
        let v: Value = parse_json_object(text).unwrap();
        assert_eq!(v["metrics"][0]["key"], "cpu_util");
    }

    #[test]
    fn garbage_yields_none() {
        assert!(parse_json_object::<Value>("no json here").is_none());
        assert!(parse_json_object::<Value>("} backwards {").is_none());
    }
}
