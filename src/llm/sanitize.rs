use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Bare key shapes: OpenAI/Anthropic `sk-...`, Google `AIza...`, env-style `OPENAI_...`.
static KEY_SHAPES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"sk-[A-Za-z0-9_\-]{16,}",
        r"AIza[0-9A-Za-z_\-]{10,}",
        r"OPENAI_[A-Za-z0-9_\-]{6,}",
    ]
    .into_iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

static INCORRECT_KEY: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)(Incorrect API key provided:\s*)([^\s,}]+)").ok());

static JSON_KEY_FIELD: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"("api_key"\s*:\s*")([^"]+)(")"#).ok());

static KEY_ASSIGNMENT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)(api[_-]?key\s*[:=]\s*)([A-Za-z0-9_\-]{8,})").ok());

fn tail4(value: &str) -> &str {
    let start = value
        .char_indices()
        .rev()
        .nth(3)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &value[start..]
}

/// Mask anything in `message` that looks like an API key, keeping the last 4 characters.
pub fn sanitize_error_message(message: &str) -> String {
    let mut out = message.to_string();

    for re in KEY_SHAPES.iter() {
        out = re
            .replace_all(&out, |c: &Captures<'_>| format!("***{}", tail4(&c[0])))
            .into_owned();
    }

    if let Some(re) = INCORRECT_KEY.as_ref() {
        out = re.replace_all(&out, "${1}***").into_owned();
    }

    if let Some(re) = JSON_KEY_FIELD.as_ref() {
        out = re
            .replace_all(&out, |c: &Captures<'_>| {
                format!("{}***{}{}", &c[1], tail4(&c[2]), &c[3])
            })
            .into_owned();
    }

    if let Some(re) = KEY_ASSIGNMENT.as_ref() {
        out = re
            .replace_all(&out, |c: &Captures<'_>| format!("{}***{}", &c[1], tail4(&c[2])))
            .into_owned();
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_provider_key_shapes() {
        let msg = "401 for key sk-proj-abcdefghijklmnop1234 and AIzaSyA1234567890XYZ9";
        let out = sanitize_error_message(msg);
        assert!(!out.contains("abcdefghijklmnop"));
        assert!(out.contains("***1234"));
        assert!(out.contains("***XYZ9"));
    }

    #[test]
    fn masks_incorrect_key_phrase_and_fields() {
        let out = sanitize_error_message("Incorrect API key provided: abc123, check it");
        assert_eq!(out, "Incorrect API key provided: ***, check it");

        let out = sanitize_error_message(r#"{"api_key": "secretvalue9876"}"#);
        assert_eq!(out, r#"{"api_key": "***9876"}"#);

        let out = sanitize_error_message("bad api-key=ZZZZZZZZ4321 given");
        assert_eq!(out, "bad api-key=***4321 given");
    }

    #[test]
    fn plain_messages_are_untouched() {
        let msg = "Upstream error with status 503: overloaded";
        assert_eq!(sanitize_error_message(msg), msg);
        assert_eq!(sanitize_error_message(""), "");
    }
}
