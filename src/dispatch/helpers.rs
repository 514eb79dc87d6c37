//! Message helpers

/// Text actually sent for one message
///
/// A non-empty prefix is joined with a single space; an absent or empty
/// prefix leaves the message untouched.
#[must_use]
pub fn compose_text(prefix: Option<&str>, message: &str) -> String {
    match prefix {
        Some(prefix) if !prefix.is_empty() => format!("{prefix} {message}"),
        _ => message.to_string(),
    }
}

/// Split an uploaded message file into the ordered message list
///
/// One message per line; lines are trimmed and blank lines dropped.
#[must_use]
pub fn parse_message_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}
