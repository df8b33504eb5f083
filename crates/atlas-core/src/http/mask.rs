//! Masking helpers for anything that reaches a log line or an error message.

/// Placeholder written over URL userinfo.
const MASK: &str = "***";

/// Replace URL userinfo (username and password) with `***`.
///
/// Used for logging only. Strings that do not parse as URLs are returned unchanged.
pub fn mask_url(raw: &str) -> String {
    let mut url = match url::Url::parse(raw) {
        Ok(url) => url,
        Err(_) => return raw.to_string(),
    };
    if url.username().is_empty() && url.password().is_none() {
        return raw.to_string();
    }
    if url.set_username(MASK).is_err() || url.set_password(Some(MASK)).is_err() {
        return raw.to_string();
    }
    url.to_string()
}

/// Truncate `text` to at most `max_chars` characters, never splitting a code point.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}…", &text[..byte_idx]),
        None => text.to_string(),
    }
}
