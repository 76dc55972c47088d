//! Pulling structured payloads out of free-form model replies.

/// The span from the first `{` to the last `}` of `text`, if any.
///
/// Models often wrap JSON in prose or code fences; this is the only
/// extraction the pipeline relies on.
#[must_use]
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Parse the embedded JSON object of `text` into `T`.
///
/// # Errors
///
/// A message describing why no object could be decoded.
pub fn parse_json_object<T: serde::de::DeserializeOwned>(text: &str) -> Result<T, String> {
    let body = extract_json_object(text).ok_or_else(|| "no JSON object in response".to_string())?;
    serde_json::from_str(body).map_err(|e| format!("invalid JSON object: {e}"))
}
