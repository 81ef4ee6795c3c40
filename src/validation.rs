use crate::error::ApiError;

pub const MAX_MESSAGE_CHARS: usize = 2000;

const DANGEROUS_PATTERNS: &[&str] = &[
    "javascript:",
    "data:",
    "vbscript:",
    "onload=",
    "onerror=",
    "onclick=",
    "eval(",
];

// Trim, bound, escape angle brackets, reject script-ish payloads
pub fn validate_message(message: &str) -> Result<String, ApiError> {
    let message = message.trim();

    if message.is_empty() {
        return Err(ApiError::Validation("Message cannot be empty".to_string()));
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::Validation(format!(
            "Message too long (max {} characters)",
            MAX_MESSAGE_CHARS
        )));
    }

    let escaped = message.replace('<', "&lt;").replace('>', "&gt;");

    let lowered = escaped.to_lowercase();
    if DANGEROUS_PATTERNS.iter().any(|p| lowered.contains(p)) {
        return Err(ApiError::Validation(
            "Message contains potentially dangerous content".to_string(),
        ));
    }

    Ok(escaped)
}
