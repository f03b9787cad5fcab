//! Input validation and normalization helpers.
//!
//! Room IDs are client-supplied strings: any non-empty string names a valid
//! room once normalized. Display names and message bodies are trimmed and
//! length-checked against the configured limits.

use crate::error::HallError;

/// Normalize a client-supplied room ID: trim + lowercase.
///
/// An empty result is a validation error; everything else is a valid room key.
pub fn normalize_room_id(room_id: &str) -> Result<String, HallError> {
    let normalized = room_id.trim().to_lowercase();
    if normalized.is_empty() {
        return Err(HallError::Validation {
            message: "Room id cannot be empty".into(),
        });
    }
    Ok(normalized)
}

/// Validate and trim a display name.
pub fn validate_user_name(name: &str, max_len: usize) -> Result<String, HallError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(HallError::Validation {
            message: "Display name cannot be empty or whitespace only".into(),
        });
    }
    if trimmed.len() > max_len {
        return Err(HallError::Validation {
            message: format!("Display name cannot exceed {max_len} characters"),
        });
    }
    Ok(trimmed.to_string())
}

/// Validate and trim a chat message body.
pub fn validate_message_text(text: &str, max_len: usize) -> Result<String, HallError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(HallError::Validation {
            message: "Message cannot be empty or whitespace only".into(),
        });
    }
    if trimmed.len() > max_len {
        return Err(HallError::Validation {
            message: format!("Message cannot exceed {max_len} characters"),
        });
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_id_is_trimmed_and_lowercased() {
        assert_eq!(normalize_room_id("  NST-Commons ").unwrap(), "nst-commons");
    }

    #[test]
    fn test_empty_room_id_rejected() {
        assert!(normalize_room_id("   ").is_err());
    }

    #[test]
    fn test_arbitrary_room_ids_are_valid() {
        // Any non-empty string materializes a room
        assert_eq!(normalize_room_id("Röom 42!").unwrap(), "röom 42!");
    }

    #[test]
    fn test_message_text_trimmed() {
        assert_eq!(validate_message_text("  hello \n", 2000).unwrap(), "hello");
    }

    #[test]
    fn test_message_text_limits() {
        assert!(validate_message_text("  \t ", 2000).is_err());
        assert!(validate_message_text(&"x".repeat(2001), 2000).is_err());
        assert!(validate_message_text(&"x".repeat(2000), 2000).is_ok());
    }

    #[test]
    fn test_user_name_limits() {
        assert!(validate_user_name("", 64).is_err());
        assert!(validate_user_name(&"a".repeat(65), 64).is_err());
        assert_eq!(validate_user_name(" Ava ", 64).unwrap(), "Ava");
    }
}
