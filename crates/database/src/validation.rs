//! Input validation for identifiers and free-form descriptors.

use std::fmt;

/// Validation error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Value too long.
    TooLong { field: String, max: usize, actual: usize },
    /// Empty value where one is required.
    Empty(String),
    /// Value contains control characters.
    ControlCharacters(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::TooLong { field, max, actual } => {
                write!(f, "{} is too long ({} chars, max {})", field, actual, max)
            }
            ValidationError::Empty(field) => write!(f, "{} cannot be empty", field),
            ValidationError::ControlCharacters(field) => {
                write!(f, "{} contains control characters", field)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Maximum allowed length for restaurant, client and order identifiers.
pub const MAX_ID_LENGTH: usize = 128;

/// Maximum allowed length for names, versions and platforms.
pub const MAX_DESCRIPTOR_LENGTH: usize = 128;

/// Maximum allowed length for stored error messages.
pub const MAX_ERROR_MESSAGE_LENGTH: usize = 2000;

/// Validate a required identifier.
pub fn validate_id(field: &str, value: &str) -> Result<(), ValidationError> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Empty(field.to_string()));
    }

    if value.len() > MAX_ID_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_ID_LENGTH,
            actual: value.len(),
        });
    }

    if value.chars().any(char::is_control) {
        return Err(ValidationError::ControlCharacters(field.to_string()));
    }

    Ok(())
}

/// Validate an optional free-form descriptor such as a client name.
pub fn validate_descriptor(field: &str, value: Option<&str>) -> Result<(), ValidationError> {
    let Some(value) = value else {
        return Ok(());
    };

    if value.len() > MAX_DESCRIPTOR_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_DESCRIPTOR_LENGTH,
            actual: value.len(),
        });
    }

    if value.chars().any(char::is_control) {
        return Err(ValidationError::ControlCharacters(field.to_string()));
    }

    Ok(())
}

/// Truncate an error message to the stored maximum on a char boundary.
pub fn truncate_error_message(message: &str) -> String {
    if message.len() <= MAX_ERROR_MESSAGE_LENGTH {
        return message.to_string();
    }

    let mut end = MAX_ERROR_MESSAGE_LENGTH;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    message[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_id() {
        assert!(validate_id("client_id", "a1b2c3d4e5f6a7b8").is_ok());
        assert_eq!(
            validate_id("client_id", "   "),
            Err(ValidationError::Empty("client_id".to_string()))
        );
        assert!(matches!(
            validate_id("client_id", &"x".repeat(MAX_ID_LENGTH + 1)),
            Err(ValidationError::TooLong { .. })
        ));
        assert_eq!(
            validate_id("client_id", "abc\n"),
            Ok(()),
            "surrounding whitespace is trimmed"
        );
        assert!(matches!(
            validate_id("client_id", "a\u{0}b"),
            Err(ValidationError::ControlCharacters(_))
        ));
    }

    #[test]
    fn test_validate_descriptor() {
        assert!(validate_descriptor("platform", None).is_ok());
        assert!(validate_descriptor("platform", Some("windows")).is_ok());
        assert!(validate_descriptor("client_name", Some(&"n".repeat(200))).is_err());
    }

    #[test]
    fn test_truncate_error_message() {
        assert_eq!(truncate_error_message("paper out"), "paper out");

        let long = "é".repeat(MAX_ERROR_MESSAGE_LENGTH);
        let truncated = truncate_error_message(&long);
        assert!(truncated.len() <= MAX_ERROR_MESSAGE_LENGTH);
        assert!(truncated.chars().all(|c| c == 'é'));
    }
}
