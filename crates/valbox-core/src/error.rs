#![forbid(unsafe_code)]

//! Error type shared by every fallible box operation.

use thiserror::Error;

use crate::shape::Shape;

pub type Result<T> = std::result::Result<T, BoxError>;

#[derive(Debug, Error)]
pub enum BoxError {
    /// The operation needs a record-like value but found something else.
    #[error("invalid operation: {reason}")]
    InvalidOperation { reason: String },

    /// The value could not be converted to or from its JSON form.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl BoxError {
    #[must_use]
    pub fn invalid_operation(reason: impl Into<String>) -> Self {
        Self::InvalidOperation {
            reason: reason.into(),
        }
    }

    pub(crate) fn not_record(what: &str, found: Shape) -> Self {
        Self::invalid_operation(format!("{what} must be record-like, found {found}"))
    }

    /// Whether this error was raised because of the value's shape.
    #[must_use]
    pub fn is_invalid_operation(&self) -> bool {
        matches!(self, Self::InvalidOperation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_record_names_the_shape() {
        let err = BoxError::not_record("current value", Shape::Scalar);
        assert!(err.is_invalid_operation());
        assert_eq!(
            err.to_string(),
            "invalid operation: current value must be record-like, found scalar"
        );
    }

    #[test]
    fn codec_errors_convert_from_serde_json() {
        let json_err = serde_json::from_str::<u8>("\"x\"").unwrap_err();
        let err: BoxError = json_err.into();
        assert!(!err.is_invalid_operation());
        assert!(err.to_string().starts_with("codec error:"));
    }
}
