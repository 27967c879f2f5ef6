//! Engine error types

use thiserror::Error;

/// Runtime errors surfaced to script as `Error` subclass instances.
#[derive(Debug, Error)]
pub enum VmError {
    /// Type error (e.g., redefining a non-configurable property)
    #[error("TypeError: {0}")]
    TypeError(String),

    /// Reference error (unbound name)
    #[error("ReferenceError: {0}")]
    ReferenceError(String),

    /// Range error (e.g., invalid array length)
    #[error("RangeError: {0}")]
    RangeError(String),

    /// Syntax error (bad pattern or flag string)
    #[error("SyntaxError: {0}")]
    SyntaxError(String),

    /// Value-stack exhaustion
    #[error("RangeError: Maximum call stack size exceeded")]
    StackOverflow,
}

impl VmError {
    /// Create a type error
    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::TypeError(msg.into())
    }

    /// Create a reference error
    pub fn reference_error(msg: impl Into<String>) -> Self {
        Self::ReferenceError(msg.into())
    }

    /// Create a range error
    pub fn range_error(msg: impl Into<String>) -> Self {
        Self::RangeError(msg.into())
    }

    /// Create a syntax error
    pub fn syntax_error(msg: impl Into<String>) -> Self {
        Self::SyntaxError(msg.into())
    }
}

/// Result type for engine operations
pub type VmResult<T> = Result<T, VmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_overflow_message() {
        assert_eq!(
            VmError::StackOverflow.to_string(),
            "RangeError: Maximum call stack size exceeded"
        );
    }

    #[test]
    fn test_kind_prefixes() {
        assert!(VmError::type_error("x").to_string().starts_with("TypeError:"));
        assert!(VmError::range_error("x").to_string().starts_with("RangeError:"));
    }
}
