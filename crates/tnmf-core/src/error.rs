//! Error types for transform-invariant factorization
//!
//! Every fallible operation in the stack returns [`TnmfResult`]. Fatal problems
//! (incompatible shapes, unsupported boundary modes, bad configuration) are
//! reported before the first iteration runs. Numerical stalls are not errors;
//! they surface as warnings on the factorization result.

use thiserror::Error;

/// Error type for factorization, transform and tensor operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TnmfError {
    /// Atom, activation or observation dimensions are incompatible
    #[error("{operation}: shape mismatch - expected {expected:?}, got {actual:?}. {reason}")]
    ShapeMismatch {
        operation: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
        reason: String,
    },

    /// The selected backend cannot realize the requested mode
    #[error("backend '{backend}' does not support {mode}")]
    UnsupportedMode { backend: String, mode: String },

    /// A configuration value is out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Input data violates the non-negativity / finiteness contract
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The Fourier transform library reported a failure
    #[error("{operation}: transform failed: {message}")]
    Transform { operation: String, message: String },
}

/// Result type for factorization operations
pub type TnmfResult<T> = Result<T, TnmfError>;

impl TnmfError {
    /// Create a shape mismatch error
    pub fn shape_mismatch(
        operation: impl Into<String>,
        expected: Vec<usize>,
        actual: Vec<usize>,
        reason: impl Into<String>,
    ) -> Self {
        TnmfError::ShapeMismatch {
            operation: operation.into(),
            expected,
            actual,
            reason: reason.into(),
        }
    }

    /// Create an unsupported mode error
    pub fn unsupported_mode(backend: impl Into<String>, mode: impl Into<String>) -> Self {
        TnmfError::UnsupportedMode {
            backend: backend.into(),
            mode: mode.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        TnmfError::InvalidConfig(message.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        TnmfError::InvalidInput(message.into())
    }

    /// Create a transform failure error
    pub fn transform(operation: impl Into<String>, message: impl Into<String>) -> Self {
        TnmfError::Transform {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Whether this error was raised by a shape check
    pub fn is_shape_mismatch(&self) -> bool {
        matches!(self, TnmfError::ShapeMismatch { .. })
    }

    /// Whether this error was raised by a capability check
    pub fn is_unsupported_mode(&self) -> bool {
        matches!(self, TnmfError::UnsupportedMode { .. })
    }
}
