//! Error handling module for replay-maker

use thiserror::Error;

/// Main error type for replay-maker operations
#[derive(Error, Debug)]
pub enum ReplayError {
    /// Malformed build configuration
    #[error("Syntax error at {location}: {message}")]
    Syntax { location: String, message: String },

    /// Pop directive applied to an empty command list
    #[error("{directive} used on an empty command list")]
    Underflow { directive: String },

    /// Non-numeric text where a number was expected
    #[error("Invalid value for {key}: '{value}'")]
    Format { key: String, value: String },

    /// File missing from every search path, or absolute path missing
    #[error("File not found: {name}")]
    NotFound { name: String },

    /// Time range that does not move forward
    #[error("Invalid time range: end ({end}) must be after start ({start})")]
    Order { start: String, end: String },

    /// External encoder produced no usable output
    #[error("Encode failed for {output}: {message}")]
    EncodeFailure { output: String, message: String },

    /// Bitrate loop gave up on an output
    #[error("Bitrate convergence failed after {attempts} attempt(s): {reason}")]
    ConvergenceFailure { attempts: u32, reason: String },

    /// Prober process error
    #[error("Failed to probe {path}: {message}")]
    ProbeFailure { path: String, message: String },

    /// Tool configuration problem
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ReplayError {
    /// Build a syntax error pointing at a document line
    pub fn syntax(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Syntax {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Errors that mean the build definition itself is broken. These stop the
    /// whole run; everything else only affects one input or output.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Syntax { .. } | Self::Underflow { .. } | Self::Format { .. } | Self::Config { .. }
        )
    }
}

/// Result type alias for replay-maker operations
pub type ReplayResult<T> = std::result::Result<T, ReplayError>;
