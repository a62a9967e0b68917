//! Error types for parley.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParleyError {
    // Configuration errors
    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Speech input errors
    #[error("Speech recognition failed: {message}")]
    Recognition { message: String },

    #[error("Speech recognition stopped responding after {attempts} restarts")]
    RecognitionUnstable { attempts: u32 },

    // Speech output errors
    #[error("Speech synthesis failed: {message}")]
    Synthesis { message: String },

    // Remote service errors
    #[error("Service request failed: {message}")]
    ServiceRequest { message: String },

    #[error("Service returned HTTP status {status}")]
    ServiceStatus { status: u16 },

    #[error("Malformed service response: {message}")]
    ServiceResponse { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ParleyError {
    /// Returns true for errors raised by the remote services.
    pub fn is_service_error(&self) -> bool {
        matches!(
            self,
            ParleyError::ServiceRequest { .. }
                | ParleyError::ServiceStatus { .. }
                | ParleyError::ServiceResponse { .. }
        )
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, ParleyError>;
