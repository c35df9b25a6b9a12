//! Error types and handling for fusewatt
//!
//! This module defines the error types used throughout the application,
//! providing consistent error handling and reporting.

use thiserror::Error;

/// Result type alias for fusewatt operations
pub type Result<T> = std::result::Result<T, FusewattError>;

/// Main error type for fusewatt
#[derive(Debug, Error)]
pub enum FusewattError {
    /// Bootstrap or dynamic configuration is malformed
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Malformed HTTP input rejected before it reaches the dynamic config store
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// A named Modbus client did not reach a connected state
    #[error("Failed to connect to Modbus client '{name}'")]
    ConnectFailed { name: String },

    /// The Modbus peer returned an exception response
    #[error("Modbus error ({code}): {text}")]
    Modbus { code: u8, text: String },

    /// Socket/timeout/transport-level failure talking to a named client
    #[error("Transport error on '{name}': {cause}")]
    Transport { name: String, cause: String },

    /// External stop requested; not a failure
    #[error("operation cancelled")]
    Cancelled,

    /// Unknown dtype, unknown address prefix, or other internal contract violation
    #[error("programmer error: {message}")]
    Programmer { message: String },

    /// HTTP/Web server errors
    #[error("Web server error: {message}")]
    Web { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },
}

impl FusewattError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        FusewattError::Config {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        FusewattError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new connect-failed error for the named client
    pub fn connect_failed<S: Into<String>>(name: S) -> Self {
        FusewattError::ConnectFailed { name: name.into() }
    }

    /// Create a new Modbus exception error, looking up the text from the fixed code table
    pub fn modbus(code: u8) -> Self {
        FusewattError::Modbus {
            code,
            text: modbus_exception_text(code).to_string(),
        }
    }

    /// Create a new transport error for the named client
    pub fn transport<S: Into<String>, C: Into<String>>(name: S, cause: C) -> Self {
        FusewattError::Transport {
            name: name.into(),
            cause: cause.into(),
        }
    }

    /// Create a new programmer error
    pub fn programmer<S: Into<String>>(message: S) -> Self {
        FusewattError::Programmer {
            message: message.into(),
        }
    }

    /// Create a new web error
    pub fn web<S: Into<String>>(message: S) -> Self {
        FusewattError::Web {
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        FusewattError::Io {
            message: message.into(),
        }
    }

    /// Whether this error should trigger the controller's reconnect backoff
    /// (§7: ConnectFailed, ModbusError, and TransportError are handled identically).
    pub fn triggers_reconnect(&self) -> bool {
        matches!(
            self,
            FusewattError::ConnectFailed { .. }
                | FusewattError::Modbus { .. }
                | FusewattError::Transport { .. }
        )
    }
}

/// Fixed Modbus exception-code table (§4.2). Unknown codes map to "unknown exception".
pub fn modbus_exception_text(code: u8) -> &'static str {
    match code {
        1 => "Illegal Function",
        2 => "Illegal Data Address",
        3 => "Illegal Data Value",
        4 => "Slave Device Failure",
        5 => "Acknowledge",
        6 => "Slave Device Busy",
        8 => "Memory Parity Error",
        10 => "Gateway Path Unavailable",
        11 => "Gateway Target Failed",
        _ => "unknown exception",
    }
}

impl From<std::io::Error> for FusewattError {
    fn from(err: std::io::Error) -> Self {
        FusewattError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for FusewattError {
    fn from(err: serde_yaml::Error) -> Self {
        FusewattError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for FusewattError {
    fn from(err: serde_json::Error) -> Self {
        FusewattError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<chrono::ParseError> for FusewattError {
    fn from(err: chrono::ParseError) -> Self {
        FusewattError::validation("datetime", &err.to_string())
    }
}
