//! Error handling for the Modbus gateway service.
//!
//! `ModGwError` covers startup and transport failures. Per-request Modbus
//! failures are not errors in this sense: they are answered on the wire as
//! exception frames (see `protocols::modbus::frame::ModbusException`).

use thiserror::Error;

/// Modbus gateway error type
#[derive(Error, Debug, Clone)]
pub enum ModGwError {
    /// Configuration-related errors (fatal at startup, never at request time)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Input/Output operation errors
    #[error("IO error: {0}")]
    IoError(String),

    /// Protocol-level errors (framing, malformed ADUs)
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// Connection establishment and maintenance errors
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Data handling errors (parsing, conversion, validation)
    #[error("Data error: {0}")]
    DataError(String),
}

/// Result type alias for the Modbus gateway
pub type Result<T> = std::result::Result<T, ModGwError>;

impl ModGwError {
    pub fn config(msg: impl Into<String>) -> Self {
        ModGwError::ConfigError(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        ModGwError::ProtocolError(msg.into())
    }

    pub fn data(msg: impl Into<String>) -> Self {
        ModGwError::DataError(msg.into())
    }
}

impl From<std::io::Error> for ModGwError {
    fn from(err: std::io::Error) -> Self {
        ModGwError::IoError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ModGwError::ConfigError("missing mapping section".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: missing mapping section"
        );

        let err = ModGwError::protocol("ADU too short");
        assert_eq!(err.to_string(), "Protocol error: ADU too short");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "peer reset");
        let err: ModGwError = io_err.into();
        assert!(matches!(err, ModGwError::IoError(_)));
        assert!(err.to_string().contains("peer reset"));
    }
}
