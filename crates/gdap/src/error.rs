//! Error types for the bridge

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Frontend protocol violations and malformed messages
    ///
    /// Use for: missing required fields, framing errors, messages that
    /// are not valid requests.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// JSON parsing and deserialization failures
    #[error("Invalid message format: {0}")]
    InvalidMessage(#[from] serde_json::Error),

    /// Socket and channel I/O failures
    ///
    /// Use for: listener bind/accept errors, socket read/write errors,
    /// writes to a stopped frontend channel.
    #[error("Communication error: {0}")]
    Communication(String),

    /// Unrecoverable failure while handling a request.
    ///
    /// By the time this is returned the 1104 error response has already
    /// been sent; the caller owns the exit policy and must terminate
    /// the process rather than continue with unknown state.
    #[error("Fatal error while processing '{command}': {reason}")]
    Fatal { command: String, reason: String },
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Communication(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Protocol("bad frame".to_string());
        assert_eq!(err.to_string(), "Protocol error: bad frame");

        let err = Error::Fatal {
            command: "launch".to_string(),
            reason: "boom".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Fatal error while processing 'launch': boom"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe gone");
        let err: Error = io.into();
        match err {
            Error::Communication(msg) => assert!(msg.contains("pipe gone")),
            _ => panic!("Expected Communication error"),
        }
    }
}
