/// Errors surfaced by the transport and the attempt driver.
///
/// Frame-level malformation never becomes a `StreamError`; malformed frames
/// are dropped by the parser/dispatcher and the stream continues.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Invalid upload input, rejected before any request is sent.
    #[error("validation error: {0}")]
    Validation(String),
    /// Connection failed, was reset, or the body could not be read.
    #[error("transport error: {message}")]
    Transport { message: String },
    /// Server answered with a non-success HTTP status.
    #[error("request failed with status {status_code}: {message}")]
    Status { status_code: u16, message: String },
    /// A single-document JSON response could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
    /// The attempt was cancelled by the caller.
    #[error("Analysis cancelled")]
    Cancelled,
}

impl StreamError {
    /// Creates a transport-level error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a status error from an HTTP status code and server detail.
    pub fn status(status_code: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status_code,
            message: message.into(),
        }
    }

    /// Returns the HTTP status code when the server rejected the request.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    /// Whether this error ends an attempt at the transport level
    /// (as opposed to configuration or caller misuse).
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Status { .. })
    }
}

impl From<reqwest::Error> for StreamError {
    fn from(value: reqwest::Error) -> Self {
        if let Some(status) = value.status() {
            return Self::status(status.as_u16(), value.to_string());
        }
        if value.is_decode() {
            return Self::Decode(value.to_string());
        }
        Self::transport(value.to_string())
    }
}
