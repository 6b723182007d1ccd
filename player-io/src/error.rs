//! Error types for PlayerIO

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// PlayerIO error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Listening socket could not be bound
    #[error("Cannot bind port {port}: {source}")]
    Bind {
        /// Requested port
        port: u16,
        /// Underlying socket error
        source: std::io::Error,
    },

    /// Listening socket could not be configured for non-blocking accept
    #[error("Cannot listen for connections: {0}")]
    Listen(std::io::Error),

    /// Configuration file could not be parsed or is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// Inbound payload is not a valid actuator request
    #[error("Decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    /// Outbound batch could not be serialized
    #[error("Encode error: {0}")]
    Encode(#[from] prost::EncodeError),

    /// Frame header announces more bytes than allowed
    #[error("Frame too large: {len} bytes (limit {limit})")]
    FrameTooLarge {
        /// Announced payload length
        len: usize,
        /// Configured limit
        limit: usize,
    },

    /// Camera frame could not be compressed
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}
