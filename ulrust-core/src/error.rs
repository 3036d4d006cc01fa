//! Error types for ulrust-core



/// Result type alias for ulrust-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core protocol errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Encoded frame would not fit the protocol buffer
    #[error("Frame too large: {size} bytes (max: {max} bytes)")]
    FrameTooLarge {
        size: usize,
        max: usize,
    },

    /// Unknown command code
    #[error("Unknown command code: {0}")]
    UnknownCommand(u8),

    /// Unknown response code
    #[error("Unknown response code: {0}")]
    UnknownResponse(u8),

    /// Admin password cannot be packed into the auth block
    #[error("Invalid admin password: {0}")]
    InvalidPassword(String),

    /// Key material of the wrong size
    #[error("Invalid key material: expected {expected} bytes, got {actual} bytes")]
    KeyLength {
        expected: usize,
        actual: usize,
    },

    /// Peer public point is not on the curve
    #[error("Invalid curve point")]
    InvalidPoint,

    /// Private scalar outside [1, n)
    #[error("Invalid private scalar")]
    InvalidScalar,

    /// Ciphertext is not a whole number of cipher blocks
    #[error("Invalid block length: {0} bytes is not a multiple of 16")]
    BlockLength(usize),

    /// A completed frame failed validation and was discarded
    #[error("Protocol desync: discarded frame with command byte 0x{command:02X} ({reason})")]
    ProtocolDesync {
        command: u8,
        reason: &'static str,
    },

    /// Another session already owns the device
    #[error("Session busy - another request batch is in flight")]
    SessionBusy,

    /// Invalid session state
    #[error("Invalid session state: {0}")]
    InvalidSessionState(String),
}
