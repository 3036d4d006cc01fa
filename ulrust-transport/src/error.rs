//! Transport errors

use uuid::Uuid;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Not connected")]
    NotConnected,

    #[error("Unknown link: {0}")]
    UnknownLink(u64),

    #[error("No Bluetooth adapter found")]
    NoAdapter,

    #[error("Peer not resolved: {0}")]
    PeerNotResolved(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Characteristic not found: {0}")]
    CharacteristicNotFound(Uuid),

    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),
}
