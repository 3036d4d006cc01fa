//! High-level error types

use std::time::Duration;

use ulrust_core::CommandCode;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Core protocol error: {0}")]
    Core(#[from] ulrust_core::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] ulrust_transport::Error),

    #[error("Type error: {0}")]
    Types(#[from] ulrust_types::Error),

    #[error("Device {address} not available after {attempts} attempt(s)")]
    DeviceNotAvailable { address: String, attempts: u32 },

    #[error("Device {address} exposes no supported key exchange")]
    UnsupportedEncryption { address: String },

    #[error("Key exchange failed: {0}")]
    KeyExchangeFailed(String),

    #[error("Command {command} rejected by device (status {status})")]
    CommandFailed { command: CommandCode, status: u8 },

    #[error("No response to {command} within {timeout:?}")]
    ResponseTimeout {
        command: CommandCode,
        timeout: Duration,
    },

    #[error("Device {address} is busy with another request batch")]
    Busy { address: String },

    #[error("No requests queued")]
    EmptyQueue,

    #[error("Operation not supported: {0}")]
    NotSupported(String),
}

impl Error {
    /// Check if a fresh `send_requests` may succeed where this one failed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DeviceNotAvailable { .. }
                | Self::ResponseTimeout { .. }
                | Self::Busy { .. }
                | Self::Transport(_)
        )
    }

    /// Check if the error can never go away for this device
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedEncryption { .. } | Self::NotSupported(_)
        )
    }
}
