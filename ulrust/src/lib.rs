//! # ulrust
//!
//! Client for U-tec Ultraloq Bluetooth smart locks.
//!
//! ## Features
//!
//! - Encrypted, checksummed command frames over BLE GATT
//! - All three key exchange schemes (static, MD5-derived, ECDH)
//! - Wake-up receiver support and bounded connect retries
//! - Per-model capability tables
//! - Async/await API using Tokio
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use ulrust::{BleTransport, Lock};
//! use ulrust_core::Credentials;
//!
//! #[tokio::main]
//! async fn main() -> ulrust::Result<()> {
//!     let transport = Arc::new(BleTransport::new().await?);
//!
//!     let lock = Lock::new("AA:BB:CC:DD:EE:FF", Credentials::new(1, "123456")?, transport)
//!         .with_model("U-Bolt")
//!         .with_wakeup_receiver(Some("11:22:33:44:55:66".into()));
//!
//!     let status = lock.update_status().await?;
//!     println!("{}", status);
//!
//!     lock.unlock().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod decode;
pub mod error;
pub mod key_exchange;
pub mod lock;
pub mod observer;
pub mod queue;
pub mod request;
pub mod session;

// Re-exports
pub use config::SessionConfig;
pub use decode::apply_response;
pub use error::{Error, Result};
pub use lock::Lock;
pub use observer::{NullObserver, SessionEvent, SessionObserver, TracingObserver};
pub use queue::CommandQueue;
pub use request::Request;
pub use session::DeviceSession;

// Re-export lower layers
pub use ulrust_core::{CommandCode, Credentials, KeyExchangeKind, ResponseCode, SessionState};
pub use ulrust_transport::{BleTransport, Link, NotifyCallback, Peer, Transport};
pub use ulrust_types::{
    AccountDevice, BatteryLevel, Capabilities, DeviceStatus, LockState, WorkMode,
};
