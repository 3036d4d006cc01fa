//! Transport layer for the lock protocol
//!
//! Abstracts the host Bluetooth stack as a GATT client: resolve a lock by
//! address, connect, read and write characteristics, and receive
//! notifications through a callback.

pub mod ble;
pub mod error;

pub use ble::BleTransport;
pub use error::{Error, Result};

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

/// Notification handler, called once per notification with its raw value
pub type NotifyCallback = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// A device found on the air and ready to connect to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Peer {
    /// Address the peer was resolved from
    pub address: String,

    /// Advertised local name, if any
    pub name: Option<String>,
}

impl Peer {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} ({})", self.address, name),
            None => f.write_str(&self.address),
        }
    }
}

/// An open connection
///
/// Identifies the connection in every GATT call. Stale after disconnect.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Link {
    /// Transport-assigned connection id
    pub id: u64,

    /// Address of the connected peer
    pub address: String,
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.address, self.id)
    }
}

/// GATT client
///
/// Implementations own the platform connection state. All methods take
/// `&self` so a transport can be shared between locks.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Find a device by address
    ///
    /// Returns `Ok(None)` if the device is not on the air.
    async fn resolve(&self, address: &str) -> Result<Option<Peer>>;

    /// Connect and discover services
    async fn connect(&self, peer: &Peer) -> Result<Link>;

    /// Close the connection and drop all its subscriptions
    async fn disconnect(&self, link: &Link) -> Result<()>;

    /// Check if the peer exposes a characteristic
    async fn has_characteristic(&self, link: &Link, uuid: Uuid) -> Result<bool>;

    /// Read a characteristic value
    async fn read(&self, link: &Link, uuid: Uuid) -> Result<Bytes>;

    /// Write a characteristic value
    async fn write(&self, link: &Link, uuid: Uuid, data: &[u8]) -> Result<()>;

    /// Deliver notifications of a characteristic to `callback`
    async fn subscribe(&self, link: &Link, uuid: Uuid, callback: NotifyCallback) -> Result<()>;

    /// Stop delivering notifications of a characteristic
    async fn unsubscribe(&self, link: &Link, uuid: Uuid) -> Result<()>;
}
