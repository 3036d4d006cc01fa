//! Bluetooth LE transport backed by the host adapter
//!
//! Uses the first adapter btleplug reports. A lock is found by MAC address or
//! by platform peripheral id. Peripherals found during resolution are cached
//! by that identifier, so a later `connect` does not scan again.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, CharPropFlags, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use ulrust_core::constants::timing::SCAN_TIMEOUT;

use crate::error::{Error, Result};
use crate::{Link, NotifyCallback, Peer, Transport};

const SCAN_POLL: Duration = Duration::from_millis(100);

/// BLE transport
///
/// One instance serves any number of locks. Each connection gets its own
/// [`Link`] id; notification listeners are tracked per link and stopped on
/// disconnect.
pub struct BleTransport {
    adapter: Adapter,
    scan_timeout: Duration,
    peers: Mutex<HashMap<String, Peripheral>>,
    links: Mutex<HashMap<u64, LinkEntry>>,
    next_link: AtomicU64,
}

struct LinkEntry {
    peripheral: Peripheral,
    listeners: HashMap<Uuid, JoinHandle<()>>,
}

impl BleTransport {
    /// Open the first Bluetooth adapter of the host
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoAdapter`] if the host has none.
    pub async fn new() -> Result<Self> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(Error::NoAdapter)?;

        Ok(Self::with_adapter(adapter))
    }

    /// Use a specific adapter
    pub fn with_adapter(adapter: Adapter) -> Self {
        Self {
            adapter,
            scan_timeout: SCAN_TIMEOUT,
            peers: Mutex::new(HashMap::new()),
            links: Mutex::new(HashMap::new()),
            next_link: AtomicU64::new(1),
        }
    }

    /// Set how long `resolve` scans before giving up
    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    async fn find_peripheral(&self, address: &str) -> Result<Option<Peripheral>> {
        if let Some(peripheral) = self.lookup(address).await? {
            return Ok(Some(peripheral));
        }

        debug!(address, timeout = ?self.scan_timeout, "Scanning");
        self.adapter.start_scan(ScanFilter::default()).await?;

        let deadline = Instant::now() + self.scan_timeout;
        let found = loop {
            if let Some(peripheral) = self.lookup(address).await? {
                break Some(peripheral);
            }
            if Instant::now() >= deadline {
                break None;
            }
            tokio::time::sleep(SCAN_POLL).await;
        };

        if let Err(e) = self.adapter.stop_scan().await {
            warn!(error = %e, "Failed to stop scan");
        }

        Ok(found)
    }

    async fn lookup(&self, address: &str) -> Result<Option<Peripheral>> {
        let peripherals = self.adapter.peripherals().await?;
        Ok(peripherals.into_iter().find(|p| {
            peripheral_matches(&p.address().to_string(), &p.id().to_string(), address)
        }))
    }

    fn peripheral(&self, link: &Link) -> Result<Peripheral> {
        self.links
            .lock()
            .get(&link.id)
            .map(|entry| entry.peripheral.clone())
            .ok_or(Error::UnknownLink(link.id))
    }

    fn characteristic(&self, link: &Link, uuid: Uuid) -> Result<(Peripheral, Characteristic)> {
        let peripheral = self.peripheral(link)?;
        let characteristic = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == uuid)
            .ok_or(Error::CharacteristicNotFound(uuid))?;

        Ok((peripheral, characteristic))
    }
}

#[async_trait]
impl Transport for BleTransport {
    async fn resolve(&self, address: &str) -> Result<Option<Peer>> {
        let Some(peripheral) = self.find_peripheral(address).await? else {
            debug!(address, "Peer not found");
            return Ok(None);
        };

        let name = peripheral
            .properties()
            .await?
            .and_then(|props| props.local_name);

        self.peers
            .lock()
            .insert(normalize(address), peripheral);

        let peer = Peer::new(address);
        Ok(Some(match name {
            Some(name) => peer.with_name(name),
            None => peer,
        }))
    }

    async fn connect(&self, peer: &Peer) -> Result<Link> {
        let cached = self.peers.lock().get(&normalize(&peer.address)).cloned();
        let peripheral = match cached {
            Some(peripheral) => peripheral,
            None => self
                .find_peripheral(&peer.address)
                .await?
                .ok_or_else(|| Error::PeerNotResolved(peer.address.clone()))?,
        };

        debug!(address = %peer.address, "Connecting via BLE...");

        if !peripheral.is_connected().await? {
            peripheral
                .connect()
                .await
                .map_err(|e| Error::ConnectionFailed(format!("{}: {}", peer.address, e)))?;
        }
        peripheral.discover_services().await?;

        let id = self.next_link.fetch_add(1, Ordering::Relaxed);
        self.links.lock().insert(
            id,
            LinkEntry {
                peripheral,
                listeners: HashMap::new(),
            },
        );

        debug!(address = %peer.address, link = id, "Connected via BLE");

        Ok(Link {
            id,
            address: peer.address.clone(),
        })
    }

    async fn disconnect(&self, link: &Link) -> Result<()> {
        let Some(entry) = self.links.lock().remove(&link.id) else {
            return Err(Error::UnknownLink(link.id));
        };

        for (_, listener) in entry.listeners {
            listener.abort();
        }

        debug!(%link, "Disconnecting...");
        if entry.peripheral.is_connected().await? {
            entry.peripheral.disconnect().await?;
        }

        Ok(())
    }

    async fn has_characteristic(&self, link: &Link, uuid: Uuid) -> Result<bool> {
        let peripheral = self.peripheral(link)?;
        Ok(peripheral.characteristics().iter().any(|c| c.uuid == uuid))
    }

    async fn read(&self, link: &Link, uuid: Uuid) -> Result<Bytes> {
        let (peripheral, characteristic) = self.characteristic(link, uuid)?;
        let value = peripheral.read(&characteristic).await?;

        trace!(%uuid, len = value.len(), "Read characteristic");
        Ok(Bytes::from(value))
    }

    async fn write(&self, link: &Link, uuid: Uuid, data: &[u8]) -> Result<()> {
        let (peripheral, characteristic) = self.characteristic(link, uuid)?;

        let write_type = if characteristic.properties.contains(CharPropFlags::WRITE) {
            WriteType::WithResponse
        } else {
            WriteType::WithoutResponse
        };

        trace!(%uuid, data = %hex::encode(data), "Writing characteristic");
        peripheral.write(&characteristic, data, write_type).await?;

        Ok(())
    }

    async fn subscribe(&self, link: &Link, uuid: Uuid, callback: NotifyCallback) -> Result<()> {
        let (peripheral, characteristic) = self.characteristic(link, uuid)?;

        // Open the stream first so nothing sent right after subscribing is lost
        let mut notifications = peripheral.notifications().await?;
        peripheral.subscribe(&characteristic).await?;

        let listener = tokio::spawn(async move {
            while let Some(notification) = notifications.next().await {
                if notification.uuid == uuid {
                    trace!(%uuid, data = %hex::encode(&notification.value), "Notification");
                    callback(&notification.value);
                }
            }
        });

        let mut links = self.links.lock();
        match links.get_mut(&link.id) {
            Some(entry) => {
                if let Some(previous) = entry.listeners.insert(uuid, listener) {
                    previous.abort();
                }
                Ok(())
            }
            None => {
                listener.abort();
                Err(Error::UnknownLink(link.id))
            }
        }
    }

    async fn unsubscribe(&self, link: &Link, uuid: Uuid) -> Result<()> {
        let listener = self
            .links
            .lock()
            .get_mut(&link.id)
            .and_then(|entry| entry.listeners.remove(&uuid));

        if let Some(listener) = listener {
            listener.abort();
        }

        let (peripheral, characteristic) = self.characteristic(link, uuid)?;
        peripheral.unsubscribe(&characteristic).await?;

        Ok(())
    }
}

fn normalize(address: &str) -> String {
    address.to_ascii_uppercase()
}

fn address_matches(candidate: &str, wanted: &str) -> bool {
    candidate.eq_ignore_ascii_case(wanted)
}

/// Match on the MAC address or, where the platform hides it (CoreBluetooth
/// reports all zeros), on the platform peripheral id
fn peripheral_matches(address: &str, id: &str, wanted: &str) -> bool {
    address_matches(address, wanted) || address_matches(id, wanted)
}
