//! Session key negotiation over an open link

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::OsRng;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use ulrust_core::ecc::{EphemeralSecret, Point};
use ulrust_core::{KeyExchangeKind, SessionKey};
use ulrust_transport::{Link, NotifyCallback, Transport};

use crate::error::{Error, Result};

/// Bytes of the peer public key: x then y, 16 bytes each
const PEER_KEY_LEN: usize = 32;

/// Find the key exchange scheme the lock offers
///
/// # Errors
///
/// Returns [`Error::UnsupportedEncryption`] if none of the key characteristics
/// is present.
pub async fn probe(transport: &dyn Transport, link: &Link) -> Result<KeyExchangeKind> {
    for kind in KeyExchangeKind::PROBE_ORDER {
        if transport.has_characteristic(link, kind.characteristic()).await? {
            debug!(%link, %kind, "Key exchange selected");
            return Ok(kind);
        }
    }

    Err(Error::UnsupportedEncryption {
        address: link.address.clone(),
    })
}

/// Derive the session key for this link
///
/// # Errors
///
/// Returns [`Error::KeyExchangeFailed`] for a malformed secret, an invalid
/// peer point or no peer key within `timeout`.
pub async fn negotiate(
    transport: &dyn Transport,
    link: &Link,
    kind: KeyExchangeKind,
    timeout: Duration,
) -> Result<SessionKey> {
    match kind {
        KeyExchangeKind::Static | KeyExchangeKind::Md5Derived => {
            let secret = transport.read(link, kind.characteristic()).await?;
            kind.derive(&secret)
                .map_err(|e| Error::KeyExchangeFailed(format!("{} secret: {}", kind, e)))
        }
        KeyExchangeKind::Ecdh => ecdh(transport, link, timeout).await,
    }
}

async fn ecdh(transport: &dyn Transport, link: &Link, timeout: Duration) -> Result<SessionKey> {
    let secret = EphemeralSecret::random(&mut OsRng);
    let (x, y) = secret
        .public_key()
        .to_le_bytes()
        .ok_or_else(|| Error::KeyExchangeFailed("degenerate public key".into()))?;

    let characteristic = KeyExchangeKind::Ecdh.characteristic();
    let (tx, rx) = oneshot::channel();
    let collector = PeerKeyCollector::new(tx);

    let callback: NotifyCallback = Arc::new(move |data: &[u8]| collector.push(data));
    transport.subscribe(link, characteristic, callback).await?;

    let peer = exchange(transport, link, &x, &y, rx, timeout).await;

    // The subscription must go whatever the outcome
    let unsubscribed = transport.unsubscribe(link, characteristic).await;
    let peer = peer?;
    unsubscribed?;

    let point = Point::from_le_bytes(&peer[..16], &peer[16..])
        .map_err(|e| Error::KeyExchangeFailed(format!("peer public key: {}", e)))?;

    secret
        .diffie_hellman(&point)
        .map_err(|e| Error::KeyExchangeFailed(format!("shared secret: {}", e)))
}

async fn exchange(
    transport: &dyn Transport,
    link: &Link,
    x: &[u8; 16],
    y: &[u8; 16],
    rx: oneshot::Receiver<[u8; PEER_KEY_LEN]>,
    timeout: Duration,
) -> Result<[u8; PEER_KEY_LEN]> {
    let characteristic = KeyExchangeKind::Ecdh.characteristic();
    transport.write(link, characteristic, x).await?;
    transport.write(link, characteristic, y).await?;
    trace!(%link, "Public key sent");

    match tokio::time::timeout(timeout, rx).await {
        Ok(Ok(peer)) => Ok(peer),
        Ok(Err(_)) => Err(Error::KeyExchangeFailed("key listener dropped".into())),
        Err(_) => Err(Error::KeyExchangeFailed(format!(
            "no peer public key within {:?}",
            timeout
        ))),
    }
}

/// Accumulates notified key bytes until both coordinates are in
struct PeerKeyCollector {
    state: Mutex<CollectorState>,
}

struct CollectorState {
    buf: Vec<u8>,
    done: Option<oneshot::Sender<[u8; PEER_KEY_LEN]>>,
}

impl PeerKeyCollector {
    fn new(done: oneshot::Sender<[u8; PEER_KEY_LEN]>) -> Self {
        Self {
            state: Mutex::new(CollectorState {
                buf: Vec::with_capacity(PEER_KEY_LEN),
                done: Some(done),
            }),
        }
    }

    fn push(&self, data: &[u8]) {
        let mut state = self.state.lock();
        if state.done.is_none() {
            return;
        }

        state.buf.extend_from_slice(data);
        if state.buf.len() < PEER_KEY_LEN {
            return;
        }

        let mut key = [0u8; PEER_KEY_LEN];
        key.copy_from_slice(&state.buf[..PEER_KEY_LEN]);
        if let Some(done) = state.done.take() {
            let _ = done.send(key);
        }
    }
}
