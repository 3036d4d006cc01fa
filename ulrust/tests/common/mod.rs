//! Simulated lock for integration tests
//!
//! Implements `Transport` and speaks the real wire protocol: it decrypts
//! request frames, answers with encrypted responses and plays the lock side
//! of all three key exchanges.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use parking_lot::Mutex;
use rand::rngs::OsRng;
use uuid::Uuid;

use ulrust::{Link, NotifyCallback, Peer, Transport};
use ulrust_core::checksum;
use ulrust_core::constants::{gatt, FRAME_MARKER};
use ulrust_core::ecc::{EphemeralSecret, Point};
use ulrust_core::{CommandCode, KeyExchangeKind, ResponseFrame, SessionKey};
use ulrust_transport::{Error, Result};

pub const LOCK: &str = "AA:BB:CC:DD:EE:FF";
pub const WAKEUP: &str = "11:22:33:44:55:66";

pub const STATIC_SECRET: [u8; 8] = *b"\x01\x02\x03\x04\x05\x06\x07\x08";
pub const MD5_SECRET: [u8; 16] = [
    0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18, 0x19, 0x1A, 0x1B, 0x1C, 0x1D, 0x1E, 0x1F,
];

/// Transport call, as seen by the lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Resolve(String),
    Connect(String),
    Disconnect(String),
    Read(Uuid),
    Write(Uuid),
    Subscribe(Uuid),
    Unsubscribe(Uuid),
}

pub struct SimulatedLock {
    state: Mutex<SimState>,
}

struct SimState {
    key_exchange: Option<KeyExchangeKind>,
    wakeup: Option<String>,
    asleep: bool,
    connect_failures: u32,
    silent: HashSet<CommandCode>,
    withhold_public_key: bool,
    noisy: HashSet<CommandCode>,
    responses: HashMap<CommandCode, Vec<u8>>,
    calls: Vec<Call>,
    commands: Vec<CommandCode>,
    keys: Vec<SessionKey>,
    next_link: u64,
    links: HashMap<u64, LinkState>,
}

struct LinkState {
    address: String,
    key: Option<SessionKey>,
    subscriptions: HashMap<Uuid, NotifyCallback>,
    inbound: ResponseFrame,
    peer_key: Vec<u8>,
}

type Delivery = (NotifyCallback, Vec<u8>);

impl SimulatedLock {
    /// Awake lock using the static key exchange
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState {
                key_exchange: Some(KeyExchangeKind::Static),
                wakeup: None,
                asleep: false,
                connect_failures: 0,
                silent: HashSet::new(),
                withhold_public_key: false,
                noisy: HashSet::new(),
                responses: HashMap::new(),
                calls: Vec::new(),
                commands: Vec::new(),
                keys: Vec::new(),
                next_link: 1,
                links: HashMap::new(),
            }),
        }
    }

    /// Offer a key exchange scheme, `None` for no key characteristic at all
    pub fn with_key_exchange(self, kind: Option<KeyExchangeKind>) -> Self {
        self.state.lock().key_exchange = kind;
        self
    }

    /// Pair a wake-up receiver
    pub fn with_wakeup_receiver(self) -> Self {
        self.state.lock().wakeup = Some(WAKEUP.to_string());
        self
    }

    /// Lock is not found until the wake-up receiver is contacted
    pub fn asleep(self) -> Self {
        self.state.lock().asleep = true;
        self
    }

    /// Fail the next `count` connects to the lock
    pub fn fail_connects(self, count: u32) -> Self {
        self.state.lock().connect_failures = count;
        self
    }

    /// Never answer `command`
    pub fn silent(self, command: CommandCode) -> Self {
        self.state.lock().silent.insert(command);
        self
    }

    /// Take the client's ECDH public key but never send one back
    pub fn withhold_public_key(self) -> Self {
        self.state.lock().withhold_public_key = true;
        self
    }

    /// Precede the answer to `command` with a stray chunk, a frame with an
    /// unknown response code and a frame answering some other command
    pub fn noisy(self, command: CommandCode) -> Self {
        self.state.lock().noisy.insert(command);
        self
    }

    /// Answer `command` with `data`
    pub fn respond(self, command: CommandCode, data: &[u8]) -> Self {
        self.state.lock().responses.insert(command, data.to_vec());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    /// Commands received, in order
    pub fn commands(&self) -> Vec<CommandCode> {
        self.state.lock().commands.clone()
    }

    /// Session keys established, one per lock connection
    pub fn keys(&self) -> Vec<SessionKey> {
        self.state.lock().keys.clone()
    }

    pub fn open_links(&self) -> usize {
        self.state.lock().links.len()
    }

    pub fn connects_to(&self, address: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Connect(a) if a == address))
            .count()
    }
}

impl SimState {
    fn record(&mut self, call: Call) {
        self.calls.push(call);
    }

    fn lock_link(&mut self, link: &Link) -> Result<&mut LinkState> {
        let state = self
            .links
            .get_mut(&link.id)
            .ok_or(Error::UnknownLink(link.id))?;
        if state.address != LOCK {
            return Err(Error::NotConnected);
        }
        Ok(state)
    }

    fn response_payload(&self, command: CommandCode) -> Vec<u8> {
        if let Some(data) = self.responses.get(&command) {
            return data.clone();
        }

        match command {
            // locked, bolt thrown, battery high, normal mode, muted
            CommandCode::LockStatus => vec![0, 2, 2, 3, 0, 1],
            CommandCode::GetLockStatus => vec![0, 2, 2],
            CommandCode::GetBattery => vec![0, 2],
            CommandCode::GetMute => vec![0, 0],
            CommandCode::GetSn => b"SIM0001\0\0\0\0\0\0\0\0\0".to_vec(),
            CommandCode::GetAutolock => vec![0, 30, 0],
            _ => vec![0],
        }
    }

    /// Handle a write to the data characteristic
    fn on_data(&mut self, link: &Link, data: &[u8]) -> Result<Vec<Delivery>> {
        let state = self.lock_link(link)?;
        let key = state.key.clone().ok_or(Error::NotConnected)?;
        let plain = key
            .decrypt(data)
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;

        let mut completed = Vec::new();
        for chunk in plain.chunks(16) {
            if state.inbound.push(chunk) && state.inbound.is_completed() {
                completed.push(state.inbound.command_byte());
                state.inbound.reset();
            }
        }
        let callback = state.subscriptions.get(&gatt::LOCK_DATA).cloned();

        let mut deliveries = Vec::new();
        for command in completed.into_iter().flatten() {
            let Ok(command) = CommandCode::try_from(command) else {
                continue;
            };
            self.commands.push(command);

            let Some(code) = command.response_code() else {
                continue;
            };
            if self.silent.contains(&command) {
                continue;
            }
            let Some(callback) = callback.clone() else {
                continue;
            };

            let mut frames = Vec::new();
            if self.noisy.contains(&command) {
                let other = if command == CommandCode::GetBattery {
                    CommandCode::GetMute
                } else {
                    CommandCode::GetBattery
                };
                frames.push(Bytes::from_static(&[0x11; 16]));
                frames.push(response_frame(0x01, &[0]));
                if let Some(other_code) = other.response_code() {
                    frames.push(response_frame(other_code.into(), &self.response_payload(other)));
                }
            }
            frames.push(response_frame(code.into(), &self.response_payload(command)));

            for block in frames.iter().flat_map(|frame| key.encrypt_frame(frame)) {
                deliveries.push((callback.clone(), block.to_vec()));
            }
        }

        Ok(deliveries)
    }

    /// Handle a write to the ECC characteristic
    fn on_public_key(&mut self, link: &Link, data: &[u8]) -> Result<Vec<Delivery>> {
        let withhold = self.withhold_public_key;
        let state = self.lock_link(link)?;
        state.peer_key.extend_from_slice(data);
        if state.peer_key.len() < 32 || withhold {
            return Ok(Vec::new());
        }

        let peer = Point::from_le_bytes(&state.peer_key[..16], &state.peer_key[16..32])
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        let secret = EphemeralSecret::random(&mut OsRng);
        let key = secret
            .diffie_hellman(&peer)
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        let (x, y) = secret
            .public_key()
            .to_le_bytes()
            .ok_or(Error::NotConnected)?;

        state.key = Some(key.clone());
        state.peer_key.clear();
        let callback = state.subscriptions.get(&gatt::LOCK_KEY_ECC).cloned();
        self.keys.push(key);

        Ok(callback
            .map(|cb| vec![(cb.clone(), x.to_vec()), (cb, y.to_vec())])
            .unwrap_or_default())
    }
}

/// Plaintext response frame with a valid CRC
pub fn response_frame(code: u8, data: &[u8]) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_u8(FRAME_MARKER);
    buf.put_u16_le((data.len() + 2) as u16);
    buf.put_u8(code);
    buf.put_slice(data);
    let crc = checksum::calculate(&buf[3..]);
    buf.put_u8(crc);
    buf.freeze()
}

fn deliver(deliveries: Vec<Delivery>) {
    for (callback, data) in deliveries {
        callback(&data);
    }
}

#[async_trait]
impl Transport for SimulatedLock {
    async fn resolve(&self, address: &str) -> Result<Option<Peer>> {
        let mut state = self.state.lock();
        state.record(Call::Resolve(address.to_string()));

        let found = if address == LOCK {
            !state.asleep
        } else {
            state.wakeup.as_deref() == Some(address)
        };

        Ok(found.then(|| Peer::new(address)))
    }

    async fn connect(&self, peer: &Peer) -> Result<Link> {
        let mut state = self.state.lock();
        state.record(Call::Connect(peer.address.clone()));

        if state.wakeup.as_deref() == Some(peer.address.as_str()) {
            state.asleep = false;
        } else if peer.address == LOCK {
            if state.connect_failures > 0 {
                state.connect_failures -= 1;
                return Err(Error::ConnectionFailed("simulated failure".into()));
            }
        } else {
            return Err(Error::PeerNotResolved(peer.address.clone()));
        }

        let key = match state.key_exchange {
            Some(KeyExchangeKind::Static) => Some(KeyExchangeKind::Static.derive(&STATIC_SECRET)),
            Some(KeyExchangeKind::Md5Derived) => {
                Some(KeyExchangeKind::Md5Derived.derive(&MD5_SECRET))
            }
            _ => None,
        }
        .transpose()
        .map_err(|e| Error::ConnectionFailed(e.to_string()))?;

        if peer.address == LOCK {
            if let Some(key) = &key {
                state.keys.push(key.clone());
            }
        }

        let id = state.next_link;
        state.next_link += 1;
        state.links.insert(
            id,
            LinkState {
                address: peer.address.clone(),
                key,
                subscriptions: HashMap::new(),
                inbound: ResponseFrame::new(),
                peer_key: Vec::new(),
            },
        );

        Ok(Link {
            id,
            address: peer.address.clone(),
        })
    }

    async fn disconnect(&self, link: &Link) -> Result<()> {
        let mut state = self.state.lock();
        state.record(Call::Disconnect(link.address.clone()));
        state
            .links
            .remove(&link.id)
            .map(|_| ())
            .ok_or(Error::UnknownLink(link.id))
    }

    async fn has_characteristic(&self, link: &Link, uuid: Uuid) -> Result<bool> {
        let mut state = self.state.lock();
        let kind = state.key_exchange;
        state.lock_link(link)?;

        Ok(uuid == gatt::LOCK_DATA || kind.map(|k| k.characteristic()) == Some(uuid))
    }

    async fn read(&self, link: &Link, uuid: Uuid) -> Result<Bytes> {
        let mut state = self.state.lock();
        state.record(Call::Read(uuid));
        state.lock_link(link)?;

        match uuid {
            u if u == gatt::LOCK_KEY_STATIC => Ok(Bytes::copy_from_slice(&STATIC_SECRET)),
            u if u == gatt::LOCK_KEY_MD5 => Ok(Bytes::copy_from_slice(&MD5_SECRET)),
            other => Err(Error::CharacteristicNotFound(other)),
        }
    }

    async fn write(&self, link: &Link, uuid: Uuid, data: &[u8]) -> Result<()> {
        let deliveries = {
            let mut state = self.state.lock();
            state.record(Call::Write(uuid));

            if uuid == gatt::LOCK_DATA {
                state.on_data(link, data)?
            } else if uuid == gatt::LOCK_KEY_ECC {
                state.on_public_key(link, data)?
            } else {
                return Err(Error::CharacteristicNotFound(uuid));
            }
        };

        // Callbacks run outside the lock, like a real notification task
        deliver(deliveries);
        Ok(())
    }

    async fn subscribe(&self, link: &Link, uuid: Uuid, callback: NotifyCallback) -> Result<()> {
        let mut state = self.state.lock();
        state.record(Call::Subscribe(uuid));
        state.lock_link(link)?.subscriptions.insert(uuid, callback);
        Ok(())
    }

    async fn unsubscribe(&self, link: &Link, uuid: Uuid) -> Result<()> {
        let mut state = self.state.lock();
        state.record(Call::Unsubscribe(uuid));
        state.lock_link(link)?.subscriptions.remove(&uuid);
        Ok(())
    }
}
