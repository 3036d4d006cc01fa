//! One request batch over one connection
//!
//! A [`DeviceSession`] is created per `send_requests` call. It:
//! - Resolves and connects to the lock, waking it through its wake-up
//!   receiver when needed
//! - Negotiates a fresh session key for the connection
//! - Drains the command queue, waiting for each response
//! - Always disconnects before returning

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::oneshot;
use tracing::{debug, info, trace, warn};

use ulrust_core::constants::gatt;
use ulrust_core::{
    CommandCode, Response, ResponseAssembler, ResponseCode, SessionGuard, SessionKey,
    SessionState,
};
use ulrust_transport::{Link, NotifyCallback, Peer, Transport};
use ulrust_types::DeviceStatus;

use crate::config::SessionConfig;
use crate::decode::apply_response;
use crate::error::{Error, Result};
use crate::key_exchange;
use crate::observer::{SessionEvent, SessionObserver};
use crate::queue::CommandQueue;
use crate::request::Request;

/// Connection lifecycle of one request batch
///
/// Holds the claim on the lock's [`Session`](ulrust_core::Session) for its
/// whole lifetime; dropping it frees the lock for the next batch.
pub struct DeviceSession {
    address: String,
    wakeup: Option<String>,
    transport: Arc<dyn Transport>,
    config: SessionConfig,
    observer: Arc<dyn SessionObserver>,
    guard: SessionGuard,
}

impl DeviceSession {
    pub fn new(
        guard: SessionGuard,
        address: impl Into<String>,
        transport: Arc<dyn Transport>,
        config: SessionConfig,
        observer: Arc<dyn SessionObserver>,
    ) -> Self {
        Self {
            address: address.into(),
            wakeup: None,
            transport,
            config,
            observer,
            guard,
        }
    }

    /// Set the wake-up receiver to contact when the lock is asleep
    pub fn with_wakeup_receiver(mut self, receiver: Option<String>) -> Self {
        self.wakeup = receiver;
        self
    }

    /// Send every queued request
    ///
    /// Requests leave the queue once answered. On error the rest of the queue
    /// is dropped and the error returned; nothing is retried on a new
    /// connection. The same holds if the returned future is dropped before it
    /// completes.
    pub async fn run(
        &self,
        queue: &Mutex<CommandQueue>,
        status: &RwLock<DeviceStatus>,
    ) -> Result<()> {
        info!(
            address = %self.address,
            batch = self.guard.batch(),
            queued = queue.lock().len(),
            "Sending requests"
        );

        let _pending = PendingBatch {
            queue,
            address: &self.address,
        };

        self.transition(SessionState::Connecting)?;

        let result = self.connect_and_drain(queue, status).await;

        match &result {
            Ok(()) => {
                self.transition(SessionState::Idle)?;
            }
            Err(e) => {
                let dropped = queue.lock().clear();
                warn!(address = %self.address, error = %e, dropped, "Request batch failed");

                if self.guard.state().can_transition(SessionState::Failed) {
                    self.transition(SessionState::Failed)?;
                    self.transition(SessionState::Idle)?;
                }
            }
        }

        result
    }

    async fn connect_and_drain(
        &self,
        queue: &Mutex<CommandQueue>,
        status: &RwLock<DeviceStatus>,
    ) -> Result<()> {
        let link = self.connect().await?;
        let mut link = LinkGuard::new(self.transport.clone(), link);

        let result = self.drain(&mut link, queue, status).await;
        link.release().await;

        result
    }

    /// Resolve and connect, retrying with one wake-up in between
    async fn connect(&self) -> Result<Link> {
        let max = self.config.max_attempts;
        let mut woken = false;

        for attempt in 1..=max {
            if attempt > 1 {
                tokio::time::sleep(self.config.retry_delay).await;
                if !woken {
                    woken = true;
                    self.wake().await?;
                }
            }

            self.emit(SessionEvent::ConnectAttempt { attempt, max });

            let peer = match self.resolve().await {
                Some(peer) => peer,
                None if !woken && self.wakeup.is_some() => {
                    woken = true;
                    self.wake().await?;
                    match self.resolve().await {
                        Some(peer) => peer,
                        None => continue,
                    }
                }
                None => continue,
            };

            match self.transport.connect(&peer).await {
                Ok(link) => {
                    debug!(address = %self.address, attempt, %link, "Connected");
                    return Ok(link);
                }
                Err(e) => {
                    warn!(address = %self.address, attempt, error = %e, "Connect failed");
                }
            }
        }

        Err(Error::DeviceNotAvailable {
            address: self.address.clone(),
            attempts: max,
        })
    }

    async fn resolve(&self) -> Option<Peer> {
        match self.transport.resolve(&self.address).await {
            Ok(Some(peer)) => Some(peer),
            Ok(None) => {
                debug!(address = %self.address, "Lock not found");
                None
            }
            Err(e) => {
                warn!(address = %self.address, error = %e, "Resolve failed");
                None
            }
        }
    }

    /// Connect briefly to the wake-up receiver
    ///
    /// A failed wake-up is logged; the next connect attempt decides.
    async fn wake(&self) -> Result<()> {
        let Some(receiver) = self.wakeup.as_deref() else {
            return Ok(());
        };

        self.transition(SessionState::WakingPeer)?;
        self.emit(SessionEvent::WakeUp {
            receiver: receiver.to_string(),
        });

        match self.transport.resolve(receiver).await {
            Ok(Some(peer)) => match self.transport.connect(&peer).await {
                Ok(link) => {
                    tokio::time::sleep(self.config.wakeup_hold).await;
                    if let Err(e) = self.transport.disconnect(&link).await {
                        warn!(receiver, error = %e, "Wake-up receiver disconnect failed");
                    }
                }
                Err(e) => warn!(receiver, error = %e, "Wake-up receiver connect failed"),
            },
            Ok(None) => warn!(receiver, "Wake-up receiver not found"),
            Err(e) => warn!(receiver, error = %e, "Wake-up receiver resolve failed"),
        }

        self.transition(SessionState::Connecting)?;
        Ok(())
    }

    async fn drain(
        &self,
        link: &mut LinkGuard,
        queue: &Mutex<CommandQueue>,
        status: &RwLock<DeviceStatus>,
    ) -> Result<()> {
        self.transition(SessionState::KeyExchange)?;

        let kind = key_exchange::probe(self.transport.as_ref(), link.link()).await?;
        let key = key_exchange::negotiate(
            self.transport.as_ref(),
            link.link(),
            kind,
            self.config.key_exchange_timeout,
        )
        .await?;
        self.emit(SessionEvent::KeyNegotiated { kind });

        self.transition(SessionState::Draining)?;

        loop {
            let next = queue.lock().front().cloned();
            let Some(request) = next else {
                break;
            };

            if let Some(response) = self.exchange(link, &key, &request, queue).await? {
                let next = apply_response(&status.read(), &response)?;
                *status.write() = next;
            }

            queue.lock().pop_front();
        }

        Ok(())
    }

    /// Send one request and wait for its response, if it has one
    async fn exchange(
        &self,
        link: &mut LinkGuard,
        key: &SessionKey,
        request: &Request,
        queue: &Mutex<CommandQueue>,
    ) -> Result<Option<Response>> {
        let Some(expected) = request.response_code() else {
            self.write_frame(link.link(), key, request).await?;
            mark_sent(queue);
            return Ok(None);
        };

        let (callback, rx) = self.response_listener(key, expected);
        link.subscribe(callback).await?;

        let result = async {
            self.write_frame(link.link(), key, request).await?;
            mark_sent(queue);
            self.await_response(rx, request.command).await
        }
        .await;

        let unsubscribed = link.unsubscribe().await;
        let response = result?;
        unsubscribed?;

        Ok(Some(response))
    }

    async fn write_frame(&self, link: &Link, key: &SessionKey, request: &Request) -> Result<()> {
        trace!(command = %request.command, frame = %hex::encode(&request.frame), "Sending frame");

        for block in key.encrypt_frame(&request.frame) {
            self.transport.write(link, gatt::LOCK_DATA, &block).await?;
        }

        self.emit(SessionEvent::CommandSent {
            command: request.command,
        });
        Ok(())
    }

    async fn await_response(
        &self,
        rx: oneshot::Receiver<Response>,
        command: CommandCode,
    ) -> Result<Response> {
        let timeout = self.config.response_timeout;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(ulrust_transport::Error::NotConnected.into()),
            Err(_) => Err(Error::ResponseTimeout { command, timeout }),
        }
    }

    /// Notification callback completing once `expected` arrives
    fn response_listener(
        &self,
        key: &SessionKey,
        expected: ResponseCode,
    ) -> (NotifyCallback, oneshot::Receiver<Response>) {
        let (tx, rx) = oneshot::channel();

        let assembler = ResponseAssembler::new(key.clone())
            .with_crc_check(self.config.verify_response_crc);
        let listener = Mutex::new(ResponseListener {
            assembler,
            done: Some(tx),
        });

        let address = self.address.clone();
        let observer = self.observer.clone();

        let callback: NotifyCallback = Arc::new(move |data: &[u8]| {
            let mut listener = listener.lock();

            match listener.assembler.on_notify(data) {
                Ok(Some(response)) if response.code == expected => {
                    observer.on_event(&address, &SessionEvent::ResponseReceived {
                        code: response.code,
                    });
                    if let Some(done) = listener.done.take() {
                        let _ = done.send(response);
                    }
                }
                Ok(Some(response)) => {
                    observer.on_event(&address, &SessionEvent::FrameDiscarded {
                        reason: format!("expected {}, got {}", expected, response.code),
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    observer.on_event(&address, &SessionEvent::FrameDiscarded {
                        reason: e.to_string(),
                    });
                }
            }
        });

        (callback, rx)
    }

    fn transition(&self, to: SessionState) -> Result<()> {
        let from = self.guard.transition(to)?;
        self.emit(SessionEvent::StateChanged { from, to });
        Ok(())
    }

    fn emit(&self, event: SessionEvent) {
        self.observer.on_event(&self.address, &event);
    }
}

struct ResponseListener {
    assembler: ResponseAssembler,
    done: Option<oneshot::Sender<Response>>,
}

/// Empties the queue when the batch ends, however it ends
struct PendingBatch<'a> {
    queue: &'a Mutex<CommandQueue>,
    address: &'a str,
}

impl Drop for PendingBatch<'_> {
    fn drop(&mut self) {
        let dropped = self.queue.lock().clear();
        if dropped > 0 {
            warn!(address = %self.address, dropped, "Request batch cancelled");
        }
    }
}

fn mark_sent(queue: &Mutex<CommandQueue>) {
    if let Some(request) = queue.lock().front_mut() {
        request.sent = true;
    }
}

/// Open link that is always torn down
///
/// `release` unsubscribes and disconnects. If the guard is dropped without
/// it, for instance when the batch future is cancelled, the same cleanup is
/// spawned on the runtime.
struct LinkGuard {
    transport: Arc<dyn Transport>,
    link: Link,
    subscribed: bool,
    released: bool,
}

impl LinkGuard {
    fn new(transport: Arc<dyn Transport>, link: Link) -> Self {
        Self {
            transport,
            link,
            subscribed: false,
            released: false,
        }
    }

    fn link(&self) -> &Link {
        &self.link
    }

    async fn subscribe(&mut self, callback: NotifyCallback) -> Result<()> {
        self.transport
            .subscribe(&self.link, gatt::LOCK_DATA, callback)
            .await?;
        self.subscribed = true;
        Ok(())
    }

    async fn unsubscribe(&mut self) -> Result<()> {
        self.subscribed = false;
        self.transport
            .unsubscribe(&self.link, gatt::LOCK_DATA)
            .await?;
        Ok(())
    }

    async fn release(mut self) {
        self.released = true;
        teardown(self.transport.as_ref(), &self.link, self.subscribed).await;
    }
}

impl Drop for LinkGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let transport = self.transport.clone();
        let link = self.link.clone();
        let subscribed = self.subscribed;

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    teardown(transport.as_ref(), &link, subscribed).await;
                });
            }
            Err(_) => warn!(%link, "Link dropped outside a runtime, not disconnected"),
        }
    }
}

async fn teardown(transport: &dyn Transport, link: &Link, subscribed: bool) {
    if subscribed {
        if let Err(e) = transport.unsubscribe(link, gatt::LOCK_DATA).await {
            debug!(%link, error = %e, "Unsubscribe failed");
        }
    }

    match transport.disconnect(link).await {
        Ok(()) => debug!(%link, "Disconnected"),
        Err(e) => warn!(%link, error = %e, "Disconnect failed"),
    }
}
