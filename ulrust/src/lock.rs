//! High-level lock interface

use std::fmt;
use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use ulrust_core::{CommandCode, Credentials, Session};
use ulrust_transport::Transport;
use ulrust_types::{AccountDevice, Capabilities, DeviceStatus, WorkMode};

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::observer::{SessionObserver, TracingObserver};
use crate::queue::CommandQueue;
use crate::request::Request;
use crate::session::DeviceSession;

/// Ultraloq lock
///
/// High-level interface for one physical lock. Each operation queues its
/// requests and sends them over a fresh connection. Only one batch can be in
/// flight per lock; different locks can be driven concurrently over the same
/// transport.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use ulrust::{BleTransport, Lock};
/// use ulrust_core::Credentials;
///
/// #[tokio::main]
/// async fn main() -> ulrust::Result<()> {
///     let transport = Arc::new(BleTransport::new().await?);
///     let credentials = Credentials::new(1, "123456")?;
///
///     let lock = Lock::new("AA:BB:CC:DD:EE:FF", credentials, transport)
///         .with_model("U-Bolt");
///
///     lock.unlock().await?;
///     println!("{}", lock.status());
///     Ok(())
/// }
/// ```
pub struct Lock {
    address: String,
    wakeup: Option<String>,
    name: String,
    model: String,
    credentials: Credentials,
    capabilities: Capabilities,
    transport: Arc<dyn Transport>,
    session: Session,
    queue: Mutex<CommandQueue>,
    status: RwLock<DeviceStatus>,
    config: SessionConfig,
    observer: Arc<dyn SessionObserver>,
}

impl Lock {
    /// Create a lock of unknown model
    pub fn new(
        address: impl Into<String>,
        credentials: Credentials,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let address = address.into();
        Self {
            name: address.clone(),
            address,
            wakeup: None,
            model: String::new(),
            credentials,
            capabilities: Capabilities::GENERIC,
            transport,
            session: Session::new(),
            queue: Mutex::new(CommandQueue::new()),
            status: RwLock::new(DeviceStatus::default()),
            config: SessionConfig::default(),
            observer: Arc::new(TracingObserver),
        }
    }

    /// Create a lock from an account API record
    ///
    /// # Errors
    ///
    /// Fails if the record's admin password cannot be decoded or packed.
    pub fn from_account(device: &AccountDevice, transport: Arc<dyn Transport>) -> Result<Self> {
        let credentials = Credentials::new(device.user.uid, device.admin_password()?)?;

        let lock = Self::new(device.uuid.clone(), credentials, transport)
            .with_name(device.name.clone())
            .with_model(device.model.clone())
            .with_wakeup_receiver(device.wakeup_receiver().map(str::to_string));

        if let Some(serial) = device.params.serialnumber.clone() {
            lock.status.write().serial_number = Some(serial);
        }

        Ok(lock)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the model, which selects the capability table
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self.capabilities = Capabilities::for_model(&self.model);
        self
    }

    /// Set the wake-up receiver paired with the lock
    pub fn with_wakeup_receiver(mut self, receiver: Option<String>) -> Self {
        self.wakeup = receiver.filter(|r| !r.is_empty());
        self
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the sink for session events (default: [`TracingObserver`])
    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn wakeup_receiver(&self) -> Option<&str> {
        self.wakeup.as_deref()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Last known status
    pub fn status(&self) -> DeviceStatus {
        self.status.read().clone()
    }

    /// Session state of this lock
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Check if a batch is in flight
    pub fn is_busy(&self) -> bool {
        self.session.is_busy()
    }

    /// Number of queued requests
    pub fn queued(&self) -> usize {
        self.queue.lock().len()
    }

    /// Build a request signed with this lock's credentials
    pub fn request(&self, command: CommandCode) -> Result<Request> {
        Request::new(command, &self.credentials)
    }

    /// Queue a request for the next [`send_requests`](Self::send_requests)
    ///
    /// Priority requests are sent before everything already queued.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] while a batch is in flight.
    pub fn enqueue(&self, request: Request, priority: bool) -> Result<()> {
        if self.session.is_busy() {
            return Err(self.busy());
        }

        debug!(address = %self.address, command = %request.command, priority, "Queued request");
        self.queue.lock().push(request, priority);
        Ok(())
    }

    /// Send all queued requests over one connection
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyQueue`] if nothing is queued
    /// - [`Error::Busy`] if a batch is already in flight (nothing is touched)
    /// - any session error; the queue is cleared
    pub async fn send_requests(&self) -> Result<()> {
        if self.queue.lock().is_empty() {
            return Err(Error::EmptyQueue);
        }

        let guard = self.session.begin().map_err(|_| self.busy())?;

        DeviceSession::new(
            guard,
            self.address.clone(),
            self.transport.clone(),
            self.config.clone(),
            self.observer.clone(),
        )
        .with_wakeup_receiver(self.wakeup.clone())
        .run(&self.queue, &self.status)
        .await
    }

    /// Unlock
    pub async fn unlock(&self) -> Result<()> {
        info!(address = %self.address, "Unlocking");
        self.actuate(CommandCode::Unlock).await
    }

    /// Throw the bolt
    pub async fn bolt_lock(&self) -> Result<()> {
        info!(address = %self.address, "Locking");
        self.actuate(CommandCode::BoltLock).await
    }

    async fn actuate(&self, command: CommandCode) -> Result<()> {
        self.enqueue(self.request(CommandCode::LockStatus)?, false)?;
        self.enqueue(self.request(command)?, true)?;
        self.send_requests().await
    }

    /// Read the full status
    ///
    /// Locks with the combined status command get everything in one frame;
    /// older models are polled field by field.
    pub async fn update_status(&self) -> Result<DeviceStatus> {
        self.enqueue(self.request(CommandCode::AdminLogin)?, false)?;
        self.enqueue(self.request(CommandCode::LockStatus)?, false)?;

        if !self.capabilities.combined_status() {
            self.enqueue(self.request(CommandCode::GetBattery)?, false)?;
            self.enqueue(self.request(CommandCode::GetMute)?, false)?;
            if self.capabilities.serial_number() {
                self.enqueue(self.request(CommandCode::GetSn)?, false)?;
            }
        }
        if self.capabilities.autolock() {
            self.enqueue(self.request(CommandCode::GetAutolock)?, false)?;
        }

        self.send_requests().await?;
        Ok(self.status())
    }

    /// Reboot the lock
    ///
    /// The lock drops the link right away, so no response is awaited.
    pub async fn reboot(&self) -> Result<()> {
        self.enqueue(self.request(CommandCode::Reboot)?, false)?;
        self.send_requests().await
    }

    /// Change the work mode
    pub async fn set_work_mode(&self, mode: WorkMode) -> Result<()> {
        let command = if self.capabilities.combined_status() {
            CommandCode::SetLockStatus
        } else {
            CommandCode::SetWorkMode
        };

        self.enqueue(self.request(CommandCode::AdminLogin)?, false)?;
        self.enqueue(
            Request::with_payload(command, vec![mode.raw()], &self.credentials)?,
            false,
        )?;
        self.send_requests().await?;

        self.status.write().work_mode = Some(mode);
        Ok(())
    }

    /// Change the auto-lock delay
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSupported`] if the model has no auto-lock.
    pub async fn set_autolock(&self, seconds: u16) -> Result<()> {
        if !self.capabilities.autolock() {
            return Err(Error::NotSupported(format!(
                "auto-lock on model '{}'",
                self.model
            )));
        }

        let mut payload = BytesMut::with_capacity(3);
        payload.put_u16_le(seconds);
        payload.put_u8(0);

        self.enqueue(self.request(CommandCode::AdminLogin)?, false)?;
        self.enqueue(
            Request::with_payload(CommandCode::SetAutolock, payload.freeze(), &self.credentials)?,
            false,
        )?;
        self.send_requests().await?;

        self.status.write().autolock_seconds = Some(seconds);
        Ok(())
    }

    fn busy(&self) -> Error {
        Error::Busy {
            address: self.address.clone(),
        }
    }
}

impl fmt::Debug for Lock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lock")
            .field("address", &self.address)
            .field("name", &self.name)
            .field("model", &self.model)
            .field("wakeup", &self.wakeup)
            .field("credentials", &self.credentials)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

impl fmt::Display for Lock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}
