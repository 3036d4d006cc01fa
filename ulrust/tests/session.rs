//! Request batches against a simulated lock

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use mockall::mock;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use uuid::Uuid;

use common::{Call, SimulatedLock, LOCK, WAKEUP};
use ulrust::{
    AccountDevice, BatteryLevel, CommandCode, Credentials, Error, KeyExchangeKind, Link, Lock,
    LockState, NotifyCallback, NullObserver, Peer, SessionConfig, SessionEvent, SessionObserver,
    SessionState, Transport, WorkMode,
};
use ulrust_core::constants::gatt;

fn credentials() -> Credentials {
    Credentials::new(1, "123456").unwrap()
}

fn lock_for(sim: &Arc<SimulatedLock>) -> Lock {
    Lock::new(LOCK, credentials(), sim.clone()).with_observer(Arc::new(NullObserver))
}

fn connects(sim: &SimulatedLock) -> Vec<String> {
    sim.calls()
        .into_iter()
        .filter_map(|call| match call {
            Call::Connect(address) => Some(address),
            _ => None,
        })
        .collect()
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<SessionEvent>>,
}

impl SessionObserver for Recorder {
    fn on_event(&self, _address: &str, event: &SessionEvent) {
        self.events.lock().push(event.clone());
    }
}

#[tokio::test]
async fn test_unlock_sends_priority_first() {
    let sim = Arc::new(SimulatedLock::new());
    let lock = lock_for(&sim);

    lock.unlock().await.unwrap();

    assert_eq!(
        sim.commands(),
        vec![CommandCode::Unlock, CommandCode::LockStatus]
    );
    assert_eq!(lock.status().lock_state, Some(LockState::Locked));
    assert_eq!(lock.queued(), 0);
    assert!(!lock.is_busy());
}

#[tokio::test]
async fn test_bolt_lock() {
    let sim = Arc::new(SimulatedLock::new());
    let lock = lock_for(&sim);

    lock.bolt_lock().await.unwrap();

    assert_eq!(
        sim.commands(),
        vec![CommandCode::BoltLock, CommandCode::LockStatus]
    );
}

#[tokio::test]
async fn test_combined_status() {
    let sim = Arc::new(SimulatedLock::new());
    let lock = lock_for(&sim).with_model("U-Bolt");

    let status = lock.update_status().await.unwrap();

    assert_eq!(
        sim.commands(),
        vec![
            CommandCode::AdminLogin,
            CommandCode::LockStatus,
            CommandCode::GetAutolock
        ]
    );
    assert_eq!(status.lock_state, Some(LockState::Locked));
    assert_eq!(status.bolt_state, Some(LockState::Locked));
    assert_eq!(status.battery, Some(BatteryLevel::High));
    assert_eq!(status.work_mode, Some(WorkMode::Normal));
    assert_eq!(status.mute, Some(true));
    assert_eq!(status.autolock_seconds, Some(30));
}

#[tokio::test]
async fn test_legacy_status() {
    let sim = Arc::new(SimulatedLock::new().respond(CommandCode::LockStatus, &[0, 1, 2]));
    let lock = lock_for(&sim).with_model("UL1-BT");

    let status = lock.update_status().await.unwrap();

    assert_eq!(
        sim.commands(),
        vec![
            CommandCode::AdminLogin,
            CommandCode::LockStatus,
            CommandCode::GetBattery,
            CommandCode::GetMute,
            CommandCode::GetSn
        ]
    );
    assert_eq!(status.lock_state, Some(LockState::Unlocked));
    assert_eq!(status.battery, Some(BatteryLevel::Medium));
    assert_eq!(status.mute, Some(false));
    assert_eq!(status.serial_number.as_deref(), Some("SIM0001"));
    assert_eq!(status.autolock_seconds, None);
}

#[tokio::test]
async fn test_md5_key_exchange() {
    let sim = Arc::new(SimulatedLock::new().with_key_exchange(Some(KeyExchangeKind::Md5Derived)));
    let lock = lock_for(&sim);

    lock.unlock().await.unwrap();

    assert!(sim.calls().contains(&Call::Read(gatt::LOCK_KEY_MD5)));
    assert_eq!(sim.commands().len(), 2);
}

#[tokio::test]
async fn test_ecdh_key_exchange() {
    let sim = Arc::new(SimulatedLock::new().with_key_exchange(Some(KeyExchangeKind::Ecdh)));
    let lock = lock_for(&sim);

    lock.unlock().await.unwrap();

    let calls = sim.calls();
    let key_writes = calls
        .iter()
        .filter(|c| **c == Call::Write(gatt::LOCK_KEY_ECC))
        .count();
    assert_eq!(key_writes, 2);
    assert!(calls.contains(&Call::Subscribe(gatt::LOCK_KEY_ECC)));
    assert!(calls.contains(&Call::Unsubscribe(gatt::LOCK_KEY_ECC)));
    assert_eq!(sim.keys().len(), 1);
    assert_eq!(sim.commands().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_ecdh_peer_key_never_arrives() {
    let sim = Arc::new(
        SimulatedLock::new()
            .with_key_exchange(Some(KeyExchangeKind::Ecdh))
            .withhold_public_key(),
    );
    let lock = lock_for(&sim)
        .with_config(SessionConfig::default().with_key_exchange_timeout(Duration::from_secs(3)));

    let started = tokio::time::Instant::now();
    let err = lock.unlock().await.unwrap_err();

    assert!(matches!(err, Error::KeyExchangeFailed(_)), "{err}");
    assert!(started.elapsed() >= Duration::from_secs(3));
    assert!(sim.commands().is_empty());
    assert!(sim.calls().contains(&Call::Unsubscribe(gatt::LOCK_KEY_ECC)));
    assert_eq!(lock.queued(), 0);
    assert_eq!(sim.open_links(), 0);
}

#[tokio::test]
async fn test_unsupported_encryption() {
    let sim = Arc::new(SimulatedLock::new().with_key_exchange(None));
    let lock = lock_for(&sim);

    let err = lock.unlock().await.unwrap_err();

    assert!(matches!(err, Error::UnsupportedEncryption { .. }));
    assert!(err.is_terminal());
    assert_eq!(lock.queued(), 0);
    assert_eq!(sim.open_links(), 0);
    assert!(sim.commands().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_response_timeout() {
    let sim = Arc::new(SimulatedLock::new().silent(CommandCode::Unlock));
    let lock = lock_for(&sim)
        .with_config(SessionConfig::default().with_response_timeout(Duration::from_secs(2)));

    let err = lock.unlock().await.unwrap_err();

    match err {
        Error::ResponseTimeout { command, timeout } => {
            assert_eq!(command, CommandCode::Unlock);
            assert_eq!(timeout, Duration::from_secs(2));
        }
        other => panic!("unexpected error: {other}"),
    }
    // The status read queued behind it is dropped, not retried
    assert_eq!(sim.commands(), vec![CommandCode::Unlock]);
    assert_eq!(lock.queued(), 0);
    assert_eq!(sim.open_links(), 0);
    assert!(sim.calls().contains(&Call::Unsubscribe(gatt::LOCK_DATA)));
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_batch_is_not_replayed() {
    let sim = Arc::new(SimulatedLock::new().silent(CommandCode::Unlock));
    let lock = lock_for(&sim)
        .with_config(SessionConfig::default().with_response_timeout(Duration::from_secs(10)));

    let cancelled = tokio::time::timeout(Duration::from_secs(1), lock.unlock()).await;
    assert!(cancelled.is_err());

    assert_eq!(lock.queued(), 0);
    assert!(!lock.is_busy());
    assert_eq!(lock.session().state(), SessionState::Idle);

    // Teardown of the abandoned link runs in the background
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(sim.open_links(), 0);

    lock.reboot().await.unwrap();
    assert_eq!(sim.commands(), vec![CommandCode::Unlock, CommandCode::Reboot]);
}

#[tokio::test]
async fn test_bad_frames_are_discarded() {
    let sim = Arc::new(SimulatedLock::new().noisy(CommandCode::LockStatus));
    let recorder = Arc::new(Recorder::default());
    let lock = Lock::new(LOCK, credentials(), sim.clone()).with_observer(recorder.clone());

    lock.unlock().await.unwrap();

    assert_eq!(lock.status().lock_state, Some(LockState::Locked));
    assert_eq!(lock.queued(), 0);

    let discarded = recorder
        .events
        .lock()
        .iter()
        .filter(|e| matches!(e, SessionEvent::FrameDiscarded { .. }))
        .count();
    // Unknown response code and a response to another command
    assert_eq!(discarded, 2);
}

#[tokio::test]
async fn test_command_rejected() {
    let sim = Arc::new(SimulatedLock::new().respond(CommandCode::Unlock, &[1]));
    let lock = lock_for(&sim);

    let err = lock.unlock().await.unwrap_err();

    assert!(matches!(
        err,
        Error::CommandFailed {
            command: CommandCode::Unlock,
            status: 1
        }
    ));
    assert_eq!(sim.commands(), vec![CommandCode::Unlock]);
    assert_eq!(lock.queued(), 0);
    assert_eq!(sim.open_links(), 0);
    assert_eq!(lock.session().state(), SessionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_wakeup_between_connect_attempts() {
    let sim = Arc::new(SimulatedLock::new().with_wakeup_receiver().fail_connects(1));
    let lock = lock_for(&sim).with_wakeup_receiver(Some(WAKEUP.to_string()));

    lock.unlock().await.unwrap();

    assert_eq!(connects(&sim), vec![LOCK, WAKEUP, LOCK]);
    assert!(sim.calls().contains(&Call::Disconnect(WAKEUP.to_string())));
    assert_eq!(sim.open_links(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_wakeup_sleeping_lock() {
    let sim = Arc::new(SimulatedLock::new().with_wakeup_receiver().asleep());
    let lock = lock_for(&sim).with_wakeup_receiver(Some(WAKEUP.to_string()));

    lock.unlock().await.unwrap();

    let resolves: Vec<_> = sim
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            Call::Resolve(address) => Some(address),
            _ => None,
        })
        .collect();
    assert_eq!(resolves, vec![LOCK, WAKEUP, LOCK]);
    assert_eq!(connects(&sim), vec![WAKEUP, LOCK]);
}

#[tokio::test(start_paused = true)]
async fn test_max_attempts() {
    let sim = Arc::new(SimulatedLock::new().with_wakeup_receiver().fail_connects(10));
    let lock = lock_for(&sim).with_wakeup_receiver(Some(WAKEUP.to_string()));

    let err = lock.unlock().await.unwrap_err();

    assert!(matches!(
        err,
        Error::DeviceNotAvailable { attempts: 2, .. }
    ));
    assert!(err.is_retryable());
    assert_eq!(sim.connects_to(LOCK), 2);
    assert_eq!(sim.connects_to(WAKEUP), 1);
    assert_eq!(lock.queued(), 0);
    assert!(!lock.is_busy());
}

#[tokio::test(start_paused = true)]
async fn test_more_attempts_configured() {
    let sim = Arc::new(SimulatedLock::new().fail_connects(3));
    let lock = lock_for(&sim).with_config(SessionConfig::default().with_max_attempts(4));

    lock.unlock().await.unwrap();

    assert_eq!(sim.connects_to(LOCK), 4);
}

#[tokio::test(start_paused = true)]
async fn test_sleeping_lock_without_receiver() {
    let sim = Arc::new(SimulatedLock::new().asleep());
    let lock = lock_for(&sim);

    let err = lock.unlock().await.unwrap_err();

    assert!(matches!(err, Error::DeviceNotAvailable { .. }));
    assert_eq!(sim.connects_to(LOCK), 0);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_batch_is_busy() {
    let sim = Arc::new(SimulatedLock::new().silent(CommandCode::AdminLogin));
    let lock = Arc::new(lock_for(&sim));

    let first = tokio::spawn({
        let lock = lock.clone();
        async move { lock.update_status().await }
    });

    while !lock.is_busy() {
        tokio::task::yield_now().await;
    }

    let calls_before = sim.calls().len();
    assert!(matches!(lock.unlock().await, Err(Error::Busy { .. })));
    assert!(matches!(lock.send_requests().await, Err(Error::Busy { .. })));
    assert_eq!(sim.calls().len(), calls_before);

    let result = first.await.unwrap();
    assert!(matches!(result, Err(Error::ResponseTimeout { .. })));
    assert!(!lock.is_busy());
}

mock! {
    pub Gatt {}

    #[async_trait]
    impl Transport for Gatt {
        async fn resolve(&self, address: &str) -> ulrust_transport::Result<Option<Peer>>;
        async fn connect(&self, peer: &Peer) -> ulrust_transport::Result<Link>;
        async fn disconnect(&self, link: &Link) -> ulrust_transport::Result<()>;
        async fn has_characteristic(&self, link: &Link, uuid: Uuid) -> ulrust_transport::Result<bool>;
        async fn read(&self, link: &Link, uuid: Uuid) -> ulrust_transport::Result<Bytes>;
        async fn write(&self, link: &Link, uuid: Uuid, data: &[u8]) -> ulrust_transport::Result<()>;
        async fn subscribe(&self, link: &Link, uuid: Uuid, callback: NotifyCallback) -> ulrust_transport::Result<()>;
        async fn unsubscribe(&self, link: &Link, uuid: Uuid) -> ulrust_transport::Result<()>;
    }
}

#[tokio::test]
async fn test_busy_leaves_queue_and_transport_alone() {
    // No expectations: any transport call panics
    let transport = Arc::new(MockGatt::new());
    let lock = Lock::new(LOCK, credentials(), transport);

    lock.enqueue(lock.request(CommandCode::LockStatus).unwrap(), false)
        .unwrap();

    let _guard = lock.session().begin().unwrap();

    assert!(matches!(lock.send_requests().await, Err(Error::Busy { .. })));
    assert!(matches!(
        lock.enqueue(lock.request(CommandCode::GetBattery).unwrap(), false),
        Err(Error::Busy { .. })
    ));
    assert_eq!(lock.queued(), 1);
}

#[tokio::test]
async fn test_empty_queue() {
    let sim = Arc::new(SimulatedLock::new());
    let lock = lock_for(&sim);

    assert!(matches!(lock.send_requests().await, Err(Error::EmptyQueue)));
    assert!(sim.calls().is_empty());
}

#[tokio::test]
async fn test_autolock_not_supported() {
    let sim = Arc::new(SimulatedLock::new());
    let lock = lock_for(&sim).with_model("UL1-BT");

    let err = lock.set_autolock(60).await.unwrap_err();

    assert!(matches!(err, Error::NotSupported(_)));
    assert!(sim.calls().is_empty());
}

#[tokio::test]
async fn test_set_autolock() {
    let sim = Arc::new(SimulatedLock::new());
    let lock = lock_for(&sim).with_model("U-Bolt");

    lock.set_autolock(120).await.unwrap();

    assert_eq!(
        sim.commands(),
        vec![CommandCode::AdminLogin, CommandCode::SetAutolock]
    );
    assert_eq!(lock.status().autolock_seconds, Some(120));
}

#[tokio::test]
async fn test_work_mode_opcode() {
    let sim = Arc::new(SimulatedLock::new());
    let combined = lock_for(&sim).with_model("U-Bolt");
    combined.set_work_mode(WorkMode::Lockout).await.unwrap();

    assert_eq!(
        sim.commands(),
        vec![CommandCode::AdminLogin, CommandCode::SetLockStatus]
    );
    assert_eq!(combined.status().work_mode, Some(WorkMode::Lockout));

    let sim = Arc::new(SimulatedLock::new());
    let legacy = lock_for(&sim).with_model("UL1-BT");
    legacy.set_work_mode(WorkMode::Passage).await.unwrap();

    assert_eq!(
        sim.commands(),
        vec![CommandCode::AdminLogin, CommandCode::SetWorkMode]
    );
}

#[tokio::test]
async fn test_reboot_waits_for_nothing() {
    let sim = Arc::new(SimulatedLock::new());
    let lock = lock_for(&sim);

    lock.reboot().await.unwrap();

    assert_eq!(sim.commands(), vec![CommandCode::Reboot]);
    assert!(!sim.calls().contains(&Call::Subscribe(gatt::LOCK_DATA)));
    assert_eq!(sim.open_links(), 0);
}

#[tokio::test]
async fn test_key_negotiated_per_connection() {
    let sim = Arc::new(SimulatedLock::new().with_key_exchange(Some(KeyExchangeKind::Ecdh)));
    let lock = lock_for(&sim);

    lock.unlock().await.unwrap();
    lock.bolt_lock().await.unwrap();

    let keys = sim.keys();
    assert_eq!(keys.len(), 2);
    assert_ne!(keys[0], keys[1]);
    assert_eq!(sim.connects_to(LOCK), 2);
}

#[tokio::test]
async fn test_always_disconnects() {
    let sim = Arc::new(SimulatedLock::new());
    let lock = lock_for(&sim);

    lock.unlock().await.unwrap();
    let calls = sim.calls();
    assert_eq!(calls.last(), Some(&Call::Disconnect(LOCK.to_string())));
    assert_eq!(sim.open_links(), 0);
}

#[tokio::test]
async fn test_response_crc_check() {
    let sim = Arc::new(SimulatedLock::new());
    let lock = lock_for(&sim).with_config(SessionConfig::default().with_response_crc(true));

    lock.unlock().await.unwrap();
    assert_eq!(lock.status().lock_state, Some(LockState::Locked));
}

#[tokio::test]
async fn test_observer_events() {
    let sim = Arc::new(SimulatedLock::new());
    let recorder = Arc::new(Recorder::default());
    let lock = Lock::new(LOCK, credentials(), sim.clone()).with_observer(recorder.clone());

    lock.unlock().await.unwrap();

    let events = recorder.events.lock().clone();
    assert_eq!(
        events.first(),
        Some(&SessionEvent::StateChanged {
            from: SessionState::Idle,
            to: SessionState::Connecting
        })
    );
    assert!(events.contains(&SessionEvent::ConnectAttempt { attempt: 1, max: 2 }));
    assert!(events.contains(&SessionEvent::KeyNegotiated {
        kind: KeyExchangeKind::Static
    }));

    let sent: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::CommandSent { command } => Some(*command),
            _ => None,
        })
        .collect();
    assert_eq!(sent, vec![CommandCode::Unlock, CommandCode::LockStatus]);

    assert_eq!(
        events.last(),
        Some(&SessionEvent::StateChanged {
            from: SessionState::Draining,
            to: SessionState::Idle
        })
    );
}

#[tokio::test]
async fn test_lock_from_account() {
    let json = format!(
        r#"{{
            "name": "Front Door",
            "model": "UL1-BT",
            "uuid": "{LOCK}",
            "user": {{ "uid": 1, "password": 1610736192 }},
            "params": {{ "extend_ble": "{WAKEUP}", "serialnumber": "UB42" }}
        }}"#
    );
    let device = AccountDevice::from_json(&json).unwrap();

    let sim = Arc::new(SimulatedLock::new());
    let lock = Lock::from_account(&device, sim.clone()).unwrap();

    assert_eq!(lock.name(), "Front Door");
    assert_eq!(lock.address(), LOCK);
    assert_eq!(lock.wakeup_receiver(), Some(WAKEUP));
    assert!(!lock.capabilities().combined_status());
    assert_eq!(lock.status().serial_number.as_deref(), Some("UB42"));

    lock.unlock().await.unwrap();
}
