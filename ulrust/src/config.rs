//! Session configuration

use std::time::Duration;

use ulrust_core::constants::timing;

/// Timing and validation knobs of a [`DeviceSession`](crate::DeviceSession)
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use ulrust::SessionConfig;
///
/// let config = SessionConfig::default()
///     .with_max_attempts(3)
///     .with_response_timeout(Duration::from_secs(2));
///
/// assert_eq!(config.max_attempts, 3);
/// assert!(!config.verify_response_crc);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Physical connect attempts per batch
    pub max_attempts: u32,

    /// Pause between connect attempts
    pub retry_delay: Duration,

    /// How long the wake-up receiver link is held open
    pub wakeup_hold: Duration,

    /// Bound on waiting for one response
    pub response_timeout: Duration,

    /// Bound on waiting for the peer ECDH public key
    pub key_exchange_timeout: Duration,

    /// Discard received frames whose CRC does not match
    pub verify_response_crc: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_attempts: timing::MAX_CONNECT_ATTEMPTS,
            retry_delay: timing::RETRY_DELAY,
            wakeup_hold: timing::WAKEUP_HOLD,
            response_timeout: timing::RESPONSE_TIMEOUT,
            key_exchange_timeout: timing::KEY_EXCHANGE_TIMEOUT,
            verify_response_crc: false,
        }
    }
}

impl SessionConfig {
    /// Set connect attempts (at least one is always made)
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_wakeup_hold(mut self, hold: Duration) -> Self {
        self.wakeup_hold = hold;
        self
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_key_exchange_timeout(mut self, timeout: Duration) -> Self {
        self.key_exchange_timeout = timeout;
        self
    }

    /// Validate the CRC of received frames
    pub fn with_response_crc(mut self, verify: bool) -> Self {
        self.verify_response_crc = verify;
        self
    }
}
