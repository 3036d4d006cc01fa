//! Protocol constants
//!
//! GATT identifiers, frame layout and default timing.

use std::time::Duration;

use uuid::Uuid;

/// First byte of every frame
pub const FRAME_MARKER: u8 = 0x7F;

/// Offset of the command byte
pub const COMMAND_OFFSET: usize = 3;

/// Offset of the first payload byte
pub const PAYLOAD_OFFSET: usize = 4;

/// Transport chunk and cipher block size
pub const BLOCK_SIZE: usize = 16;

/// Largest frame the lock firmware buffers
pub const MAX_FRAME_SIZE: usize = 5120;

/// Size of the auth block (uid + password)
pub const AUTH_BLOCK_SIZE: usize = 8;

/// Prefix of the static session key
pub const STATIC_KEY_PREFIX: &[u8; 8] = b"Anviz.ut";

/// "ULtraloq" read as a little-endian u64
pub const MD5_KEY_MAGIC: u64 = 0x716f_6c61_7274_4c55;

/// GATT identifiers
pub mod gatt {
    use super::Uuid;

    /// Lock service
    pub const LOCK_SERVICE: Uuid = Uuid::from_u128(0x00007200_0000_1000_8000_00805f9b34fb);

    /// Request writes and response notifications
    pub const LOCK_DATA: Uuid = Uuid::from_u128(0x00007201_0000_1000_8000_00805f9b34fb);

    /// Static key secret (readable)
    pub const LOCK_KEY_STATIC: Uuid = Uuid::from_u128(0x00007220_0000_1000_8000_00805f9b34fb);

    /// ECDH public key exchange (write + notify)
    pub const LOCK_KEY_ECC: Uuid = Uuid::from_u128(0x00007221_0000_1000_8000_00805f9b34fb);

    /// MD5 key secret (readable)
    pub const LOCK_KEY_MD5: Uuid = Uuid::from_u128(0x00007223_0000_1000_8000_00805f9b34fb);
}

/// Default timing
pub mod timing {
    use super::Duration;

    /// Physical connect attempts per request batch
    pub const MAX_CONNECT_ATTEMPTS: u32 = 2;

    /// Pause between connect attempts
    pub const RETRY_DELAY: Duration = Duration::from_millis(500);

    /// How long a wake-up receiver link is held open
    pub const WAKEUP_HOLD: Duration = Duration::from_millis(500);

    /// Bound on waiting for a single response
    pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Bound on waiting for the peer's ECDH public key
    pub const KEY_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Bound on a BLE scan for one address
    pub const SCAN_TIMEOUT: Duration = Duration::from_secs(10);
}
