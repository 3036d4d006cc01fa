//! Decoded lock status

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};

/// Lock or bolt position as reported by the lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockState {
    Unavailable,
    Unlocked,
    Locked,
    NotAvailable,
    Unknown(u8),
}

impl From<u8> for LockState {
    fn from(raw: u8) -> Self {
        match raw {
            0 => Self::Unavailable,
            1 => Self::Unlocked,
            2 => Self::Locked,
            255 => Self::NotAvailable,
            other => Self::Unknown(other),
        }
    }
}

impl LockState {
    pub fn name(self) -> &'static str {
        match self {
            Self::Unavailable => "unavailable",
            Self::Unlocked => "unlocked",
            Self::Locked => "locked",
            Self::NotAvailable => "not available",
            Self::Unknown(_) => "unknown",
        }
    }
}

/// Coarse battery level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatteryLevel {
    Critical,
    Low,
    Medium,
    High,
    Unknown(u8),
}

impl From<u8> for BatteryLevel {
    fn from(raw: u8) -> Self {
        match raw {
            0 => Self::Critical,
            1 => Self::Low,
            2 => Self::Medium,
            3 => Self::High,
            other => Self::Unknown(other),
        }
    }
}

impl BatteryLevel {
    pub fn name(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Unknown(_) => "unknown",
        }
    }
}

/// Lock work mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkMode {
    /// Credentials unlock, auto-lock applies
    Normal,
    /// Stays unlocked
    Passage,
    /// Rejects all credentials except admin
    Lockout,
    Unknown(u8),
}

impl From<u8> for WorkMode {
    fn from(raw: u8) -> Self {
        match raw {
            0 => Self::Normal,
            1 => Self::Passage,
            2 => Self::Lockout,
            other => Self::Unknown(other),
        }
    }
}

impl WorkMode {
    /// Wire value
    pub fn raw(self) -> u8 {
        match self {
            Self::Normal => 0,
            Self::Passage => 1,
            Self::Lockout => 2,
            Self::Unknown(raw) => raw,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Passage => "passage",
            Self::Lockout => "lockout",
            Self::Unknown(_) => "unknown",
        }
    }
}

macro_rules! display_by_name {
    ($($ty:ty),+) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    Self::Unknown(raw) => write!(f, "unknown({})", raw),
                    _ => f.write_str(self.name()),
                }
            }
        })+
    };
}

display_by_name!(LockState, BatteryLevel, WorkMode);

/// Last known status of a lock
///
/// Fields stay `None` until a response has reported them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceStatus {
    /// Lock mode
    pub lock_state: Option<LockState>,

    /// Bolt position
    pub bolt_state: Option<LockState>,

    /// Battery level
    pub battery: Option<BatteryLevel>,

    /// Work mode
    pub work_mode: Option<WorkMode>,

    /// Keypad sound muted
    pub mute: Option<bool>,

    /// Auto-lock delay in seconds
    pub autolock_seconds: Option<u16>,

    /// Serial number
    pub serial_number: Option<String>,

    /// Lock clock at the time of the last status read
    pub calendar: Option<NaiveDateTime>,
}

impl DeviceStatus {
    /// Check if the lock reported itself locked
    pub fn is_locked(&self) -> bool {
        self.lock_state == Some(LockState::Locked)
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn opt<T: fmt::Display>(value: &Option<T>) -> String {
            value
                .as_ref()
                .map_or_else(|| "?".to_string(), |v| v.to_string())
        }

        write!(
            f,
            "Status[lock: {}, bolt: {}, battery: {}, mode: {}, mute: {}]",
            opt(&self.lock_state),
            opt(&self.bolt_state),
            opt(&self.battery),
            opt(&self.work_mode),
            opt(&self.mute)
        )
    }
}

/// Decode the packed clock of a status response
///
/// Big-endian u32, from the least significant bit: seconds (6), minutes (6),
/// hours (5), day (5), month + 1 (4), years since 2000 (6).
pub fn decode_calendar(bytes: [u8; 4]) -> Option<NaiveDateTime> {
    let v = u32::from_be_bytes(bytes);

    let second = v & 63;
    let minute = (v >> 6) & 63;
    let hour = (v >> 12) & 31;
    let day = (v >> 17) & 31;
    let month = (v >> 22).wrapping_sub(1) & 15;
    let year = ((v >> 26) & 63) as i32 + 2000;

    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)
}

/// Decode a fixed-width Latin-1 field, stopping at the first NUL
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes
        .iter()
        .take_while(|&&b| b != 0)
        .map(|&b| char::from(b))
        .collect()
}
