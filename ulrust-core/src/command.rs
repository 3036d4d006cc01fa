//! Lock protocol command definitions
//!
//! Every request carries a one-byte command code at offset 3 of the frame.
//! The lock answers with the same code with its top bit flipped.

use std::fmt;

use bytes::Bytes;

use crate::error::{Error, Result};

/// Request command codes (host to lock)
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandCode {
    // Status
    LockStatus = 80,
    GetLockStatus = 81,
    SetLockStatus = 82,
    GetMute = 83,
    GetBattery = 67,
    GetSn = 94,
    DoorSensor = 117,

    // Actuation
    Unlock = 85,
    BoltLock = 86,
    Reboot = 23,

    // Settings
    GetAutolock = 90,
    SetAutolock = 89,
    SetWorkMode = 160,
    AdminLogin = 32,

    // Clock
    ReadTime = 65,
    WriteTime = 66,
}

/// Response codes (lock to host)
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ResponseCode {
    LockStatus = 208,
    GetLockStatus = 209,
    SetLockStatus = 210,
    GetMute = 211,
    GetBattery = 195,
    GetSn = 222,
    DoorSensor = 245,
    Unlock = 213,
    BoltLock = 214,
    GetAutolock = 218,
    SetAutolock = 217,
    SetWorkMode = 32,
    AdminLogin = 160,
    ReadTime = 193,
    WriteTime = 194,
}

impl CommandCode {
    /// Commands whose frame carries the uid/password auth block
    pub fn requires_auth(self) -> bool {
        matches!(self, Self::Unlock | Self::BoltLock | Self::AdminLogin)
    }

    /// Commands the lock answers with a notification
    ///
    /// A reboot drops the link before anything is sent back.
    pub fn expects_response(self) -> bool {
        !matches!(self, Self::Reboot)
    }

    /// Response code the lock uses to answer this command
    ///
    /// `None` for commands that are never answered.
    pub fn response_code(self) -> Option<ResponseCode> {
        if !self.expects_response() {
            return None;
        }
        ResponseCode::try_from(self as u8 ^ 0x80).ok()
    }

    /// Payload sent when the caller supplies none
    pub fn default_payload(self) -> Bytes {
        match self {
            // Length of the serial number to read back
            Self::GetSn => Bytes::from_static(&[16]),
            _ => Bytes::new(),
        }
    }

    /// Get command name
    pub fn name(self) -> &'static str {
        match self {
            Self::LockStatus => "LOCK_STATUS",
            Self::GetLockStatus => "GET_LOCK_STATUS",
            Self::SetLockStatus => "SET_LOCK_STATUS",
            Self::GetMute => "GET_MUTE",
            Self::GetBattery => "GET_BATTERY",
            Self::GetSn => "GET_SN",
            Self::DoorSensor => "DOORSENSOR",
            Self::Unlock => "UNLOCK",
            Self::BoltLock => "BOLT_LOCK",
            Self::Reboot => "REBOOT",
            Self::GetAutolock => "GET_AUTOLOCK",
            Self::SetAutolock => "SET_AUTOLOCK",
            Self::SetWorkMode => "SET_WORK_MODE",
            Self::AdminLogin => "ADMIN_LOGIN",
            Self::ReadTime => "READ_TIME",
            Self::WriteTime => "WRITE_TIME",
        }
    }
}

impl ResponseCode {
    /// Command this response answers
    pub fn command(self) -> CommandCode {
        match self {
            Self::LockStatus => CommandCode::LockStatus,
            Self::GetLockStatus => CommandCode::GetLockStatus,
            Self::SetLockStatus => CommandCode::SetLockStatus,
            Self::GetMute => CommandCode::GetMute,
            Self::GetBattery => CommandCode::GetBattery,
            Self::GetSn => CommandCode::GetSn,
            Self::DoorSensor => CommandCode::DoorSensor,
            Self::Unlock => CommandCode::Unlock,
            Self::BoltLock => CommandCode::BoltLock,
            Self::GetAutolock => CommandCode::GetAutolock,
            Self::SetAutolock => CommandCode::SetAutolock,
            Self::SetWorkMode => CommandCode::SetWorkMode,
            Self::AdminLogin => CommandCode::AdminLogin,
            Self::ReadTime => CommandCode::ReadTime,
            Self::WriteTime => CommandCode::WriteTime,
        }
    }

    /// Check if this response only acknowledges a write
    ///
    /// The first payload byte of an acknowledgement is a status, zero on success.
    pub fn is_acknowledgement(self) -> bool {
        matches!(
            self,
            Self::Unlock
                | Self::BoltLock
                | Self::SetLockStatus
                | Self::SetWorkMode
                | Self::SetAutolock
                | Self::AdminLogin
                | Self::WriteTime
        )
    }

    /// Get response name
    pub fn name(self) -> &'static str {
        self.command().name()
    }
}

impl From<CommandCode> for u8 {
    fn from(cmd: CommandCode) -> u8 {
        cmd as u8
    }
}

impl From<ResponseCode> for u8 {
    fn from(code: ResponseCode) -> u8 {
        code as u8
    }
}

impl TryFrom<u8> for CommandCode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            80 => Ok(Self::LockStatus),
            81 => Ok(Self::GetLockStatus),
            82 => Ok(Self::SetLockStatus),
            83 => Ok(Self::GetMute),
            67 => Ok(Self::GetBattery),
            94 => Ok(Self::GetSn),
            117 => Ok(Self::DoorSensor),
            85 => Ok(Self::Unlock),
            86 => Ok(Self::BoltLock),
            23 => Ok(Self::Reboot),
            90 => Ok(Self::GetAutolock),
            89 => Ok(Self::SetAutolock),
            160 => Ok(Self::SetWorkMode),
            32 => Ok(Self::AdminLogin),
            65 => Ok(Self::ReadTime),
            66 => Ok(Self::WriteTime),
            _ => Err(Error::UnknownCommand(value)),
        }
    }
}

impl TryFrom<u8> for ResponseCode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            208 => Ok(Self::LockStatus),
            209 => Ok(Self::GetLockStatus),
            210 => Ok(Self::SetLockStatus),
            211 => Ok(Self::GetMute),
            195 => Ok(Self::GetBattery),
            222 => Ok(Self::GetSn),
            245 => Ok(Self::DoorSensor),
            213 => Ok(Self::Unlock),
            214 => Ok(Self::BoltLock),
            218 => Ok(Self::GetAutolock),
            217 => Ok(Self::SetAutolock),
            32 => Ok(Self::SetWorkMode),
            160 => Ok(Self::AdminLogin),
            193 => Ok(Self::ReadTime),
            194 => Ok(Self::WriteTime),
            _ => Err(Error::UnknownResponse(value)),
        }
    }
}

impl fmt::Display for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), *self as u8)
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_RSP({})", self.name(), *self as u8)
    }
}
