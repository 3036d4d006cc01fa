//! Type definitions for ulrust

pub mod account;
pub mod capabilities;
pub mod error;
pub mod status;

pub use account::{decode_admin_password, AccountDevice};
pub use capabilities::Capabilities;
pub use error::{Error, Result};
pub use status::{BatteryLevel, DeviceStatus, LockState, WorkMode};
