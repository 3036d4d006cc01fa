//! Account API device records
//!
//! The vendor account API lists the locks of an account as JSON records.
//! Fetching them is out of scope here; these types parse a record once it has
//! been obtained, and decode the packed admin password it carries.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One lock as listed by the account API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountDevice {
    /// User-assigned name
    pub name: String,

    /// Model name, keys the capability table
    #[serde(default)]
    pub model: String,

    /// Bluetooth address or platform identifier of the lock
    pub uuid: String,

    /// Credentials of the account user on this lock
    pub user: AccountUser,

    /// Extra parameters
    #[serde(default)]
    pub params: AccountParams,
}

/// Credentials of the account user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountUser {
    /// User id on the lock
    pub uid: u32,

    /// Admin password, packed (see [`decode_admin_password`])
    pub password: u32,
}

/// Optional record parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountParams {
    /// Address of the wake-up receiver paired with the lock
    #[serde(default)]
    pub extend_ble: Option<String>,

    /// Serial number
    #[serde(default)]
    pub serialnumber: Option<String>,
}

impl AccountDevice {
    /// Parse one record
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse the device list of an account
    pub fn list_from_json(json: &str) -> Result<Vec<Self>> {
        Ok(serde_json::from_str(json)?)
    }

    /// Admin password as entered on the keypad
    pub fn admin_password(&self) -> Result<String> {
        decode_admin_password(self.user.password)
    }

    /// Wake-up receiver address, if one is paired
    pub fn wakeup_receiver(&self) -> Option<&str> {
        self.params
            .extend_ble
            .as_deref()
            .filter(|address| !address.is_empty())
    }
}

/// Decode the packed admin password of an account record
///
/// The top nibble holds the number of digits, the low 28 bits the value.
/// Leading zeros are restored from the digit count. A zero nibble means the
/// integer is the password itself.
///
/// # Errors
///
/// Returns [`Error::Validation`] if the digit count is not a decimal digit.
///
/// # Examples
///
/// ```
/// use ulrust_types::decode_admin_password;
///
/// assert_eq!(decode_admin_password(0x6000_007B).unwrap(), "000123");
/// assert_eq!(decode_admin_password(1234).unwrap(), "1234");
/// ```
pub fn decode_admin_password(raw: u32) -> Result<String> {
    let digits = (raw >> 28) as usize;
    if digits == 0 {
        return Ok(raw.to_string());
    }
    if digits > 9 {
        return Err(Error::Validation(format!(
            "password length nibble {:X} is not a digit count",
            digits
        )));
    }

    let value = raw & 0x0FFF_FFFF;
    Ok(format!("{:0width$}", value, width = digits))
}
