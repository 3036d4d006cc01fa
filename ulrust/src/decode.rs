//! Response field decoding
//!
//! Maps response payloads onto a status snapshot. Offsets are positions in the
//! response data (after the command byte).

use ulrust_core::{Response, ResponseCode};
use ulrust_types::status::{decode_calendar, decode_latin1};
use ulrust_types::{BatteryLevel, DeviceStatus, LockState, WorkMode};

use crate::error::{Error, Result};

const EXTENDED_STATUS_LEN: usize = 6;
const CALENDAR_STATUS_LEN: usize = 10;
const SERIAL_STATUS_LEN: usize = 26;

/// Apply one response to a status snapshot
///
/// Returns the updated snapshot; `status` is left untouched. Responses that
/// carry no status fields return an unchanged copy.
///
/// # Errors
///
/// Returns [`Error::CommandFailed`] if an acknowledgement reports a non-zero
/// status byte.
///
/// # Examples
///
/// ```
/// use ulrust::apply_response;
/// use ulrust_core::{Response, ResponseCode};
/// use ulrust_types::{BatteryLevel, DeviceStatus};
///
/// let response = Response::new(ResponseCode::GetBattery, vec![0u8, 2]);
/// let status = apply_response(&DeviceStatus::default(), &response).unwrap();
///
/// assert_eq!(status.battery, Some(BatteryLevel::Medium));
/// ```
pub fn apply_response(status: &DeviceStatus, response: &Response) -> Result<DeviceStatus> {
    if !response.is_success() {
        return Err(Error::CommandFailed {
            command: response.code.command(),
            status: response.status().unwrap_or_default(),
        });
    }

    let mut next = status.clone();

    match response.code {
        ResponseCode::LockStatus => {
            decode_lock_bolt(&mut next, response);

            let data = &response.data;
            if data.len() >= EXTENDED_STATUS_LEN {
                next.battery = Some(BatteryLevel::from(data[3]));
                next.work_mode = Some(WorkMode::from(data[4]));
                next.mute = Some(data[5] != 0);
            }
            if data.len() >= CALENDAR_STATUS_LEN {
                next.calendar = decode_calendar([data[6], data[7], data[8], data[9]]);
            }
            if data.len() >= SERIAL_STATUS_LEN {
                let serial = decode_latin1(&data[10..SERIAL_STATUS_LEN]);
                if !serial.is_empty() {
                    next.serial_number = Some(serial);
                }
            }
        }
        ResponseCode::GetLockStatus => decode_lock_bolt(&mut next, response),
        ResponseCode::GetBattery => {
            if let Some(level) = response.byte(1) {
                next.battery = Some(BatteryLevel::from(level));
            }
        }
        ResponseCode::GetMute => {
            if let Some(mute) = response.byte(1) {
                next.mute = Some(mute != 0);
            }
        }
        ResponseCode::GetSn => {
            next.serial_number = Some(decode_latin1(&response.data));
        }
        ResponseCode::GetAutolock => {
            if let Some(seconds) = response.u16_le(1) {
                next.autolock_seconds = Some(seconds);
            }
        }
        _ => {}
    }

    Ok(next)
}

fn decode_lock_bolt(status: &mut DeviceStatus, response: &Response) {
    if let Some(lock) = response.byte(1) {
        status.lock_state = Some(LockState::from(lock));
    }
    if let Some(bolt) = response.byte(2) {
        status.bolt_state = Some(LockState::from(bolt));
    }
}
