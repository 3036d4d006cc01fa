//! # ulrust-core
//!
//! Core protocol implementation for Ultraloq Bluetooth smart locks.
//!
//! This crate provides the low-level protocol primitives:
//! - Frame structure and encoding
//! - CRC8 checksum
//! - Command and response codes
//! - Transport cipher and session key derivation
//! - Response reassembly
//! - Session state tracking
//!
//! Nothing in here performs I/O.

pub mod checksum;
pub mod cipher;
pub mod command;
pub mod constants;
pub mod ecc;
pub mod error;
pub mod frame;
pub mod keys;
pub mod response;
pub mod session;

pub use cipher::SessionKey;
pub use command::{CommandCode, ResponseCode};
pub use error::{Error, Result};
pub use frame::{Credentials, Frame};
pub use keys::KeyExchangeKind;
pub use response::{Response, ResponseAssembler, ResponseFrame};
pub use session::{Session, SessionGuard, SessionState};
