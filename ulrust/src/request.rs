//! Queued lock requests

use std::fmt;

use bytes::Bytes;

use ulrust_core::{CommandCode, Credentials, Frame, ResponseCode};

use crate::error::Result;

/// One command, encoded and ready to send
///
/// The plaintext frame is built once, when the request is created. It is
/// encrypted with the session key of whatever connection ends up sending it.
#[derive(Clone, PartialEq, Eq)]
pub struct Request {
    /// Command code
    pub command: CommandCode,

    /// Frame carries the auth block
    pub requires_auth: bool,

    /// Lock answers with a notification
    pub expects_response: bool,

    /// Command payload
    pub payload: Bytes,

    /// Encoded plaintext frame
    pub frame: Bytes,

    /// Set once the frame has been written
    pub sent: bool,
}

impl Request {
    /// Build a request with the command's default payload
    ///
    /// # Examples
    ///
    /// ```
    /// use ulrust::Request;
    /// use ulrust_core::{CommandCode, Credentials};
    ///
    /// let credentials = Credentials::new(1, "12").unwrap();
    /// let request = Request::new(CommandCode::Unlock, &credentials).unwrap();
    ///
    /// assert!(request.requires_auth);
    /// assert_eq!(request.frame.len(), 13);
    /// ```
    pub fn new(command: CommandCode, credentials: &Credentials) -> Result<Self> {
        Self::with_payload(command, command.default_payload(), credentials)
    }

    /// Build a request with an explicit payload
    pub fn with_payload(
        command: CommandCode,
        payload: impl Into<Bytes>,
        credentials: &Credentials,
    ) -> Result<Self> {
        let payload = payload.into();
        let requires_auth = command.requires_auth();

        let mut frame = Frame::new(command).with_payload(payload.clone());
        if requires_auth {
            frame = frame.with_auth(credentials.clone());
        }

        Ok(Self {
            command,
            requires_auth,
            expects_response: command.expects_response(),
            payload,
            frame: frame.encode()?,
            sent: false,
        })
    }

    /// Response code that completes this request
    pub fn response_code(&self) -> Option<ResponseCode> {
        if self.expects_response {
            self.command.response_code()
        } else {
            None
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The frame holds the auth block, keep it out of logs
        f.debug_struct("Request")
            .field("command", &self.command)
            .field("requires_auth", &self.requires_auth)
            .field("expects_response", &self.expects_response)
            .field("payload", &hex::encode(&self.payload))
            .field("sent", &self.sent)
            .finish()
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Request[{}]", self.command)
    }
}
