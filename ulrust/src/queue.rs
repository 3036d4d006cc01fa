//! Per-lock command queue

use std::collections::VecDeque;

use crate::request::Request;

/// Pending requests of one lock
///
/// Priority requests jump to the head, everything else is FIFO.
#[derive(Debug, Default)]
pub struct CommandQueue {
    requests: VecDeque<Request>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a request
    pub fn push(&mut self, request: Request, priority: bool) {
        if priority {
            self.requests.push_front(request);
        } else {
            self.requests.push_back(request);
        }
    }

    /// Next request to send
    pub fn front(&self) -> Option<&Request> {
        self.requests.front()
    }

    pub fn front_mut(&mut self) -> Option<&mut Request> {
        self.requests.front_mut()
    }

    /// Remove the next request
    pub fn pop_front(&mut self) -> Option<Request> {
        self.requests.pop_front()
    }

    /// Drop all pending requests
    ///
    /// Returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.requests.len();
        self.requests.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Pending requests in send order
    pub fn iter(&self) -> impl Iterator<Item = &Request> {
        self.requests.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use ulrust_core::{CommandCode, Credentials};

    fn request(command: CommandCode) -> Request {
        let credentials = Credentials::new(1, "1234").unwrap();
        Request::new(command, &credentials).unwrap()
    }

    fn order(queue: &CommandQueue) -> Vec<CommandCode> {
        queue.iter().map(|r| r.command).collect()
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = CommandQueue::new();
        queue.push(request(CommandCode::AdminLogin), false);
        queue.push(request(CommandCode::LockStatus), false);

        assert_eq!(
            order(&queue),
            vec![CommandCode::AdminLogin, CommandCode::LockStatus]
        );
    }

    #[test]
    fn test_priority_goes_first() {
        let mut queue = CommandQueue::new();
        queue.push(request(CommandCode::LockStatus), false);
        queue.push(request(CommandCode::Unlock), true);

        assert_eq!(queue.front().map(|r| r.command), Some(CommandCode::Unlock));
        assert_eq!(
            order(&queue),
            vec![CommandCode::Unlock, CommandCode::LockStatus]
        );
    }

    #[test]
    fn test_clear() {
        let mut queue = CommandQueue::new();
        queue.push(request(CommandCode::GetBattery), false);
        queue.push(request(CommandCode::GetMute), false);

        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
        assert!(queue.pop_front().is_none());
    }
}
