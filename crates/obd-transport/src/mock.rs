//! Scripted in-process adapter for tests
//!
//! Plays the adapter side of the dialogue: commands are accumulated until
//! the carriage return, looked up in a reply script, and the canned
//! response (ending in the `>` prompt) is queued for the next read. A
//! [`MockHandle`] lets a test inspect the command log after the transport
//! has been moved into a session.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::trace;

use crate::{Transport, TransportError};

#[derive(Debug, Default)]
struct MockInner {
    connected: bool,
    /// Ordered one-shot exchanges, consumed front to back
    script: VecDeque<(String, String)>,
    /// Fallback replies for commands not covered by the script
    table: HashMap<String, String>,
    /// Every command the session wrote, CR stripped, uppercased
    sent: Vec<String>,
    /// Bytes queued for `read_until`
    outgoing: VecDeque<u8>,
    /// Partial command being accumulated
    partial: Vec<u8>,
    /// Error injected into the next read
    fail_next_read: Option<TransportError>,
}

impl MockInner {
    fn resolve_reply(&mut self, command: &str) -> String {
        if let Some((expected, reply)) = self.script.front() {
            if expected.eq_ignore_ascii_case(command) {
                let reply = reply.clone();
                self.script.pop_front();
                return reply;
            }
        }
        if let Some(reply) = self.table.get(&command.to_ascii_uppercase()) {
            return reply.clone();
        }
        // unknown command, answer like a real adapter
        "?\r\r>".to_string()
    }
}

/// Inspection handle onto a [`MockTransport`]
#[derive(Debug, Clone)]
pub struct MockHandle {
    inner: Arc<Mutex<MockInner>>,
}

impl MockHandle {
    /// Commands written so far, in order
    pub fn sent_commands(&self) -> Vec<String> {
        self.inner.lock().unwrap().sent.clone()
    }

    /// Number of scripted exchanges not yet consumed
    pub fn remaining_script(&self) -> usize {
        self.inner.lock().unwrap().script.len()
    }

    /// Inject an error into the next `read_until` call
    pub fn fail_next_read(&self, error: TransportError) {
        self.inner.lock().unwrap().fail_next_read = Some(error);
    }

    /// Append a scripted exchange after construction
    pub fn push_exchange(&self, request: &str, reply: &str) {
        self.inner
            .lock()
            .unwrap()
            .script
            .push_back((request.to_string(), reply.to_string()));
    }
}

/// Scripted [`Transport`] implementation
pub struct MockTransport {
    inner: Arc<Mutex<MockInner>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockInner::default())),
        }
    }

    /// Adapter that answers the standard init sequence with `OK`s, so tests
    /// can focus on the OBD traffic that follows.
    pub fn with_default_init() -> Self {
        let mock = Self::new();
        for (cmd, reply) in [
            ("ATZ", "\r\rELM327 v1.5\r\r>"),
            ("ATE0", "OK\r\r>"),
            ("ATL0", "OK\r\r>"),
            ("ATS0", "OK\r\r>"),
            ("ATH1", "OK\r\r>"),
            ("ATDPN", "A6\r\r>"),
            ("ATI", "ELM327 v1.5\r\r>"),
        ] {
            mock.table_entry(cmd, reply);
        }
        for protocol in 0..=9 {
            mock.table_entry(&format!("ATSP{protocol}"), "OK\r\r>");
        }
        mock
    }

    /// Add a one-shot exchange; consumed in order
    pub fn expect(self, request: &str, reply: &str) -> Self {
        self.inner
            .lock()
            .unwrap()
            .script
            .push_back((request.to_string(), reply.to_string()));
        self
    }

    /// Add a repeatable reply for `request`
    pub fn table_entry(&self, request: &str, reply: &str) {
        self.inner
            .lock()
            .unwrap()
            .table
            .insert(request.to_ascii_uppercase(), reply.to_string());
    }

    /// Builder form of [`table_entry`](Self::table_entry)
    pub fn with_entry(self, request: &str, reply: &str) -> Self {
        self.table_entry(request, reply);
        self
    }

    /// Inspection handle, cloneable and usable after the transport moves
    pub fn handle(&self) -> MockHandle {
        MockHandle {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&mut self, _timeout: Duration) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();
        inner.connected = true;
        inner.outgoing.clear();
        inner.partial.clear();
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.connected {
            return Err(TransportError::NotConnected);
        }

        for &byte in data {
            match byte {
                b'\r' => {
                    let command = String::from_utf8_lossy(&inner.partial)
                        .trim()
                        .to_ascii_uppercase();
                    inner.partial.clear();
                    if command.is_empty() {
                        continue;
                    }
                    trace!(%command, "mock adapter received command");
                    inner.sent.push(command.clone());
                    let reply = inner.resolve_reply(&command);
                    inner.outgoing.extend(reply.as_bytes());
                }
                b'\n' => {}
                _ => inner.partial.push(byte),
            }
        }
        Ok(())
    }

    async fn read_until(
        &mut self,
        delimiter: u8,
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.connected {
            return Err(TransportError::NotConnected);
        }
        if let Some(error) = inner.fail_next_read.take() {
            return Err(error);
        }

        match inner.outgoing.iter().position(|&b| b == delimiter) {
            Some(pos) => Ok(inner.outgoing.drain(..=pos).collect()),
            // nothing queued: a real adapter would stay silent
            None => Err(TransportError::Timeout(timeout)),
        }
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();
        inner.connected = false;
        inner.outgoing.clear();
        inner.partial.clear();
        Ok(())
    }

    fn endpoint(&self) -> String {
        "mock".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_exchange_round_trip() {
        let mut mock = MockTransport::new().expect("010D", "41 0D 32\r\r>");
        let handle = mock.handle();

        mock.connect(Duration::from_millis(10)).await.unwrap();
        mock.write(b"010D\r").await.unwrap();

        let reply = mock
            .read_until(b'>', Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(reply, b"41 0D 32\r\r>");
        assert_eq!(handle.sent_commands(), vec!["010D"]);
        assert_eq!(handle.remaining_script(), 0);
    }

    #[tokio::test]
    async fn unknown_command_gets_question_mark() {
        let mut mock = MockTransport::new();
        mock.connect(Duration::from_millis(10)).await.unwrap();
        mock.write(b"ATXYZ\r").await.unwrap();

        let reply = mock
            .read_until(b'>', Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(reply, b"?\r\r>");
    }

    #[tokio::test]
    async fn silent_adapter_times_out() {
        let mut mock = MockTransport::new();
        mock.connect(Duration::from_millis(10)).await.unwrap();
        let err = mock
            .read_until(b'>', Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Timeout(_)));
    }

    #[tokio::test]
    async fn injected_error_surfaces_once() {
        let mut mock = MockTransport::new().expect("0100", "41 00 BE 3F A8 13\r\r>");
        let handle = mock.handle();
        mock.connect(Duration::from_millis(10)).await.unwrap();

        handle.fail_next_read(TransportError::Timeout(Duration::from_millis(1)));
        mock.write(b"0100\r").await.unwrap();

        assert!(mock
            .read_until(b'>', Duration::from_millis(10))
            .await
            .is_err());
        // reply is still queued for the retry
        assert!(mock
            .read_until(b'>', Duration::from_millis(10))
            .await
            .is_ok());
    }
}
