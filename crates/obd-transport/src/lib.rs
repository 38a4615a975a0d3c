//! Byte-oriented transports for ELM327 OBD-II adapters
//!
//! An ELM327 adapter is a half-duplex ASCII device: the host writes a
//! CR-terminated command and reads bytes until the `>` prompt. This crate
//! abstracts the byte channel behind the [`Transport`] trait and provides a
//! TCP implementation (WiFi dongles), a scripted mock for tests, and a BLE
//! implementation behind the `ble` cargo feature.

mod error;
mod mock;
mod tcp;

#[cfg(feature = "ble")]
mod ble;

pub use error::TransportError;
pub use mock::{MockHandle, MockTransport};
pub use tcp::{TcpTransport, TcpTransportConfig};

#[cfg(feature = "ble")]
pub use ble::{BleDeviceProfile, BleTransport, BleTransportConfig};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// The ELM327 "ready for next command" byte; every response ends with it.
pub const PROMPT: u8 = b'>';

/// Link lifecycle as observed by subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No link
    Disconnected,
    /// Transport connect in progress
    Connecting,
    /// Adapter answers AT commands
    ConnectedToAdapter,
    /// In-vehicle protocol negotiated, ECUs responding
    ConnectedToVehicle,
}

/// Multi-producer channel for [`ConnectionState`] transitions.
///
/// The session owns one of these; transports and the session publish into
/// it and any number of consumers subscribe. The initial value is
/// [`ConnectionState::Disconnected`].
#[derive(Debug, Clone)]
pub struct StateChannel {
    tx: Arc<watch::Sender<ConnectionState>>,
}

impl StateChannel {
    /// Create a channel starting in `Disconnected`
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ConnectionState::Disconnected);
        Self { tx: Arc::new(tx) }
    }

    /// Publish a transition; no-op when the state is unchanged
    pub fn publish(&self, state: ConnectionState) {
        self.tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                tracing::debug!(?state, "connection state transition");
                *current = state;
                true
            }
        });
    }

    /// Current state without subscribing
    pub fn current(&self) -> ConnectionState {
        *self.tx.borrow()
    }

    /// Subscribe to every subsequent transition
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.tx.subscribe()
    }
}

impl Default for StateChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// A bidirectional byte channel to an ELM327-class adapter.
///
/// Implementations are plain byte pipes: framing (the `>` prompt), echo
/// handling and retries live in the session layer above. A single adapter
/// services one command at a time; callers serialize access.
#[async_trait]
pub trait Transport: Send {
    /// Establish the link within `timeout`
    async fn connect(&mut self, timeout: Duration) -> Result<(), TransportError>;

    /// Write raw bytes to the adapter
    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Read bytes until `delimiter` (inclusive) or `timeout`.
    ///
    /// Bytes received past the delimiter are buffered for the next read, so
    /// a successful call leaves the stream positioned immediately after the
    /// delimiter.
    async fn read_until(
        &mut self,
        delimiter: u8,
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError>;

    /// Tear the link down; idempotent
    async fn disconnect(&mut self) -> Result<(), TransportError>;

    /// Human-readable endpoint description for diagnostics
    fn endpoint(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_channel_starts_disconnected() {
        let ch = StateChannel::new();
        assert_eq!(ch.current(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn state_channel_publishes_transitions() {
        let ch = StateChannel::new();
        let mut rx = ch.subscribe();

        ch.publish(ConnectionState::Connecting);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), ConnectionState::Connecting);

        ch.publish(ConnectionState::ConnectedToAdapter);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), ConnectionState::ConnectedToAdapter);
    }

    #[tokio::test]
    async fn duplicate_state_is_not_republished() {
        let ch = StateChannel::new();
        let rx = ch.subscribe();
        ch.publish(ConnectionState::Disconnected);
        assert!(!rx.has_changed().unwrap());
    }
}
