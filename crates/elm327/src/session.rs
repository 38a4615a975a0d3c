//! The adapter dialogue
//!
//! A session owns the transport behind an async mutex: one command in
//! flight at a time, each exchange writing `<cmd>\r` and consuming bytes
//! through exactly one `>` prompt. Everything above (protocol detection,
//! polling, the public API) goes through [`Elm327Session::send_command`].

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, info, trace, warn};

use obd_transport::{Transport, TransportError, PROMPT};

use crate::error::{LinkErrorKind, SessionError};

/// Session timing and retry knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Per-command prompt deadline
    pub command_timeout: Duration,
    /// Settle time after `ATZ`; the chip reboots and replays its banner
    pub reset_delay: Duration,
    /// Settle time after each other init step
    pub init_delay: Duration,
    /// Resend attempts for retryable failures
    pub retries: u32,
    /// Back-off between resends
    pub retry_backoff: Duration,
    /// How long a cancellation drain waits for the orphaned prompt
    pub drain_grace: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_millis(1500),
            reset_delay: Duration::from_millis(1000),
            init_delay: Duration::from_millis(100),
            retries: 2,
            retry_backoff: Duration::from_millis(150),
            drain_grace: Duration::from_millis(500),
        }
    }
}

/// A live dialogue with one ELM327 adapter
pub struct Elm327Session {
    transport: Mutex<Box<dyn Transport>>,
    config: SessionConfig,
}

impl std::fmt::Debug for Elm327Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Elm327Session")
            .field("config", &self.config)
            .finish()
    }
}

impl Elm327Session {
    pub fn new(transport: Box<dyn Transport>, config: SessionConfig) -> Self {
        Self {
            transport: Mutex::new(transport),
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Bring the underlying transport up
    pub async fn connect_transport(&self, timeout: Duration) -> Result<(), SessionError> {
        let mut transport = self.transport.lock().await;
        transport.connect(timeout).await?;
        Ok(())
    }

    /// Tear the transport down; idempotent
    pub async fn disconnect(&self) {
        let mut transport = self.transport.lock().await;
        if let Err(e) = transport.disconnect().await {
            warn!(error = %e, "transport disconnect failed");
        }
    }

    /// Send one command and return its response lines.
    ///
    /// Yields [`SessionError::AdapterBusy`] if another command currently
    /// holds the link rather than queueing behind it.
    pub async fn send_command(&self, command: &str) -> Result<Vec<String>, SessionError> {
        let mut transport = self
            .transport
            .try_lock()
            .map_err(|_| SessionError::AdapterBusy)?;
        self.exchange(&mut transport, command).await
    }

    /// [`send_command`](Self::send_command) with the configured retry
    /// policy: timeouts and link errors are resent after a back-off,
    /// invalid responses are not.
    pub async fn send_with_retries(&self, command: &str) -> Result<Vec<String>, SessionError> {
        let mut attempt = 0;
        loop {
            match self.send_command(command).await {
                Ok(lines) => return Ok(lines),
                Err(e) if e.is_retryable() && attempt < self.config.retries => {
                    attempt += 1;
                    warn!(command, attempt, error = %e, "retrying command");
                    sleep(self.config.retry_backoff * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Consume any stale bytes up to the next prompt.
    ///
    /// After a cancelled exchange the adapter still finishes its reply;
    /// one drain restores the prompt invariant for the next command.
    pub async fn drain(&self) {
        let mut transport = self.transport.lock().await;
        match transport.read_until(PROMPT, self.config.drain_grace).await {
            Ok(stale) => debug!(bytes = stale.len(), "drained stale response"),
            Err(TransportError::Timeout(_)) => trace!("drain found no stale bytes"),
            Err(e) => warn!(error = %e, "drain failed"),
        }
    }

    /// Run the adapter initialization ladder; returns the `ATI` banner.
    ///
    /// `ATZ` and `ATI` answer with a banner instead of `OK`; every other
    /// step must acknowledge. Headers stay on for ECU demultiplexing.
    pub async fn initialize(&self) -> Result<String, SessionError> {
        info!("initializing ELM327 adapter");

        // the reset replays the banner and may echo; accept anything
        let mut transport = self
            .transport
            .try_lock()
            .map_err(|_| SessionError::AdapterBusy)?;
        let _ = self.exchange(&mut transport, "ATZ").await?;
        drop(transport);
        sleep(self.config.reset_delay).await;

        for command in ["ATE0", "ATL0", "ATS0", "ATH1"] {
            self.expect_ok(command).await?;
            sleep(self.config.init_delay).await;
        }

        let banner = self.send_with_retries("ATI").await?;
        let version = banner.first().cloned().unwrap_or_default();
        info!(version, "adapter initialized");
        Ok(version)
    }

    /// Send an init step that must answer `OK`
    pub async fn expect_ok(&self, command: &str) -> Result<(), SessionError> {
        let lines = self.send_with_retries(command).await?;
        if lines.iter().any(|line| line.contains("OK")) {
            Ok(())
        } else {
            warn!(command, ?lines, "init step not acknowledged");
            Err(SessionError::AdapterInitFailed(command.to_string()))
        }
    }

    /// One write -> read-until-prompt cycle under the held lock
    async fn exchange(
        &self,
        transport: &mut Box<dyn Transport>,
        command: &str,
    ) -> Result<Vec<String>, SessionError> {
        trace!(command, "-> adapter");
        let mut wire = command.as_bytes().to_vec();
        wire.push(b'\r');
        transport.write(&wire).await?;

        let raw = transport
            .read_until(PROMPT, self.config.command_timeout)
            .await?;
        let text = String::from_utf8_lossy(&raw);
        trace!(response = %text.escape_debug(), "<- adapter");

        self.classify(command, &text)
    }

    /// Split a raw response into lines and map adapter sentinels
    fn classify(&self, command: &str, text: &str) -> Result<Vec<String>, SessionError> {
        let lines: Vec<String> = text
            .split(['\r', '\n'])
            .map(str::trim)
            .filter(|line| {
                !line.is_empty()
                    && *line != ">"
                    && !line.eq_ignore_ascii_case(command)
                    && !line.to_ascii_uppercase().contains("SEARCHING")
            })
            .map(str::to_string)
            .collect();

        let first = match lines.first() {
            Some(first) => first.to_ascii_uppercase(),
            None => return Ok(lines),
        };

        if first.contains("NO DATA") {
            debug!(command, "adapter reports no data");
            return Ok(Vec::new());
        }
        if first == "?" || first.contains("UNABLE TO CONNECT") {
            return Err(SessionError::InvalidResponse(first));
        }
        if first.contains("STOPPED") {
            return Err(SessionError::Link(LinkErrorKind::Stopped));
        }
        if first.contains("BUS INIT") && first.contains("ERROR") {
            return Err(SessionError::Link(LinkErrorKind::BusInit));
        }
        if first.contains("CAN ERROR") {
            return Err(SessionError::Link(LinkErrorKind::Can));
        }

        Ok(lines)
    }
}
