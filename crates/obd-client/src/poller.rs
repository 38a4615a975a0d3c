//! The continuous-polling engine
//!
//! One task owns the poll loop: assemble the subscribed Mode 01 PIDs into
//! compound requests (the adapter answers them all in one exchange),
//! decode a snapshot, push it over a channel, sleep out the pacing
//! interval, repeat. Stopping cancels the in-flight exchange and drains
//! the adapter to its prompt so the link stays usable.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use obd_pids::{CommandId, MeasurementResult, TypedValue};

use crate::config::{PollStrategy, PollingConfig};
use crate::error::ObdError;
use crate::ObdInner;

/// One polling pass: every answered PID with its decoded value
pub type Snapshot = HashMap<CommandId, MeasurementResult>;

/// The ELM327 accepts at most six PIDs in one compound Mode 01 request
const MAX_BATCH_PIDS: usize = 6;

/// Control handle for a running poll task
pub struct PollHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollHandle {
    /// Stop polling; waits for the task to cancel its in-flight command
    /// and drain the adapter before returning.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "poll task did not shut down cleanly");
        }
    }
}

/// Spawn the poll loop; returns the snapshot stream and its handle
pub(crate) fn spawn(
    inner: Arc<ObdInner>,
    commands: Vec<CommandId>,
    config: PollingConfig,
) -> (mpsc::Receiver<Snapshot>, PollHandle) {
    let (snapshot_tx, snapshot_rx) = mpsc::channel(config.channel_capacity.max(1));
    let (stop_tx, stop_rx) = watch::channel(false);

    let task = tokio::spawn(run(inner, commands, config, snapshot_tx, stop_rx));

    (snapshot_rx, PollHandle { stop_tx, task })
}

async fn run(
    inner: Arc<ObdInner>,
    commands: Vec<CommandId>,
    config: PollingConfig,
    snapshot_tx: mpsc::Sender<Snapshot>,
    mut stop_rx: watch::Receiver<bool>,
) {
    info!(pids = commands.len(), strategy = ?config.strategy, "polling started");
    let mut interval = config.interval;

    loop {
        if *stop_rx.borrow() {
            break;
        }

        let started = Instant::now();
        let snapshot = tokio::select! {
            biased;
            _ = stop_rx.changed() => {
                // the in-flight exchange was just cancelled; restore the
                // prompt invariant before releasing the adapter
                inner.session.drain().await;
                break;
            }
            result = poll_once(&inner, &commands, config.strategy) => match result {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(error = %e, "polling pass failed");
                    if matches!(e, ObdError::Session(_) | ObdError::CommandFailed { .. }) {
                        break;
                    }
                    Snapshot::new()
                }
            },
        };

        if !snapshot.is_empty() && snapshot_tx.send(snapshot).await.is_err() {
            debug!("snapshot receiver dropped, polling stops");
            break;
        }

        let elapsed = started.elapsed();
        if config.adaptive {
            interval = adaptive_interval(elapsed, &config);
        }
        let pause = interval.saturating_sub(elapsed);
        if !pause.is_zero() {
            tokio::select! {
                biased;
                _ = stop_rx.changed() => break,
                _ = sleep(pause) => {}
            }
        }
    }

    info!("polling stopped");
}

/// `clamp(elapsed * safety_factor, floor, cap)`: keeps the adapter busy
/// without outrunning a slow protocol.
fn adaptive_interval(elapsed: Duration, config: &PollingConfig) -> Duration {
    elapsed
        .mul_f64(config.safety_factor.max(1.0))
        .clamp(config.floor, config.cap)
}

/// Execute one polling pass with the configured strategy
pub(crate) async fn poll_once(
    inner: &ObdInner,
    commands: &[CommandId],
    strategy: PollStrategy,
) -> Result<Snapshot, ObdError> {
    match strategy {
        PollStrategy::Batched => poll_batched(inner, commands).await,
        PollStrategy::Sequential => poll_sequential(inner, commands).await,
    }
}

/// Compound-request strategy: `01 P1 P2 ... Pn` per chunk of six
pub(crate) async fn poll_batched(
    inner: &ObdInner,
    commands: &[CommandId],
) -> Result<Snapshot, ObdError> {
    let mut snapshot = Snapshot::new();

    let batchable: Vec<CommandId> = commands
        .iter()
        .copied()
        .filter(|c| {
            let ok = c.mode01_pid().is_some();
            if !ok {
                warn!(command = c.spec().wire, "only Mode 01 PIDs can be batched");
            }
            ok
        })
        .collect();

    for chunk in batchable.chunks(MAX_BATCH_PIDS) {
        let mut wire = String::from("01");
        for command in chunk {
            wire.push_str(&format!("{:02X}", command.mode01_pid().unwrap()));
        }

        let messages = match inner.query_wire(&wire).await {
            Ok(messages) => messages,
            Err(ObdError::NoData) => continue,
            Err(e) => return Err(e),
        };

        // answers ride in the first message, echo-PID then value, in
        // request order; a missing echo means that PID went unanswered
        let Some(message) = messages.first() else {
            continue;
        };
        let data = &message.data;
        if data.first() != Some(&0x41) {
            debug!(?data, "batch reply without Mode 01 response byte");
            continue;
        }

        let mut idx = 1;
        for command in chunk {
            let pid = command.mode01_pid().unwrap();
            if idx >= data.len() || data[idx] != pid {
                debug!(pid, "PID missing from batch reply");
                continue;
            }
            idx += 1;

            let width = command.spec().response_bytes;
            if idx + width > data.len() {
                warn!(pid, "batch reply truncated mid-value");
                break;
            }
            let payload = &data[idx..idx + width];
            idx += width;

            match command.decode(payload, inner.units()) {
                Ok(TypedValue::Measurement(m)) => {
                    snapshot.insert(*command, m);
                }
                Ok(_) => {}
                Err(e) => {
                    // one bad value never spoils its siblings
                    warn!(pid, error = %e, "PID decode failed");
                }
            }
        }
    }

    Ok(snapshot)
}

/// One-command-per-request strategy; concurrency stays at one because the
/// adapter is half-duplex.
async fn poll_sequential(
    inner: &ObdInner,
    commands: &[CommandId],
) -> Result<Snapshot, ObdError> {
    let mut snapshot = Snapshot::new();
    for &command in commands {
        match inner.send_command_typed(command).await {
            Ok(TypedValue::Measurement(m)) => {
                snapshot.insert(command, m);
            }
            Ok(_) => {}
            Err(ObdError::NoData) => {
                debug!(command = command.spec().wire, "no data for PID");
            }
            Err(e @ ObdError::Session(_)) => return Err(e),
            Err(e) => {
                warn!(command = command.spec().wire, error = %e, "PID failed");
            }
        }
    }
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adaptive_interval_clamps_both_ends() {
        let config = PollingConfig {
            adaptive: true,
            ..Default::default()
        };
        // fast batch hits the floor
        assert_eq!(
            adaptive_interval(Duration::from_millis(10), &config),
            config.floor
        );
        // slow batch hits the cap
        assert_eq!(
            adaptive_interval(Duration::from_secs(10), &config),
            config.cap
        );
        // middle scales by the safety factor
        assert_eq!(
            adaptive_interval(Duration::from_millis(400), &config),
            Duration::from_millis(600)
        );
    }
}
