//! Protocol negotiation
//!
//! The detector is a small ladder: try the caller's preferred protocol,
//! fall back to the adapter's auto-search, then walk every protocol
//! manually. A protocol is accepted exactly when a `0100` probe comes back
//! with a positive Mode 01 PID 00 response (`41 00`). The accepted
//! probe's reply is kept for the ECU mapping that follows.

use tracing::{debug, info, warn};

use crate::error::{ProtocolError, SessionError};
use crate::protocol::ObdProtocol;
use crate::session::Elm327Session;

/// Outcome of a successful negotiation
#[derive(Debug, Clone)]
pub struct Detection {
    pub protocol: ObdProtocol,
    /// The raw `0100` reply lines of the accepted protocol
    pub probe_lines: Vec<String>,
}

/// Whether a probe reply contains the `41 00` positive response
fn probe_succeeded(lines: &[String]) -> bool {
    lines.iter().any(|line| {
        line.to_ascii_uppercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .contains("4100")
    })
}

/// Probe the currently selected protocol with `0100`
async fn probe(session: &Elm327Session) -> Result<Option<Vec<String>>, SessionError> {
    match session.send_with_retries("0100").await {
        Ok(lines) if probe_succeeded(&lines) => Ok(Some(lines)),
        Ok(lines) => {
            debug!(?lines, "probe got no positive response");
            Ok(None)
        }
        // a probe that cannot connect is a failed candidate, not a dead link
        Err(SessionError::InvalidResponse(line)) => {
            debug!(line, "probe rejected by adapter");
            Ok(None)
        }
        Err(SessionError::Link(kind)) => {
            debug!(?kind, "probe hit a bus error");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Select `protocol` on the adapter and probe it
async fn try_protocol(
    session: &Elm327Session,
    protocol: ObdProtocol,
) -> Result<Option<Detection>, SessionError> {
    let Some(select) = protocol.select_command() else {
        return Ok(None);
    };
    session.expect_ok(&select).await?;
    Ok(probe(session).await?.map(|probe_lines| Detection {
        protocol,
        probe_lines,
    }))
}

/// Ask the adapter which protocol its auto-search settled on
async fn describe_protocol(session: &Elm327Session) -> Result<ObdProtocol, ProtocolError> {
    let lines = session.send_with_retries("ATDPN").await?;
    let reply = lines.first().map(String::as_str).unwrap_or_default().trim();
    // an `A` prefix flags that the adapter chose the protocol itself
    let id = reply.trim_start_matches(['A', 'a']).chars().next();
    match id.and_then(ObdProtocol::from_elm_id) {
        Some(protocol) => Ok(protocol),
        None => {
            warn!(reply, "ATDPN reply did not name a known protocol");
            Err(ProtocolError::UnknownProtocol(id.unwrap_or('?')))
        }
    }
}

/// Run the negotiation ladder to completion
pub async fn detect_protocol(
    session: &Elm327Session,
    preferred: Option<ObdProtocol>,
) -> Result<Detection, ProtocolError> {
    // 1. the caller's preference, when it names a concrete protocol
    if let Some(preferred) = preferred.filter(|p| *p != ObdProtocol::Auto) {
        info!(?preferred, "trying preferred protocol");
        if let Some(detection) = try_protocol(session, preferred).await? {
            info!(protocol = ?detection.protocol, "preferred protocol accepted");
            return Ok(detection);
        }
        warn!(?preferred, "preferred protocol rejected, falling back to auto");
    }

    // 2. the adapter's own search
    if let Some(detection) = try_protocol(session, ObdProtocol::Auto).await? {
        let protocol = describe_protocol(session).await?;
        info!(?protocol, "auto-search found a protocol");
        return Ok(Detection {
            protocol,
            probe_lines: detection.probe_lines,
        });
    }

    // 3. walk every protocol by hand
    for &candidate in ObdProtocol::manual_candidates() {
        debug!(?candidate, "manual protocol attempt");
        if let Some(detection) = try_protocol(session, candidate).await? {
            info!(protocol = ?detection.protocol, "manual walk found a protocol");
            return Ok(detection);
        }
    }

    Err(ProtocolError::NoProtocolFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionConfig;
    use obd_transport::MockTransport;
    use std::time::Duration;

    fn session(mock: MockTransport) -> Elm327Session {
        let config = SessionConfig {
            reset_delay: Duration::from_millis(1),
            init_delay: Duration::from_millis(1),
            retry_backoff: Duration::from_millis(1),
            ..Default::default()
        };
        Elm327Session::new(Box::new(mock), config)
    }

    #[test]
    fn probe_matches_spaced_and_packed_responses() {
        assert!(probe_succeeded(&["41 00 BE 3F A8 13".to_string()]));
        assert!(probe_succeeded(&["7E8064100BE3FA813".to_string()]));
        assert!(!probe_succeeded(&["41 0C 0F A0".to_string()]));
    }

    #[tokio::test]
    async fn auto_detection_reads_the_concrete_protocol() {
        let mock = MockTransport::new()
            .expect("ATSP0", "OK\r\r>")
            .expect("0100", "SEARCHING...\r7E8 06 41 00 BE 3F A8 13\r\r>")
            .expect("ATDPN", "A6\r\r>");
        let s = session(mock);
        s.connect_transport(Duration::from_millis(10)).await.unwrap();

        let detection = detect_protocol(&s, None).await.unwrap();
        assert_eq!(detection.protocol, ObdProtocol::Can11Bit500K);
        assert!(!detection.probe_lines.is_empty());
    }

    #[tokio::test]
    async fn failed_auto_walks_the_manual_ladder() {
        let mock = MockTransport::new()
            .expect("ATSP0", "OK\r\r>")
            .expect("0100", "SEARCHING...\rUNABLE TO CONNECT\r\r>")
            .expect("ATSP1", "OK\r\r>")
            .expect("0100", "NO DATA\r\r>")
            .expect("ATSP2", "OK\r\r>")
            .expect("0100", "41 00 BE 1F A8 13\r\r>");
        let handle = mock.handle();
        let s = session(mock);
        s.connect_transport(Duration::from_millis(10)).await.unwrap();

        let detection = detect_protocol(&s, None).await.unwrap();
        assert_eq!(detection.protocol, ObdProtocol::J1850Vpw);
        assert_eq!(
            handle.sent_commands(),
            vec!["ATSP0", "0100", "ATSP1", "0100", "ATSP2", "0100"]
        );
    }

    #[tokio::test]
    async fn preferred_protocol_is_tried_first() {
        let mock = MockTransport::new()
            .expect("ATSP6", "OK\r\r>")
            .expect("0100", "7E8 06 41 00 BE 3F A8 13\r\r>");
        let s = session(mock);
        s.connect_transport(Duration::from_millis(10)).await.unwrap();

        let detection = detect_protocol(&s, Some(ObdProtocol::Can11Bit500K))
            .await
            .unwrap();
        assert_eq!(detection.protocol, ObdProtocol::Can11Bit500K);
    }

    #[tokio::test]
    async fn exhausted_ladder_reports_no_protocol() {
        let mock = MockTransport::new();
        let handle = mock.handle();
        handle.push_exchange("ATSP0", "OK\r\r>");
        handle.push_exchange("0100", "UNABLE TO CONNECT\r\r>");
        for n in 1..=9 {
            handle.push_exchange(&format!("ATSP{n}"), "OK\r\r>");
            handle.push_exchange("0100", "UNABLE TO CONNECT\r\r>");
        }
        let s = session(mock);
        s.connect_transport(Duration::from_millis(10)).await.unwrap();

        let err = detect_protocol(&s, None).await.unwrap_err();
        assert!(matches!(err, ProtocolError::NoProtocolFound));
    }
}
