//! Trace replay.
//!
//! A trace is a JSON-lines file, one [`TraceEvent`] per line:
//!
//! ```text
//! {"kind":"ack","acked":1,"rtt_us":20150}
//! {"kind":"ack","acked":2,"rtt_us":20900,"window_limited":false}
//! {"kind":"loss"}
//! {"kind":"state","state":"loss"}
//! {"kind":"undo"}
//! {"kind":"event","event":"restart_after_idle"}
//! ```
//!
//! [`Replay`] feeds each event to a controller and applies the outcome to a
//! [`TransportWindow`], recording one [`ReplayRecord`] per event.

use std::io::{BufRead, Write};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::congestion_control::{
    AckSample, CaEvent, CaState, CongestionControl, CongestionControlStats, CongestionController,
    GrowthDirective,
};
use crate::errors::TraceError;
use crate::ndm::NdmStats;
use crate::window::TransportWindow;

fn window_limited_default() -> bool {
    true
}

/// One line of a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceEvent {
    Ack {
        acked: u32,
        rtt_us: u64,
        #[serde(default = "window_limited_default")]
        window_limited: bool,
    },
    Loss {
        /// Retransmission timeout rather than fast retransmit.
        #[serde(default)]
        timeout: bool,
    },
    Undo,
    Event {
        event: CaEvent,
    },
    State {
        state: CaState,
    },
}

/// Parse a JSON-lines trace. Blank lines and lines starting with `#` are skipped.
pub fn read_trace(reader: impl BufRead) -> Result<Vec<TraceEvent>, TraceError> {
    let mut events = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let event = serde_json::from_str(trimmed).map_err(|source| TraceError::Malformed {
            line: idx + 1,
            source,
        })?;
        events.push(event);
    }
    Ok(events)
}

pub fn write_trace(mut writer: impl Write, events: &[TraceEvent]) -> Result<(), TraceError> {
    for event in events {
        serde_json::to_writer(&mut writer, event).map_err(std::io::Error::from)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Outcome of one replayed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayRecord {
    pub step: u64,
    pub event: TraceEvent,
    /// Directive returned for an ack.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directive: Option<GrowthDirective>,
    pub cwnd: u32,
    pub ssthresh: u32,
    pub entropy: u16,
}

/// End-of-trace summary.
#[derive(Debug, Clone, Serialize)]
pub struct ReplaySummary {
    pub events: u64,
    pub final_cwnd: u32,
    pub peak_cwnd: u32,
    pub window: TransportWindow,
    pub stats: CongestionControlStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ndm: Option<NdmStats>,
}

/// Drives a controller and a host window through a trace.
#[derive(Debug)]
pub struct Replay {
    controller: CongestionController,
    window: TransportWindow,
    steps: u64,
    peak_cwnd: u32,
}

impl Replay {
    pub fn new(controller: CongestionController, window: TransportWindow) -> Self {
        let peak_cwnd = window.cwnd();
        Self {
            controller,
            window,
            steps: 0,
            peak_cwnd,
        }
    }

    pub fn controller(&self) -> &CongestionController {
        &self.controller
    }

    pub fn window(&self) -> &TransportWindow {
        &self.window
    }

    pub fn step(&mut self, event: TraceEvent) -> ReplayRecord {
        self.steps += 1;
        let mut directive = None;
        match event {
            TraceEvent::Ack {
                acked,
                rtt_us,
                window_limited,
            } => {
                if rtt_us == 0 {
                    tracing::warn!(step = self.steps, "Ack without RTT sample");
                }
                let outcome = self.controller.on_ack(AckSample {
                    acked,
                    rtt: Duration::from_micros(rtt_us),
                    cwnd: self.window.cwnd(),
                    window_limited,
                });
                self.window.apply(outcome);
                directive = Some(outcome);
            }
            TraceEvent::Loss { timeout } => {
                let ssthresh = self.controller.on_loss(self.window.cwnd());
                self.window.enter_recovery(ssthresh, timeout);
            }
            TraceEvent::Undo => {
                let restored = self.controller.on_undo(self.window.cwnd());
                self.window.undo(restored);
            }
            TraceEvent::Event { event } => self.controller.on_event(event),
            TraceEvent::State { state } => self.controller.on_state(state),
        }
        self.peak_cwnd = self.peak_cwnd.max(self.window.cwnd());

        ReplayRecord {
            step: self.steps,
            event,
            directive,
            cwnd: self.window.cwnd(),
            ssthresh: self.window.ssthresh(),
            entropy: self.controller.export_diagnostics().entropy,
        }
    }

    pub fn run(&mut self, events: impl IntoIterator<Item = TraceEvent>) -> Vec<ReplayRecord> {
        events.into_iter().map(|event| self.step(event)).collect()
    }

    pub fn summary(&self) -> ReplaySummary {
        ReplaySummary {
            events: self.steps,
            final_cwnd: self.window.cwnd(),
            peak_cwnd: self.peak_cwnd,
            window: self.window.clone(),
            stats: self.controller.stats(),
            ndm: self.controller.ndm_stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::congestion_control::{CongestionControlAlgorithm, CongestionControlConfig};

    fn replay(algorithm: CongestionControlAlgorithm) -> Replay {
        let controller = CongestionControlConfig::new(algorithm).build(10, 0).unwrap();
        Replay::new(controller, TransportWindow::new(10, 0))
    }

    #[test]
    fn test_read_trace() {
        let input = r#"
# comment
{"kind":"ack","acked":1,"rtt_us":20150}
{"kind":"ack","acked":2,"rtt_us":20900,"window_limited":false}
{"kind":"loss"}
{"kind":"loss","timeout":true}
{"kind":"undo"}
{"kind":"event","event":"restart_after_idle"}
{"kind":"state","state":"loss"}
"#;
        let events = read_trace(input.as_bytes()).unwrap();
        assert_eq!(events.len(), 7);
        assert_eq!(
            events[0],
            TraceEvent::Ack {
                acked: 1,
                rtt_us: 20150,
                window_limited: true
            }
        );
        assert_eq!(events[3], TraceEvent::Loss { timeout: true });
        assert_eq!(
            events[5],
            TraceEvent::Event {
                event: CaEvent::RestartAfterIdle
            }
        );
    }

    #[test]
    fn test_malformed_line_reports_number() {
        let input = "{\"kind\":\"undo\"}\n{\"kind\":\"ack\"}\n";
        match read_trace(input.as_bytes()) {
            Err(TraceError::Malformed { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_write_then_read() {
        let events = vec![
            TraceEvent::Ack {
                acked: 1,
                rtt_us: 1000,
                window_limited: true,
            },
            TraceEvent::State {
                state: CaState::Recovery,
            },
        ];
        let mut buf = Vec::new();
        write_trace(&mut buf, &events).unwrap();
        assert_eq!(read_trace(buf.as_slice()).unwrap(), events);
    }

    #[test]
    fn test_loss_and_undo_cycle() {
        let mut replay = replay(CongestionControlAlgorithm::Ndm);
        for _ in 0..30 {
            replay.step(TraceEvent::Ack {
                acked: 1,
                rtt_us: 20_000,
                window_limited: true,
            });
        }
        let before = replay.window().cwnd();
        assert!(before > 10);

        let loss = replay.step(TraceEvent::Loss { timeout: false });
        assert!(loss.cwnd < before);
        assert_eq!(loss.directive, None);

        let undo = replay.step(TraceEvent::Undo);
        assert!(undo.cwnd >= before);

        let summary = replay.summary();
        assert_eq!(summary.events, 32);
        assert_eq!(summary.peak_cwnd, before.max(undo.cwnd));
        assert_eq!(summary.stats.total_losses, 1);
        assert!(summary.ndm.is_some());
    }

    #[test]
    fn test_reno_replay_grows_like_reno() {
        let mut replay = replay(CongestionControlAlgorithm::Reno);
        let records = replay.run((0..5).map(|_| TraceEvent::Ack {
            acked: 2,
            rtt_us: 5_000,
            window_limited: true,
        }));
        assert_eq!(records.last().unwrap().cwnd, 20);
        assert!(replay.summary().ndm.is_none());
    }
}
