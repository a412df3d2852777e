//! Webhook progress reporting.
//!
//! A webhook answer can take minutes to arrive, so the coordinator reports
//! what it is doing while it waits. Progress is emitted on **stderr** so
//! stdout stays clean for the answer itself.

use std::io::Write;

/// A single progress event for one webhook exchange.
#[derive(Clone, Debug, PartialEq)]
pub enum PollProgressEvent {
    /// The initial request was sent.
    Sent { session_id: String },
    /// The webhook accepted the work and will be polled.
    Processing { session_id: String },
    /// Sleeping before poll `attempt` (1-based) of `max_attempts`.
    Waiting {
        attempt: u32,
        max_attempts: u32,
        delay_ms: u64,
    },
    /// A poll failed or came back without an answer.
    NotReady { attempt: u32, reason: String },
    /// An answer arrived after `polls` poll calls.
    Completed { polls: u32 },
}

/// Receives progress events. Implementations write to stderr (human or JSON).
pub trait PollProgressReporter: Send + Sync {
    fn report(&self, event: PollProgressEvent);
}

/// Human-friendly progress on stderr: "webhook  poll 3/20  waiting 4.5s".
pub struct StderrProgress;

impl PollProgressReporter for StderrProgress {
    fn report(&self, event: PollProgressEvent) {
        let line = match &event {
            PollProgressEvent::Sent { session_id } => {
                format!("webhook  sent ({})\n", session_id)
            }
            PollProgressEvent::Processing { .. } => {
                "webhook  workflow started, waiting for response...\n".to_string()
            }
            PollProgressEvent::Waiting {
                attempt,
                max_attempts,
                delay_ms,
            } => format!(
                "webhook  poll {}/{}  waiting {}\n",
                attempt,
                max_attempts,
                format_delay(*delay_ms)
            ),
            PollProgressEvent::NotReady { attempt, reason } => {
                format!("webhook  poll {}  not ready: {}\n", attempt, reason)
            }
            PollProgressEvent::Completed { polls } => {
                format!("webhook  response received after {} polls\n", polls)
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl PollProgressReporter for JsonProgress {
    fn report(&self, event: PollProgressEvent) {
        let obj = match &event {
            PollProgressEvent::Sent { session_id } => serde_json::json!({
                "event": "progress",
                "phase": "sent",
                "session_id": session_id
            }),
            PollProgressEvent::Processing { session_id } => serde_json::json!({
                "event": "progress",
                "phase": "processing",
                "session_id": session_id
            }),
            PollProgressEvent::Waiting {
                attempt,
                max_attempts,
                delay_ms,
            } => serde_json::json!({
                "event": "progress",
                "phase": "waiting",
                "attempt": attempt,
                "max_attempts": max_attempts,
                "delay_ms": delay_ms
            }),
            PollProgressEvent::NotReady { attempt, reason } => serde_json::json!({
                "event": "progress",
                "phase": "not_ready",
                "attempt": attempt,
                "reason": reason
            }),
            PollProgressEvent::Completed { polls } => serde_json::json!({
                "event": "progress",
                "phase": "completed",
                "polls": polls
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl PollProgressReporter for NoProgress {
    fn report(&self, _event: PollProgressEvent) {}
}

/// `850ms`, `3s`, `4.5s`.
pub(crate) fn format_delay(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms % 1000 == 0 {
        format!("{}s", ms / 1000)
    } else {
        let secs = format!("{:.2}", ms as f64 / 1000.0);
        format!("{}s", secs.trim_end_matches('0').trim_end_matches('.'))
    }
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s {
            "off" => Ok(ProgressMode::Off),
            "human" => Ok(ProgressMode::Human),
            "json" => Ok(ProgressMode::Json),
            other => anyhow::bail!(
                "Unknown progress mode: '{}'. Use off, human, or json.",
                other
            ),
        }
    }

    /// Build a reporter for this mode.
    pub fn reporter(&self) -> Box<dyn PollProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
