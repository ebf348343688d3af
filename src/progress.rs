//! Conversion progress reporting.
//!
//! Reports observable progress during `cmig convert` so users see how
//! much of the working set has been processed. Progress is emitted on
//! **stderr** so stdout remains parseable for scripts.

use std::io::Write;

use content_migrator_core::models::RecordKind;

/// A single progress event for a conversion run.
#[derive(Clone, Debug)]
pub enum BatchProgressEvent {
    /// Reading the working set (no total yet).
    Discovering { kind: RecordKind },
    /// n records processed out of total.
    Converting {
        kind: RecordKind,
        n: u64,
        total: u64,
    },
}

/// Reports conversion progress.
pub trait BatchProgressReporter: Send + Sync {
    fn report(&self, event: BatchProgressEvent);
}

/// Human-friendly progress on stderr: "convert notes  1,200 / 5,000 records".
pub struct StderrProgress;

impl BatchProgressReporter for StderrProgress {
    fn report(&self, event: BatchProgressEvent) {
        let line = match &event {
            BatchProgressEvent::Discovering { kind } => {
                format!("convert {}  discovering...\n", kind.label())
            }
            BatchProgressEvent::Converting { kind, n, total } => format!(
                "convert {}  {} / {} records\n",
                kind.label(),
                format_number(*n),
                format_number(*total)
            ),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl BatchProgressReporter for JsonProgress {
    fn report(&self, event: BatchProgressEvent) {
        let obj = match &event {
            BatchProgressEvent::Discovering { kind } => serde_json::json!({
                "event": "progress",
                "kind": kind.as_str(),
                "phase": "discovering"
            }),
            BatchProgressEvent::Converting { kind, n, total } => serde_json::json!({
                "event": "progress",
                "kind": kind.as_str(),
                "phase": "converting",
                "n": n,
                "total": total
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

impl BatchProgressReporter for NoProgress {
    fn report(&self, _event: BatchProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI.
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    /// Human progress when stderr is a TTY, otherwise off.
    Auto,
    Off,
    Human,
    Json,
}

impl ProgressMode {
    pub fn reporter(&self) -> Box<dyn BatchProgressReporter> {
        match self {
            ProgressMode::Auto if atty::is(atty::Stream::Stderr) => Box::new(StderrProgress),
            ProgressMode::Auto | ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
