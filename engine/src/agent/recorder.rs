//! Interaction Recorder
//!
//! Two side channels fed by the orchestrator:
//!
//! - `EventLog`: append-only JSON-lines file, one `LogEntry` per event. Clones
//!   share one file handle behind a mutex and every entry is written with a
//!   single `write_all`, so concurrent writers never interleave partial lines.
//!   Entries are stamped under the lock, so file order is timestamp order.
//!   Separately opened logs on the same path share no mutex; exclusion between
//!   them relies on `O_APPEND` plus the single `write_all` per line.
//! - `Stats`: cumulative per-process counters, reset only on request.

use chrono::{DateTime, Utc};
use sdk::{CapabilityArgs, EngineError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// One orchestrator step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Action {
        capability_name: String,
        args: CapabilityArgs,
        rationale: String,
    },
    Finish {
        output: String,
        rationale: String,
    },
}

/// A logged event: `{"timestamp": ..., "type": "action" | "finish", ...}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: Event,
}

/// Append-only JSON-lines event log
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
    file: Arc<Mutex<File>>,
}

impl EventLog {
    /// Open (or create) the log, creating its directory if needed
    pub fn open(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        debug!("Event log opened at {:?}", path);

        Ok(Self {
            path,
            file: Arc::new(Mutex::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry as a single line
    pub fn append(&self, event: &Event) -> Result<LogEntry, EngineError> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| EngineError::Io(io::Error::new(io::ErrorKind::Other, "event log lock poisoned")))?;

        let entry = LogEntry {
            timestamp: Utc::now(),
            event: event.clone(),
        };
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        file.write_all(line.as_bytes())?;
        file.flush()?;

        Ok(entry)
    }

    /// Parse every entry back from a log file
    pub fn read_entries(path: impl AsRef<Path>) -> Result<Vec<LogEntry>, EngineError> {
        let reader = BufReader::new(File::open(path)?);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(&line)?);
        }
        Ok(entries)
    }
}

/// Cumulative counters. `total == successes + errors` always holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub total: u64,
    pub successes: u64,
    pub errors: u64,
    pub per_capability_uses: BTreeMap<String, u64>,
}

impl Stats {
    pub fn record_outcome(&mut self, success: bool) {
        self.total += 1;
        if success {
            self.successes += 1;
        } else {
            self.errors += 1;
        }
    }

    pub fn record_use(&mut self, capability: &str) {
        *self
            .per_capability_uses
            .entry(capability.to_string())
            .or_insert(0) += 1;
    }

    /// `errors / max(total, 1)`
    pub fn error_rate(&self) -> f64 {
        self.errors as f64 / self.total.max(1) as f64
    }
}

/// Strategy family chosen at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    OpenAI,
    Simulated,
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelType::OpenAI => write!(f, "openai"),
            ModelType::Simulated => write!(f, "simulated"),
        }
    }
}

/// Summary returned by `get_stats`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsReport {
    pub total_interactions: u64,
    pub successful_interactions: u64,
    pub error_rate: f64,
    pub tools_available: usize,
    pub retrieval_available: bool,
    pub model_type: ModelType,
}

/// Event sink plus counters, owned by one orchestrator
#[derive(Debug, Default)]
pub struct InteractionRecorder {
    log: Option<EventLog>,
    stats: Stats,
}

impl InteractionRecorder {
    pub fn new(log: Option<EventLog>) -> Self {
        Self {
            log,
            stats: Stats::default(),
        }
    }

    /// Recorder without a log file
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.log.as_ref().map(EventLog::path)
    }

    /// Append to the trace and the log. Log failures are reported and dropped.
    pub fn record(&self, trace: &mut Vec<Event>, event: Event) {
        if let Some(log) = &self.log {
            if let Err(e) = log.append(&event) {
                warn!("Failed to append to event log {:?}: {}", log.path(), e);
            }
        }
        trace.push(event);
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut Stats {
        &mut self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = Stats::default();
    }
}
