//! Agent Loop Core
//!
//! This module implements the query-resolution loop. The orchestrator keeps a
//! per-query context, asks a reasoner what to do next, dispatches capabilities
//! and records every step for audit and statistics.

pub mod context;
pub mod core;
pub mod reasoner;
pub mod recorder;

pub use context::{Observation, ObservationKind, QueryContext};
pub use core::{AgentParts, EngineStatus, Orchestrator, QueryResponse, QueryStatus, TerminalState};
pub use reasoner::{Decision, LiveReasoner, Reasoner, RuleBasedReasoner};
pub use recorder::{Event, EventLog, InteractionRecorder, LogEntry, ModelType, Stats, StatsReport};
