//! Debate driver: configuration, the event-folded state, and the orchestrator.
//!
//! # Modes
//!
//! ```text
//! Rounds      all personas in parallel per round ─► checkpoint ─► converge?
//! FreeForm    reactive scoring picks one speaker per turn
//! Sequential  every persona plans, the most urgent speaks; silence ends it
//! ```

pub mod config;
pub mod orchestrator;
pub mod state;

pub use config::{DebateConfig, DebateMode, GraphConfig};
pub use orchestrator::DebateOrchestrator;
pub use state::{Completion, CruxRoomRecord, DebateState, SkippedTurn};
