//! Debate event stream.
//!
//! ```text
//! ┌──────────────┐  emit   ┌───────────────┐  recv   ┌──────────────┐
//! │ Orchestrator │────────▶│   EventSink   │────────▶│   Consumer   │
//! │  (producer)  │         │ (bounded mpsc)│         │ (log / UI)   │
//! └──────┬───────┘         └───────────────┘         └──────┬───────┘
//!        │ apply                                           │ replay
//!        ▼                                                 ▼
//!   DebateState  ◀──────────── same pure fold ─────────  DebateState
//! ```

pub mod sink;
pub mod types;

pub use sink::{collect, EventSink, SinkClosed, CHANNEL_CAPACITY};
pub use types::{CompletionReason, DebateEvent, EventEnvelope};
