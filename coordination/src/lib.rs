//! Crux Coordination Library
//!
//! Engine for structured multi-agent debates that surface *cruxes*: the
//! disagreements which, if resolved, would change someone's mind.
//!
//! # Features
//!
//! ## Debate driver
//! - Three modes: parallel rounds, reactive free-form turns, and
//!   deliberative sequential turns
//! - Every state change is a [`DebateEvent`]; [`DebateState::apply`] folds
//!   the live stream and a persisted one identically
//! - Stops on convergence, divergence, an event cap, or silence
//!
//! ## Shared state
//! - Copy-on-write [`BlackboardState`]: claims, stances, disputes, cruxes,
//!   flip conditions
//! - Entropy-based [`ConvergenceTracker`]
//!
//! ## Argumentation
//! - Dung [`ArgumentationGraph`] with grounded labelling and preferred
//!   extensions
//! - [`CruxExtractor`] turning the graph into a [`DebateOutput`]
//!
//! ## Crux rooms
//! - [`DisagreementRegistry`] with hysteresis and cooldown
//! - Two-persona [`CruxRoom`] side conversations producing [`CruxCard`]s
//!
//! # Usage
//!
//! ```ignore
//! let orchestrator = DebateOrchestrator::new(config, personas, collaborators)?;
//! let (sink, receiver) = EventSink::channel(CHANNEL_CAPACITY);
//! let state = orchestrator.run("Should cities cap rents?", sink).await?;
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod argumentation;
pub mod blackboard;
pub mod collaborators;
pub mod convergence;
pub mod crux;
pub mod crux_room;
pub mod debate;
pub mod decode;
pub mod disagreement;
pub mod error;
pub mod events;
pub mod persona;
pub mod resilience;
pub mod scheduler;
pub mod transcript;

// Re-export key argumentation types
pub use argumentation::{
    Argument, ArgumentationGraph, Attack, AttackTarget, AttackType, DungFramework, Label,
    Labelling, TargetComponent, ValidationResult,
};

// Re-export key blackboard types
pub use blackboard::{
    AgentStance, BlackboardState, Claim, Crux, Dispute, FlipCondition, Stance, StanceUpdate,
    TurnResult,
};

// Re-export collaborator contracts
pub use collaborators::{
    AgentTurnGenerator, AgentTurnResponse, ActionPlanner, ArgumentGenerator, AttackValidator,
    ClaimDecomposer, CollaboratorResult, Collaborators, CruxCardExtractor, DisagreementDetector,
    FinalExtractor, Summarizer,
};

// Re-export convergence types
pub use convergence::{ConvergenceConfig, ConvergenceState, ConvergenceTracker};

// Re-export crux extraction types
pub use crux::{CruxExtractor, DebateOutput};

// Re-export crux room types
pub use crux_room::{CruxCard, CruxRoom, CruxRoomConfig, CruxRoomPhase};

// Re-export debate driver types
pub use debate::{DebateConfig, DebateMode, DebateOrchestrator, DebateState, GraphConfig};

// Re-export disagreement registry types
pub use disagreement::{DisagreementDetection, DisagreementRegistry, PairKey, RegistryConfig};

// Re-export error types
pub use error::{CollaboratorError, ConfigError, DebateError, ReplayError, RetryCategory};

// Re-export event types
pub use events::{CompletionReason, DebateEvent, EventEnvelope, EventSink, CHANNEL_CAPACITY};

// Re-export persona types
pub use persona::PersonaProfile;

// Re-export resilience types
pub use resilience::{DegradationLevel, DegradedResponse, RetryPolicy};

// Re-export scheduler types
pub use scheduler::{DeliberativeScheduler, ReactiveScheduler};

// Re-export transcript types
pub use transcript::TranscriptMessage;
