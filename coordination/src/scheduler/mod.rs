//! Turn scheduling policies: reactive (free-form) and deliberative (sequential).

pub mod deliberative;
pub mod reactive;

pub use deliberative::{
    ActionPlan, DeliberativeScheduler, PlannedAction, TurnDecision, SILENCE_LIMIT,
};
pub use reactive::{ReactiveScheduler, SpeakerCandidate, SpeakerReason};
