//! Shared blackboard: claims, stance log, disputes, cruxes, flip conditions.

pub mod board;
pub mod types;

pub use board::{estimate_tokens, BlackboardState, NEW_CRUX_WEIGHT};
pub use types::{
    AgentStance, Claim, Crux, Dispute, DisputeSide, FlipCondition, Stance, StanceUpdate,
    TurnResult,
};
