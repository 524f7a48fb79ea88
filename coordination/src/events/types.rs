//! Debate event types.
//!
//! Every event is self-contained: folding the ordered stream through
//! [`DebateState::apply`](crate::debate::DebateState::apply) rebuilds the
//! final state without any other input.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::argumentation::{Argument, ArgumentId, Attack, Labelling, ValidationResult};
use crate::blackboard::{Claim, TurnResult};
use crate::convergence::ConvergenceState;
use crate::crux::DebateOutput;
use crate::crux_room::CruxCard;
use crate::debate::DebateMode;
use crate::disagreement::DisagreementDetection;
use crate::persona::PersonaProfile;
use crate::transcript::TranscriptMessage;

/// Why the debate loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    Converged,
    Diverged,
    /// Convergence observation cap reached.
    EventCap,
    MaxRounds,
    /// Nobody asked for the floor for too long.
    SilenceBreak,
}

impl std::fmt::Display for CompletionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Converged => write!(f, "converged"),
            Self::Diverged => write!(f, "diverged"),
            Self::EventCap => write!(f, "event_cap"),
            Self::MaxRounds => write!(f, "max_rounds"),
            Self::SilenceBreak => write!(f, "silence_break"),
        }
    }
}

/// All debate events, in emission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DebateEvent {
    /// Human-readable progress note.
    Status { message: String },

    DebateStarted {
        debate_id: String,
        topic: String,
        mode: DebateMode,
        graph_enabled: bool,
        personas: Vec<PersonaProfile>,
        claims: Vec<Claim>,
    },

    /// A scheduler picked the next speaker.
    SpeakerSelected {
        round: u32,
        persona_id: String,
        reason: String,
        #[serde(default)]
        score: Option<f64>,
    },

    /// One agent turn, folded into the blackboard.
    AgentTurn { turn: TurnResult },

    /// An agent call failed; the agent sits out this round or turn.
    AgentSkipped {
        round: u32,
        persona_id: String,
        error: String,
    },

    ArgumentsAdded { round: u32, arguments: Vec<Argument> },

    AttacksAdded {
        round: u32,
        attacks: Vec<Attack>,
        validations: Vec<ValidationResult>,
        /// Validation failed and every attack was assumed valid.
        #[serde(default)]
        degraded: bool,
    },

    /// Semantics recomputed after the graph changed.
    GraphUpdated {
        round: u32,
        labelling: Labelling,
        grounded: Vec<ArgumentId>,
        preferred_count: usize,
    },

    /// Checkpoint after a batch of turns was folded.
    BlackboardUpdated {
        version: u64,
        disputes: usize,
        open_cruxes: usize,
    },

    ConvergenceUpdated { state: ConvergenceState },

    DisagreementDetected {
        detection: DisagreementDetection,
        consecutive_windows: u32,
        eligible: bool,
    },

    CruxRoomOpened {
        room_id: String,
        personas: [String; 2],
        topic: String,
    },

    CruxRoomMessage {
        room_id: String,
        message: TranscriptMessage,
    },

    CruxCardProduced { room_id: String, card: CruxCard },

    DebateComplete {
        rounds: u32,
        reason: CompletionReason,
        output: DebateOutput,
    },

    /// Terminal failure; no other terminal event follows.
    Error { message: String },
}

impl DebateEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Status { .. } => "status",
            Self::DebateStarted { .. } => "debate_started",
            Self::SpeakerSelected { .. } => "speaker_selected",
            Self::AgentTurn { .. } => "agent_turn",
            Self::AgentSkipped { .. } => "agent_skipped",
            Self::ArgumentsAdded { .. } => "arguments_added",
            Self::AttacksAdded { .. } => "attacks_added",
            Self::GraphUpdated { .. } => "graph_updated",
            Self::BlackboardUpdated { .. } => "blackboard_updated",
            Self::ConvergenceUpdated { .. } => "convergence_updated",
            Self::DisagreementDetected { .. } => "disagreement_detected",
            Self::CruxRoomOpened { .. } => "crux_room_opened",
            Self::CruxRoomMessage { .. } => "crux_room_message",
            Self::CruxCardProduced { .. } => "crux_card_produced",
            Self::DebateComplete { .. } => "debate_complete",
            Self::Error { .. } => "error",
        }
    }

    /// Whether the stream ends with this event.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::DebateComplete { .. } | Self::Error { .. })
    }

    pub fn status(message: impl Into<String>) -> Self {
        Self::Status {
            message: message.into(),
        }
    }
}

/// An event with its position in the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: DebateEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let envelope = EventEnvelope {
            sequence: 4,
            timestamp: Utc::now(),
            event: DebateEvent::status("round 1"),
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["type"], "status");
        assert_eq!(json["sequence"], 4);
        assert_eq!(json["message"], "round 1");

        let back: EventEnvelope = serde_json::from_value(json).unwrap();
        assert_eq!(back, envelope);
    }

    #[test]
    fn test_terminal_events() {
        assert!(DebateEvent::Error {
            message: "x".into()
        }
        .is_terminal());
        assert!(!DebateEvent::status("x").is_terminal());
        let done = DebateEvent::DebateComplete {
            rounds: 2,
            reason: CompletionReason::Converged,
            output: DebateOutput::default(),
        };
        assert!(done.is_terminal());
        assert_eq!(done.event_type(), "debate_complete");
    }

    #[test]
    fn test_completion_reason_display() {
        assert_eq!(CompletionReason::EventCap.to_string(), "event_cap");
        assert_eq!(
            serde_json::to_string(&CompletionReason::SilenceBreak).unwrap(),
            "\"silence_break\""
        );
    }
}
