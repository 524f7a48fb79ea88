//! Debate state folded from the event stream.
//!
//! [`DebateState::apply`] is the only way the state changes. The live
//! orchestrator folds every event it emits, and [`DebateState::replay`]
//! folds a persisted stream, so both arrive at the same value.

use serde::{Deserialize, Serialize};

use crate::argumentation::{ArgumentationGraph, Labelling};
use crate::blackboard::{BlackboardState, Claim};
use crate::convergence::ConvergenceState;
use crate::crux::DebateOutput;
use crate::crux_room::CruxCard;
use crate::debate::DebateMode;
use crate::disagreement::DisagreementDetection;
use crate::error::ReplayError;
use crate::events::{CompletionReason, DebateEvent, EventEnvelope};
use crate::persona::PersonaProfile;
use crate::transcript::TranscriptMessage;

/// An agent call that failed and was sat out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedTurn {
    pub round: u32,
    pub persona_id: String,
    pub error: String,
}

/// A crux room as seen through the event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CruxRoomRecord {
    pub room_id: String,
    pub personas: [String; 2],
    pub topic: String,
    pub transcript: Vec<TranscriptMessage>,
    pub card: Option<CruxCard>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub rounds: u32,
    pub reason: CompletionReason,
    pub output: DebateOutput,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DebateState {
    pub started: bool,
    pub debate_id: String,
    pub topic: String,
    pub mode: DebateMode,
    pub graph_enabled: bool,
    pub personas: Vec<PersonaProfile>,
    pub blackboard: BlackboardState,
    pub graph: ArgumentationGraph,
    pub labelling: Labelling,
    pub convergence: Vec<ConvergenceState>,
    pub transcript: Vec<TranscriptMessage>,
    pub skipped: Vec<SkippedTurn>,
    pub detections: Vec<DisagreementDetection>,
    pub crux_rooms: Vec<CruxRoomRecord>,
    pub completion: Option<Completion>,
    pub error: Option<String>,
    pub last_sequence: Option<u64>,
}

impl DebateState {
    /// Fold one event into the next state.
    pub fn apply(mut self, envelope: &EventEnvelope) -> Result<Self, ReplayError> {
        let sequence = envelope.sequence;
        if self.is_finished() {
            return Err(ReplayError::AfterTerminal(sequence));
        }

        match &envelope.event {
            DebateEvent::DebateStarted {
                debate_id,
                topic,
                mode,
                graph_enabled,
                personas,
                claims,
            } => {
                if self.started {
                    return Err(ReplayError::DuplicateStart(sequence));
                }
                self.started = true;
                self.debate_id = debate_id.clone();
                self.topic = topic.clone();
                self.mode = *mode;
                self.graph_enabled = *graph_enabled;
                self.personas = personas.clone();
                self.blackboard = BlackboardState::create(topic, claims.clone());
            }
            // Allowed before the debate starts: a setup failure is a lone error.
            DebateEvent::Status { .. } => {}
            DebateEvent::Error { message } => self.error = Some(message.clone()),
            event if !self.started => {
                return Err(ReplayError::NotStarted {
                    sequence,
                    kind: event.event_type().to_string(),
                })
            }
            DebateEvent::SpeakerSelected { .. } | DebateEvent::BlackboardUpdated { .. } => {}
            DebateEvent::AgentTurn { turn } => {
                self.blackboard = self.blackboard.update(turn);
                if !turn.response.is_empty() {
                    self.transcript.push(TranscriptMessage::new(
                        &turn.persona_id,
                        &turn.response,
                        turn.round,
                    ));
                }
            }
            DebateEvent::AgentSkipped {
                round,
                persona_id,
                error,
            } => self.skipped.push(SkippedTurn {
                round: *round,
                persona_id: persona_id.clone(),
                error: error.clone(),
            }),
            DebateEvent::ArgumentsAdded { arguments, .. } => {
                self.graph = self.graph.with_arguments(arguments);
            }
            DebateEvent::AttacksAdded {
                attacks,
                validations,
                ..
            } => {
                self.graph = self.graph.with_attacks(attacks, validations);
            }
            DebateEvent::GraphUpdated { labelling, .. } => self.labelling = labelling.clone(),
            DebateEvent::ConvergenceUpdated { state } => self.convergence.push(state.clone()),
            DebateEvent::DisagreementDetected { detection, .. } => {
                self.detections.push(detection.clone())
            }
            DebateEvent::CruxRoomOpened {
                room_id,
                personas,
                topic,
            } => self.crux_rooms.push(CruxRoomRecord {
                room_id: room_id.clone(),
                personas: personas.clone(),
                topic: topic.clone(),
                transcript: Vec::new(),
                card: None,
            }),
            DebateEvent::CruxRoomMessage { room_id, message } => {
                self.room_mut(room_id)?.transcript.push(message.clone());
            }
            DebateEvent::CruxCardProduced { room_id, card } => {
                self.room_mut(room_id)?.card = Some(card.clone());
            }
            DebateEvent::DebateComplete {
                rounds,
                reason,
                output,
            } => {
                self.completion = Some(Completion {
                    rounds: *rounds,
                    reason: *reason,
                    output: output.clone(),
                })
            }
        }

        self.last_sequence = Some(sequence);
        Ok(self)
    }

    /// Rebuild a state from a persisted stream.
    pub fn replay(events: &[EventEnvelope]) -> Result<Self, ReplayError> {
        if events.is_empty() {
            return Err(ReplayError::Empty);
        }
        let mut state = Self::default();
        for (expected, envelope) in (0u64..).zip(events) {
            if envelope.sequence != expected {
                return Err(ReplayError::SequenceGap {
                    expected,
                    actual: envelope.sequence,
                });
            }
            state = state.apply(envelope)?;
        }
        Ok(state)
    }

    fn room_mut(&mut self, room_id: &str) -> Result<&mut CruxRoomRecord, ReplayError> {
        self.crux_rooms
            .iter_mut()
            .find(|r| r.room_id == room_id)
            .ok_or_else(|| ReplayError::UnknownRoom(room_id.to_string()))
    }

    /// A terminal event has been applied.
    pub fn is_finished(&self) -> bool {
        self.completion.is_some() || self.error.is_some()
    }

    pub fn claims(&self) -> &[Claim] {
        &self.blackboard.claims
    }

    pub fn latest_convergence(&self) -> Option<&ConvergenceState> {
        self.convergence.last()
    }

    pub fn persona(&self, id: &str) -> Option<&PersonaProfile> {
        self.personas.iter().find(|p| p.id == id)
    }

    pub fn crux_cards(&self) -> Vec<CruxCard> {
        self.crux_rooms.iter().filter_map(|r| r.card.clone()).collect()
    }

    pub fn output(&self) -> Option<&DebateOutput> {
        self.completion.as_ref().map(|c| &c.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blackboard::{Stance, TurnResult};
    use chrono::Utc;

    fn envelope(sequence: u64, event: DebateEvent) -> EventEnvelope {
        EventEnvelope {
            sequence,
            timestamp: Utc::now(),
            event,
        }
    }

    fn started(sequence: u64) -> EventEnvelope {
        envelope(
            sequence,
            DebateEvent::DebateStarted {
                debate_id: "d1".into(),
                topic: "Rent control".into(),
                mode: DebateMode::Rounds,
                graph_enabled: false,
                personas: vec![PersonaProfile::new("a", "A"), PersonaProfile::new("b", "B")],
                claims: vec![Claim {
                    id: "c1".into(),
                    text: "Rents fall".into(),
                    debate_id: "d1".into(),
                }],
            },
        )
    }

    #[test]
    fn test_replay_folds_turns() {
        let events = vec![
            started(0),
            envelope(
                1,
                DebateEvent::AgentTurn {
                    turn: TurnResult::new("a", 1)
                        .with_stance("c1", Stance::Pro, 0.9)
                        .with_response("They do."),
                },
            ),
            envelope(
                2,
                DebateEvent::AgentSkipped {
                    round: 1,
                    persona_id: "b".into(),
                    error: "timeout".into(),
                },
            ),
        ];
        let state = DebateState::replay(&events).unwrap();
        assert!(state.started);
        assert_eq!(state.blackboard.version, 1);
        assert_eq!(state.transcript.len(), 1);
        assert_eq!(state.skipped.len(), 1);
        assert_eq!(state.last_sequence, Some(2));
        assert!(!state.is_finished());
    }

    #[test]
    fn test_event_before_start_rejected() {
        let events = vec![envelope(
            0,
            DebateEvent::AgentTurn {
                turn: TurnResult::new("a", 1),
            },
        )];
        assert_eq!(
            DebateState::replay(&events).unwrap_err(),
            ReplayError::NotStarted {
                sequence: 0,
                kind: "agent_turn".into()
            }
        );
    }

    #[test]
    fn test_lone_error_is_a_valid_stream() {
        let events = vec![envelope(
            0,
            DebateEvent::Error {
                message: "claim decomposition failed".into(),
            },
        )];
        let state = DebateState::replay(&events).unwrap();
        assert!(!state.started);
        assert!(state.is_finished());
    }

    #[test]
    fn test_sequence_gap_and_duplicate_start() {
        assert_eq!(
            DebateState::replay(&[started(0), envelope(2, DebateEvent::status("x"))]).unwrap_err(),
            ReplayError::SequenceGap {
                expected: 1,
                actual: 2
            }
        );
        assert_eq!(
            DebateState::replay(&[started(0), started(1)]).unwrap_err(),
            ReplayError::DuplicateStart(1)
        );
        assert_eq!(DebateState::replay(&[]).unwrap_err(), ReplayError::Empty);
    }

    #[test]
    fn test_nothing_after_terminal() {
        let events = vec![
            started(0),
            envelope(
                1,
                DebateEvent::DebateComplete {
                    rounds: 1,
                    reason: CompletionReason::MaxRounds,
                    output: DebateOutput::default(),
                },
            ),
            envelope(2, DebateEvent::status("late")),
        ];
        assert_eq!(
            DebateState::replay(&events).unwrap_err(),
            ReplayError::AfterTerminal(2)
        );
    }

    #[test]
    fn test_room_message_needs_open_room() {
        let events = vec![
            started(0),
            envelope(
                1,
                DebateEvent::CruxRoomMessage {
                    room_id: "room-9".into(),
                    message: TranscriptMessage::new("a", "hi", 1),
                },
            ),
        ];
        assert_eq!(
            DebateState::replay(&events).unwrap_err(),
            ReplayError::UnknownRoom("room-9".into())
        );
    }
}
