//! Crux rooms: bounded two-persona sub-dialogues that end in a crux card.
//!
//! A room is opened when the disagreement registry marks a pair eligible.
//! The two personas alternate for at most `max_turns`, then the transcript
//! goes to the card-extraction collaborator. When extraction fails, a
//! degraded card is built from the transcript itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::collaborators::{CruxCardExtractor, CruxCardRequest};
use crate::crux::settling_question;
use crate::disagreement::{DisagreementDetection, PairKey};
use crate::resilience::{retry_with_backoff, RetryPolicy};
use crate::transcript::TranscriptMessage;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CruxRoomConfig {
    pub max_turns: u32,
    /// Rooms allowed per debate.
    pub max_rooms: u32,
}

impl Default for CruxRoomConfig {
    fn default() -> Self {
        Self {
            max_turns: 6,
            max_rooms: 3,
        }
    }
}

/// Lifecycle of a crux room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CruxRoomPhase {
    Opened,
    /// Personas are taking turns.
    Exchanging,
    /// Waiting on card extraction.
    Extracting,
    Closed,
    /// Ended without a card (no usable exchange).
    Aborted,
}

impl CruxRoomPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Aborted)
    }

    pub fn valid_transitions(self) -> &'static [CruxRoomPhase] {
        match self {
            Self::Opened => &[Self::Exchanging, Self::Aborted],
            Self::Exchanging => &[Self::Extracting, Self::Aborted],
            Self::Extracting => &[Self::Closed, Self::Aborted],
            Self::Closed | Self::Aborted => &[],
        }
    }
}

impl std::fmt::Display for CruxRoomPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Opened => write!(f, "opened"),
            Self::Exchanging => write!(f, "exchanging"),
            Self::Extracting => write!(f, "extracting"),
            Self::Closed => write!(f, "closed"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid crux room transition {from} → {to}")]
pub struct PhaseError {
    pub from: CruxRoomPhase,
    pub to: CruxRoomPhase,
}

/// What kind of disagreement the card describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisagreementKind {
    /// Settled by data.
    Empirical,
    /// Different priorities or values.
    Values,
    /// The personas mean different things by a term.
    Definitional,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardPosition {
    pub persona_id: String,
    pub position: String,
}

/// Structured result of a crux room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CruxCard {
    pub topic: String,
    pub personas: [String; 2],
    pub crux: String,
    #[serde(default)]
    pub positions: Vec<CardPosition>,
    pub disagreement_kind: DisagreementKind,
    #[serde(default)]
    pub resolvable: bool,
    #[serde(default)]
    pub settling_question: Option<String>,
    /// Built locally because extraction failed.
    #[serde(default)]
    pub degraded: bool,
}

/// A running crux room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CruxRoom {
    pub id: String,
    pub pair: PairKey,
    pub topic: String,
    /// The two personas, in speaking order.
    pub personas: [String; 2],
    pub phase: CruxRoomPhase,
    pub transcript: Vec<TranscriptMessage>,
    pub turns_taken: u32,
    pub max_turns: u32,
    pub opened_at: DateTime<Utc>,
}

impl CruxRoom {
    pub fn open(id: &str, detection: &DisagreementDetection, max_turns: u32) -> Self {
        info!(room = id, pair = %detection.pair(), topic = %detection.topic, "crux room opened");
        Self {
            id: id.to_string(),
            pair: detection.pair(),
            topic: detection.topic.clone(),
            personas: detection.personas.clone(),
            phase: CruxRoomPhase::Opened,
            transcript: Vec::new(),
            turns_taken: 0,
            max_turns,
            opened_at: Utc::now(),
        }
    }

    pub fn transition(&mut self, to: CruxRoomPhase) -> Result<(), PhaseError> {
        if !self.phase.valid_transitions().contains(&to) {
            return Err(PhaseError {
                from: self.phase,
                to,
            });
        }
        self.phase = to;
        Ok(())
    }

    /// Persona due to speak next and the one they answer, or `None` once
    /// the turn budget is spent.
    pub fn next_turn(&self) -> Option<(&str, &str)> {
        if self.turns_taken >= self.max_turns || self.phase.is_terminal() {
            return None;
        }
        let i = (self.turns_taken % 2) as usize;
        Some((&self.personas[i], &self.personas[1 - i]))
    }

    /// Count a turn, keeping its message if the persona produced one.
    pub fn record_turn(&mut self, message: Option<TranscriptMessage>) {
        self.turns_taken += 1;
        if let Some(message) = message {
            self.transcript.push(message);
        }
    }

    /// Both personas spoke at least once.
    pub fn has_exchange(&self) -> bool {
        self.personas
            .iter()
            .all(|p| self.transcript.iter().any(|m| &m.persona_id == p))
    }

    pub fn card_request(&self) -> CruxCardRequest {
        CruxCardRequest {
            topic: self.topic.clone(),
            personas: self.personas.clone(),
            transcript: self.transcript.clone(),
        }
    }

    /// Card built from the transcript alone.
    pub fn degraded_card(&self) -> CruxCard {
        let positions = self
            .personas
            .iter()
            .filter_map(|p| {
                self.transcript
                    .iter()
                    .rev()
                    .find(|m| &m.persona_id == p)
                    .map(|m| CardPosition {
                        persona_id: p.clone(),
                        position: m.text.clone(),
                    })
            })
            .collect();
        CruxCard {
            topic: self.topic.clone(),
            personas: self.personas.clone(),
            crux: self.topic.clone(),
            positions,
            disagreement_kind: DisagreementKind::Unknown,
            resolvable: false,
            settling_question: Some(settling_question(&self.topic)),
            degraded: true,
        }
    }

    /// Extract the card and close the room. Rooms without a real exchange
    /// are aborted and yield nothing.
    pub async fn conclude(
        &mut self,
        extractor: Option<&dyn CruxCardExtractor>,
        retry: &RetryPolicy,
    ) -> Option<CruxCard> {
        if !self.has_exchange() {
            warn!(room = %self.id, "crux room ended without an exchange");
            self.phase = CruxRoomPhase::Aborted;
            return None;
        }
        if self.phase == CruxRoomPhase::Opened {
            self.phase = CruxRoomPhase::Exchanging;
        }
        if self.transition(CruxRoomPhase::Extracting).is_err() {
            self.phase = CruxRoomPhase::Aborted;
            return None;
        }

        let card = match extractor {
            Some(extractor) => {
                let request = self.card_request();
                let extracted = retry_with_backoff(retry, "crux_card_extractor", || {
                    extractor.extract_card(&request)
                })
                .await;
                match extracted {
                    Ok(mut card) => {
                        // The room, not the collaborator, owns identity fields.
                        card.personas = self.personas.clone();
                        card.topic = self.topic.clone();
                        card
                    }
                    Err(e) => {
                        warn!(
                            room = %self.id,
                            error = %e,
                            "crux card extraction failed, using degraded card"
                        );
                        self.degraded_card()
                    }
                }
            }
            None => self.degraded_card(),
        };

        self.phase = CruxRoomPhase::Closed;
        info!(room = %self.id, degraded = card.degraded, "crux room closed");
        Some(card)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::CollaboratorResult;
    use crate::error::CollaboratorError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn detection() -> DisagreementDetection {
        DisagreementDetection {
            personas: ["bob".into(), "alice".into()],
            topic: "That supply responds to price.".into(),
            confidence: 0.9,
        }
    }

    fn exchanged_room() -> CruxRoom {
        let mut room = CruxRoom::open("room-1", &detection(), 4);
        room.transition(CruxRoomPhase::Exchanging).unwrap();
        room.record_turn(Some(TranscriptMessage::new("bob", "It does, quickly.", 1)));
        room.record_turn(Some(TranscriptMessage::new("alice", "Only over decades.", 1)));
        room
    }

    struct CardStub {
        fail: bool,
        transient_failures: u32,
        calls: AtomicU32,
    }

    impl CardStub {
        fn new(fail: bool, transient_failures: u32) -> Self {
            Self {
                fail,
                transient_failures,
                calls: AtomicU32::new(0),
            }
        }
    }

    fn instant_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            backoff_step_ms: 0,
        }
    }

    #[async_trait]
    impl CruxCardExtractor for CardStub {
        async fn extract_card(&self, request: &CruxCardRequest) -> CollaboratorResult<CruxCard> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.transient_failures {
                return Err(CollaboratorError::transient("crux_card", "503"));
            }
            if self.fail {
                return Err(CollaboratorError::malformed("crux_card", "not json"));
            }
            Ok(CruxCard {
                topic: "ignored".into(),
                personas: ["x".into(), "y".into()],
                crux: format!("elasticity ({} messages)", request.transcript.len()),
                positions: Vec::new(),
                disagreement_kind: DisagreementKind::Empirical,
                resolvable: true,
                settling_question: None,
                degraded: false,
            })
        }
    }

    #[test]
    fn test_phase_transitions() {
        assert!(CruxRoomPhase::Opened
            .valid_transitions()
            .contains(&CruxRoomPhase::Exchanging));
        assert!(CruxRoomPhase::Closed.valid_transitions().is_empty());
        assert!(CruxRoomPhase::Aborted.is_terminal());

        let mut room = CruxRoom::open("r", &detection(), 2);
        let err = room.transition(CruxRoomPhase::Closed).unwrap_err();
        assert_eq!(err.from, CruxRoomPhase::Opened);
        assert_eq!(room.phase, CruxRoomPhase::Opened);
    }

    #[test]
    fn test_turns_alternate_and_stop() {
        let mut room = CruxRoom::open("r", &detection(), 3);
        assert_eq!(room.next_turn(), Some(("bob", "alice")));
        room.record_turn(None);
        assert_eq!(room.next_turn(), Some(("alice", "bob")));
        room.record_turn(None);
        assert_eq!(room.next_turn(), Some(("bob", "alice")));
        room.record_turn(None);
        assert_eq!(room.next_turn(), None);
        assert!(room.transcript.is_empty());
    }

    #[test]
    fn test_pair_is_unordered() {
        let room = CruxRoom::open("r", &detection(), 2);
        assert_eq!(room.pair, PairKey::new("alice", "bob"));
    }

    #[tokio::test]
    async fn test_conclude_with_extractor() {
        let mut room = exchanged_room();
        let card = room
            .conclude(Some(&CardStub::new(false, 0)), &instant_retry())
            .await
            .unwrap();
        assert_eq!(room.phase, CruxRoomPhase::Closed);
        assert_eq!(card.crux, "elasticity (2 messages)");
        assert_eq!(card.personas, ["bob".to_string(), "alice".to_string()]);
        assert_eq!(card.topic, "That supply responds to price.");
        assert!(!card.degraded);
    }

    #[tokio::test]
    async fn test_conclude_retries_transient_extraction_error() {
        let mut room = exchanged_room();
        let stub = CardStub::new(false, 1);
        let card = room.conclude(Some(&stub), &instant_retry()).await.unwrap();
        assert_eq!(stub.calls.load(Ordering::SeqCst), 2);
        assert!(!card.degraded);
        assert_eq!(card.crux, "elasticity (2 messages)");
    }

    #[tokio::test]
    async fn test_conclude_degrades_on_failure() {
        let mut room = exchanged_room();
        let stub = CardStub::new(true, 0);
        let card = room.conclude(Some(&stub), &instant_retry()).await.unwrap();
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
        assert!(card.degraded);
        assert_eq!(card.disagreement_kind, DisagreementKind::Unknown);
        assert_eq!(card.positions.len(), 2);
        assert_eq!(card.positions[1].position, "Only over decades.");
        assert_eq!(
            card.settling_question.as_deref(),
            Some("What evidence would confirm or refute that supply responds to price?")
        );
        assert_eq!(room.phase, CruxRoomPhase::Closed);
    }

    #[tokio::test]
    async fn test_conclude_without_exchange_aborts() {
        let mut room = CruxRoom::open("r", &detection(), 2);
        room.record_turn(Some(TranscriptMessage::new("bob", "hm", 1)));
        room.record_turn(None);
        assert!(room.conclude(None, &instant_retry()).await.is_none());
        assert_eq!(room.phase, CruxRoomPhase::Aborted);
    }
}
