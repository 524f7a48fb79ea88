//! Contracts for the external services the engine consumes.
//!
//! Every collaborator is an injected trait object, so tests substitute
//! deterministic stubs. Implementations decode and validate their raw
//! output at this boundary (see [`crate::decode`]) and report
//! [`CollaboratorError::Malformed`] on schema mismatch.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::argumentation::{
    Argument, ArgumentationGraph, Attack, AttackTarget, AttackType, ValidationResult,
};
use crate::blackboard::{BlackboardState, Claim, StanceUpdate, TurnResult};
use crate::crux::DebateOutput;
use crate::crux_room::CruxCard;
use crate::disagreement::DisagreementDetection;
use crate::error::CollaboratorError;
use crate::persona::PersonaProfile;
use crate::scheduler::ActionPlan;
use crate::transcript::TranscriptMessage;

pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

/// A claim proposed by the decomposition service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimDraft {
    pub id: String,
    pub text: String,
}

/// Topic → ordered sub-claims.
#[async_trait]
pub trait ClaimDecomposer: Send + Sync {
    async fn decompose(&self, topic: &str) -> CollaboratorResult<Vec<ClaimDraft>>;
}

/// Why a persona is being asked to speak.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnContext {
    /// Parallel round: every persona answers the same snapshot.
    Round,
    /// Picked by a scheduler, with its reason/intent.
    Scheduled { reason: String },
    /// Turn inside a crux room.
    CruxRoom { topic: String, opponent_id: String },
}

/// Everything an agent turn needs. Built from a frozen snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRequest {
    pub persona: PersonaProfile,
    pub round: u32,
    pub topic: String,
    pub claims: Vec<Claim>,
    pub blackboard_summary: String,
    pub recent_transcript: Vec<TranscriptMessage>,
    pub context: TurnContext,
}

/// Decoded output of one agent turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentTurnResponse {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub stances: Vec<StanceUpdate>,
    #[serde(default)]
    pub new_cruxes: Vec<String>,
    #[serde(default)]
    pub flip_triggers: Vec<String>,
    #[serde(default)]
    pub resolved_cruxes: Vec<String>,
}

impl AgentTurnResponse {
    pub fn into_turn(self, persona_id: &str, round: u32) -> TurnResult {
        TurnResult {
            persona_id: persona_id.to_string(),
            round,
            response: self.response,
            stances: self.stances,
            new_cruxes: self.new_cruxes,
            flip_triggers: self.flip_triggers,
            resolved_cruxes: self.resolved_cruxes,
        }
    }
}

/// Persona + prompt → utterance and structured stance data.
#[async_trait]
pub trait AgentTurnGenerator: Send + Sync {
    async fn take_turn(&self, request: &TurnRequest) -> CollaboratorResult<AgentTurnResponse>;
}

/// Bounded message window → pairwise disagreement, if any.
#[async_trait]
pub trait DisagreementDetector: Send + Sync {
    async fn detect(
        &self,
        window: &[TranscriptMessage],
    ) -> CollaboratorResult<Option<DisagreementDetection>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRequest {
    pub persona: PersonaProfile,
    pub turn: u32,
    pub blackboard_summary: String,
    pub recent_transcript: Vec<TranscriptMessage>,
}

/// Each persona proposes speak / interrupt / listen for the next turn.
#[async_trait]
pub trait ActionPlanner: Send + Sync {
    async fn propose(&self, request: &PlanRequest) -> CollaboratorResult<ActionPlan>;
}

/// An argument as proposed by a persona, before ids are assigned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArgumentDraft {
    pub claim: String,
    #[serde(default)]
    pub premises: Vec<String>,
    #[serde(default)]
    pub assumptions: Vec<String>,
    #[serde(default)]
    pub evidence: Vec<String>,
}

impl ArgumentDraft {
    pub fn into_argument(self, id: String, speaker_id: &str, round: u32) -> Argument {
        Argument {
            id,
            speaker_id: speaker_id.to_string(),
            claim: self.claim,
            premises: self.premises,
            assumptions: self.assumptions,
            evidence: self.evidence,
            round,
        }
    }
}

/// An attack proposal together with its counter-argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackDraft {
    pub target_arg_id: String,
    #[serde(rename = "type")]
    pub attack_type: AttackType,
    pub target: AttackTarget,
    pub counter_proposition: String,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub evidence: Vec<String>,
    pub confidence: f64,
    pub counter_argument: ArgumentDraft,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgumentRequest {
    pub persona: PersonaProfile,
    pub round: u32,
    pub topic: String,
    pub claims: Vec<Claim>,
    /// Arguments by other personas that may be attacked.
    pub opposing_arguments: Vec<Argument>,
}

/// Graph mode: arguments in the opening round, attacks afterwards.
#[async_trait]
pub trait ArgumentGenerator: Send + Sync {
    async fn generate_arguments(
        &self,
        request: &ArgumentRequest,
    ) -> CollaboratorResult<Vec<ArgumentDraft>>;

    async fn generate_attacks(&self, request: &ArgumentRequest)
        -> CollaboratorResult<Vec<AttackDraft>>;
}

/// Judges all pending attacks of a round in one call.
#[async_trait]
pub trait AttackValidator: Send + Sync {
    async fn validate(
        &self,
        attacks: &[Attack],
        graph: &ArgumentationGraph,
    ) -> CollaboratorResult<Vec<ValidationResult>>;
}

/// Full blackboard snapshot → structured debate output.
#[async_trait]
pub trait FinalExtractor: Send + Sync {
    async fn extract(&self, snapshot: &BlackboardState) -> CollaboratorResult<DebateOutput>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRequest {
    pub text: String,
    pub min_tokens: usize,
    pub max_tokens: usize,
}

/// Compresses a rendering to fit a token window.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, request: &SummaryRequest) -> CollaboratorResult<String>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CruxCardRequest {
    pub topic: String,
    pub personas: [String; 2],
    pub transcript: Vec<TranscriptMessage>,
}

/// Crux-room transcript → crux card.
#[async_trait]
pub trait CruxCardExtractor: Send + Sync {
    async fn extract_card(&self, request: &CruxCardRequest) -> CollaboratorResult<CruxCard>;
}

/// The set of services handed to the orchestrator.
#[derive(Clone)]
pub struct Collaborators {
    pub claims: Arc<dyn ClaimDecomposer>,
    pub agent: Arc<dyn AgentTurnGenerator>,
    pub detector: Option<Arc<dyn DisagreementDetector>>,
    pub planner: Option<Arc<dyn ActionPlanner>>,
    pub arguments: Option<Arc<dyn ArgumentGenerator>>,
    pub validator: Option<Arc<dyn AttackValidator>>,
    pub extractor: Option<Arc<dyn FinalExtractor>>,
    pub summarizer: Option<Arc<dyn Summarizer>>,
    pub crux_cards: Option<Arc<dyn CruxCardExtractor>>,
}

impl Collaborators {
    pub fn new(claims: Arc<dyn ClaimDecomposer>, agent: Arc<dyn AgentTurnGenerator>) -> Self {
        Self {
            claims,
            agent,
            detector: None,
            planner: None,
            arguments: None,
            validator: None,
            extractor: None,
            summarizer: None,
            crux_cards: None,
        }
    }

    pub fn with_detector(mut self, detector: Arc<dyn DisagreementDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn with_planner(mut self, planner: Arc<dyn ActionPlanner>) -> Self {
        self.planner = Some(planner);
        self
    }

    pub fn with_arguments(mut self, arguments: Arc<dyn ArgumentGenerator>) -> Self {
        self.arguments = Some(arguments);
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn AttackValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn FinalExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    pub fn with_crux_cards(mut self, crux_cards: Arc<dyn CruxCardExtractor>) -> Self {
        self.crux_cards = Some(crux_cards);
        self
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("detector", &self.detector.is_some())
            .field("planner", &self.planner.is_some())
            .field("arguments", &self.arguments.is_some())
            .field("validator", &self.validator.is_some())
            .field("extractor", &self.extractor.is_some())
            .field("summarizer", &self.summarizer.is_some())
            .field("crux_cards", &self.crux_cards.is_some())
            .finish()
    }
}
