//! Deterministic collaborator stubs shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;

use crux_coordination::argumentation::{ArgumentationGraph, Attack, ValidationResult};
use crux_coordination::blackboard::{Stance, StanceUpdate};
use crux_coordination::collaborators::{
    ActionPlanner, AgentTurnGenerator, AgentTurnResponse, ArgumentDraft, ArgumentGenerator,
    ArgumentRequest, AttackDraft, AttackValidator, ClaimDecomposer, ClaimDraft,
    CollaboratorResult, Collaborators, DisagreementDetector, PlanRequest, TurnRequest,
};
use crux_coordination::debate::{DebateConfig, DebateOrchestrator, DebateState};
use crux_coordination::disagreement::DisagreementDetection;
use crux_coordination::error::{CollaboratorError, DebateError};
use crux_coordination::events::{collect, EventEnvelope, EventSink, CHANNEL_CAPACITY};
use crux_coordination::persona::PersonaProfile;
use crux_coordination::resilience::RetryPolicy;
use crux_coordination::scheduler::ActionPlan;
use crux_coordination::transcript::TranscriptMessage;

pub struct StaticClaims(pub Vec<(&'static str, &'static str)>);

#[async_trait]
impl ClaimDecomposer for StaticClaims {
    async fn decompose(&self, _topic: &str) -> CollaboratorResult<Vec<ClaimDraft>> {
        Ok(self
            .0
            .iter()
            .map(|(id, text)| ClaimDraft {
                id: id.to_string(),
                text: text.to_string(),
            })
            .collect())
    }
}

pub struct FailingClaims;

#[async_trait]
impl ClaimDecomposer for FailingClaims {
    async fn decompose(&self, _topic: &str) -> CollaboratorResult<Vec<ClaimDraft>> {
        Err(CollaboratorError::unavailable("claim_decomposer", "401 unauthorized"))
    }
}

pub struct ScriptedAgent<F>(pub F);

impl<F> ScriptedAgent<F>
where
    F: Fn(&TurnRequest) -> CollaboratorResult<AgentTurnResponse> + Send + Sync,
{
    pub fn new(script: F) -> Arc<Self> {
        Arc::new(Self(script))
    }
}

#[async_trait]
impl<F> AgentTurnGenerator for ScriptedAgent<F>
where
    F: Fn(&TurnRequest) -> CollaboratorResult<AgentTurnResponse> + Send + Sync,
{
    async fn take_turn(&self, request: &TurnRequest) -> CollaboratorResult<AgentTurnResponse> {
        (self.0)(request)
    }
}

pub struct ScriptedDetector<F>(pub F);

impl<F> ScriptedDetector<F>
where
    F: Fn(&[TranscriptMessage]) -> Option<DisagreementDetection> + Send + Sync,
{
    pub fn new(script: F) -> Arc<Self> {
        Arc::new(Self(script))
    }
}

#[async_trait]
impl<F> DisagreementDetector for ScriptedDetector<F>
where
    F: Fn(&[TranscriptMessage]) -> Option<DisagreementDetection> + Send + Sync,
{
    async fn detect(
        &self,
        window: &[TranscriptMessage],
    ) -> CollaboratorResult<Option<DisagreementDetection>> {
        Ok((self.0)(window))
    }
}

pub struct ScriptedPlanner<F>(pub F);

impl<F> ScriptedPlanner<F>
where
    F: Fn(&PlanRequest) -> ActionPlan + Send + Sync,
{
    pub fn new(script: F) -> Arc<Self> {
        Arc::new(Self(script))
    }
}

#[async_trait]
impl<F> ActionPlanner for ScriptedPlanner<F>
where
    F: Fn(&PlanRequest) -> ActionPlan + Send + Sync,
{
    async fn propose(&self, request: &PlanRequest) -> CollaboratorResult<ActionPlan> {
        Ok((self.0)(request))
    }
}

pub struct ScriptedArguments<A, B> {
    pub arguments: A,
    pub attacks: B,
}

impl<A, B> ScriptedArguments<A, B>
where
    A: Fn(&ArgumentRequest) -> Vec<ArgumentDraft> + Send + Sync,
    B: Fn(&ArgumentRequest) -> Vec<AttackDraft> + Send + Sync,
{
    pub fn new(arguments: A, attacks: B) -> Arc<Self> {
        Arc::new(Self { arguments, attacks })
    }
}

#[async_trait]
impl<A, B> ArgumentGenerator for ScriptedArguments<A, B>
where
    A: Fn(&ArgumentRequest) -> Vec<ArgumentDraft> + Send + Sync,
    B: Fn(&ArgumentRequest) -> Vec<AttackDraft> + Send + Sync,
{
    async fn generate_arguments(
        &self,
        request: &ArgumentRequest,
    ) -> CollaboratorResult<Vec<ArgumentDraft>> {
        Ok((self.arguments)(request))
    }

    async fn generate_attacks(
        &self,
        request: &ArgumentRequest,
    ) -> CollaboratorResult<Vec<AttackDraft>> {
        Ok((self.attacks)(request))
    }
}

/// Judges every attack valid, or fails every call.
pub struct StubValidator {
    pub fail: bool,
}

#[async_trait]
impl AttackValidator for StubValidator {
    async fn validate(
        &self,
        attacks: &[Attack],
        _graph: &ArgumentationGraph,
    ) -> CollaboratorResult<Vec<ValidationResult>> {
        if self.fail {
            return Err(CollaboratorError::malformed("attack_validator", "not json"));
        }
        Ok(attacks
            .iter()
            .map(|a| ValidationResult {
                attack_id: a.id.clone(),
                valid: true,
                attack_strength: 0.8,
                corrections: None,
            })
            .collect())
    }
}

pub fn roster() -> Vec<PersonaProfile> {
    vec![
        PersonaProfile::new("econ", "Ada").with_keywords(&["prices", "supply"]),
        PersonaProfile::new("tenant", "Bea").with_keywords(&["rent", "eviction"]),
        PersonaProfile::new("planner", "Cy").with_keywords(&["zoning"]),
    ]
}

pub fn two_claims() -> Arc<StaticClaims> {
    Arc::new(StaticClaims(vec![
        ("c1", "Rent caps lower average rents"),
        ("c2", "Rent caps reduce housing supply"),
    ]))
}

/// No retries or sleeps, seeded scheduler.
pub fn fast_config() -> DebateConfig {
    DebateConfig {
        retry: RetryPolicy::none(),
        seed: Some(7),
        ..Default::default()
    }
}

pub fn stances(claims: &[&str], stance: Stance, confidence: f64) -> Vec<StanceUpdate> {
    claims
        .iter()
        .map(|c| StanceUpdate {
            claim_id: c.to_string(),
            stance,
            confidence,
        })
        .collect()
}

pub fn response(text: &str, stances: Vec<StanceUpdate>) -> AgentTurnResponse {
    AgentTurnResponse {
        response: text.to_string(),
        stances,
        ..Default::default()
    }
}

pub fn orchestrator(config: DebateConfig, collaborators: Collaborators) -> DebateOrchestrator {
    DebateOrchestrator::new(config, roster(), collaborators).unwrap()
}

/// Route driver logs to the test harness; `RUST_LOG=debug` shows decisions.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}

/// Run a debate while draining its events concurrently.
pub async fn run_debate(
    orchestrator: &DebateOrchestrator,
    topic: &str,
) -> (Result<DebateState, DebateError>, Vec<EventEnvelope>) {
    init_tracing();
    let (sink, receiver) = EventSink::channel(CHANNEL_CAPACITY);
    tokio::join!(orchestrator.run(topic, sink), collect(receiver))
}

pub fn event_types(events: &[EventEnvelope]) -> Vec<&'static str> {
    events.iter().map(|e| e.event.event_type()).collect()
}
