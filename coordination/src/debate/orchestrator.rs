//! Debate orchestrator: drives rounds or turns over the collaborators,
//! streams every state change as an event, and decides when to stop.
//!
//! ```text
//! decompose ─► DebateStarted
//!     │
//!     ▼  per round / turn
//! [graph round] ─► agent turns ─► BlackboardUpdated ─► detection ─► [crux room]
//!     │                                                               │
//!     └──────────────── ConvergenceUpdated ◀──────────────────────────┘
//!                            │ stop?
//!                            ▼
//!                      DebateComplete
//! ```
//!
//! The driver owns no state of its own beyond scheduler bookkeeping: every
//! change goes through [`DebateState::apply`] on the event it just emitted.

use std::collections::BTreeSet;

use futures::future::join_all;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::argumentation::{Argument, Attack, ValidationResult};
use crate::blackboard::Claim;
use crate::collaborators::{
    AgentTurnResponse, ArgumentRequest, ClaimDraft, CollaboratorResult, Collaborators,
    PlanRequest, TurnContext, TurnRequest,
};
use crate::convergence::ConvergenceTracker;
use crate::crux::{CruxExtractor, DebateOutput};
use crate::crux_room::{CruxRoom, CruxRoomPhase};
use crate::debate::config::{DebateConfig, DebateMode};
use crate::debate::state::DebateState;
use crate::disagreement::{DisagreementDetection, DisagreementRegistry, PairKey};
use crate::error::{CollaboratorError, ConfigError, DebateError};
use crate::events::{CompletionReason, DebateEvent, EventSink};
use crate::persona::{validate_roster, PersonaProfile};
use crate::resilience::{retry_with_backoff, DegradedResponse};
use crate::scheduler::{
    ActionPlan, DeliberativeScheduler, PlannedAction, ReactiveScheduler, TurnDecision,
};
use crate::transcript::{recent_window, TranscriptMessage};

/// Reason attached to the first free-form speaker, before anyone has spoken.
const OPENING_REASON: &str = "OPENING";

/// Runs debates for a fixed roster and set of collaborators.
#[derive(Debug)]
pub struct DebateOrchestrator {
    config: DebateConfig,
    personas: Vec<PersonaProfile>,
    collaborators: Collaborators,
}

impl DebateOrchestrator {
    pub fn new(
        config: DebateConfig,
        personas: Vec<PersonaProfile>,
        collaborators: Collaborators,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        validate_roster(&personas)?;
        if config.mode == DebateMode::Sequential && collaborators.planner.is_none() {
            return Err(ConfigError::invalid(
                "mode",
                "sequential debates need an action planner",
            ));
        }
        if config.graph.enabled && collaborators.arguments.is_none() {
            return Err(ConfigError::invalid(
                "graph.enabled",
                "graph rounds need an argument generator",
            ));
        }
        Ok(Self {
            config,
            personas,
            collaborators,
        })
    }

    pub fn config(&self) -> &DebateConfig {
        &self.config
    }

    pub fn personas(&self) -> &[PersonaProfile] {
        &self.personas
    }

    /// Run one debate on `topic`, streaming events into `sink`.
    ///
    /// Returns the folded state on completion. Dropping the receiving end
    /// of the sink cancels the run with [`DebateError::Cancelled`].
    pub async fn run(&self, topic: &str, sink: EventSink) -> Result<DebateState, DebateError> {
        DebateRun::new(self, sink).execute(topic).await
    }
}

/// Per-run mutable bookkeeping.
struct DebateRun<'a> {
    orchestrator: &'a DebateOrchestrator,
    sink: EventSink,
    state: DebateState,
    tracker: ConvergenceTracker,
    registry: DisagreementRegistry,
    reactive: ReactiveScheduler<StdRng>,
    deliberative: DeliberativeScheduler,
    active_rooms: BTreeSet<PairKey>,
    rooms_opened: u32,
}

impl<'a> DebateRun<'a> {
    fn new(orchestrator: &'a DebateOrchestrator, sink: EventSink) -> Self {
        let config = &orchestrator.config;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            orchestrator,
            sink,
            state: DebateState::default(),
            tracker: ConvergenceTracker::new(config.convergence.clone()),
            registry: DisagreementRegistry::new(config.registry.clone()),
            reactive: ReactiveScheduler::new(rng),
            deliberative: DeliberativeScheduler::default(),
            active_rooms: BTreeSet::new(),
            rooms_opened: 0,
        }
    }

    async fn execute(mut self, topic: &str) -> Result<DebateState, DebateError> {
        let orchestrator = self.orchestrator;
        let config = &orchestrator.config;
        let debate_id = Uuid::new_v4().to_string();

        self.ensure_live()?;
        let drafts = match self.decompose(topic).await {
            Ok(drafts) => drafts,
            Err(e) => {
                warn!(%debate_id, error = %e, "claim decomposition failed");
                self.emit(DebateEvent::Error {
                    message: format!("claim decomposition failed: {}", e),
                })
                .await?;
                return Err(DebateError::Setup(e));
            }
        };
        let claims: Vec<Claim> = drafts
            .into_iter()
            .map(|d| Claim {
                id: d.id,
                text: d.text,
                debate_id: debate_id.clone(),
            })
            .collect();

        info!(
            %debate_id,
            mode = %config.mode,
            personas = orchestrator.personas.len(),
            claims = claims.len(),
            graph = config.graph.enabled,
            "debate started"
        );
        self.emit(DebateEvent::DebateStarted {
            debate_id: debate_id.clone(),
            topic: topic.to_string(),
            mode: config.mode,
            graph_enabled: config.graph.enabled,
            personas: orchestrator.personas.clone(),
            claims,
        })
        .await?;

        let (rounds, reason) = match config.mode {
            DebateMode::Rounds => self.run_rounds().await?,
            DebateMode::FreeForm => self.run_free_form().await?,
            DebateMode::Sequential => self.run_sequential().await?,
        };

        let output = self.final_output().await;
        info!(%debate_id, rounds, %reason, cruxes = output.cruxes.len(), "debate complete");
        self.emit(DebateEvent::DebateComplete {
            rounds,
            reason,
            output,
        })
        .await?;
        Ok(self.state)
    }

    /// Emit one event and fold it into the state.
    async fn emit(&mut self, event: DebateEvent) -> Result<(), DebateError> {
        let envelope = self
            .sink
            .emit(event)
            .await
            .map_err(|_| DebateError::Cancelled)?;
        self.state = std::mem::take(&mut self.state).apply(&envelope)?;
        Ok(())
    }

    fn ensure_live(&self) -> Result<(), DebateError> {
        if self.sink.is_closed() {
            info!("event consumer gone, cancelling debate");
            Err(DebateError::Cancelled)
        } else {
            Ok(())
        }
    }

    async fn decompose(&self, topic: &str) -> CollaboratorResult<Vec<ClaimDraft>> {
        let orchestrator = self.orchestrator;
        let drafts = retry_with_backoff(&orchestrator.config.retry, "claim_decomposer", || {
            orchestrator.collaborators.claims.decompose(topic)
        })
        .await?;
        if drafts.is_empty() {
            return Err(CollaboratorError::malformed(
                "claim_decomposer",
                "no claims returned",
            ));
        }
        Ok(drafts)
    }

    // ── Modes ──────────────────────────────────────────────────────────

    async fn run_rounds(&mut self) -> Result<(u32, CompletionReason), DebateError> {
        let orchestrator = self.orchestrator;
        let config = &orchestrator.config;

        for round in 1..=config.max_rounds {
            self.ensure_live()?;
            self.emit(DebateEvent::status(format!(
                "round {} of {}",
                round, config.max_rounds
            )))
            .await?;

            if config.graph.enabled {
                self.graph_round(round).await?;
            }

            // Every persona answers the same frozen snapshot.
            let (summary, recent) = self.prompt_context().await;
            let requests: Vec<TurnRequest> = orchestrator
                .personas
                .iter()
                .map(|p| self.turn_request(p, round, &summary, &recent, TurnContext::Round))
                .collect();
            let results = join_all(
                requests
                    .iter()
                    .map(|request| call_agent(orchestrator, request)),
            )
            .await;
            for (persona, result) in orchestrator.personas.iter().zip(results) {
                self.record_turn(&persona.id, round, result).await?;
            }

            self.checkpoint().await?;
            self.detect(round).await?;
            if let Some(reason) = self.observe(round).await? {
                return Ok((round, reason));
            }
        }
        Ok((config.max_rounds, CompletionReason::MaxRounds))
    }

    async fn run_free_form(&mut self) -> Result<(u32, CompletionReason), DebateError> {
        let orchestrator = self.orchestrator;
        let config = &orchestrator.config;
        let personas = &orchestrator.personas;
        let cycle = personas.len() as u32;
        let mut round = 1;

        for turn in 1..=config.max_turns {
            self.ensure_live()?;
            round = (turn - 1) / cycle + 1;

            let ranked = match self.state.transcript.last() {
                Some(last) => self
                    .reactive
                    .next_speaker(personas, last, &self.state.transcript)
                    .map(|c| (c.persona_id, c.reason.to_string(), Some(c.score))),
                None => None,
            };
            let (persona_id, reason, score) = ranked.unwrap_or_else(|| {
                let persona = &personas[((turn - 1) % cycle) as usize];
                (persona.id.clone(), OPENING_REASON.to_string(), None)
            });
            debug!(turn, persona = %persona_id, %reason, "free-form speaker");

            self.emit(DebateEvent::SpeakerSelected {
                round,
                persona_id: persona_id.clone(),
                reason: reason.clone(),
                score,
            })
            .await?;
            self.scheduled_turn(&persona_id, round, reason).await?;

            if turn % cycle == 0 || turn == config.max_turns {
                if let Some(reason) = self.end_cycle(round).await? {
                    return Ok((round, reason));
                }
            }
        }
        Ok((round, CompletionReason::MaxRounds))
    }

    async fn run_sequential(&mut self) -> Result<(u32, CompletionReason), DebateError> {
        let orchestrator = self.orchestrator;
        let config = &orchestrator.config;
        let personas = &orchestrator.personas;
        let Some(planner) = orchestrator.collaborators.planner.as_ref() else {
            return Err(
                ConfigError::invalid("mode", "sequential debates need an action planner").into(),
            );
        };
        let cycle = personas.len() as u32;
        let mut round = 1;

        for turn in 1..=config.max_turns {
            self.ensure_live()?;
            round = (turn - 1) / cycle + 1;

            let (summary, recent) = self.prompt_context().await;
            let requests: Vec<PlanRequest> = personas
                .iter()
                .map(|persona| PlanRequest {
                    persona: persona.clone(),
                    turn,
                    blackboard_summary: summary.clone(),
                    recent_transcript: recent.clone(),
                })
                .collect();
            let results = join_all(requests.iter().map(|request| {
                retry_with_backoff(&config.retry, "action_planner", move || {
                    planner.propose(request)
                })
            }))
            .await;
            let plans: Vec<ActionPlan> = personas
                .iter()
                .zip(results)
                .map(|(persona, result)| match result {
                    Ok(mut plan) => {
                        plan.persona_id = persona.id.clone();
                        plan
                    }
                    Err(e) => {
                        warn!(
                            turn,
                            persona = %persona.id,
                            error = %e,
                            "action planning failed, persona listens"
                        );
                        ActionPlan {
                            persona_id: persona.id.clone(),
                            action: PlannedAction::Listen,
                            urgency: 0.0,
                            intent: String::new(),
                        }
                    }
                })
                .collect();

            match self.deliberative.decide(&plans) {
                TurnDecision::Speak(plan) => {
                    self.emit(DebateEvent::SpeakerSelected {
                        round,
                        persona_id: plan.persona_id.clone(),
                        reason: format!("{}: {}", plan.action, plan.intent),
                        score: Some(plan.urgency),
                    })
                    .await?;
                    self.scheduled_turn(&plan.persona_id, round, plan.intent.clone())
                        .await?;
                }
                TurnDecision::Silent { consecutive } => {
                    self.emit(DebateEvent::status(format!(
                        "turn {}: every persona is listening ({} in a row)",
                        turn, consecutive
                    )))
                    .await?;
                }
                TurnDecision::Terminate => {
                    self.emit(DebateEvent::status(format!(
                        "turn {}: nobody wants the floor, ending debate",
                        turn
                    )))
                    .await?;
                    return Ok((round, CompletionReason::SilenceBreak));
                }
            }

            if turn % cycle == 0 || turn == config.max_turns {
                if let Some(reason) = self.end_cycle(round).await? {
                    return Ok((round, reason));
                }
            }
        }
        Ok((round, CompletionReason::MaxRounds))
    }

    // ── Turns ──────────────────────────────────────────────────────────

    /// Blackboard summary and recent transcript for the next prompt.
    async fn prompt_context(&self) -> (String, Vec<TranscriptMessage>) {
        let config = &self.orchestrator.config;
        let summary = self
            .state
            .blackboard
            .summarize(
                config.summary_token_budget,
                self.orchestrator.collaborators.summarizer.as_deref(),
                &config.retry,
            )
            .await;
        let recent = recent_window(&self.state.transcript, config.transcript_window).to_vec();
        (summary, recent)
    }

    fn turn_request(
        &self,
        persona: &PersonaProfile,
        round: u32,
        summary: &str,
        recent: &[TranscriptMessage],
        context: TurnContext,
    ) -> TurnRequest {
        TurnRequest {
            persona: persona.clone(),
            round,
            topic: self.state.topic.clone(),
            claims: self.state.blackboard.claims.clone(),
            blackboard_summary: summary.to_string(),
            recent_transcript: recent.to_vec(),
            context,
        }
    }

    /// One scheduler-picked turn in the turn-based modes.
    async fn scheduled_turn(
        &mut self,
        persona_id: &str,
        round: u32,
        reason: String,
    ) -> Result<(), DebateError> {
        let orchestrator = self.orchestrator;
        let Some(persona) = orchestrator.personas.iter().find(|p| p.id == persona_id) else {
            warn!(persona = %persona_id, "scheduler picked an unknown persona");
            return Ok(());
        };
        let (summary, recent) = self.prompt_context().await;
        let request =
            self.turn_request(persona, round, &summary, &recent, TurnContext::Scheduled { reason });
        let result = call_agent(orchestrator, &request).await;
        self.record_turn(persona_id, round, result).await
    }

    async fn record_turn(
        &mut self,
        persona_id: &str,
        round: u32,
        result: CollaboratorResult<AgentTurnResponse>,
    ) -> Result<(), DebateError> {
        match result {
            Ok(response) => {
                self.emit(DebateEvent::AgentTurn {
                    turn: response.into_turn(persona_id, round),
                })
                .await
            }
            Err(CollaboratorError::Cancelled(reason)) => {
                info!(persona = %persona_id, %reason, "agent call cancelled");
                Err(DebateError::Cancelled)
            }
            Err(e) => {
                warn!(round, persona = %persona_id, error = %e, "agent turn failed, skipping");
                self.emit(DebateEvent::AgentSkipped {
                    round,
                    persona_id: persona_id.to_string(),
                    error: e.to_string(),
                })
                .await
            }
        }
    }

    /// Checkpoint, detection and convergence at the end of a turn cycle.
    async fn end_cycle(&mut self, round: u32) -> Result<Option<CompletionReason>, DebateError> {
        self.checkpoint().await?;
        self.detect(round).await?;
        self.observe(round).await
    }

    async fn checkpoint(&mut self) -> Result<(), DebateError> {
        let board = &self.state.blackboard;
        let event = DebateEvent::BlackboardUpdated {
            version: board.version,
            disputes: board.disputes.len(),
            open_cruxes: board.unresolved_cruxes().count(),
        };
        self.emit(event).await
    }

    async fn observe(&mut self, round: u32) -> Result<Option<CompletionReason>, DebateError> {
        let state = self.tracker.observe(&self.state.blackboard, round);
        let reason = if state.converged && !state.forced_stop {
            Some(CompletionReason::Converged)
        } else if state.diverged {
            Some(CompletionReason::Diverged)
        } else if state.forced_stop {
            Some(CompletionReason::EventCap)
        } else {
            None
        };
        self.emit(DebateEvent::ConvergenceUpdated { state }).await?;
        Ok(reason)
    }

    // ── Argument graph ─────────────────────────────────────────────────

    async fn graph_round(&mut self, round: u32) -> Result<(), DebateError> {
        let config = &self.orchestrator.config;
        let changed = if round == 1 {
            self.argument_round(round).await?
        } else if round <= 1 + config.graph.max_attack_rounds {
            self.attack_round(round).await?
        } else {
            false
        };
        if !changed {
            return Ok(());
        }

        let graph = &self.state.graph;
        let event = DebateEvent::GraphUpdated {
            round,
            labelling: graph.compute_labelling(),
            grounded: graph.grounded_extension().into_iter().collect(),
            preferred_count: graph.preferred_extensions().len(),
        };
        self.emit(event).await
    }

    /// Opening round: every persona puts forward its arguments.
    async fn argument_round(&mut self, round: u32) -> Result<bool, DebateError> {
        let orchestrator = self.orchestrator;
        let Some(generator) = orchestrator.collaborators.arguments.as_ref() else {
            return Ok(false);
        };
        let requests: Vec<ArgumentRequest> = orchestrator
            .personas
            .iter()
            .map(|persona| self.argument_request(persona, round, Vec::new()))
            .collect();
        let results = join_all(requests.iter().map(|request| {
            retry_with_backoff(&orchestrator.config.retry, "argument_generator", move || {
                generator.generate_arguments(request)
            })
        }))
        .await;

        let mut next_id = self.state.graph.arguments().len();
        let mut arguments = Vec::new();
        for (persona, result) in orchestrator.personas.iter().zip(results) {
            match result {
                Ok(drafts) => {
                    for draft in drafts {
                        next_id += 1;
                        arguments.push(draft.into_argument(
                            format!("arg-{}", next_id),
                            &persona.id,
                            round,
                        ));
                    }
                }
                Err(e) => self.skip_graph_turn(round, &persona.id, e).await?,
            }
        }

        if arguments.is_empty() {
            return Ok(false);
        }
        self.emit(DebateEvent::ArgumentsAdded { round, arguments })
            .await?;
        Ok(true)
    }

    /// Attack round: personas attack opposing arguments, then one batch
    /// validation decides which attacks count.
    async fn attack_round(&mut self, round: u32) -> Result<bool, DebateError> {
        let orchestrator = self.orchestrator;
        let Some(generator) = orchestrator.collaborators.arguments.as_ref() else {
            return Ok(false);
        };
        if self.state.graph.is_empty() {
            return Ok(false);
        }

        let requests: Vec<ArgumentRequest> = orchestrator
            .personas
            .iter()
            .map(|persona| {
                let opposing = self
                    .state
                    .graph
                    .arguments()
                    .iter()
                    .filter(|a| a.speaker_id != persona.id)
                    .cloned()
                    .collect();
                self.argument_request(persona, round, opposing)
            })
            .collect();
        let results = join_all(requests.iter().map(|request| {
            retry_with_backoff(&orchestrator.config.retry, "argument_generator", move || {
                generator.generate_attacks(request)
            })
        }))
        .await;

        let mut next_arg = self.state.graph.arguments().len();
        let mut next_attack = self.state.graph.attacks().len();
        let mut counter_arguments = Vec::new();
        let mut attacks = Vec::new();
        for (persona, result) in orchestrator.personas.iter().zip(results) {
            let drafts = match result {
                Ok(drafts) => drafts,
                Err(e) => {
                    self.skip_graph_turn(round, &persona.id, e).await?;
                    continue;
                }
            };
            for draft in drafts {
                if self.state.graph.argument(&draft.target_arg_id).is_none() {
                    warn!(
                        round,
                        persona = %persona.id,
                        target = %draft.target_arg_id,
                        "attack on unknown argument dropped"
                    );
                    continue;
                }
                next_arg += 1;
                next_attack += 1;
                let from_arg_id = format!("arg-{}", next_arg);
                counter_arguments.push(draft.counter_argument.into_argument(
                    from_arg_id.clone(),
                    &persona.id,
                    round,
                ));
                attacks.push(Attack {
                    id: format!("atk-{}", next_attack),
                    from_arg_id,
                    to_arg_id: draft.target_arg_id,
                    attack_type: draft.attack_type,
                    target: draft.target,
                    counter_proposition: draft.counter_proposition,
                    rationale: draft.rationale,
                    evidence: draft.evidence,
                    confidence: draft.confidence.clamp(0.0, 1.0),
                    speaker_id: persona.id.clone(),
                    round,
                });
            }
        }

        if attacks.is_empty() {
            return Ok(false);
        }
        self.emit(DebateEvent::ArgumentsAdded {
            round,
            arguments: counter_arguments,
        })
        .await?;

        let validated = self.validate_attacks(&attacks).await;
        let degraded = validated.is_degraded();
        self.emit(DebateEvent::AttacksAdded {
            round,
            attacks,
            validations: validated.payload,
            degraded,
        })
        .await?;
        Ok(true)
    }

    fn argument_request(
        &self,
        persona: &PersonaProfile,
        round: u32,
        opposing_arguments: Vec<Argument>,
    ) -> ArgumentRequest {
        ArgumentRequest {
            persona: persona.clone(),
            round,
            topic: self.state.topic.clone(),
            claims: self.state.blackboard.claims.clone(),
            opposing_arguments,
        }
    }

    async fn skip_graph_turn(
        &mut self,
        round: u32,
        persona_id: &str,
        error: CollaboratorError,
    ) -> Result<(), DebateError> {
        if let CollaboratorError::Cancelled(_) = error {
            return Err(DebateError::Cancelled);
        }
        warn!(
            round,
            persona = %persona_id,
            error = %error,
            "argument generation failed, skipping"
        );
        self.emit(DebateEvent::AgentSkipped {
            round,
            persona_id: persona_id.to_string(),
            error: error.to_string(),
        })
        .await
    }

    /// Batch-validate `attacks`; any attack the validator does not judge is
    /// assumed valid.
    async fn validate_attacks(
        &self,
        attacks: &[Attack],
    ) -> DegradedResponse<Vec<ValidationResult>> {
        let orchestrator = self.orchestrator;
        let assume_all = || -> Vec<ValidationResult> {
            attacks
                .iter()
                .map(|a| ValidationResult::assumed_valid(&a.id))
                .collect()
        };
        let Some(validator) = orchestrator.collaborators.validator.as_ref() else {
            return DegradedResponse::full(assume_all(), "unvalidated");
        };

        let graph = &self.state.graph;
        let result = retry_with_backoff(&orchestrator.config.retry, "attack_validator", || {
            validator.validate(attacks, graph)
        })
        .await
        .map(|verdicts| complete_verdicts(attacks, verdicts));
        DegradedResponse::from_result(result, "attack_validator", "assumed_valid", assume_all)
    }

    // ── Disagreements and crux rooms ───────────────────────────────────

    async fn detect(&mut self, round: u32) -> Result<(), DebateError> {
        let orchestrator = self.orchestrator;
        let config = &orchestrator.config;
        let Some(detector) = orchestrator.collaborators.detector.as_ref() else {
            return Ok(());
        };
        let window = recent_window(&self.state.transcript, config.detection_window).to_vec();
        if window.len() < 2 {
            return Ok(());
        }
        self.ensure_live()?;

        let detection = match retry_with_backoff(&config.retry, "disagreement_detector", || {
            detector.detect(&window)
        })
        .await
        {
            Ok(detection) => detection,
            Err(CollaboratorError::Cancelled(_)) => return Err(DebateError::Cancelled),
            Err(e) => {
                warn!(round, error = %e, "disagreement detection failed");
                return Ok(());
            }
        };

        let Some(detection) = detection else {
            self.registry.decay_others(None);
            return Ok(());
        };
        let [a, b] = &detection.personas;
        if a == b || self.state.persona(a).is_none() || self.state.persona(b).is_none() {
            warn!(round, first = %a, second = %b, "detection names an invalid pair, ignored");
            return Ok(());
        }

        let pair = detection.pair();
        let eligible =
            self.registry
                .update(&pair, &detection.topic, detection.confidence, &self.active_rooms);
        self.registry.decay_others(Some(&pair));
        let consecutive_windows = self
            .registry
            .candidate(&pair)
            .map_or(0, |c| c.consecutive_windows);

        self.emit(DebateEvent::DisagreementDetected {
            detection: detection.clone(),
            consecutive_windows,
            eligible,
        })
        .await?;

        if eligible {
            if self.rooms_opened >= config.crux_room.max_rooms {
                debug!(%pair, max_rooms = config.crux_room.max_rooms, "crux room budget spent");
                return Ok(());
            }
            self.registry.record_spawn(&pair);
            self.run_crux_room(&detection, round).await?;
        }
        Ok(())
    }

    async fn run_crux_room(
        &mut self,
        detection: &DisagreementDetection,
        round: u32,
    ) -> Result<(), DebateError> {
        let orchestrator = self.orchestrator;
        self.rooms_opened += 1;
        let room_id = format!("room-{}", self.rooms_opened);
        let mut room = CruxRoom::open(&room_id, detection, orchestrator.config.crux_room.max_turns);

        self.active_rooms.insert(room.pair.clone());
        let exchanged = self.exchange(&mut room, round).await;
        self.active_rooms.remove(&room.pair);
        exchanged?;

        match room
            .conclude(
                orchestrator.collaborators.crux_cards.as_deref(),
                &orchestrator.config.retry,
            )
            .await
        {
            Some(card) => {
                self.emit(DebateEvent::CruxCardProduced {
                    room_id: room.id.clone(),
                    card,
                })
                .await
            }
            None => {
                self.emit(DebateEvent::status(format!(
                    "crux room {} closed without an exchange",
                    room.id
                )))
                .await
            }
        }
    }

    /// Alternate the two personas until the room's turn budget is spent.
    async fn exchange(&mut self, room: &mut CruxRoom, round: u32) -> Result<(), DebateError> {
        let orchestrator = self.orchestrator;
        let config = &orchestrator.config;

        self.emit(DebateEvent::CruxRoomOpened {
            room_id: room.id.clone(),
            personas: room.personas.clone(),
            topic: room.topic.clone(),
        })
        .await?;
        if let Err(e) = room.transition(CruxRoomPhase::Exchanging) {
            warn!(room = %room.id, error = %e, "crux room could not start");
            return Ok(());
        }

        let summary = self
            .state
            .blackboard
            .summarize(
                config.summary_token_budget,
                orchestrator.collaborators.summarizer.as_deref(),
                &config.retry,
            )
            .await;

        while let Some((speaker, opponent)) = room
            .next_turn()
            .map(|(s, o)| (s.to_string(), o.to_string()))
        {
            self.ensure_live()?;
            let Some(persona) = orchestrator.personas.iter().find(|p| p.id == speaker) else {
                room.record_turn(None);
                continue;
            };
            let request = TurnRequest {
                persona: persona.clone(),
                round,
                topic: room.topic.clone(),
                claims: self.state.blackboard.claims.clone(),
                blackboard_summary: summary.clone(),
                recent_transcript: recent_window(&room.transcript, config.transcript_window)
                    .to_vec(),
                context: TurnContext::CruxRoom {
                    topic: room.topic.clone(),
                    opponent_id: opponent,
                },
            };

            match call_agent(orchestrator, &request).await {
                Ok(response) if !response.response.trim().is_empty() => {
                    let message = TranscriptMessage::new(&speaker, &response.response, round);
                    self.emit(DebateEvent::CruxRoomMessage {
                        room_id: room.id.clone(),
                        message: message.clone(),
                    })
                    .await?;
                    room.record_turn(Some(message));
                }
                Ok(_) => {
                    warn!(room = %room.id, persona = %speaker, "empty crux room turn");
                    room.record_turn(None);
                }
                Err(CollaboratorError::Cancelled(_)) => return Err(DebateError::Cancelled),
                Err(e) => {
                    warn!(room = %room.id, persona = %speaker, error = %e, "crux room turn failed");
                    room.record_turn(None);
                }
            }
        }
        Ok(())
    }

    // ── Output ─────────────────────────────────────────────────────────

    /// Graph extraction when arguments exist, otherwise the extractor
    /// collaborator, otherwise a projection of the blackboard. Crux cards
    /// are merged in last.
    async fn final_output(&self) -> DebateOutput {
        let orchestrator = self.orchestrator;
        let board = &self.state.blackboard;

        let mut output = if self.state.graph_enabled && !self.state.graph.is_empty() {
            CruxExtractor::extract(&self.state.graph)
        } else if let Some(extractor) = orchestrator.collaborators.extractor.as_ref() {
            let result = retry_with_backoff(&orchestrator.config.retry, "final_extractor", || {
                extractor.extract(board)
            })
            .await;
            DegradedResponse::from_result(result, "final_extractor", "blackboard_projection", || {
                DebateOutput::from_blackboard(board)
            })
            .payload
        } else {
            DebateOutput::from_blackboard(board)
        };

        output.merge_cards(&self.state.crux_cards());
        output
    }
}

async fn call_agent(
    orchestrator: &DebateOrchestrator,
    request: &TurnRequest,
) -> CollaboratorResult<AgentTurnResponse> {
    retry_with_backoff(&orchestrator.config.retry, "agent_turn", || {
        orchestrator.collaborators.agent.take_turn(request)
    })
    .await
}

/// Keep verdicts for known attacks and assume the rest valid.
fn complete_verdicts(
    attacks: &[Attack],
    verdicts: Vec<ValidationResult>,
) -> Vec<ValidationResult> {
    let mut complete: Vec<ValidationResult> = verdicts
        .into_iter()
        .filter(|v| attacks.iter().any(|a| a.id == v.attack_id))
        .collect();
    for attack in attacks {
        if !complete.iter().any(|v| v.attack_id == attack.id) {
            complete.push(ValidationResult::assumed_valid(&attack.id));
        }
    }
    complete
}
