//! Blackboard state and its update rule.
//!
//! `update` is a pure fold step: it reads the previous state and builds the
//! next one field by field. History is append-only (stance log, cruxes,
//! flip conditions); disputes and crux weights are recomputed every step.
//! Folding the same turns in a different order can yield a different state,
//! so callers fold in a fixed persona order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::types::{
    AgentStance, Claim, Crux, Dispute, DisputeSide, FlipCondition, TurnResult,
};
use crate::collaborators::{Summarizer, SummaryRequest};
use crate::resilience::{retry_with_backoff, RetryPolicy};

/// Weight assigned to a freshly proposed crux before recomputation.
pub const NEW_CRUX_WEIGHT: f64 = 0.5;

/// Shared, versioned debate state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlackboardState {
    pub version: u64,
    pub topic: String,
    pub claims: Vec<Claim>,
    pub stances: Vec<AgentStance>,
    pub disputes: Vec<Dispute>,
    pub cruxes: Vec<Crux>,
    pub flip_conditions: Vec<FlipCondition>,
}

impl BlackboardState {
    /// Empty state over the given claims.
    pub fn create(topic: &str, claims: Vec<Claim>) -> Self {
        Self {
            version: 0,
            topic: topic.to_string(),
            claims,
            stances: Vec::new(),
            disputes: Vec::new(),
            cruxes: Vec::new(),
            flip_conditions: Vec::new(),
        }
    }

    /// Fold one agent turn into a new state.
    pub fn update(&self, turn: &TurnResult) -> Self {
        let stances = self.append_stances(turn);
        let cruxes = self.merge_cruxes(turn);
        let flip_conditions = self.upsert_flip_conditions(turn, &stances);
        let disputes = rebuild_disputes(&self.claims, &stances);
        let cruxes = reweight_cruxes(cruxes, !disputes.is_empty());

        debug!(
            persona = %turn.persona_id,
            round = turn.round,
            version = self.version + 1,
            disputes = disputes.len(),
            cruxes = cruxes.len(),
            "blackboard updated"
        );

        Self {
            version: self.version + 1,
            topic: self.topic.clone(),
            claims: self.claims.clone(),
            stances,
            disputes,
            cruxes,
            flip_conditions,
        }
    }

    fn append_stances(&self, turn: &TurnResult) -> Vec<AgentStance> {
        let mut stances = self.stances.clone();
        for update in &turn.stances {
            if !self.claims.iter().any(|c| c.id == update.claim_id) {
                warn!(
                    persona = %turn.persona_id,
                    claim = %update.claim_id,
                    "stance on unknown claim ignored"
                );
                continue;
            }
            stances.push(AgentStance {
                persona_id: turn.persona_id.clone(),
                claim_id: update.claim_id.clone(),
                stance: update.stance,
                confidence: update.confidence.clamp(0.0, 1.0),
                round: turn.round,
            });
        }
        stances
    }

    fn merge_cruxes(&self, turn: &TurnResult) -> Vec<Crux> {
        let mut cruxes = self.cruxes.clone();
        for proposition in &turn.new_cruxes {
            let proposition = proposition.trim();
            if proposition.is_empty() || cruxes.iter().any(|c| c.matches(proposition)) {
                continue;
            }
            cruxes.push(Crux {
                id: format!("crux-{}", cruxes.len() + 1),
                proposition: proposition.to_string(),
                weight: NEW_CRUX_WEIGHT,
                resolved: false,
                surfaced_by_tables: vec![0],
            });
        }
        for settled in &turn.resolved_cruxes {
            for crux in cruxes.iter_mut().filter(|c| c.matches(settled)) {
                crux.resolved = true;
            }
        }
        cruxes
    }

    fn upsert_flip_conditions(
        &self,
        turn: &TurnResult,
        stances: &[AgentStance],
    ) -> Vec<FlipCondition> {
        let mut conditions = self.flip_conditions.clone();
        for trigger in &turn.flip_triggers {
            let trigger = trigger.trim();
            if trigger.is_empty() {
                continue;
            }
            match conditions
                .iter_mut()
                .find(|c| c.persona_id == turn.persona_id && c.condition == trigger)
            {
                Some(existing) => existing.triggered = true,
                None => conditions.push(FlipCondition {
                    persona_id: turn.persona_id.clone(),
                    condition: trigger.to_string(),
                    claim_id: self.first_claim_of(&turn.persona_id, stances),
                    triggered: true,
                }),
            }
        }
        conditions
    }

    /// First claim (in claim order) the persona holds a stance on.
    fn first_claim_of(&self, persona_id: &str, stances: &[AgentStance]) -> String {
        self.claims
            .iter()
            .find(|claim| {
                stances
                    .iter()
                    .any(|s| s.persona_id == persona_id && s.claim_id == claim.id)
            })
            .or_else(|| self.claims.first())
            .map(|claim| claim.id.clone())
            .unwrap_or_default()
    }

    /// Latest stance per persona on `claim_id`, personas in first-seen order.
    pub fn latest_stances_for_claim(&self, claim_id: &str) -> Vec<&AgentStance> {
        latest_for_claim(&self.stances, claim_id)
    }

    /// Latest stance for every (persona, claim) pair.
    pub fn current_stances(&self) -> Vec<&AgentStance> {
        self.claims
            .iter()
            .flat_map(|claim| self.latest_stances_for_claim(&claim.id))
            .collect()
    }

    pub fn unresolved_cruxes(&self) -> impl Iterator<Item = &Crux> {
        self.cruxes.iter().filter(|c| !c.resolved)
    }

    pub fn claim(&self, claim_id: &str) -> Option<&Claim> {
        self.claims.iter().find(|c| c.id == claim_id)
    }

    /// Naive textual rendering used for prompts and summaries.
    pub fn render(&self) -> String {
        let mut out = format!("Topic: {}\n", self.topic);

        out.push_str("Claims:\n");
        for claim in &self.claims {
            out.push_str(&format!("- [{}] {}\n", claim.id, claim.text));
        }

        let current = self.current_stances();
        if !current.is_empty() {
            out.push_str("Stances:\n");
            for s in current {
                out.push_str(&format!(
                    "- {} on {}: {} ({:.2}, round {})\n",
                    s.persona_id, s.claim_id, s.stance, s.confidence, s.round
                ));
            }
        }

        if !self.disputes.is_empty() {
            out.push_str("Disputes:\n");
            for dispute in &self.disputes {
                let sides: Vec<String> = dispute
                    .sides
                    .iter()
                    .map(|s| format!("{}={}({:.2})", s.persona_id, s.stance, s.confidence))
                    .collect();
                out.push_str(&format!("- {}: {}\n", dispute.claim_id, sides.join(" vs ")));
            }
        }

        let open: Vec<&Crux> = self.unresolved_cruxes().collect();
        if !open.is_empty() {
            out.push_str("Open cruxes:\n");
            for crux in open {
                out.push_str(&format!("- ({:.2}) {}\n", crux.weight, crux.proposition));
            }
        }

        let triggered: Vec<&FlipCondition> =
            self.flip_conditions.iter().filter(|f| f.triggered).collect();
        if !triggered.is_empty() {
            out.push_str("Triggered flip conditions:\n");
            for flip in triggered {
                out.push_str(&format!("- {}: {}\n", flip.persona_id, flip.condition));
            }
        }

        out
    }

    /// Compact summary within roughly `token_budget` tokens.
    ///
    /// Short renderings are returned as-is; longer ones go to the
    /// summarizer with a ±20% window, falling back to truncation once
    /// `retry` is spent.
    pub async fn summarize(
        &self,
        token_budget: usize,
        summarizer: Option<&dyn Summarizer>,
        retry: &RetryPolicy,
    ) -> String {
        let text = self.render();
        if estimate_tokens(&text) <= token_budget {
            return text;
        }

        if let Some(summarizer) = summarizer {
            let request = SummaryRequest {
                text: text.clone(),
                min_tokens: token_budget * 4 / 5,
                max_tokens: token_budget * 6 / 5,
            };
            let summary =
                retry_with_backoff(retry, "summarizer", || summarizer.summarize(&request)).await;
            match summary {
                Ok(summary) => return summary,
                Err(e) => warn!(error = %e, "summarizer failed, truncating blackboard"),
            }
        }

        truncate_chars(&text, token_budget * 4)
    }
}

/// Rough token estimate: four characters per token.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn latest_for_claim<'a>(stances: &'a [AgentStance], claim_id: &str) -> Vec<&'a AgentStance> {
    let mut order: Vec<&str> = Vec::new();
    let mut latest: BTreeMap<&str, &AgentStance> = BTreeMap::new();
    for stance in stances.iter().filter(|s| s.claim_id == claim_id) {
        let persona = stance.persona_id.as_str();
        match latest.get(persona) {
            Some(existing) if existing.round > stance.round => {}
            Some(_) => {
                latest.insert(persona, stance);
            }
            None => {
                order.push(persona);
                latest.insert(persona, stance);
            }
        }
    }
    order.into_iter().filter_map(|p| latest.get(p).copied()).collect()
}

fn rebuild_disputes(claims: &[Claim], stances: &[AgentStance]) -> Vec<Dispute> {
    claims
        .iter()
        .filter_map(|claim| {
            let current = latest_for_claim(stances, &claim.id);
            let first = current.first()?.stance;
            if current.iter().all(|s| s.stance == first) {
                return None;
            }
            Some(Dispute {
                claim_id: claim.id.clone(),
                sides: current
                    .iter()
                    .map(|s| DisputeSide {
                        persona_id: s.persona_id.clone(),
                        stance: s.stance,
                        confidence: s.confidence,
                    })
                    .collect(),
            })
        })
        .collect()
}

/// Base 0.3, +0.3 while any dispute is open, plus an ordinal bonus of up
/// to 0.3 that grows with creation order. Resolved cruxes weigh 0.
fn reweight_cruxes(cruxes: Vec<Crux>, any_dispute: bool) -> Vec<Crux> {
    let count = cruxes.len().max(1) as f64;
    cruxes
        .into_iter()
        .enumerate()
        .map(|(index, crux)| {
            let weight = if crux.resolved {
                0.0
            } else {
                let dispute_bonus = if any_dispute { 0.3 } else { 0.0 };
                let ordinal_bonus = (0.3 * (index + 1) as f64 / count).clamp(0.0, 0.3);
                (0.3 + dispute_bonus + ordinal_bonus).clamp(0.0, 1.0)
            };
            Crux { weight, ..crux }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blackboard::types::Stance;
    use crate::collaborators::CollaboratorResult;
    use crate::error::CollaboratorError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn claims() -> Vec<Claim> {
        vec![
            Claim {
                id: "c1".into(),
                text: "Rent control lowers rents".into(),
                debate_id: "d".into(),
            },
            Claim {
                id: "c2".into(),
                text: "Rent control reduces supply".into(),
                debate_id: "d".into(),
            },
        ]
    }

    fn board() -> BlackboardState {
        BlackboardState::create("Rent control", claims())
    }

    #[test]
    fn test_create_is_empty() {
        let state = board();
        assert_eq!(state.version, 0);
        assert_eq!(state.claims.len(), 2);
        assert!(state.stances.is_empty() && state.cruxes.is_empty());
    }

    #[test]
    fn test_update_appends_and_leaves_previous_untouched() {
        let s0 = board();
        let s1 = s0.update(&TurnResult::new("alice", 1).with_stance("c1", Stance::Pro, 0.8));
        assert!(s0.stances.is_empty());
        assert_eq!(s1.stances.len(), 1);
        assert_eq!(s1.version, 1);
    }

    #[test]
    fn test_unknown_claim_ignored() {
        let s1 = board().update(&TurnResult::new("alice", 1).with_stance("c9", Stance::Pro, 0.8));
        assert!(s1.stances.is_empty());
    }

    #[test]
    fn test_confidence_clamped() {
        let s1 = board().update(&TurnResult::new("alice", 1).with_stance("c1", Stance::Pro, 1.7));
        assert_eq!(s1.stances[0].confidence, 1.0);
    }

    #[test]
    fn test_latest_stance_is_highest_round() {
        let s = board()
            .update(&TurnResult::new("alice", 2).with_stance("c1", Stance::Con, 0.6))
            .update(&TurnResult::new("alice", 1).with_stance("c1", Stance::Pro, 0.9));
        let latest = s.latest_stances_for_claim("c1");
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].stance, Stance::Con);
        assert_eq!(s.stances.len(), 2);
    }

    #[test]
    fn test_crux_dedup_case_insensitive() {
        let s = board()
            .update(&TurnResult::new("alice", 1).with_crux("Supply is elastic"))
            .update(
                &TurnResult::new("bob", 1)
                    .with_crux("supply is ELASTIC ")
                    .with_crux("Landlords exit"),
            );
        assert_eq!(s.cruxes.len(), 2);
        assert_eq!(s.cruxes[0].id, "crux-1");
        assert_eq!(s.cruxes[1].id, "crux-2");
        assert_eq!(s.cruxes[1].surfaced_by_tables, vec![0]);
        assert!(!s.cruxes[1].resolved);
    }

    #[test]
    fn test_disputes_from_latest_stances() {
        let s = board()
            .update(&TurnResult::new("alice", 1).with_stance("c1", Stance::Pro, 0.8))
            .update(&TurnResult::new("bob", 1).with_stance("c1", Stance::Con, 0.7));
        assert_eq!(s.disputes.len(), 1);
        assert_eq!(s.disputes[0].claim_id, "c1");
        assert_eq!(s.disputes[0].sides.len(), 2);

        // bob comes around → dispute disappears
        let s = s.update(&TurnResult::new("bob", 2).with_stance("c1", Stance::Pro, 0.6));
        assert!(s.disputes.is_empty());
    }

    #[test]
    fn test_crux_weights() {
        let s = board()
            .update(
                &TurnResult::new("alice", 1)
                    .with_crux("first")
                    .with_crux("second"),
            );
        // no disputes: 0.3 + ordinal (0.15, 0.30)
        assert!((s.cruxes[0].weight - 0.45).abs() < 1e-9);
        assert!((s.cruxes[1].weight - 0.6).abs() < 1e-9);

        let s = s
            .update(&TurnResult::new("alice", 1).with_stance("c1", Stance::Pro, 0.8))
            .update(&TurnResult::new("bob", 1).with_stance("c1", Stance::Con, 0.8));
        assert!((s.cruxes[0].weight - 0.75).abs() < 1e-9);
        assert!((s.cruxes[1].weight - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_resolved_crux_weighs_zero() {
        let mut turn = TurnResult::new("bob", 2);
        turn.resolved_cruxes.push("FIRST".into());
        let s = board()
            .update(&TurnResult::new("alice", 1).with_crux("first"))
            .update(&turn);
        assert!(s.cruxes[0].resolved);
        assert_eq!(s.cruxes[0].weight, 0.0);
        assert_eq!(s.unresolved_cruxes().count(), 0);
    }

    #[test]
    fn test_flip_condition_upsert() {
        let s = board()
            .update(
                &TurnResult::new("alice", 1)
                    .with_stance("c2", Stance::Con, 0.7)
                    .with_flip_trigger("new supply data"),
            );
        assert_eq!(s.flip_conditions.len(), 1);
        assert_eq!(s.flip_conditions[0].claim_id, "c2");
        assert!(s.flip_conditions[0].triggered);

        let s = s.update(&TurnResult::new("alice", 2).with_flip_trigger("new supply data"));
        assert_eq!(s.flip_conditions.len(), 1);

        // same text from another persona is a distinct condition
        let s = s.update(&TurnResult::new("bob", 2).with_flip_trigger("new supply data"));
        assert_eq!(s.flip_conditions.len(), 2);
        assert_eq!(s.flip_conditions[1].claim_id, "c1");
    }

    #[test]
    fn test_render_sections() {
        let s = board()
            .update(&TurnResult::new("alice", 1).with_stance("c1", Stance::Pro, 0.8))
            .update(
                &TurnResult::new("bob", 1)
                    .with_stance("c1", Stance::Con, 0.7)
                    .with_crux("Supply is elastic")
                    .with_flip_trigger("a natural experiment"),
            );
        let text = s.render();
        assert!(text.starts_with("Topic: Rent control"));
        assert!(text.contains("alice on c1: pro (0.80, round 1)"));
        assert!(text.contains("c1: alice=pro(0.80) vs bob=con(0.70)"));
        assert!(text.contains("Supply is elastic"));
        assert!(text.contains("bob: a natural experiment"));
    }

    /// Fails with a transient error for the first `failures` calls.
    struct FixedSummarizer {
        failures: u32,
        calls: AtomicU32,
    }

    impl FixedSummarizer {
        fn failing(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Summarizer for FixedSummarizer {
        async fn summarize(&self, request: &SummaryRequest) -> CollaboratorResult<String> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                return Err(CollaboratorError::transient("summarizer", "429"));
            }
            Ok(format!("summary {}-{}", request.min_tokens, request.max_tokens))
        }
    }

    fn instant_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            backoff_step_ms: 0,
        }
    }

    #[tokio::test]
    async fn test_summarize_short_returns_render() {
        let s = board();
        let out = s.summarize(10_000, None, &instant_retry()).await;
        assert_eq!(out, s.render());
    }

    #[tokio::test]
    async fn test_summarize_delegates_with_window() {
        let s = board();
        let summarizer = FixedSummarizer::failing(0);
        let out = s.summarize(10, Some(&summarizer), &instant_retry()).await;
        assert_eq!(out, "summary 8-12");
    }

    #[tokio::test]
    async fn test_summarize_retries_transient_failure() {
        let s = board();
        let summarizer = FixedSummarizer::failing(1);
        let out = s.summarize(5, Some(&summarizer), &instant_retry()).await;
        assert_eq!(out, "summary 4-6");
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_summarize_falls_back_to_truncation() {
        let s = board();
        let summarizer = FixedSummarizer::failing(u32::MAX);
        let out = s.summarize(5, Some(&summarizer), &instant_retry()).await;
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 3);
        assert_eq!(out.chars().count(), 20);
        assert!(s.render().starts_with(&out));
    }
}
