//! Convergence / divergence tracking across debate rounds.
//!
//! Per claim, the tracker looks at each persona's latest stance and measures
//! how the confidence mass spreads over pro/con/uncertain (normalized Shannon
//! entropy) and how far apart personas sit on the pro/con axis. A debate
//! converges when every claim is one-sided and no crux is open; it diverges
//! when entropy stays high without any new crux surfacing.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::blackboard::{AgentStance, BlackboardState, Stance};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergenceConfig {
    /// Share of pro or con mass a claim needs to count as settled.
    pub threshold: f64,
    /// Entropy above which a round counts toward divergence.
    pub divergence_entropy: f64,
    /// Consecutive high-entropy rounds needed to declare divergence.
    pub divergence_window: usize,
    /// Hard cap on observations before a forced stop.
    pub max_events: u32,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            threshold: 0.8,
            divergence_entropy: 0.95,
            divergence_window: 2,
            max_events: 15,
        }
    }
}

/// Metrics for a single claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimMetrics {
    pub claim_id: String,
    pub entropy: f64,
    pub confidence_weighted_distance: f64,
    /// max(pro, con) / total mass; 0 when no mass.
    pub dominance: f64,
}

/// Result of one observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceState {
    pub round: u32,
    pub entropy: f64,
    pub confidence_weighted_distance: f64,
    pub unresolved_crux_count: usize,
    pub converged: bool,
    /// Converged only because the observation cap was hit.
    #[serde(default)]
    pub forced_stop: bool,
    pub diverged: bool,
    pub event_count: u32,
    pub max_events: u32,
    #[serde(default)]
    pub claims: Vec<ClaimMetrics>,
}

impl ConvergenceState {
    /// Whether this observation hit the forced-stop cap.
    pub fn capped(&self) -> bool {
        self.event_count >= self.max_events
    }

    pub fn should_stop(&self) -> bool {
        self.converged || self.diverged
    }
}

/// Carries entropy history and crux arrival across rounds.
#[derive(Debug, Clone)]
pub struct ConvergenceTracker {
    config: ConvergenceConfig,
    entropy_history: Vec<f64>,
    last_new_crux_round: Option<u32>,
    known_cruxes: usize,
    event_count: u32,
}

impl ConvergenceTracker {
    pub fn new(config: ConvergenceConfig) -> Self {
        Self {
            config,
            entropy_history: Vec::new(),
            last_new_crux_round: None,
            known_cruxes: 0,
            event_count: 0,
        }
    }

    pub fn entropy_history(&self) -> &[f64] {
        &self.entropy_history
    }

    pub fn last_new_crux_round(&self) -> Option<u32> {
        self.last_new_crux_round
    }

    /// Record one round's blackboard and evaluate the stop conditions.
    pub fn observe(&mut self, board: &BlackboardState, round: u32) -> ConvergenceState {
        self.event_count += 1;
        if board.cruxes.len() > self.known_cruxes {
            self.known_cruxes = board.cruxes.len();
            self.last_new_crux_round = Some(round);
        }

        let claims: Vec<ClaimMetrics> = board
            .claims
            .iter()
            .map(|claim| claim_metrics(&claim.id, &board.latest_stances_for_claim(&claim.id)))
            .collect();

        let (entropy, distance) = if claims.is_empty() {
            (1.0, 0.0)
        } else {
            let n = claims.len() as f64;
            (
                claims.iter().map(|c| c.entropy).sum::<f64>() / n,
                claims
                    .iter()
                    .map(|c| c.confidence_weighted_distance)
                    .sum::<f64>()
                    / n,
            )
        };
        self.entropy_history.push(entropy);

        let unresolved = board.unresolved_cruxes().count();
        let one_sided = claims.iter().all(|c| c.dominance >= self.config.threshold);
        let settled = unresolved == 0 && one_sided;
        let capped = self.event_count >= self.config.max_events;
        let converged = settled || capped;
        let diverged = self.is_diverging(round);

        debug!(round, entropy, distance, unresolved, "convergence observed");
        if converged || diverged {
            info!(round, converged, diverged, capped, "debate stop condition reached");
        }

        ConvergenceState {
            round,
            entropy,
            confidence_weighted_distance: distance,
            unresolved_crux_count: unresolved,
            converged,
            forced_stop: capped && !settled,
            diverged,
            event_count: self.event_count,
            max_events: self.config.max_events,
            claims,
        }
    }

    fn is_diverging(&self, round: u32) -> bool {
        let window = self.config.divergence_window;
        if window == 0 || self.entropy_history.len() < window {
            return false;
        }
        let high = self.entropy_history[self.entropy_history.len() - window..]
            .iter()
            .all(|e| *e > self.config.divergence_entropy);
        let quiet = self
            .last_new_crux_round
            .map_or(true, |r| r as u64 + window as u64 <= round as u64);
        high && quiet
    }
}

/// Entropy, pairwise distance and dominance over the given latest stances.
pub fn claim_metrics(claim_id: &str, latest: &[&AgentStance]) -> ClaimMetrics {
    let mass = |stance: Stance| -> f64 {
        latest
            .iter()
            .filter(|s| s.stance == stance)
            .map(|s| s.confidence)
            .sum()
    };
    let (pro, con, uncertain) = (mass(Stance::Pro), mass(Stance::Con), mass(Stance::Uncertain));
    let total = pro + con + uncertain;

    let (entropy, dominance) = if total <= 0.0 {
        (1.0, 0.0)
    } else {
        let h: f64 = [pro, con, uncertain]
            .iter()
            .filter(|m| **m > 0.0)
            .map(|m| {
                let p = m / total;
                -p * p.ln()
            })
            .sum();
        ((h / 3f64.ln()).clamp(0.0, 1.0), pro.max(con) / total)
    };

    ClaimMetrics {
        claim_id: claim_id.to_string(),
        entropy,
        confidence_weighted_distance: pairwise_distance(latest),
        dominance,
    }
}

fn pairwise_distance(latest: &[&AgentStance]) -> f64 {
    if latest.len() < 2 {
        return 0.0;
    }
    let values: Vec<f64> = latest
        .iter()
        .map(|s| s.stance.scalar() * s.confidence)
        .collect();
    let mut sum = 0.0;
    let mut pairs = 0usize;
    for i in 0..values.len() {
        for j in (i + 1)..values.len() {
            sum += (values[i] - values[j]).abs();
            pairs += 1;
        }
    }
    sum / pairs as f64
}
