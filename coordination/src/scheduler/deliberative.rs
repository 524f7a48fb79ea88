//! Deliberative urgency scoring for sequential debates.
//!
//! Each persona proposes an action for the next turn; the most urgent
//! speak/interrupt wins. Repeated all-listen turns end the debate.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Consecutive all-listen turns before the debate is terminated.
pub const SILENCE_LIMIT: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlannedAction {
    Speak,
    Interrupt,
    Listen,
}

impl std::fmt::Display for PlannedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Speak => write!(f, "speak"),
            Self::Interrupt => write!(f, "interrupt"),
            Self::Listen => write!(f, "listen"),
        }
    }
}

/// One persona's proposal for the next turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPlan {
    pub persona_id: String,
    pub action: PlannedAction,
    /// In [0, 1].
    pub urgency: f64,
    #[serde(default)]
    pub intent: String,
}

/// Outcome of one scheduling step.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnDecision {
    Speak(ActionPlan),
    /// Nobody wants the floor this turn.
    Silent { consecutive: u32 },
    /// Silence limit reached.
    Terminate,
}

#[derive(Debug, Clone)]
pub struct DeliberativeScheduler {
    silence_limit: u32,
    silent_turns: u32,
}

impl Default for DeliberativeScheduler {
    fn default() -> Self {
        Self::new(SILENCE_LIMIT)
    }
}

impl DeliberativeScheduler {
    pub fn new(silence_limit: u32) -> Self {
        Self {
            silence_limit,
            silent_turns: 0,
        }
    }

    pub fn silent_turns(&self) -> u32 {
        self.silent_turns
    }

    /// Pick the next speaker from `plans`, given in roster order.
    ///
    /// Highest urgency wins; on equal urgency an interrupt beats a speak,
    /// then roster order decides.
    pub fn decide(&mut self, plans: &[ActionPlan]) -> TurnDecision {
        let mut best: Option<&ActionPlan> = None;
        for plan in plans.iter().filter(|p| p.action != PlannedAction::Listen) {
            best = match best {
                None => Some(plan),
                Some(current) if outranks(plan, current) => Some(plan),
                keep => keep,
            };
        }

        match best {
            Some(plan) => {
                self.silent_turns = 0;
                debug!(
                    persona = %plan.persona_id,
                    action = %plan.action,
                    urgency = plan.urgency,
                    "deliberative speaker chosen"
                );
                TurnDecision::Speak(plan.clone())
            }
            None => {
                self.silent_turns += 1;
                if self.silent_turns >= self.silence_limit {
                    TurnDecision::Terminate
                } else {
                    TurnDecision::Silent {
                        consecutive: self.silent_turns,
                    }
                }
            }
        }
    }
}

fn outranks(candidate: &ActionPlan, current: &ActionPlan) -> bool {
    match candidate.urgency.total_cmp(&current.urgency) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => {
            candidate.action == PlannedAction::Interrupt && current.action == PlannedAction::Speak
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(id: &str, action: PlannedAction, urgency: f64) -> ActionPlan {
        ActionPlan {
            persona_id: id.into(),
            action,
            urgency,
            intent: String::new(),
        }
    }

    #[test]
    fn test_max_urgency_wins() {
        let mut sched = DeliberativeScheduler::default();
        let decision = sched.decide(&[
            plan("a", PlannedAction::Speak, 0.4),
            plan("b", PlannedAction::Speak, 0.9),
            plan("c", PlannedAction::Listen, 1.0),
        ]);
        assert!(matches!(decision, TurnDecision::Speak(p) if p.persona_id == "b"));
    }

    #[test]
    fn test_interrupt_wins_ties() {
        let mut sched = DeliberativeScheduler::default();
        let decision = sched.decide(&[
            plan("a", PlannedAction::Speak, 0.7),
            plan("b", PlannedAction::Interrupt, 0.7),
            plan("c", PlannedAction::Speak, 0.7),
        ]);
        assert!(matches!(decision, TurnDecision::Speak(p) if p.persona_id == "b"));
    }

    #[test]
    fn test_roster_order_breaks_remaining_ties() {
        let mut sched = DeliberativeScheduler::default();
        let decision = sched.decide(&[
            plan("a", PlannedAction::Speak, 0.5),
            plan("b", PlannedAction::Speak, 0.5),
        ]);
        assert!(matches!(decision, TurnDecision::Speak(p) if p.persona_id == "a"));
    }

    #[test]
    fn test_silence_break_after_three_turns() {
        let mut sched = DeliberativeScheduler::default();
        let listening = [plan("a", PlannedAction::Listen, 0.9)];
        assert_eq!(sched.decide(&listening), TurnDecision::Silent { consecutive: 1 });
        assert_eq!(sched.decide(&listening), TurnDecision::Silent { consecutive: 2 });
        assert_eq!(sched.decide(&listening), TurnDecision::Terminate);
    }

    #[test]
    fn test_speech_resets_silence() {
        let mut sched = DeliberativeScheduler::default();
        sched.decide(&[plan("a", PlannedAction::Listen, 0.1)]);
        sched.decide(&[plan("a", PlannedAction::Listen, 0.1)]);
        sched.decide(&[plan("a", PlannedAction::Speak, 0.1)]);
        assert_eq!(sched.silent_turns(), 0);
        assert_eq!(
            sched.decide(&[]),
            TurnDecision::Silent { consecutive: 1 }
        );
    }
}
