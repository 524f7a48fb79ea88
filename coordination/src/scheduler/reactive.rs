//! Reactive priority scoring for free-form debates.
//!
//! After each message every other persona is scored additively; the highest
//! score speaks next. The reason label follows a fixed precedence
//! (address, then domain, then question) even though all bonuses add up.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::persona::PersonaProfile;
use crate::transcript::{recent_window, TranscriptMessage};

pub const ADDRESS_BONUS: f64 = 10.0;
pub const DOMAIN_BONUS: f64 = 7.0;
pub const QUESTION_BONUS: f64 = 3.0;
pub const RECENCY_PENALTY: f64 = 5.0;
pub const RECENCY_WINDOW: usize = 3;
pub const SILENCE_BONUS_PER_TURN: f64 = 2.0;
pub const SILENCE_BONUS_CAP: f64 = 8.0;
pub const JITTER_MAX: f64 = 3.0;

/// Why a persona is being called on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpeakerReason {
    /// Addressed by name or alias.
    Objection,
    /// The message touches the persona's domain.
    Evidence,
    /// The message asks a question.
    Challenge,
    Counter,
}

impl std::fmt::Display for SpeakerReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Objection => write!(f, "OBJECTION"),
            Self::Evidence => write!(f, "EVIDENCE"),
            Self::Challenge => write!(f, "CHALLENGE"),
            Self::Counter => write!(f, "COUNTER"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerCandidate {
    pub persona_id: String,
    pub score: f64,
    pub reason: SpeakerReason,
}

/// Additive scorer with seeded or thread-local jitter.
#[derive(Debug)]
pub struct ReactiveScheduler<R> {
    rng: R,
    jitter: f64,
}

impl<R: Rng> ReactiveScheduler<R> {
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            jitter: JITTER_MAX,
        }
    }

    /// Scheduler without jitter, for reproducible orderings.
    pub fn without_jitter(rng: R) -> Self {
        Self { rng, jitter: 0.0 }
    }

    /// Score every persona except the author of `last`, best first.
    ///
    /// `history` is the full transcript, `last` included.
    pub fn rank(
        &mut self,
        personas: &[PersonaProfile],
        last: &TranscriptMessage,
        history: &[TranscriptMessage],
    ) -> Vec<SpeakerCandidate> {
        let text = last.text.to_lowercase();
        let is_question = last.text.trim_end().ends_with('?');
        let recent = recent_window(history, RECENCY_WINDOW);

        let mut candidates: Vec<SpeakerCandidate> = personas
            .iter()
            .filter(|p| p.id != last.persona_id)
            .map(|persona| {
                let addressed = persona
                    .address_terms()
                    .iter()
                    .any(|term| text.contains(term.as_str()));
                let in_domain = persona
                    .domain_keywords
                    .iter()
                    .map(|k| k.trim().to_lowercase())
                    .any(|k| !k.is_empty() && text.contains(k.as_str()));

                let mut score = 0.0;
                let mut reason = SpeakerReason::Counter;
                if addressed {
                    score += ADDRESS_BONUS;
                    reason = SpeakerReason::Objection;
                }
                if in_domain {
                    score += DOMAIN_BONUS;
                    if reason == SpeakerReason::Counter {
                        reason = SpeakerReason::Evidence;
                    }
                }
                if is_question {
                    score += QUESTION_BONUS;
                    if reason == SpeakerReason::Counter {
                        reason = SpeakerReason::Challenge;
                    }
                }

                let appearances = recent.iter().filter(|m| m.persona_id == persona.id).count();
                score -= RECENCY_PENALTY * appearances as f64;

                let silence = history
                    .iter()
                    .rev()
                    .position(|m| m.persona_id == persona.id)
                    .unwrap_or(history.len());
                score += (SILENCE_BONUS_PER_TURN * silence as f64).min(SILENCE_BONUS_CAP);

                if self.jitter > 0.0 {
                    score += self.rng.random_range(0.0..self.jitter);
                }

                SpeakerCandidate {
                    persona_id: persona.id.clone(),
                    score,
                    reason,
                }
            })
            .collect();

        // Stable: equal scores keep roster order.
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        candidates
    }

    /// Top-ranked candidate, if any persona other than the last speaker exists.
    pub fn next_speaker(
        &mut self,
        personas: &[PersonaProfile],
        last: &TranscriptMessage,
        history: &[TranscriptMessage],
    ) -> Option<SpeakerCandidate> {
        self.rank(personas, last, history).into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn roster() -> Vec<PersonaProfile> {
        vec![
            PersonaProfile::new("econ", "Ada").with_keywords(&["inflation", "rates"]),
            PersonaProfile::new("eng", "Brook").with_aliases(&["the engineer"]),
            PersonaProfile::new("phil", "Cato"),
        ]
    }

    fn scheduler() -> ReactiveScheduler<StdRng> {
        ReactiveScheduler::without_jitter(StdRng::seed_from_u64(7))
    }

    fn msg(persona: &str, text: &str) -> TranscriptMessage {
        TranscriptMessage::new(persona, text, 1)
    }

    #[test]
    fn test_last_speaker_excluded() {
        let last = msg("econ", "Rates matter.");
        let ranked = scheduler().rank(&roster(), &last, &[last.clone()]);
        assert_eq!(ranked.len(), 2);
        assert!(ranked.iter().all(|c| c.persona_id != "econ"));
    }

    #[test]
    fn test_address_takes_precedence_in_reason() {
        let history = vec![msg("phil", "Ada, what about inflation?")];
        let ranked = scheduler().rank(&roster(), &history[0], &history);
        let econ = ranked.iter().find(|c| c.persona_id == "econ").unwrap();
        assert_eq!(econ.reason, SpeakerReason::Objection);
        // 10 + 7 + 3 + silence min(8, 2 * 1)
        assert_eq!(econ.score, 22.0);
        assert_eq!(ranked[0].persona_id, "econ");
    }

    #[test]
    fn test_domain_then_question_reasons() {
        let history = vec![msg("phil", "Why would inflation fall?")];
        let ranked = scheduler().rank(&roster(), &history[0], &history);
        let econ = ranked.iter().find(|c| c.persona_id == "econ").unwrap();
        let eng = ranked.iter().find(|c| c.persona_id == "eng").unwrap();
        assert_eq!(econ.reason, SpeakerReason::Evidence);
        assert_eq!(eng.reason, SpeakerReason::Challenge);
    }

    #[test]
    fn test_default_reason_is_counter() {
        let history = vec![msg("phil", "I disagree.")];
        let ranked = scheduler().rank(&roster(), &history[0], &history);
        assert!(ranked.iter().all(|c| c.reason == SpeakerReason::Counter));
    }

    #[test]
    fn test_alias_addresses() {
        let history = vec![msg("phil", "Over to the engineer.")];
        let ranked = scheduler().rank(&roster(), &history[0], &history);
        assert_eq!(ranked[0].persona_id, "eng");
        assert_eq!(ranked[0].reason, SpeakerReason::Objection);
    }

    #[test]
    fn test_recency_penalty_and_silence_bonus() {
        let history = vec![
            msg("eng", "one"),
            msg("econ", "two"),
            msg("eng", "three"),
            msg("phil", "four"),
        ];
        let ranked = scheduler().rank(&roster(), &history[3], &history);
        let econ = ranked.iter().find(|c| c.persona_id == "econ").unwrap();
        let eng = ranked.iter().find(|c| c.persona_id == "eng").unwrap();
        // econ: one appearance in last 3 (-5), silent for 2 turns (+4)
        assert_eq!(econ.score, -1.0);
        // eng: one appearance in last 3 (-5), silent for 1 turn (+2)
        assert_eq!(eng.score, -3.0);
        assert_eq!(ranked[0].persona_id, "econ");
    }

    #[test]
    fn test_silence_bonus_capped() {
        let mut history: Vec<_> = (0..10)
            .map(|i| msg(if i % 2 == 0 { "econ" } else { "phil" }, "x"))
            .collect();
        history.push(msg("phil", "x"));
        let ranked = scheduler().rank(&roster(), history.last().unwrap(), &history);
        let eng = ranked.iter().find(|c| c.persona_id == "eng").unwrap();
        assert_eq!(eng.score, SILENCE_BONUS_CAP);
    }

    #[test]
    fn test_jitter_bounded() {
        let history = vec![msg("phil", "plain")];
        let mut sched = ReactiveScheduler::new(StdRng::seed_from_u64(1));
        for _ in 0..50 {
            for c in sched.rank(&roster(), &history[0], &history) {
                // base score is the silence bonus of 2
                assert!(c.score >= 2.0 && c.score < 2.0 + JITTER_MAX);
            }
        }
    }

    #[test]
    fn test_single_persona_has_no_candidate() {
        let only = vec![PersonaProfile::new("a", "A")];
        let last = msg("a", "hello");
        assert!(scheduler().next_speaker(&only, &last, &[last.clone()]).is_none());
    }
}
