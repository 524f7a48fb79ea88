//! Persistent pairwise disagreement tracking and crux-room eligibility.
//!
//! A detection window may flag one persona pair. Pairs flagged in enough
//! consecutive windows with high confidence become eligible for a crux room,
//! subject to a per-pair cooldown after each spawn.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Unordered pair of persona ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey(String, String);

impl PairKey {
    pub fn new(a: &str, b: &str) -> Self {
        if a <= b {
            Self(a.to_string(), b.to_string())
        } else {
            Self(b.to_string(), a.to_string())
        }
    }

    pub fn first(&self) -> &str {
        &self.0
    }

    pub fn second(&self) -> &str {
        &self.1
    }

    pub fn contains(&self, persona_id: &str) -> bool {
        self.0 == persona_id || self.1 == persona_id
    }
}

impl std::fmt::Display for PairKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}|{}", self.0, self.1)
    }
}

/// Output of the disagreement-detection collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisagreementDetection {
    pub personas: [String; 2],
    pub topic: String,
    pub confidence: f64,
}

impl DisagreementDetection {
    pub fn pair(&self) -> PairKey {
        PairKey::new(&self.personas[0], &self.personas[1])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub min_consecutive_windows: u32,
    pub min_confidence: f64,
    pub cooldown_secs: i64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            min_consecutive_windows: 2,
            min_confidence: 0.8,
            cooldown_secs: 300,
        }
    }
}

/// Accumulated evidence for one pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub pair: PairKey,
    pub topic: String,
    pub consecutive_windows: u32,
    pub confidence: f64,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct DisagreementRegistry {
    config: RegistryConfig,
    candidates: HashMap<PairKey, CandidateRecord>,
    last_spawn: HashMap<PairKey, DateTime<Utc>>,
}

impl DisagreementRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            candidates: HashMap::new(),
            last_spawn: HashMap::new(),
        }
    }

    pub fn candidate(&self, pair: &PairKey) -> Option<&CandidateRecord> {
        self.candidates.get(pair)
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Record a detection for `pair` and report spawn eligibility.
    pub fn update(
        &mut self,
        pair: &PairKey,
        topic: &str,
        confidence: f64,
        active_rooms: &BTreeSet<PairKey>,
    ) -> bool {
        self.update_at(pair, topic, confidence, active_rooms, Utc::now())
    }

    pub fn update_at(
        &mut self,
        pair: &PairKey,
        topic: &str,
        confidence: f64,
        active_rooms: &BTreeSet<PairKey>,
        now: DateTime<Utc>,
    ) -> bool {
        let record = self
            .candidates
            .entry(pair.clone())
            .and_modify(|r| {
                r.consecutive_windows += 1;
                r.topic = topic.to_string();
                r.confidence = confidence;
                r.last_seen_at = now;
            })
            .or_insert_with(|| CandidateRecord {
                pair: pair.clone(),
                topic: topic.to_string(),
                consecutive_windows: 1,
                confidence,
                first_seen_at: now,
                last_seen_at: now,
            });

        let windows = record.consecutive_windows;
        let cooled = self
            .last_spawn
            .get(pair)
            .map_or(true, |t| now - *t >= Duration::seconds(self.config.cooldown_secs));
        let eligible = windows >= self.config.min_consecutive_windows
            && confidence >= self.config.min_confidence
            && !active_rooms.contains(pair)
            && cooled;

        debug!(%pair, windows, confidence, eligible, "disagreement recorded");
        eligible
    }

    /// The latest window did not flag `pair`.
    pub fn decay(&mut self, pair: &PairKey) {
        if let Some(record) = self.candidates.get_mut(pair) {
            if record.consecutive_windows <= 1 {
                self.candidates.remove(pair);
                debug!(%pair, "disagreement candidate dropped");
            } else {
                record.consecutive_windows -= 1;
            }
        }
    }

    /// Decay every tracked pair except `flagged`.
    pub fn decay_others(&mut self, flagged: Option<&PairKey>) {
        let pairs: Vec<PairKey> = self
            .candidates
            .keys()
            .filter(|p| Some(*p) != flagged)
            .cloned()
            .collect();
        for pair in pairs {
            self.decay(&pair);
        }
    }

    pub fn record_spawn(&mut self, pair: &PairKey) {
        self.record_spawn_at(pair, Utc::now());
    }

    pub fn record_spawn_at(&mut self, pair: &PairKey, now: DateTime<Utc>) {
        self.candidates.remove(pair);
        self.last_spawn.insert(pair.clone(), now);
        info!(%pair, "crux room spawned, cooldown started");
    }

    pub fn last_spawn(&self, pair: &PairKey) -> Option<DateTime<Utc>> {
        self.last_spawn.get(pair).copied()
    }
}
