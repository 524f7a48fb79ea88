//! Debate configuration.

use serde::{Deserialize, Serialize};

use crate::convergence::ConvergenceConfig;
use crate::crux_room::CruxRoomConfig;
use crate::disagreement::RegistryConfig;
use crate::error::ConfigError;
use crate::resilience::RetryPolicy;

/// How turns are allocated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebateMode {
    /// Every persona answers each round in parallel.
    #[default]
    Rounds,
    /// One speaker per turn, chosen by reactive scoring.
    FreeForm,
    /// One speaker per turn, chosen from concurrent action plans.
    Sequential,
}

impl std::fmt::Display for DebateMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rounds => write!(f, "rounds"),
            Self::FreeForm => write!(f, "free_form"),
            Self::Sequential => write!(f, "sequential"),
        }
    }
}

impl std::str::FromStr for DebateMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "rounds" | "parallel" => Ok(Self::Rounds),
            "free_form" | "freeform" | "reactive" => Ok(Self::FreeForm),
            "sequential" | "classical" | "deliberative" => Ok(Self::Sequential),
            other => Err(ConfigError::invalid("mode", format!("unknown mode '{}'", other))),
        }
    }
}

/// Argument-graph rounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub enabled: bool,
    /// Attack/validation rounds after the opening argument round.
    pub max_attack_rounds: u32,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_attack_rounds: 3,
        }
    }
}

/// Top-level debate settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebateConfig {
    pub mode: DebateMode,
    /// Round cap in `Rounds` mode.
    pub max_rounds: u32,
    /// Turn cap in the turn-based modes.
    pub max_turns: u32,
    pub graph: GraphConfig,
    pub convergence: ConvergenceConfig,
    pub registry: RegistryConfig,
    pub crux_room: CruxRoomConfig,
    pub retry: RetryPolicy,
    /// Messages handed to the disagreement detector.
    pub detection_window: usize,
    /// Messages of recent transcript included in each prompt.
    pub transcript_window: usize,
    pub summary_token_budget: usize,
    /// Seed for scheduler jitter; random when unset.
    pub seed: Option<u64>,
}

impl Default for DebateConfig {
    fn default() -> Self {
        Self {
            mode: DebateMode::Rounds,
            max_rounds: 5,
            max_turns: 24,
            graph: GraphConfig::default(),
            convergence: ConvergenceConfig::default(),
            registry: RegistryConfig::default(),
            crux_room: CruxRoomConfig::default(),
            retry: RetryPolicy::default(),
            detection_window: 8,
            transcript_window: 6,
            summary_token_budget: 800,
            seed: None,
        }
    }
}

impl DebateConfig {
    pub fn with_mode(mut self, mode: DebateMode) -> Self {
        self.mode = mode;
        self
    }

    /// Reject settings that would make a run meaningless or unbounded.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn unit(field: &str, value: f64) -> Result<(), ConfigError> {
            if value.is_finite() && value > 0.0 && value <= 1.0 {
                Ok(())
            } else {
                Err(ConfigError::invalid(field, format!("{} not in (0, 1]", value)))
            }
        }
        fn positive(field: &str, value: u64) -> Result<(), ConfigError> {
            if value == 0 {
                Err(ConfigError::invalid(field, "must be at least 1"))
            } else {
                Ok(())
            }
        }

        positive("max_rounds", self.max_rounds as u64)?;
        positive("max_turns", self.max_turns as u64)?;
        unit("convergence.threshold", self.convergence.threshold)?;
        unit("convergence.divergence_entropy", self.convergence.divergence_entropy)?;
        positive("convergence.divergence_window", self.convergence.divergence_window as u64)?;
        positive("convergence.max_events", self.convergence.max_events as u64)?;
        positive(
            "registry.min_consecutive_windows",
            self.registry.min_consecutive_windows as u64,
        )?;
        unit("registry.min_confidence", self.registry.min_confidence)?;
        if self.registry.cooldown_secs < 0 {
            return Err(ConfigError::invalid("registry.cooldown_secs", "must not be negative"));
        }
        if self.crux_room.max_turns < 2 {
            return Err(ConfigError::invalid(
                "crux_room.max_turns",
                "both personas need a turn",
            ));
        }
        positive("retry.max_attempts", self.retry.max_attempts as u64)?;
        if self.detection_window < 2 {
            return Err(ConfigError::invalid("detection_window", "must be at least 2"));
        }
        positive("summary_token_budget", self.summary_token_budget as u64)?;
        Ok(())
    }
}
