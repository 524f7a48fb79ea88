//! Blackboard value types.

use serde::{Deserialize, Serialize};

/// Position of a persona on a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    Pro,
    Con,
    Uncertain,
}

impl Stance {
    pub const ALL: [Stance; 3] = [Stance::Pro, Stance::Con, Stance::Uncertain];

    /// Position on the pro/con axis: pro = 1, uncertain = 0.5, con = 0.
    pub fn scalar(self) -> f64 {
        match self {
            Self::Pro => 1.0,
            Self::Uncertain => 0.5,
            Self::Con => 0.0,
        }
    }
}

impl std::fmt::Display for Stance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pro => write!(f, "pro"),
            Self::Con => write!(f, "con"),
            Self::Uncertain => write!(f, "uncertain"),
        }
    }
}

impl std::str::FromStr for Stance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pro" | "for" | "support" => Ok(Self::Pro),
            "con" | "against" | "oppose" => Ok(Self::Con),
            "uncertain" | "neutral" | "unsure" => Ok(Self::Uncertain),
            other => Err(format!("unknown stance '{}'", other)),
        }
    }
}

/// A sub-claim of the debate topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub id: String,
    pub text: String,
    pub debate_id: String,
}

/// One row of the append-only stance log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStance {
    pub persona_id: String,
    pub claim_id: String,
    pub stance: Stance,
    pub confidence: f64,
    pub round: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisputeSide {
    pub persona_id: String,
    pub stance: Stance,
    pub confidence: f64,
}

/// A claim on which current stances differ. Derived from the stance log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dispute {
    pub claim_id: String,
    pub sides: Vec<DisputeSide>,
}

/// A contested proposition. Identity is the case-insensitive text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crux {
    pub id: String,
    pub proposition: String,
    pub weight: f64,
    pub resolved: bool,
    #[serde(default)]
    pub surfaced_by_tables: Vec<u32>,
}

impl Crux {
    pub fn matches(&self, proposition: &str) -> bool {
        self.proposition.trim().to_lowercase() == proposition.trim().to_lowercase()
    }
}

/// A condition under which a persona would change position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlipCondition {
    pub persona_id: String,
    pub condition: String,
    pub claim_id: String,
    pub triggered: bool,
}

/// A stance declaration inside a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StanceUpdate {
    pub claim_id: String,
    pub stance: Stance,
    pub confidence: f64,
}

/// Structured output of one agent turn, folded into the blackboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnResult {
    pub persona_id: String,
    pub round: u32,
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub stances: Vec<StanceUpdate>,
    #[serde(default)]
    pub new_cruxes: Vec<String>,
    #[serde(default)]
    pub flip_triggers: Vec<String>,
    /// Crux propositions this persona considers settled.
    #[serde(default)]
    pub resolved_cruxes: Vec<String>,
}

impl TurnResult {
    pub fn new(persona_id: &str, round: u32) -> Self {
        Self {
            persona_id: persona_id.to_string(),
            round,
            response: String::new(),
            stances: Vec::new(),
            new_cruxes: Vec::new(),
            flip_triggers: Vec::new(),
            resolved_cruxes: Vec::new(),
        }
    }

    pub fn with_stance(mut self, claim_id: &str, stance: Stance, confidence: f64) -> Self {
        self.stances.push(StanceUpdate {
            claim_id: claim_id.to_string(),
            stance,
            confidence,
        });
        self
    }

    pub fn with_crux(mut self, proposition: &str) -> Self {
        self.new_cruxes.push(proposition.to_string());
        self
    }

    pub fn with_flip_trigger(mut self, condition: &str) -> Self {
        self.flip_triggers.push(condition.to_string());
        self
    }

    pub fn with_response(mut self, response: &str) -> Self {
        self.response = response.to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stance_scalar() {
        assert_eq!(Stance::Pro.scalar(), 1.0);
        assert_eq!(Stance::Uncertain.scalar(), 0.5);
        assert_eq!(Stance::Con.scalar(), 0.0);
    }

    #[test]
    fn test_stance_parse_synonyms() {
        assert_eq!("Against".parse::<Stance>().unwrap(), Stance::Con);
        assert_eq!(" neutral ".parse::<Stance>().unwrap(), Stance::Uncertain);
        assert!("maybe".parse::<Stance>().is_err());
    }

    #[test]
    fn test_crux_matches_case_insensitive() {
        let crux = Crux {
            id: "crux-1".into(),
            proposition: "Rents follow supply".into(),
            weight: 0.5,
            resolved: false,
            surfaced_by_tables: vec![0],
        };
        assert!(crux.matches("  rents FOLLOW supply "));
        assert!(!crux.matches("rents follow demand"));
    }

    #[test]
    fn test_turn_result_defaults_from_json() {
        let turn: TurnResult =
            serde_json::from_str(r#"{"persona_id": "a", "round": 3}"#).unwrap();
        assert!(turn.stances.is_empty());
        assert!(turn.resolved_cruxes.is_empty());
    }
}
