//! Arguments, attacks, validations and labels.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Identifier of an argument within one debate.
pub type ArgumentId = String;

/// A structured argument put forward by one persona.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    pub id: ArgumentId,
    pub speaker_id: String,
    pub claim: String,
    #[serde(default)]
    pub premises: Vec<String>,
    #[serde(default)]
    pub assumptions: Vec<String>,
    #[serde(default)]
    pub evidence: Vec<String>,
    pub round: u32,
}

/// How an attack engages its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackType {
    /// Contradicts the conclusion.
    Rebut,
    /// Contradicts a premise or assumption.
    Undermine,
    /// Denies that the premises support the conclusion.
    Undercut,
}

impl std::fmt::Display for AttackType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rebut => write!(f, "rebut"),
            Self::Undermine => write!(f, "undermine"),
            Self::Undercut => write!(f, "undercut"),
        }
    }
}

/// Which part of the target argument is attacked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetComponent {
    Claim,
    Premise,
    Assumption,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackTarget {
    pub component: TargetComponent,
    /// Index into the premise/assumption list; 0 for the claim.
    #[serde(default)]
    pub index: usize,
}

/// A directed attack from one argument onto another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attack {
    pub id: String,
    pub from_arg_id: ArgumentId,
    pub to_arg_id: ArgumentId,
    #[serde(rename = "type")]
    pub attack_type: AttackType,
    pub target: AttackTarget,
    pub counter_proposition: String,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub evidence: Vec<String>,
    pub confidence: f64,
    pub speaker_id: String,
    pub round: u32,
}

/// Verdict of the batch validator on a single attack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub attack_id: String,
    pub valid: bool,
    pub attack_strength: f64,
    #[serde(default)]
    pub corrections: Option<String>,
}

impl ValidationResult {
    /// Strength assigned when the validator is unavailable.
    pub const DEFAULT_STRENGTH: f64 = 0.5;

    /// Accept an attack with medium strength (degraded validation).
    pub fn assumed_valid(attack_id: &str) -> Self {
        Self {
            attack_id: attack_id.to_string(),
            valid: true,
            attack_strength: Self::DEFAULT_STRENGTH,
            corrections: None,
        }
    }
}

/// Acceptance status of an argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Label {
    In,
    Out,
    Undec,
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::In => write!(f, "IN"),
            Self::Out => write!(f, "OUT"),
            Self::Undec => write!(f, "UNDEC"),
        }
    }
}

/// Assignment of a label to every argument. Produced fresh by each
/// computation; never edited afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Labelling(BTreeMap<ArgumentId, Label>);

impl Labelling {
    pub(crate) fn from_map(map: BTreeMap<ArgumentId, Label>) -> Self {
        Self(map)
    }

    pub fn get(&self, id: &str) -> Option<Label> {
        self.0.get(id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ArgumentId, &Label)> {
        self.0.iter()
    }

    /// Ids carrying `label`, in id order.
    pub fn with_label(&self, label: Label) -> Vec<ArgumentId> {
        self.0
            .iter()
            .filter(|(_, l)| **l == label)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
