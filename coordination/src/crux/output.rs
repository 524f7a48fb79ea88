//! Structured debate output: the schema consumed by downstream readers.

use serde::{Deserialize, Serialize};

use super::extractor::settling_question;
use crate::blackboard::{BlackboardState, Stance};
use crate::crux_room::CruxCard;

/// Final structured result of a debate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebateOutput {
    #[serde(default)]
    pub cruxes: Vec<OutputCrux>,
    #[serde(default)]
    pub fault_lines: Vec<FaultLine>,
    #[serde(default)]
    pub flip_conditions: Vec<OutputFlipCondition>,
    #[serde(default)]
    pub evidence_ledger: Vec<EvidenceLedgerEntry>,
    #[serde(default)]
    pub resolution_paths: Vec<String>,
}

impl DebateOutput {
    pub fn is_empty(&self) -> bool {
        self.cruxes.is_empty()
            && self.fault_lines.is_empty()
            && self.flip_conditions.is_empty()
            && self.evidence_ledger.is_empty()
            && self.resolution_paths.is_empty()
    }

    /// Local projection used when no extraction service answers: open
    /// cruxes, disputes as fault lines, and the flip conditions on record.
    pub fn from_blackboard(board: &BlackboardState) -> Self {
        let mut cruxes: Vec<OutputCrux> = board
            .unresolved_cruxes()
            .map(|c| OutputCrux {
                proposition: c.proposition.clone(),
                weight: c.weight,
                settling_question: Some(settling_question(&c.proposition)),
                dependent_arguments: Vec::new(),
            })
            .collect();
        cruxes.sort_by(|a, b| b.weight.total_cmp(&a.weight));

        let fault_lines = board
            .disputes
            .iter()
            .map(|dispute| {
                let text = board
                    .claim(&dispute.claim_id)
                    .map(|c| c.text.as_str())
                    .unwrap_or(dispute.claim_id.as_str());
                let side = |stance: Stance| -> Vec<&str> {
                    dispute
                        .sides
                        .iter()
                        .filter(|s| s.stance == stance)
                        .map(|s| s.persona_id.as_str())
                        .collect()
                };
                FaultLine {
                    description: format!(
                        "{}: pro [{}] vs con [{}] vs uncertain [{}]",
                        text,
                        side(Stance::Pro).join(", "),
                        side(Stance::Con).join(", "),
                        side(Stance::Uncertain).join(", ")
                    ),
                    personas: dispute.sides.iter().map(|s| s.persona_id.clone()).collect(),
                    argument_ids: Vec::new(),
                }
            })
            .collect();

        let flip_conditions = board
            .flip_conditions
            .iter()
            .map(|f| OutputFlipCondition {
                persona_id: f.persona_id.clone(),
                claim: board
                    .claim(&f.claim_id)
                    .map(|c| c.text.clone())
                    .unwrap_or_else(|| f.claim_id.clone()),
                condition: f.condition.clone(),
                triggered: f.triggered,
            })
            .collect();

        let resolution_paths = cruxes
            .iter()
            .filter_map(|c| c.settling_question.clone())
            .collect();

        Self {
            cruxes,
            fault_lines,
            flip_conditions,
            evidence_ledger: Vec::new(),
            resolution_paths,
        }
    }

    /// Fold crux-room cards in: each card's crux becomes a crux unless one
    /// with the same text exists, and its settling question a resolution path.
    pub fn merge_cards(&mut self, cards: &[CruxCard]) {
        for card in cards {
            let known = self
                .cruxes
                .iter()
                .any(|c| c.proposition.trim().eq_ignore_ascii_case(card.crux.trim()));
            if !known {
                self.cruxes.push(OutputCrux {
                    proposition: card.crux.clone(),
                    weight: if card.degraded { 0.5 } else { 0.8 },
                    settling_question: card.settling_question.clone(),
                    dependent_arguments: Vec::new(),
                });
            }
            if let Some(question) = &card.settling_question {
                if !self.resolution_paths.contains(question) {
                    self.resolution_paths.push(question.clone());
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputCrux {
    pub proposition: String,
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settling_question: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependent_arguments: Vec<String>,
}

/// A deep, assumption-level split between groups of personas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaultLine {
    pub description: String,
    #[serde(default)]
    pub personas: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub argument_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputFlipCondition {
    pub persona_id: String,
    pub claim: String,
    pub condition: String,
    #[serde(default)]
    pub triggered: bool,
}

/// Evidence a persona offered, split by whether it survived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceLedgerEntry {
    pub persona_id: String,
    #[serde(default)]
    pub accepted: Vec<String>,
    #[serde(default)]
    pub rejected: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_uses_camel_case_keys() {
        let output = DebateOutput {
            fault_lines: vec![FaultLine {
                description: "growth vs stability".into(),
                personas: vec!["hawk".into()],
                argument_ids: vec![],
            }],
            resolution_paths: vec!["What evidence would confirm or refute that x?".into()],
            ..Default::default()
        };
        let value = serde_json::to_value(&output).unwrap();
        assert!(value.get("faultLines").is_some());
        assert!(value.get("resolutionPaths").is_some());
        assert!(value["faultLines"][0].get("argumentIds").is_none());
    }

    #[test]
    fn test_from_blackboard_projection() {
        use crate::blackboard::{Claim, TurnResult};

        let board = BlackboardState::create(
            "Rent control",
            vec![Claim {
                id: "c1".into(),
                text: "Rent control lowers rents".into(),
                debate_id: "d".into(),
            }],
        )
        .update(
            &TurnResult::new("alice", 1)
                .with_stance("c1", Stance::Pro, 0.8)
                .with_crux("Supply is elastic."),
        )
        .update(
            &TurnResult::new("bob", 1)
                .with_stance("c1", Stance::Con, 0.6)
                .with_flip_trigger("a natural experiment"),
        );

        let output = DebateOutput::from_blackboard(&board);
        assert_eq!(output.cruxes.len(), 1);
        assert_eq!(
            output.resolution_paths,
            vec!["What evidence would confirm or refute that Supply is elastic?".to_string()]
        );
        assert_eq!(output.fault_lines.len(), 1);
        assert_eq!(
            output.fault_lines[0].description,
            "Rent control lowers rents: pro [alice] vs con [bob] vs uncertain []"
        );
        assert_eq!(output.flip_conditions[0].claim, "Rent control lowers rents");
        assert!(output.evidence_ledger.is_empty());
    }

    #[test]
    fn test_merge_cards_dedups() {
        use crate::crux_room::DisagreementKind;

        let mut output = DebateOutput {
            cruxes: vec![OutputCrux {
                proposition: "Supply is elastic".into(),
                weight: 0.6,
                settling_question: None,
                dependent_arguments: vec![],
            }],
            ..Default::default()
        };
        let card = |crux: &str| CruxCard {
            topic: "t".into(),
            personas: ["a".into(), "b".into()],
            crux: crux.into(),
            positions: vec![],
            disagreement_kind: DisagreementKind::Empirical,
            resolvable: true,
            settling_question: Some(format!("Is it true that {}?", crux)),
            degraded: false,
        };
        output.merge_cards(&[card("supply is ELASTIC"), card("Landlords exit")]);
        assert_eq!(output.cruxes.len(), 2);
        assert_eq!(output.cruxes[1].weight, 0.8);
        assert_eq!(output.resolution_paths.len(), 2);
    }

    #[test]
    fn test_missing_sections_default_to_empty() {
        let parsed: DebateOutput = serde_json::from_str(r#"{"cruxes": []}"#).unwrap();
        assert!(parsed.is_empty());
    }
}
