//! Crux extraction from argumentation extensions.
//!
//! Common ground is the grounded extension. Each preferred extension is a
//! camp. Arguments in exactly one of the first two camps are "disputed";
//! their assumptions are ranked to find the cruxes that separate the camps.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use super::output::{
    DebateOutput, EvidenceLedgerEntry, FaultLine, OutputCrux, OutputFlipCondition,
};
use crate::argumentation::{Argument, ArgumentId, ArgumentationGraph, Label, Labelling};

/// Ranked assumptions kept per analysis.
pub const MAX_CRUX_ASSUMPTIONS: usize = 3;

/// Arguments and speakers of one preferred extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camp {
    pub argument_ids: Vec<ArgumentId>,
    pub speakers: BTreeSet<String>,
}

/// An assumption on which disputed arguments depend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CruxAssumption {
    pub assumption: String,
    pub dependents: Vec<ArgumentId>,
    /// Summed attack degree of the disputed dependents. Arguments that only
    /// share the assumption text count toward `dependents`, not here.
    pub centrality: usize,
    pub settling_question: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CruxAnalysis {
    pub common_ground: Vec<ArgumentId>,
    pub camps: Vec<Camp>,
    pub symmetric_difference: Vec<ArgumentId>,
    pub crux_assumptions: Vec<CruxAssumption>,
    pub labelling: Labelling,
}

/// Dedup key for assumption text.
fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Turn an assumption into the question that would settle it.
pub fn settling_question(assumption: &str) -> String {
    let mut text = assumption.trim();
    if text
        .get(..5)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("that "))
    {
        text = text[5..].trim_start();
    }
    let text = text.strip_suffix('.').unwrap_or(text);
    format!("What evidence would confirm or refute that {}?", text)
}

pub struct CruxExtractor;

impl CruxExtractor {
    /// Analyse the current graph.
    pub fn analyze(graph: &ArgumentationGraph) -> CruxAnalysis {
        let framework = graph.framework();
        let labelling = framework.compute_labelling();
        let grounded: BTreeSet<ArgumentId> =
            labelling.with_label(Label::In).into_iter().collect();
        let preferred = framework.preferred_extensions();

        let in_graph_order = |set: &BTreeSet<ArgumentId>| -> Vec<ArgumentId> {
            graph
                .arguments()
                .iter()
                .filter(|a| set.contains(&a.id))
                .map(|a| a.id.clone())
                .collect()
        };

        let common_ground = in_graph_order(&grounded);

        let camps: Vec<Camp> = preferred
            .iter()
            .map(|extension| Camp {
                argument_ids: in_graph_order(extension),
                speakers: graph
                    .arguments()
                    .iter()
                    .filter(|a| extension.contains(&a.id))
                    .map(|a| a.speaker_id.clone())
                    .collect(),
            })
            .collect();

        let symmetric_difference = match (preferred.first(), preferred.get(1)) {
            (Some(first), Some(second)) => {
                let diff: BTreeSet<ArgumentId> =
                    first.symmetric_difference(second).cloned().collect();
                in_graph_order(&diff)
            }
            _ => Vec::new(),
        };

        let crux_assumptions = Self::rank_assumptions(graph, &symmetric_difference);

        CruxAnalysis {
            common_ground,
            camps,
            symmetric_difference,
            crux_assumptions,
            labelling,
        }
    }

    fn rank_assumptions(
        graph: &ArgumentationGraph,
        disputed: &[ArgumentId],
    ) -> Vec<CruxAssumption> {
        // key -> (display text, dependents), keys in first-seen order
        let mut order: Vec<String> = Vec::new();
        let mut entries: HashMap<String, (String, Vec<ArgumentId>)> = HashMap::new();

        let disputed_args: Vec<&Argument> = disputed
            .iter()
            .filter_map(|id| graph.argument(id))
            .collect();

        for argument in &disputed_args {
            for assumption in &argument.assumptions {
                let key = normalize(assumption);
                if key.is_empty() {
                    continue;
                }
                let entry = entries.entry(key.clone()).or_insert_with(|| {
                    order.push(key.clone());
                    (assumption.trim().to_string(), Vec::new())
                });
                if !entry.1.contains(&argument.id) {
                    entry.1.push(argument.id.clone());
                }
            }
        }

        for argument in graph.arguments() {
            if disputed.contains(&argument.id) {
                continue;
            }
            for assumption in &argument.assumptions {
                if let Some(entry) = entries.get_mut(&normalize(assumption)) {
                    if !entry.1.contains(&argument.id) {
                        entry.1.push(argument.id.clone());
                    }
                }
            }
        }

        let mut ranked: Vec<CruxAssumption> = order
            .into_iter()
            .filter_map(|key| entries.remove(&key))
            .map(|(assumption, dependents)| {
                let centrality = dependents
                    .iter()
                    .filter(|id| disputed.contains(id))
                    .map(|id| graph.attack_degree(id))
                    .sum();
                CruxAssumption {
                    settling_question: settling_question(&assumption),
                    assumption,
                    dependents,
                    centrality,
                }
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.dependents
                .len()
                .cmp(&a.dependents.len())
                .then(b.centrality.cmp(&a.centrality))
        });
        ranked.truncate(MAX_CRUX_ASSUMPTIONS);
        ranked
    }

    /// Project an analysis into the structured output schema.
    pub fn project(graph: &ArgumentationGraph, analysis: &CruxAnalysis) -> DebateOutput {
        let cruxes = analysis
            .crux_assumptions
            .iter()
            .map(|c| OutputCrux {
                proposition: c.assumption.clone(),
                weight: (c.centrality as f64 / 10.0).min(1.0),
                settling_question: Some(c.settling_question.clone()),
                dependent_arguments: c.dependents.clone(),
            })
            .collect();

        let fault_lines = analysis
            .camps
            .iter()
            .take(2)
            .map(|camp| FaultLine {
                description: camp
                    .argument_ids
                    .first()
                    .and_then(|id| graph.argument(id))
                    .map(|a| a.claim.clone())
                    .unwrap_or_else(|| "no accepted arguments".to_string()),
                personas: camp.speakers.iter().cloned().collect(),
                argument_ids: camp.argument_ids.clone(),
            })
            .collect();

        let live = graph.live_attacks();
        let flip_conditions = graph
            .arguments()
            .iter()
            .filter(|a| analysis.labelling.get(&a.id) == Some(Label::Out))
            .map(|argument| {
                let defeater = live.iter().find(|atk| {
                    atk.to_arg_id == argument.id
                        && analysis.labelling.get(&atk.from_arg_id) == Some(Label::In)
                });
                let condition = match defeater {
                    Some(atk) => format!(
                        "if it were shown that \"{}\" does not hold",
                        atk.counter_proposition.trim()
                    ),
                    None => "if the claim were re-established".to_string(),
                };
                OutputFlipCondition {
                    persona_id: argument.speaker_id.clone(),
                    claim: argument.claim.clone(),
                    condition,
                    triggered: false,
                }
            })
            .collect();

        let mut evidence_ledger: Vec<EvidenceLedgerEntry> = Vec::new();
        for argument in graph.arguments() {
            let label = analysis.labelling.get(&argument.id);
            let idx = match evidence_ledger
                .iter()
                .position(|e| e.persona_id == argument.speaker_id)
            {
                Some(idx) => idx,
                None => {
                    evidence_ledger.push(EvidenceLedgerEntry {
                        persona_id: argument.speaker_id.clone(),
                        accepted: Vec::new(),
                        rejected: Vec::new(),
                    });
                    evidence_ledger.len() - 1
                }
            };
            let entry = &mut evidence_ledger[idx];
            match label {
                Some(Label::In) => entry.accepted.extend(argument.evidence.iter().cloned()),
                Some(Label::Out) => entry.rejected.extend(argument.evidence.iter().cloned()),
                _ => {}
            }
        }

        let resolution_paths = analysis
            .crux_assumptions
            .iter()
            .map(|c| c.settling_question.clone())
            .collect();

        DebateOutput {
            cruxes,
            fault_lines,
            flip_conditions,
            evidence_ledger,
            resolution_paths,
        }
    }

    /// Analyse and project in one step.
    pub fn extract(graph: &ArgumentationGraph) -> DebateOutput {
        let analysis = Self::analyze(graph);
        Self::project(graph, &analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::argumentation::{
        Attack, AttackTarget, AttackType, TargetComponent, ValidationResult,
    };

    fn arg(id: &str, speaker: &str, assumptions: &[&str], evidence: &[&str]) -> Argument {
        Argument {
            id: id.into(),
            speaker_id: speaker.into(),
            claim: format!("{} claims {}", speaker, id),
            premises: vec![],
            assumptions: assumptions.iter().map(|s| s.to_string()).collect(),
            evidence: evidence.iter().map(|s| s.to_string()).collect(),
            round: 1,
        }
    }

    fn atk(id: &str, from: &str, to: &str, counter: &str) -> Attack {
        Attack {
            id: id.into(),
            from_arg_id: from.into(),
            to_arg_id: to.into(),
            attack_type: AttackType::Undermine,
            target: AttackTarget {
                component: TargetComponent::Assumption,
                index: 0,
            },
            counter_proposition: counter.into(),
            rationale: String::new(),
            evidence: vec![],
            confidence: 0.9,
            speaker_id: "x".into(),
            round: 2,
        }
    }

    fn graph_with(args: Vec<Argument>, attacks: Vec<Attack>) -> ArgumentationGraph {
        let validations: Vec<ValidationResult> = attacks
            .iter()
            .map(|a| ValidationResult::assumed_valid(&a.id))
            .collect();
        ArgumentationGraph::new()
            .with_arguments(&args)
            .with_attacks(&attacks, &validations)
    }

    /// a ↔ b mutual attack (two camps), c unattacked, d attacked by c.
    fn two_camp_graph() -> ArgumentationGraph {
        graph_with(
            vec![
                arg("a", "alice", &["Markets self-correct "], &["1990s data"]),
                arg("b", "bob", &["regulation works"], &["EU study"]),
                arg("c", "carol", &["markets self-correct"], &["survey"]),
                arg("d", "dave", &[], &["anecdote"]),
            ],
            vec![
                atk("t1", "a", "b", "regulation fails"),
                atk("t2", "b", "a", "markets fail"),
                atk("t3", "c", "d", "the anecdote is unrepresentative"),
            ],
        )
    }

    #[test]
    fn test_settling_question_strips_that_and_period() {
        assert_eq!(
            settling_question("That prices are sticky."),
            "What evidence would confirm or refute that prices are sticky?"
        );
        assert_eq!(
            settling_question("  wages lag  "),
            "What evidence would confirm or refute that wages lag?"
        );
    }

    #[test]
    fn test_analyze_camps_and_common_ground() {
        let graph = two_camp_graph();
        let analysis = CruxExtractor::analyze(&graph);

        assert_eq!(analysis.common_ground, vec!["c"]);
        assert_eq!(analysis.camps.len(), 2);
        assert_eq!(analysis.symmetric_difference, vec!["a", "b"]);
        for camp in &analysis.camps {
            assert!(camp.argument_ids.contains(&"c".to_string()));
            assert!(camp.speakers.contains("carol"));
        }
    }

    #[test]
    fn test_assumption_ranking_counts_shared_non_disputed() {
        let graph = two_camp_graph();
        let analysis = CruxExtractor::analyze(&graph);

        let top = &analysis.crux_assumptions[0];
        // "markets self-correct" is shared by disputed a and grounded c.
        assert_eq!(top.assumption, "Markets self-correct");
        assert_eq!(top.dependents, vec!["a", "c"]);
        // only disputed a counts: 2 attacks
        assert_eq!(top.centrality, 2);
        assert_eq!(
            top.settling_question,
            "What evidence would confirm or refute that Markets self-correct?"
        );
        assert_eq!(analysis.crux_assumptions[1].assumption, "regulation works");
    }

    #[test]
    fn test_shared_argument_degree_does_not_break_ties() {
        // p and q both have two dependents; q's non-disputed sharer c is
        // busy attacking d, e and f, which must not lift q above p.
        let graph = graph_with(
            vec![
                arg("a", "alice", &["p"], &[]),
                arg("b", "bob", &["q"], &[]),
                arg("c", "carol", &["q"], &[]),
                arg("g", "gus", &["p"], &[]),
                arg("d", "dave", &[], &[]),
                arg("e", "erin", &[], &[]),
                arg("f", "fay", &[], &[]),
            ],
            vec![
                atk("t1", "a", "b", "x"),
                atk("t2", "b", "a", "y"),
                atk("t3", "c", "d", "z"),
                atk("t4", "c", "e", "z"),
                atk("t5", "c", "f", "z"),
            ],
        );
        let analysis = CruxExtractor::analyze(&graph);
        assert_eq!(analysis.symmetric_difference, vec!["a", "b"]);

        let ranked = &analysis.crux_assumptions;
        assert_eq!(ranked[0].assumption, "p");
        assert_eq!(ranked[0].dependents, vec!["a", "g"]);
        assert_eq!(ranked[0].centrality, 2);
        assert_eq!(ranked[1].assumption, "q");
        assert_eq!(ranked[1].dependents, vec!["b", "c"]);
        assert_eq!(ranked[1].centrality, 2);
    }

    #[test]
    fn test_ranking_keeps_top_three() {
        let graph = graph_with(
            vec![
                arg("a", "alice", &["p1", "p2", "p3", "p4"], &[]),
                arg("b", "bob", &["q1"], &[]),
            ],
            vec![atk("t1", "a", "b", "x"), atk("t2", "b", "a", "y")],
        );
        let analysis = CruxExtractor::analyze(&graph);
        assert_eq!(analysis.crux_assumptions.len(), MAX_CRUX_ASSUMPTIONS);
    }

    #[test]
    fn test_single_extension_has_no_disputes() {
        let graph = graph_with(
            vec![arg("a", "alice", &["x"], &[]), arg("b", "bob", &["y"], &[])],
            vec![atk("t1", "a", "b", "b is wrong")],
        );
        let analysis = CruxExtractor::analyze(&graph);
        assert_eq!(analysis.camps.len(), 1);
        assert!(analysis.symmetric_difference.is_empty());
        assert!(analysis.crux_assumptions.is_empty());
    }

    #[test]
    fn test_project_flip_conditions_and_ledger() {
        let graph = two_camp_graph();
        let output = CruxExtractor::extract(&graph);

        assert_eq!(output.flip_conditions.len(), 1);
        let flip = &output.flip_conditions[0];
        assert_eq!(flip.persona_id, "dave");
        assert!(flip.condition.contains("the anecdote is unrepresentative"));

        let carol = output
            .evidence_ledger
            .iter()
            .find(|e| e.persona_id == "carol")
            .unwrap();
        assert_eq!(carol.accepted, vec!["survey"]);
        let dave = output
            .evidence_ledger
            .iter()
            .find(|e| e.persona_id == "dave")
            .unwrap();
        assert_eq!(dave.rejected, vec!["anecdote"]);
        // UNDEC evidence is neither accepted nor rejected
        let alice = output
            .evidence_ledger
            .iter()
            .find(|e| e.persona_id == "alice")
            .unwrap();
        assert!(alice.accepted.is_empty() && alice.rejected.is_empty());
    }

    #[test]
    fn test_project_cruxes_and_fault_lines() {
        let graph = two_camp_graph();
        let output = CruxExtractor::extract(&graph);

        assert!((output.cruxes[0].weight - 0.2).abs() < 1e-9);
        assert_eq!(output.fault_lines.len(), 2);
        assert_eq!(output.resolution_paths.len(), output.cruxes.len());
        // lead argument of each camp is the first in graph order
        assert_eq!(output.fault_lines[0].description, "alice claims a");
    }

    #[test]
    fn test_flip_condition_names_defeating_attack() {
        let graph = graph_with(
            vec![arg("x", "xena", &[], &[]), arg("y", "yuri", &[], &[])],
            vec![atk("t1", "x", "y", "y overreaches")],
        );
        let output = CruxExtractor::extract(&graph);
        assert_eq!(output.flip_conditions.len(), 1);
        assert_eq!(output.flip_conditions[0].persona_id, "yuri");
        assert!(output.flip_conditions[0].condition.contains("y overreaches"));
        assert!(output.cruxes.is_empty());
    }
}
