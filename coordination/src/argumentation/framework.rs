//! Dung abstract-argumentation framework and its semantics.
//!
//! Only validated attacks whose endpoints are both known arguments become
//! edges. The labelling is the grounded one: arguments start UNDEC and the
//! fixpoint moves them monotonically to IN or OUT, so it terminates within
//! `|arguments| + 1` passes.
//!
//! Preferred extensions are enumerated as `grounded ∪ S` for subsets `S` of
//! the UNDEC arguments. Enumeration is brute force and capped at
//! [`MAX_ENUMERATION_BITS`] undecided arguments (2^16 candidates); any
//! UNDEC arguments beyond the cap are never added to a candidate.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::types::{ArgumentId, Argument, Attack, Label, Labelling, ValidationResult};

/// Undecided arguments considered by the preferred-extension enumeration.
pub const MAX_ENUMERATION_BITS: usize = 16;

/// Directed attack relation over a fixed set of argument ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DungFramework {
    arguments: Vec<ArgumentId>,
    attacks: BTreeMap<ArgumentId, BTreeSet<ArgumentId>>,
    attacked_by: BTreeMap<ArgumentId, BTreeSet<ArgumentId>>,
}

impl DungFramework {
    /// Build a framework from ids and `(from, to)` pairs. Pairs that
    /// reference an unknown id are dropped.
    pub fn new<I, P>(arguments: I, attacks: P) -> Self
    where
        I: IntoIterator<Item = ArgumentId>,
        P: IntoIterator<Item = (ArgumentId, ArgumentId)>,
    {
        let mut seen = HashSet::new();
        let arguments: Vec<ArgumentId> = arguments
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();

        let mut framework = Self {
            arguments,
            attacks: BTreeMap::new(),
            attacked_by: BTreeMap::new(),
        };
        for (from, to) in attacks {
            if !seen.contains(&from) || !seen.contains(&to) {
                debug!(from = %from, to = %to, "dropping attack on unknown argument");
                continue;
            }
            framework
                .attacks
                .entry(from.clone())
                .or_default()
                .insert(to.clone());
            framework.attacked_by.entry(to).or_default().insert(from);
        }
        framework
    }

    pub fn arguments(&self) -> &[ArgumentId] {
        &self.arguments
    }

    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }

    /// Arguments attacked by `id`.
    pub fn targets(&self, id: &str) -> impl Iterator<Item = &ArgumentId> {
        self.attacks.get(id).into_iter().flatten()
    }

    /// Arguments attacking `id`.
    pub fn attackers(&self, id: &str) -> impl Iterator<Item = &ArgumentId> {
        self.attacked_by.get(id).into_iter().flatten()
    }

    pub fn attacks(&self, from: &str, to: &str) -> bool {
        self.attacks.get(from).is_some_and(|t| t.contains(to))
    }

    /// Number of edges touching `id` in either direction.
    pub fn degree(&self, id: &str) -> usize {
        self.targets(id).count() + self.attackers(id).count()
    }

    /// Grounded labelling by monotone fixpoint.
    pub fn compute_labelling(&self) -> Labelling {
        let mut labels: BTreeMap<ArgumentId, Label> = self
            .arguments
            .iter()
            .map(|id| (id.clone(), Label::Undec))
            .collect();

        for _pass in 0..=self.arguments.len() {
            let mut changed = false;
            for id in &self.arguments {
                if labels.get(id) != Some(&Label::Undec) {
                    continue;
                }
                let defeated = self
                    .attackers(id)
                    .all(|attacker| labels.get(attacker) == Some(&Label::Out));
                if !defeated {
                    continue;
                }
                labels.insert(id.clone(), Label::In);
                changed = true;
                for target in self.targets(id) {
                    if labels.get(target) == Some(&Label::Undec) {
                        labels.insert(target.clone(), Label::Out);
                    }
                }
            }
            if !changed {
                break;
            }
        }

        Labelling::from_map(labels)
    }

    /// The IN set of the grounded labelling.
    pub fn grounded_extension(&self) -> BTreeSet<ArgumentId> {
        self.compute_labelling()
            .with_label(Label::In)
            .into_iter()
            .collect()
    }

    /// No member attacks another member.
    pub fn is_conflict_free(&self, set: &BTreeSet<ArgumentId>) -> bool {
        set.iter()
            .all(|a| self.targets(a).all(|target| !set.contains(target)))
    }

    /// Conflict-free and every attacker of a member is counter-attacked
    /// by some member.
    pub fn is_admissible(&self, set: &BTreeSet<ArgumentId>) -> bool {
        if !self.is_conflict_free(set) {
            return false;
        }
        set.iter().all(|member| {
            self.attackers(member)
                .all(|attacker| set.iter().any(|d| self.attacks(d, attacker)))
        })
    }

    /// Maximal admissible supersets of the grounded extension.
    pub fn preferred_extensions(&self) -> Vec<BTreeSet<ArgumentId>> {
        if self.arguments.is_empty() {
            return vec![BTreeSet::new()];
        }

        let labelling = self.compute_labelling();
        let grounded: BTreeSet<ArgumentId> =
            labelling.with_label(Label::In).into_iter().collect();
        let undecided: Vec<&ArgumentId> = self
            .arguments
            .iter()
            .filter(|id| labelling.get(id) == Some(Label::Undec))
            .collect();

        if undecided.is_empty() {
            return vec![grounded];
        }

        let bits = undecided.len().min(MAX_ENUMERATION_BITS);
        if undecided.len() > bits {
            warn!(
                undecided = undecided.len(),
                cap = MAX_ENUMERATION_BITS,
                "preferred-extension enumeration truncated"
            );
        }

        let mut admissible: Vec<BTreeSet<ArgumentId>> = Vec::new();
        for mask in 0u32..(1u32 << bits) {
            let mut candidate = grounded.clone();
            for (bit, id) in undecided.iter().take(bits).enumerate() {
                if mask & (1 << bit) != 0 {
                    candidate.insert((*id).clone());
                }
            }
            if self.is_admissible(&candidate) {
                admissible.push(candidate);
            }
        }

        // Largest first: anything with an admissible strict superset is
        // contained in some already-kept maximal set.
        let mut by_size: Vec<usize> = (0..admissible.len()).collect();
        by_size.sort_by(|a, b| admissible[*b].len().cmp(&admissible[*a].len()));
        let mut maximal: Vec<usize> = Vec::new();
        for idx in by_size {
            let candidate = &admissible[idx];
            let dominated = maximal.iter().any(|&m| {
                admissible[m].len() > candidate.len() && candidate.is_subset(&admissible[m])
            });
            if !dominated {
                maximal.push(idx);
            }
        }
        maximal.sort_unstable();

        if maximal.is_empty() {
            return vec![grounded];
        }
        maximal
            .into_iter()
            .map(|idx| admissible[idx].clone())
            .collect()
    }

    /// Sub-framework induced by `keep`.
    pub fn restricted_to(&self, keep: &BTreeSet<ArgumentId>) -> Self {
        let pairs = self
            .attacks
            .iter()
            .flat_map(|(from, targets)| targets.iter().map(move |to| (from.clone(), to.clone())))
            .filter(|(from, to)| keep.contains(from) && keep.contains(to));
        Self::new(
            self.arguments.iter().filter(|id| keep.contains(*id)).cloned(),
            pairs,
        )
    }
}

/// Arguments, attacks and validations accumulated over one debate.
///
/// Every `with_*` method returns a new graph; the receiver is untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArgumentationGraph {
    arguments: Vec<Argument>,
    attacks: Vec<Attack>,
    validations: Vec<ValidationResult>,
}

impl ArgumentationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    pub fn attacks(&self) -> &[Attack] {
        &self.attacks
    }

    pub fn validations(&self) -> &[ValidationResult] {
        &self.validations
    }

    pub fn argument(&self, id: &str) -> Option<&Argument> {
        self.arguments.iter().find(|a| a.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }

    /// Graph with `arguments` appended. Ids already present are skipped.
    pub fn with_arguments(&self, arguments: &[Argument]) -> Self {
        let mut next = Vec::with_capacity(self.arguments.len() + arguments.len());
        next.extend(self.arguments.iter().cloned());
        for argument in arguments {
            if next.iter().any(|a: &Argument| a.id == argument.id) {
                debug!(id = %argument.id, "duplicate argument id ignored");
                continue;
            }
            next.push(argument.clone());
        }
        Self {
            arguments: next,
            attacks: self.attacks.clone(),
            validations: self.validations.clone(),
        }
    }

    /// Graph with `attacks` and their `validations` appended.
    pub fn with_attacks(&self, attacks: &[Attack], validations: &[ValidationResult]) -> Self {
        Self {
            arguments: self.arguments.clone(),
            attacks: self.attacks.iter().chain(attacks).cloned().collect(),
            validations: self.validations.iter().chain(validations).cloned().collect(),
        }
    }

    /// Attacks that are validated and connect two known arguments.
    /// A later validation for the same attack overrides an earlier one.
    pub fn live_attacks(&self) -> Vec<&Attack> {
        let verdicts: HashMap<&str, bool> = self
            .validations
            .iter()
            .map(|v| (v.attack_id.as_str(), v.valid))
            .collect();
        let known: HashSet<&str> = self.arguments.iter().map(|a| a.id.as_str()).collect();
        self.attacks
            .iter()
            .filter(|a| verdicts.get(a.id.as_str()).copied().unwrap_or(false))
            .filter(|a| {
                known.contains(a.from_arg_id.as_str()) && known.contains(a.to_arg_id.as_str())
            })
            .collect()
    }

    pub fn validation(&self, attack_id: &str) -> Option<&ValidationResult> {
        self.validations.iter().rev().find(|v| v.attack_id == attack_id)
    }

    /// Framework over validated attacks only.
    pub fn framework(&self) -> DungFramework {
        DungFramework::new(
            self.arguments.iter().map(|a| a.id.clone()),
            self.live_attacks()
                .into_iter()
                .map(|a| (a.from_arg_id.clone(), a.to_arg_id.clone())),
        )
    }

    pub fn compute_labelling(&self) -> Labelling {
        self.framework().compute_labelling()
    }

    pub fn grounded_extension(&self) -> BTreeSet<ArgumentId> {
        self.framework().grounded_extension()
    }

    pub fn preferred_extensions(&self) -> Vec<BTreeSet<ArgumentId>> {
        self.framework().preferred_extensions()
    }

    /// Count of live attacks where `id` is source or target.
    pub fn attack_degree(&self, id: &str) -> usize {
        self.live_attacks()
            .iter()
            .filter(|a| a.from_arg_id == id || a.to_arg_id == id)
            .count()
    }
}
