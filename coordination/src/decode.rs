//! Decode-and-validate step for raw collaborator output.
//!
//! Text-generation services return free text that usually contains a JSON
//! payload. Each `decode_*` function pulls the payload out, deserializes it
//! into a wire struct, checks ranges and identifiers, and returns the typed
//! value. Anything that does not fit is [`CollaboratorError::Malformed`].

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::warn;

use crate::argumentation::{AttackTarget, AttackType, ValidationResult};
use crate::blackboard::{Stance, StanceUpdate};
use crate::collaborators::{
    AgentTurnResponse, ArgumentDraft, AttackDraft, ClaimDraft, CollaboratorResult,
};
use crate::crux::DebateOutput;
use crate::crux_room::{CardPosition, CruxCard, DisagreementKind};
use crate::disagreement::DisagreementDetection;
use crate::error::CollaboratorError;
use crate::scheduler::{ActionPlan, PlannedAction};

/// Out-of-range confidences within this margin are clamped, not rejected.
pub const CONFIDENCE_TOLERANCE: f64 = 0.05;

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*\n?(.*?)```").unwrap());

/// Locate the JSON payload in `text`.
///
/// Prefers a fenced code block whose body parses; otherwise takes the first
/// balanced object or array.
pub fn extract_json(text: &str) -> Option<&str> {
    for caps in FENCED_BLOCK.captures_iter(text) {
        if let Some(body) = caps.get(1) {
            let body = body.as_str().trim();
            if serde_json::from_str::<serde_json::Value>(body).is_ok() {
                return Some(body);
            }
        }
    }
    first_balanced(text)
}

/// First `{...}` or `[...]` span with balanced delimiters, skipping
/// delimiters inside string literals.
fn first_balanced(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Extract and deserialize a payload.
pub fn decode<T: DeserializeOwned>(collaborator: &str, raw: &str) -> CollaboratorResult<T> {
    let payload = extract_json(raw)
        .ok_or_else(|| CollaboratorError::malformed(collaborator, "no JSON payload found"))?;
    serde_json::from_str(payload)
        .map_err(|e| CollaboratorError::malformed(collaborator, format!("schema mismatch: {}", e)))
}

/// Validate a confidence/strength/urgency value into [0, 1].
pub fn unit_interval(collaborator: &str, field: &str, value: f64) -> CollaboratorResult<f64> {
    if !value.is_finite() {
        return Err(CollaboratorError::malformed(
            collaborator,
            format!("{} is not a finite number", field),
        ));
    }
    if value < -CONFIDENCE_TOLERANCE || value > 1.0 + CONFIDENCE_TOLERANCE {
        return Err(CollaboratorError::malformed(
            collaborator,
            format!("{} {} outside [0, 1]", field, value),
        ));
    }
    Ok(value.clamp(0.0, 1.0))
}

fn non_empty(collaborator: &str, field: &str, value: &str) -> CollaboratorResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CollaboratorError::malformed(
            collaborator,
            format!("{} is empty", field),
        ));
    }
    Ok(value.to_string())
}

/// Accepts either a bare list or an object wrapping it under `key`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListOrWrapped<T> {
    List(Vec<T>),
    Wrapped(serde_json::Map<String, serde_json::Value>),
}

fn decode_list<T: DeserializeOwned>(
    collaborator: &str,
    raw: &str,
    key: &str,
) -> CollaboratorResult<Vec<T>> {
    match decode::<ListOrWrapped<T>>(collaborator, raw)? {
        ListOrWrapped::List(items) => Ok(items),
        ListOrWrapped::Wrapped(mut map) => {
            let value = map.remove(key).ok_or_else(|| {
                CollaboratorError::malformed(collaborator, format!("missing field `{}`", key))
            })?;
            serde_json::from_value(value).map_err(|e| {
                CollaboratorError::malformed(collaborator, format!("schema mismatch: {}", e))
            })
        }
    }
}

pub fn decode_claims(raw: &str) -> CollaboratorResult<Vec<ClaimDraft>> {
    const WHO: &str = "claim_decomposer";
    let drafts: Vec<ClaimDraft> = decode_list(WHO, raw, "claims")?;
    if drafts.is_empty() {
        return Err(CollaboratorError::malformed(WHO, "no claims returned"));
    }
    let mut seen = HashSet::new();
    drafts
        .into_iter()
        .map(|d| {
            let id = non_empty(WHO, "claim id", &d.id)?;
            if !seen.insert(id.clone()) {
                return Err(CollaboratorError::malformed(WHO, format!("duplicate claim id {}", id)));
            }
            Ok(ClaimDraft {
                id,
                text: non_empty(WHO, "claim text", &d.text)?,
            })
        })
        .collect()
}

#[derive(Deserialize)]
struct WireStance {
    #[serde(alias = "claimId")]
    claim_id: String,
    stance: String,
    confidence: f64,
}

#[derive(Deserialize)]
struct WireTurn {
    #[serde(default, alias = "utterance")]
    response: String,
    #[serde(default)]
    stances: Vec<WireStance>,
    #[serde(default, alias = "newCruxes")]
    new_cruxes: Vec<String>,
    #[serde(default, alias = "flipTriggers")]
    flip_triggers: Vec<String>,
    #[serde(default, alias = "resolvedCruxes")]
    resolved_cruxes: Vec<String>,
}

/// Decode an agent turn. Stances on claims outside `claim_ids` are dropped.
pub fn decode_turn(raw: &str, claim_ids: &[&str]) -> CollaboratorResult<AgentTurnResponse> {
    const WHO: &str = "agent_turn";
    let wire: WireTurn = decode(WHO, raw)?;

    let mut stances = Vec::with_capacity(wire.stances.len());
    for s in wire.stances {
        if !claim_ids.contains(&s.claim_id.as_str()) {
            warn!(claim = %s.claim_id, "stance on unknown claim dropped");
            continue;
        }
        let stance: Stance = s
            .stance
            .parse()
            .map_err(|e: String| CollaboratorError::malformed(WHO, e))?;
        stances.push(StanceUpdate {
            claim_id: s.claim_id,
            stance,
            confidence: unit_interval(WHO, "confidence", s.confidence)?,
        });
    }

    let clean = |items: Vec<String>| -> Vec<String> {
        items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    };

    Ok(AgentTurnResponse {
        response: wire.response.trim().to_string(),
        stances,
        new_cruxes: clean(wire.new_cruxes),
        flip_triggers: clean(wire.flip_triggers),
        resolved_cruxes: clean(wire.resolved_cruxes),
    })
}

#[derive(Deserialize)]
struct WireDetection {
    #[serde(default)]
    disagreement: Option<bool>,
    #[serde(default)]
    personas: Vec<String>,
    #[serde(default)]
    topic: String,
    #[serde(default)]
    confidence: f64,
}

/// Decode a detection; `null`, `{}` or `{"disagreement": false}` mean none.
pub fn decode_detection(
    raw: &str,
    persona_ids: &[&str],
) -> CollaboratorResult<Option<DisagreementDetection>> {
    const WHO: &str = "disagreement_detector";
    if raw.trim() == "null" {
        return Ok(None);
    }
    let wire: WireDetection = decode(WHO, raw)?;
    if wire.disagreement == Some(false) || wire.personas.is_empty() {
        return Ok(None);
    }
    let [a, b]: [String; 2] = wire
        .personas
        .try_into()
        .map_err(|_| CollaboratorError::malformed(WHO, "personas must name exactly two ids"))?;
    for id in [&a, &b] {
        if !persona_ids.contains(&id.as_str()) {
            return Err(CollaboratorError::malformed(WHO, format!("unknown persona {}", id)));
        }
    }
    if a == b {
        return Err(CollaboratorError::malformed(WHO, "personas must differ"));
    }
    Ok(Some(DisagreementDetection {
        personas: [a, b],
        topic: non_empty(WHO, "topic", &wire.topic)?,
        confidence: unit_interval(WHO, "confidence", wire.confidence)?,
    }))
}

#[derive(Deserialize)]
struct WirePlan {
    action: String,
    urgency: f64,
    #[serde(default)]
    intent: String,
}

pub fn decode_plan(raw: &str, persona_id: &str) -> CollaboratorResult<ActionPlan> {
    const WHO: &str = "action_planner";
    let wire: WirePlan = decode(WHO, raw)?;
    let action = match wire.action.trim().to_ascii_lowercase().as_str() {
        "speak" => PlannedAction::Speak,
        "interrupt" => PlannedAction::Interrupt,
        "listen" | "pass" => PlannedAction::Listen,
        other => {
            return Err(CollaboratorError::malformed(
                WHO,
                format!("unknown action '{}'", other),
            ))
        }
    };
    Ok(ActionPlan {
        persona_id: persona_id.to_string(),
        action,
        urgency: unit_interval(WHO, "urgency", wire.urgency)?,
        intent: wire.intent.trim().to_string(),
    })
}

fn validate_argument(who: &str, draft: ArgumentDraft) -> CollaboratorResult<ArgumentDraft> {
    Ok(ArgumentDraft {
        claim: non_empty(who, "argument claim", &draft.claim)?,
        ..draft
    })
}

pub fn decode_arguments(raw: &str) -> CollaboratorResult<Vec<ArgumentDraft>> {
    const WHO: &str = "argument_generator";
    decode_list::<ArgumentDraft>(WHO, raw, "arguments")?
        .into_iter()
        .map(|d| validate_argument(WHO, d))
        .collect()
}

#[derive(Deserialize)]
struct WireAttack {
    #[serde(alias = "targetArgId")]
    target_arg_id: String,
    #[serde(rename = "type")]
    attack_type: AttackType,
    target: AttackTarget,
    #[serde(alias = "counterProposition")]
    counter_proposition: String,
    #[serde(default)]
    rationale: String,
    #[serde(default)]
    evidence: Vec<String>,
    confidence: f64,
    #[serde(alias = "counterArgument")]
    counter_argument: ArgumentDraft,
}

/// Decode attacks. Targets outside `target_ids` are dropped.
pub fn decode_attacks(raw: &str, target_ids: &[&str]) -> CollaboratorResult<Vec<AttackDraft>> {
    const WHO: &str = "attack_generator";
    let wire: Vec<WireAttack> = decode_list(WHO, raw, "attacks")?;
    let mut attacks = Vec::with_capacity(wire.len());
    for w in wire {
        if !target_ids.contains(&w.target_arg_id.as_str()) {
            warn!(target = %w.target_arg_id, "attack on unknown argument dropped");
            continue;
        }
        attacks.push(AttackDraft {
            target_arg_id: w.target_arg_id,
            attack_type: w.attack_type,
            target: w.target,
            counter_proposition: non_empty(WHO, "counter_proposition", &w.counter_proposition)?,
            rationale: w.rationale,
            evidence: w.evidence,
            confidence: unit_interval(WHO, "confidence", w.confidence)?,
            counter_argument: validate_argument(WHO, w.counter_argument)?,
        });
    }
    Ok(attacks)
}

#[derive(Deserialize)]
struct WireValidation {
    #[serde(alias = "attackId")]
    attack_id: String,
    valid: bool,
    #[serde(default = "default_strength", alias = "attackStrength", alias = "strength")]
    attack_strength: f64,
    #[serde(default)]
    corrections: Option<String>,
}

fn default_strength() -> f64 {
    ValidationResult::DEFAULT_STRENGTH
}

/// Decode batch validation. Every pending attack must receive a verdict.
pub fn decode_validations(
    raw: &str,
    attack_ids: &[&str],
) -> CollaboratorResult<Vec<ValidationResult>> {
    const WHO: &str = "attack_validator";
    let wire: Vec<WireValidation> = decode_list(WHO, raw, "validations")?;
    let mut results = Vec::with_capacity(attack_ids.len());
    for w in wire {
        if !attack_ids.contains(&w.attack_id.as_str()) {
            warn!(attack = %w.attack_id, "validation for unknown attack dropped");
            continue;
        }
        results.push(ValidationResult {
            attack_id: w.attack_id,
            valid: w.valid,
            attack_strength: unit_interval(WHO, "attack_strength", w.attack_strength)?,
            corrections: w.corrections.filter(|c| !c.trim().is_empty()),
        });
    }
    if let Some(missing) = attack_ids
        .iter()
        .find(|id| !results.iter().any(|r| r.attack_id == **id))
    {
        return Err(CollaboratorError::malformed(
            WHO,
            format!("no verdict for attack {}", missing),
        ));
    }
    Ok(results)
}

pub fn decode_output(raw: &str) -> CollaboratorResult<DebateOutput> {
    const WHO: &str = "final_extractor";
    let mut output: DebateOutput = decode(WHO, raw)?;
    for crux in &mut output.cruxes {
        crux.weight = unit_interval(WHO, "crux weight", crux.weight)?;
    }
    Ok(output)
}

#[derive(Deserialize)]
struct WireCard {
    crux: String,
    #[serde(default)]
    positions: Vec<CardPosition>,
    #[serde(default, alias = "disagreementKind")]
    disagreement_kind: Option<DisagreementKind>,
    #[serde(default)]
    resolvable: bool,
    #[serde(default, alias = "settlingQuestion")]
    settling_question: Option<String>,
}

pub fn decode_crux_card(
    raw: &str,
    topic: &str,
    personas: &[String; 2],
) -> CollaboratorResult<CruxCard> {
    const WHO: &str = "crux_card_extractor";
    let wire: WireCard = decode(WHO, raw)?;
    Ok(CruxCard {
        topic: topic.to_string(),
        personas: personas.clone(),
        crux: non_empty(WHO, "crux", &wire.crux)?,
        positions: wire
            .positions
            .into_iter()
            .filter(|p| personas.contains(&p.persona_id))
            .collect(),
        disagreement_kind: wire.disagreement_kind.unwrap_or(DisagreementKind::Unknown),
        resolvable: wire.resolvable,
        settling_question: wire.settling_question.filter(|q| !q.trim().is_empty()),
        degraded: false,
    })
}
