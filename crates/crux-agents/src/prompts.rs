//! System prompts and per-call prompt builders for each collaborator role.
//!
//! Prompt versioning: bump `PROMPT_VERSION` whenever preamble content changes,
//! so a logged event stream can be tied to the prompts that produced it.

use std::fmt::Write as _;

use crux_coordination::collaborators::{
    ArgumentRequest, CruxCardRequest, PlanRequest, SummaryRequest, TurnContext, TurnRequest,
};
use crux_coordination::{
    ArgumentationGraph, Attack, BlackboardState, PersonaProfile, TranscriptMessage,
};

/// Prompt version. Bump on any preamble content change.
pub const PROMPT_VERSION: &str = "1.2.0";

pub const DECOMPOSER_PREAMBLE: &str = "\
You split a debate topic into 2 to 5 sub-claims that can each be argued for or against \
independently. Each claim is one declarative sentence.

Respond with JSON only:
{\"claims\": [{\"id\": \"c1\", \"text\": \"...\"}, ...]}";

pub const DEBATER_PREAMBLE: &str = "\
You take part in a structured debate as the persona described in each message. Stay in \
character, engage with what others said, and be concrete.

After your reply, report your position on every listed claim and anything that would \
change your mind. Respond with JSON only:
{
  \"response\": \"what you say to the room\",
  \"stances\": [{\"claim_id\": \"c1\", \"stance\": \"pro|con|uncertain\", \"confidence\": 0.0-1.0}],
  \"new_cruxes\": [\"a proposition that, if settled, would resolve a disagreement\"],
  \"flip_triggers\": [\"evidence that would make you change your stance\"],
  \"resolved_cruxes\": [\"a crux you now consider settled\"]
}
Lists may be empty.";

pub const PLANNER_PREAMBLE: &str = "\
You decide whether a debate persona wants the floor on the next turn. Choose `speak` if \
they have something new to add, `interrupt` if something just said demands an immediate \
answer, and `listen` otherwise. Urgency is 0.0-1.0.

Respond with JSON only:
{\"action\": \"speak|interrupt|listen\", \"urgency\": 0.0, \"intent\": \"one short sentence\"}";

pub const DETECTOR_PREAMBLE: &str = "\
You read a short stretch of a debate and decide whether two specific participants are \
stuck on the same point of disagreement. Only flag a pair when they directly contradict \
each other; general tension does not count.

Respond with JSON only, either
{\"disagreement\": true, \"personas\": [\"id1\", \"id2\"], \"topic\": \"the point\", \"confidence\": 0.0-1.0}
or
{\"disagreement\": false}";

pub const ARGUMENT_PREAMBLE: &str = "\
You write structured arguments for a debate persona. An argument has a claim, the \
premises that support it, the unstated assumptions it relies on, and any evidence.

For opening arguments respond with JSON only:
{\"arguments\": [{\"claim\": \"...\", \"premises\": [\"...\"], \"assumptions\": [\"...\"], \"evidence\": [\"...\"]}]}

For attacks respond with JSON only:
{\"attacks\": [{
  \"target_arg_id\": \"arg-1\",
  \"type\": \"rebut|undermine|undercut\",
  \"target\": {\"component\": \"claim|premise|assumption\", \"index\": 0},
  \"counter_proposition\": \"...\",
  \"rationale\": \"...\",
  \"evidence\": [\"...\"],
  \"confidence\": 0.0-1.0,
  \"counter_argument\": {\"claim\": \"...\", \"premises\": [], \"assumptions\": [], \"evidence\": []}
}]}
A rebut contradicts the claim, an undermine contradicts a premise or assumption, and an \
undercut denies that the premises support the claim.";

pub const VALIDATOR_PREAMBLE: &str = "\
You judge attacks between debate arguments. An attack is valid when it actually engages \
the targeted component and would weaken the target if true. Rate attack strength 0.0-1.0.

Respond with JSON only, one verdict per attack:
{\"validations\": [{\"attack_id\": \"atk-1\", \"valid\": true, \"attack_strength\": 0.7, \"corrections\": null}]}";

pub const EXTRACTOR_PREAMBLE: &str = "\
You summarise a finished debate into its cruxes: the propositions that, if resolved, would \
change someone's mind. Weight each crux 0.0-1.0 by how much of the disagreement hangs on it.

Respond with JSON only:
{
  \"cruxes\": [{\"proposition\": \"...\", \"weight\": 0.0, \"settlingQuestion\": \"...\"}],
  \"faultLines\": [{\"description\": \"...\", \"personas\": [\"id\"]}],
  \"flipConditions\": [{\"personaId\": \"id\", \"claim\": \"c1\", \"condition\": \"...\", \"triggered\": false}],
  \"evidenceLedger\": [{\"personaId\": \"id\", \"accepted\": [], \"rejected\": []}],
  \"resolutionPaths\": [\"...\"]
}";

pub const SUMMARIZER_PREAMBLE: &str = "\
You compress debate state for the next speaker. Keep every claim id, every open crux and \
each persona's latest stance. Drop repetition. Reply with the summary text only.";

pub const CRUX_CARD_PREAMBLE: &str = "\
You read a focused exchange between two debaters and distil the single crux they disagree \
on. Classify it as empirical (data would settle it), values (different priorities) or \
definitional (they mean different things by a term).

Respond with JSON only:
{
  \"crux\": \"the proposition\",
  \"positions\": [{\"persona_id\": \"id\", \"position\": \"...\"}],
  \"disagreement_kind\": \"empirical|values|definitional\",
  \"resolvable\": true,
  \"settling_question\": \"what would settle it\"
}";

fn persona_block(out: &mut String, persona: &PersonaProfile) {
    let _ = writeln!(out, "## You are {} (id: {})", persona.name, persona.id);
    if !persona.background.trim().is_empty() {
        let _ = writeln!(out, "{}", persona.background.trim());
    }
    if !persona.domain_keywords.is_empty() {
        let _ = writeln!(out, "Expertise: {}", persona.domain_keywords.join(", "));
    }
}

fn transcript_block(out: &mut String, messages: &[TranscriptMessage]) {
    if messages.is_empty() {
        return;
    }
    out.push_str("\n## Recent exchange\n");
    for m in messages {
        let _ = writeln!(out, "[round {}] {}: {}", m.round, m.persona_id, m.text);
    }
}

pub fn decompose_prompt(topic: &str) -> String {
    format!("Topic: {}", topic)
}

pub fn turn_prompt(request: &TurnRequest) -> String {
    let mut out = String::new();
    persona_block(&mut out, &request.persona);
    let _ = writeln!(out, "\n## Debate: {}", request.topic);
    for claim in &request.claims {
        let _ = writeln!(out, "- [{}] {}", claim.id, claim.text);
    }
    let _ = writeln!(out, "\n## Current state\n{}", request.blackboard_summary);
    transcript_block(&mut out, &request.recent_transcript);

    out.push_str("\n## Your turn\n");
    match &request.context {
        TurnContext::Round => {
            let _ = writeln!(out, "Round {}. Give your view on the claims.", request.round);
        }
        TurnContext::Scheduled { reason } => {
            let _ = writeln!(out, "You have the floor ({}).", reason);
        }
        TurnContext::CruxRoom { topic, opponent_id } => {
            let _ = writeln!(
                out,
                "You are in a side room with {} to get to the bottom of: {}. \
                 Address them directly and name the exact point you disagree on.",
                opponent_id, topic
            );
        }
    }
    out
}

pub fn plan_prompt(request: &PlanRequest) -> String {
    let mut out = String::new();
    persona_block(&mut out, &request.persona);
    let _ = writeln!(out, "\n## Current state\n{}", request.blackboard_summary);
    transcript_block(&mut out, &request.recent_transcript);
    let _ = writeln!(out, "\nTurn {} is next. Do you want the floor?", request.turn);
    out
}

pub fn detection_prompt(window: &[TranscriptMessage], persona_ids: &[&str]) -> String {
    let mut out = format!("Participants: {}\n", persona_ids.join(", "));
    transcript_block(&mut out, window);
    out
}

pub fn arguments_prompt(request: &ArgumentRequest) -> String {
    let mut out = String::new();
    persona_block(&mut out, &request.persona);
    let _ = writeln!(out, "\n## Debate: {}", request.topic);
    for claim in &request.claims {
        let _ = writeln!(out, "- [{}] {}", claim.id, claim.text);
    }
    out.push_str("\nState your opening arguments (one to three).\n");
    out
}

pub fn attacks_prompt(request: &ArgumentRequest) -> String {
    let mut out = String::new();
    persona_block(&mut out, &request.persona);
    let _ = writeln!(out, "\n## Debate: {}\n\n## Arguments you may attack", request.topic);
    for arg in &request.opposing_arguments {
        let _ = writeln!(out, "[{}] by {}: {}", arg.id, arg.speaker_id, arg.claim);
        for (i, p) in arg.premises.iter().enumerate() {
            let _ = writeln!(out, "  premise {}: {}", i, p);
        }
        for (i, a) in arg.assumptions.iter().enumerate() {
            let _ = writeln!(out, "  assumption {}: {}", i, a);
        }
    }
    let _ = writeln!(
        out,
        "\nRound {}. Attack the weakest of these, or return an empty list.",
        request.round
    );
    out
}

pub fn validation_prompt(attacks: &[Attack], graph: &ArgumentationGraph) -> String {
    let mut out = String::from("## Attacks to judge\n");
    for attack in attacks {
        let target = graph
            .argument(&attack.to_arg_id)
            .map(|a| a.claim.as_str())
            .unwrap_or("(unknown)");
        let _ = writeln!(
            out,
            "[{}] {} on {} ({:?} #{}) against \"{}\": {}",
            attack.id,
            attack.attack_type,
            attack.to_arg_id,
            attack.target.component,
            attack.target.index,
            target,
            attack.counter_proposition
        );
        if !attack.rationale.is_empty() {
            let _ = writeln!(out, "  rationale: {}", attack.rationale);
        }
    }
    out
}

pub fn extraction_prompt(snapshot: &BlackboardState) -> String {
    format!("## Final debate state\n{}", snapshot.render())
}

pub fn summary_prompt(request: &SummaryRequest) -> String {
    format!(
        "Summarise in roughly {}-{} tokens:\n\n{}",
        request.min_tokens, request.max_tokens, request.text
    )
}

pub fn crux_card_prompt(request: &CruxCardRequest) -> String {
    let mut out = format!(
        "Side room between {} and {} on: {}\n",
        request.personas[0], request.personas[1], request.topic
    );
    transcript_block(&mut out, &request.transcript);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crux_coordination::Claim;

    fn request(context: TurnContext) -> TurnRequest {
        TurnRequest {
            persona: PersonaProfile::new("econ", "Ada").with_keywords(&["prices"]),
            round: 2,
            topic: "Rent control".into(),
            claims: vec![Claim {
                id: "c1".into(),
                text: "Rents fall".into(),
                debate_id: "d1".into(),
            }],
            blackboard_summary: "Topic: Rent control".into(),
            recent_transcript: vec![TranscriptMessage::new("tenant", "Ada, why?", 1)],
            context,
        }
    }

    #[test]
    fn test_turn_prompt_lists_claims_and_transcript() {
        let prompt = turn_prompt(&request(TurnContext::Round));
        assert!(prompt.contains("You are Ada (id: econ)"));
        assert!(prompt.contains("[c1] Rents fall"));
        assert!(prompt.contains("tenant: Ada, why?"));
        assert!(prompt.contains("Round 2"));
    }

    #[test]
    fn test_crux_room_prompt_names_opponent() {
        let prompt = turn_prompt(&request(TurnContext::CruxRoom {
            topic: "supply response".into(),
            opponent_id: "tenant".into(),
        }));
        assert!(prompt.contains("side room with tenant"));
        assert!(prompt.contains("supply response"));
    }
}
