//! Argument generation and attack validation for graph rounds.

use async_trait::async_trait;

use crux_coordination::collaborators::{ArgumentDraft, ArgumentRequest, AttackDraft};
use crux_coordination::decode::{decode_arguments, decode_attacks, decode_validations};
use crux_coordination::{
    ArgumentGenerator, ArgumentationGraph, Attack, AttackValidator, CollaboratorResult,
    ValidationResult,
};

use super::{ask, OaiAgent};
use crate::prompts;

pub struct LlmArguments {
    agent: OaiAgent,
}

impl LlmArguments {
    pub fn new(agent: OaiAgent) -> Self {
        Self { agent }
    }
}

#[async_trait]
impl ArgumentGenerator for LlmArguments {
    async fn generate_arguments(
        &self,
        request: &ArgumentRequest,
    ) -> CollaboratorResult<Vec<ArgumentDraft>> {
        let raw = ask(
            &self.agent,
            "argument_generator",
            &prompts::arguments_prompt(request),
        )
        .await?;
        decode_arguments(&raw)
    }

    async fn generate_attacks(
        &self,
        request: &ArgumentRequest,
    ) -> CollaboratorResult<Vec<AttackDraft>> {
        if request.opposing_arguments.is_empty() {
            return Ok(Vec::new());
        }
        let raw = ask(&self.agent, "attack_generator", &prompts::attacks_prompt(request)).await?;
        let targets: Vec<&str> = request
            .opposing_arguments
            .iter()
            .map(|a| a.id.as_str())
            .collect();
        decode_attacks(&raw, &targets)
    }
}

/// Judges a whole round of attacks in one call.
pub struct LlmValidator {
    agent: OaiAgent,
}

impl LlmValidator {
    pub fn new(agent: OaiAgent) -> Self {
        Self { agent }
    }
}

#[async_trait]
impl AttackValidator for LlmValidator {
    async fn validate(
        &self,
        attacks: &[Attack],
        graph: &ArgumentationGraph,
    ) -> CollaboratorResult<Vec<ValidationResult>> {
        if attacks.is_empty() {
            return Ok(Vec::new());
        }
        let raw = ask(
            &self.agent,
            "attack_validator",
            &prompts::validation_prompt(attacks, graph),
        )
        .await?;
        let ids: Vec<&str> = attacks.iter().map(|a| a.id.as_str()).collect();
        decode_validations(&raw, &ids)
    }
}
