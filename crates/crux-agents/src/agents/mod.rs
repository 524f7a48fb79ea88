//! LLM-backed collaborators.
//!
//! Each role gets its own rig agent (preamble + temperature) on the shared
//! OpenAI-compatible client. Raw completions go through
//! [`crux_coordination::decode`] before they reach the engine, so the engine
//! only ever sees typed, validated values.

pub mod analysts;
pub mod debater;
pub mod graph;

use std::sync::Arc;

use anyhow::Result;
use rig::agent::Agent;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers::openai;
use tracing::debug;

use crux_coordination::{CollaboratorError, CollaboratorResult, Collaborators, PersonaProfile};

use crate::config::{build_client, AgentsConfig};
use crate::prompts::{self, PROMPT_VERSION};

/// Type alias for agents built from OpenAI-compatible endpoints.
pub type OaiAgent = Agent<openai::completion::CompletionModel>;

/// Builds one agent per role from an [`AgentsConfig`].
pub struct AgentFactory {
    client: openai::CompletionsClient,
    config: AgentsConfig,
}

impl AgentFactory {
    pub fn new(config: &AgentsConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(&config.endpoint)?,
            config: config.clone(),
        })
    }

    fn build(&self, name: &str, model: &str, preamble: &str, temperature: f64) -> OaiAgent {
        self.client
            .agent(model)
            .name(name)
            .preamble(preamble)
            .temperature(temperature)
            .build()
    }

    fn analyst(&self, name: &str, preamble: &str) -> OaiAgent {
        self.build(name, &self.config.analyst_model, preamble, 0.1)
    }

    /// Wire every collaborator the debate config can use.
    pub fn collaborators(&self, personas: &[PersonaProfile]) -> Collaborators {
        let model = &self.config.endpoint.model;
        let persona_ids: Vec<String> = personas.iter().map(|p| p.id.clone()).collect();

        let debater = debater::LlmDebater::new(self.build(
            "debater",
            model,
            prompts::DEBATER_PREAMBLE,
            self.config.debater_temperature,
        ));
        let planner =
            debater::LlmPlanner::new(self.build("planner", model, prompts::PLANNER_PREAMBLE, 0.3));
        let decomposer = analysts::LlmDecomposer::new(
            self.analyst("claim_decomposer", prompts::DECOMPOSER_PREAMBLE),
        );

        Collaborators::new(Arc::new(decomposer), Arc::new(debater))
            .with_planner(Arc::new(planner))
            .with_detector(Arc::new(analysts::LlmDetector::new(
                self.analyst("disagreement_detector", prompts::DETECTOR_PREAMBLE),
                persona_ids,
            )))
            .with_arguments(Arc::new(graph::LlmArguments::new(self.build(
                "argument_generator",
                model,
                prompts::ARGUMENT_PREAMBLE,
                0.4,
            ))))
            .with_validator(Arc::new(graph::LlmValidator::new(
                self.analyst("attack_validator", prompts::VALIDATOR_PREAMBLE),
            )))
            .with_extractor(Arc::new(analysts::LlmExtractor::new(
                self.analyst("final_extractor", prompts::EXTRACTOR_PREAMBLE),
            )))
            .with_summarizer(Arc::new(analysts::LlmSummarizer::new(
                self.analyst("summarizer", prompts::SUMMARIZER_PREAMBLE),
            )))
            .with_crux_cards(Arc::new(analysts::LlmCruxCards::new(
                self.analyst("crux_card_extractor", prompts::CRUX_CARD_PREAMBLE),
            )))
    }
}

/// Send one prompt and map transport failures onto the collaborator taxonomy.
pub(crate) async fn ask(agent: &OaiAgent, who: &str, prompt: &str) -> CollaboratorResult<String> {
    debug!(
        collaborator = who,
        prompt_version = PROMPT_VERSION,
        chars = prompt.len(),
        "prompting"
    );
    agent
        .prompt(prompt)
        .await
        .map_err(|e| classify_prompt_error(who, &e.to_string()))
}

/// Rate limits, gateway errors and connection-level failures are transient;
/// everything else (auth, unknown model, bad request) is not worth retrying.
pub fn classify_prompt_error(who: &str, message: &str) -> CollaboratorError {
    let lower = message.to_ascii_lowercase();
    let transient = message.contains("429")
        || message.contains("502")
        || message.contains("503")
        || message.contains("504")
        || lower.contains("rate limit")
        || lower.contains("connection")
        || lower.contains("timed out")
        || lower.contains("timeout")
        || lower.contains("error sending request")
        || lower.contains("broken pipe")
        || lower.contains("reset by peer")
        || lower.contains("response contained no message");
    if transient {
        CollaboratorError::transient(who, message)
    } else {
        CollaboratorError::unavailable(who, message)
    }
}
