//! Single-shot analytical roles: decomposition, detection, extraction,
//! summarisation and crux cards.

use async_trait::async_trait;

use crux_coordination::collaborators::{ClaimDraft, CruxCardRequest, SummaryRequest};
use crux_coordination::decode::{decode_claims, decode_crux_card, decode_detection, decode_output};
use crux_coordination::{
    BlackboardState, ClaimDecomposer, CollaboratorError, CollaboratorResult, CruxCard,
    CruxCardExtractor, DebateOutput, DisagreementDetection, DisagreementDetector, FinalExtractor,
    Summarizer, TranscriptMessage,
};

use super::{ask, OaiAgent};
use crate::prompts;

pub struct LlmDecomposer {
    agent: OaiAgent,
}

impl LlmDecomposer {
    pub fn new(agent: OaiAgent) -> Self {
        Self { agent }
    }
}

#[async_trait]
impl ClaimDecomposer for LlmDecomposer {
    async fn decompose(&self, topic: &str) -> CollaboratorResult<Vec<ClaimDraft>> {
        let raw = ask(&self.agent, "claim_decomposer", &prompts::decompose_prompt(topic)).await?;
        decode_claims(&raw)
    }
}

/// Flags a persona pair stuck on one point. Knows the roster so it can
/// reject ids the model invents.
pub struct LlmDetector {
    agent: OaiAgent,
    persona_ids: Vec<String>,
}

impl LlmDetector {
    pub fn new(agent: OaiAgent, persona_ids: Vec<String>) -> Self {
        Self { agent, persona_ids }
    }
}

#[async_trait]
impl DisagreementDetector for LlmDetector {
    async fn detect(
        &self,
        window: &[TranscriptMessage],
    ) -> CollaboratorResult<Option<DisagreementDetection>> {
        let ids: Vec<&str> = self.persona_ids.iter().map(String::as_str).collect();
        let raw = ask(
            &self.agent,
            "disagreement_detector",
            &prompts::detection_prompt(window, &ids),
        )
        .await?;
        decode_detection(&raw, &ids)
    }
}

pub struct LlmExtractor {
    agent: OaiAgent,
}

impl LlmExtractor {
    pub fn new(agent: OaiAgent) -> Self {
        Self { agent }
    }
}

#[async_trait]
impl FinalExtractor for LlmExtractor {
    async fn extract(&self, snapshot: &BlackboardState) -> CollaboratorResult<DebateOutput> {
        let raw = ask(
            &self.agent,
            "final_extractor",
            &prompts::extraction_prompt(snapshot),
        )
        .await?;
        decode_output(&raw)
    }
}

pub struct LlmSummarizer {
    agent: OaiAgent,
}

impl LlmSummarizer {
    pub fn new(agent: OaiAgent) -> Self {
        Self { agent }
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, request: &SummaryRequest) -> CollaboratorResult<String> {
        let raw = ask(&self.agent, "summarizer", &prompts::summary_prompt(request)).await?;
        let summary = raw.trim();
        if summary.is_empty() {
            return Err(CollaboratorError::malformed("summarizer", "empty summary"));
        }
        Ok(summary.to_string())
    }
}

pub struct LlmCruxCards {
    agent: OaiAgent,
}

impl LlmCruxCards {
    pub fn new(agent: OaiAgent) -> Self {
        Self { agent }
    }
}

#[async_trait]
impl CruxCardExtractor for LlmCruxCards {
    async fn extract_card(&self, request: &CruxCardRequest) -> CollaboratorResult<CruxCard> {
        let raw = ask(
            &self.agent,
            "crux_card_extractor",
            &prompts::crux_card_prompt(request),
        )
        .await?;
        decode_crux_card(&raw, &request.topic, &request.personas)
    }
}
