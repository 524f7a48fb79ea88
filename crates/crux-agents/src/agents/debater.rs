//! Persona turns and action planning.

use async_trait::async_trait;

use crux_coordination::collaborators::{PlanRequest, TurnRequest};
use crux_coordination::decode::{decode_plan, decode_turn};
use crux_coordination::scheduler::ActionPlan;
use crux_coordination::{
    ActionPlanner, AgentTurnGenerator, AgentTurnResponse, CollaboratorResult,
};

use super::{ask, OaiAgent};
use crate::prompts;

/// Speaks for whichever persona the request names.
pub struct LlmDebater {
    agent: OaiAgent,
}

impl LlmDebater {
    pub fn new(agent: OaiAgent) -> Self {
        Self { agent }
    }
}

#[async_trait]
impl AgentTurnGenerator for LlmDebater {
    async fn take_turn(&self, request: &TurnRequest) -> CollaboratorResult<AgentTurnResponse> {
        let raw = ask(&self.agent, "agent_turn", &prompts::turn_prompt(request)).await?;
        let claim_ids: Vec<&str> = request.claims.iter().map(|c| c.id.as_str()).collect();
        decode_turn(&raw, &claim_ids)
    }
}

/// Proposes speak / interrupt / listen for one persona.
pub struct LlmPlanner {
    agent: OaiAgent,
}

impl LlmPlanner {
    pub fn new(agent: OaiAgent) -> Self {
        Self { agent }
    }
}

#[async_trait]
impl ActionPlanner for LlmPlanner {
    async fn propose(&self, request: &PlanRequest) -> CollaboratorResult<ActionPlan> {
        let raw = ask(&self.agent, "action_planner", &prompts::plan_prompt(request)).await?;
        decode_plan(&raw, &request.persona.id)
    }
}
