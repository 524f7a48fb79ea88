//! LLM-backed collaborators, configuration and event logging for the crux
//! debate engine.
//!
//! The engine itself lives in [`crux_coordination`]; this crate plugs
//! OpenAI-compatible endpoints into its collaborator traits and provides the
//! `crux-agents` command-line driver.

pub mod agents;
pub mod config;
pub mod event_log;
pub mod prompts;
pub mod report;
