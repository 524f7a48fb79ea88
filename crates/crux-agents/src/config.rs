use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use crux_coordination::persona::validate_roster;
use crux_coordination::{DebateConfig, PersonaProfile};
use rig::providers::openai;
use serde::Deserialize;

/// Text-generation endpoint (any OpenAI-compatible server).
#[derive(Debug, Clone, Deserialize)]
pub struct Endpoint {
    pub url: String,
    pub model: String,
    pub api_key: String,
}

/// Top-level configuration for the agents binary.
#[derive(Debug, Clone)]
pub struct AgentsConfig {
    pub endpoint: Endpoint,
    /// Model used for short analytical calls (detection, validation,
    /// extraction). Defaults to the main model.
    pub analyst_model: String,
    /// Sampling temperature for persona turns.
    pub debater_temperature: f64,
    pub debate: DebateConfig,
    /// Where the event log is written, if anywhere.
    pub events_path: Option<PathBuf>,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        let model = std::env::var("CRUX_LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
        Self {
            endpoint: Endpoint {
                url: std::env::var("CRUX_LLM_URL")
                    .unwrap_or_else(|_| "http://localhost:8080/v1".into()),
                model: model.clone(),
                api_key: std::env::var("CRUX_LLM_API_KEY")
                    .unwrap_or_else(|_| "not-needed".into()),
            },
            analyst_model: std::env::var("CRUX_ANALYST_MODEL").unwrap_or(model),
            debater_temperature: 0.7,
            debate: DebateConfig::default(),
            events_path: None,
        }
    }
}

/// On-disk overrides. Every section is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub endpoint: Option<EndpointOverrides>,
    pub debate: Option<DebateConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EndpointOverrides {
    pub url: Option<String>,
    pub model: Option<String>,
    pub analyst_model: Option<String>,
    pub api_key: Option<String>,
    pub temperature: Option<f64>,
}

impl AgentsConfig {
    /// Environment defaults, overlaid with a TOML file when given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(path) = path {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            let file: FileConfig = toml::from_str(&text)
                .with_context(|| format!("Failed to parse config {}", path.display()))?;
            config.apply(file);
        }
        config
            .debate
            .validate()
            .context("Invalid debate configuration")?;
        Ok(config)
    }

    fn apply(&mut self, file: FileConfig) {
        if let Some(endpoint) = file.endpoint {
            if let Some(url) = endpoint.url {
                self.endpoint.url = url;
            }
            if let Some(model) = endpoint.model {
                self.endpoint.model = model;
            }
            if let Some(model) = endpoint.analyst_model {
                self.analyst_model = model;
            }
            if let Some(key) = endpoint.api_key {
                self.endpoint.api_key = key;
            }
            if let Some(temperature) = endpoint.temperature {
                self.debater_temperature = temperature;
            }
        }
        if let Some(debate) = file.debate {
            self.debate = debate;
        }
    }
}

#[derive(Debug, Deserialize)]
struct PersonaFile {
    personas: Vec<PersonaProfile>,
}

/// Load a persona roster from YAML.
///
/// Accepts either a bare list or a `personas:` mapping.
pub fn load_personas(path: &Path) -> Result<Vec<PersonaProfile>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read personas {}", path.display()))?;
    parse_personas(&text).with_context(|| format!("Failed to load personas {}", path.display()))
}

pub fn parse_personas(text: &str) -> Result<Vec<PersonaProfile>> {
    let personas = match serde_yaml::from_str::<PersonaFile>(text) {
        Ok(file) => file.personas,
        Err(_) => serde_yaml::from_str::<Vec<PersonaProfile>>(text)
            .context("Expected a list of personas or a `personas:` mapping")?,
    };
    validate_roster(&personas)?;
    Ok(personas)
}

/// Build the rig client for the configured endpoint.
pub fn build_client(endpoint: &Endpoint) -> Result<openai::CompletionsClient> {
    openai::CompletionsClient::builder()
        .api_key(&endpoint.api_key)
        .base_url(&endpoint.url)
        .build()
        .with_context(|| format!("Failed to build client for {}", endpoint.url))
}

/// Check if an inference endpoint is reachable (GET /models).
pub async fn check_endpoint(url: &str) -> bool {
    let models_url = format!("{}/models", url.trim_end_matches('/'));
    match reqwest::Client::new()
        .get(&models_url)
        .timeout(std::time::Duration::from_secs(5))
        .send()
        .await
    {
        Ok(resp) => resp.status().is_success(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crux_coordination::DebateMode;

    #[test]
    fn test_parse_personas_mapping_and_list() {
        let mapping = r#"
personas:
  - id: econ
    name: Ada
    domain_keywords: [prices, supply]
  - id: tenant
    name: Bea
    aliases: [tenants]
"#;
        let personas = parse_personas(mapping).unwrap();
        assert_eq!(personas.len(), 2);
        assert_eq!(personas[0].domain_keywords, vec!["prices", "supply"]);
        assert!(personas[1].background.is_empty());

        let list = "- {id: a, name: A}\n- {id: b, name: B}\n";
        assert_eq!(parse_personas(list).unwrap().len(), 2);
    }

    #[test]
    fn test_parse_personas_rejects_short_roster() {
        let err = parse_personas("- {id: a, name: A}\n").unwrap_err();
        assert!(format!("{:#}", err).contains("at least 2 personas"));
    }

    #[test]
    fn test_demo_files_load() {
        let personas = parse_personas(include_str!("../../../demos/personas.yaml")).unwrap();
        assert_eq!(personas.len(), 3);
        assert!(personas[2].aliases.contains(&"city planner".to_string()));

        let file: FileConfig = toml::from_str(include_str!("../../../demos/crux.toml")).unwrap();
        let mut config = AgentsConfig::default();
        config.apply(file);
        assert_eq!(config.debate.mode, DebateMode::FreeForm);
        assert_eq!(config.debate.convergence.max_events, 12);
        assert!(config.debate.validate().is_ok());
    }

    #[test]
    fn test_file_overrides_apply() {
        let file: FileConfig = toml::from_str(
            r#"
            [endpoint]
            model = "local-model"
            temperature = 0.2

            [debate]
            mode = "sequential"
            max_turns = 12
            "#,
        )
        .unwrap();
        let mut config = AgentsConfig::default();
        config.apply(file);
        assert_eq!(config.endpoint.model, "local-model");
        assert_eq!(config.debater_temperature, 0.2);
        assert_eq!(config.debate.mode, DebateMode::Sequential);
        assert_eq!(config.debate.max_turns, 12);
        assert_eq!(config.debate.max_rounds, 5);
    }
}
