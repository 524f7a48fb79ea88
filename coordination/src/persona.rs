//! Persona definitions and roster validation.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Minimum participants in a debate.
pub const MIN_PERSONAS: usize = 2;

/// Identity and routing hints for one debating agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaProfile {
    pub id: String,
    pub name: String,
    /// Names the persona answers to when addressed directly.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Topics that pull this persona into the conversation.
    #[serde(default)]
    pub domain_keywords: Vec<String>,
    /// Free-form background passed to the agent collaborator.
    #[serde(default)]
    pub background: String,
}

impl PersonaProfile {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            aliases: Vec::new(),
            domain_keywords: Vec::new(),
            background: String::new(),
        }
    }

    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn with_keywords(mut self, keywords: &[&str]) -> Self {
        self.domain_keywords = keywords.iter().map(|k| k.to_string()).collect();
        self
    }

    /// Aliases plus the display name, lowercased.
    pub fn address_terms(&self) -> Vec<String> {
        std::iter::once(&self.name)
            .chain(self.aliases.iter())
            .map(|a| a.trim().to_lowercase())
            .filter(|a| !a.is_empty())
            .collect()
    }
}

/// Check a roster for size and duplicate ids.
pub fn validate_roster(personas: &[PersonaProfile]) -> Result<(), ConfigError> {
    if personas.len() < MIN_PERSONAS {
        return Err(ConfigError::TooFewPersonas {
            min: MIN_PERSONAS,
            actual: personas.len(),
        });
    }
    let mut seen = HashSet::new();
    for persona in personas {
        if persona.id.trim().is_empty() {
            return Err(ConfigError::invalid("persona.id", "must not be empty"));
        }
        if !seen.insert(persona.id.as_str()) {
            return Err(ConfigError::DuplicatePersona(persona.id.clone()));
        }
    }
    Ok(())
}

/// Resolve requested ids against the known roster, preserving request order.
pub fn select_personas(
    known: &[PersonaProfile],
    requested: &[String],
) -> Result<Vec<PersonaProfile>, ConfigError> {
    requested
        .iter()
        .map(|id| {
            known
                .iter()
                .find(|p| &p.id == id)
                .cloned()
                .ok_or_else(|| ConfigError::MissingPersona(id.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_terms_include_name() {
        let p = PersonaProfile::new("econ", "Keynes").with_aliases(&["JMK", " "]);
        assert_eq!(p.address_terms(), vec!["keynes", "jmk"]);
    }

    #[test]
    fn test_validate_roster_too_small() {
        let err = validate_roster(&[PersonaProfile::new("a", "A")]).unwrap_err();
        assert_eq!(err, ConfigError::TooFewPersonas { min: 2, actual: 1 });
    }

    #[test]
    fn test_validate_roster_duplicate() {
        let roster = vec![PersonaProfile::new("a", "A"), PersonaProfile::new("a", "B")];
        assert_eq!(
            validate_roster(&roster).unwrap_err(),
            ConfigError::DuplicatePersona("a".into())
        );
    }

    #[test]
    fn test_select_missing_persona() {
        let roster = vec![PersonaProfile::new("a", "A"), PersonaProfile::new("b", "B")];
        let err = select_personas(&roster, &["b".into(), "zed".into()]).unwrap_err();
        assert_eq!(err, ConfigError::MissingPersona("zed".into()));

        let picked = select_personas(&roster, &["b".into(), "a".into()]).unwrap();
        assert_eq!(picked[0].id, "b");
    }

    #[test]
    fn test_persona_yaml_defaults() {
        let p: PersonaProfile = serde_json::from_str(r#"{"id": "x", "name": "X"}"#).unwrap();
        assert!(p.aliases.is_empty());
        assert!(p.domain_keywords.is_empty());
    }
}
