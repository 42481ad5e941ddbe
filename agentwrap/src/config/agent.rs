//! Agent description consumed from the scaffolder's configuration object.

use crate::errors::{AgentError, AgentResult};
use a2a_types::{AgentCard, AgentSkill};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Agent execution framework a generated server wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Framework {
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "crewai")]
    CrewAi,
    #[serde(rename = "langgraph")]
    LangGraph,
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::OpenAi => "openai",
            Self::CrewAi => "crewai",
            Self::LangGraph => "langgraph",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    #[serde(default)]
    pub streaming: bool,
    #[serde(default, rename = "pushNotifications")]
    pub push_notifications: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillConfig {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub examples: Vec<String>,
}

fn default_modes() -> Vec<String> {
    vec!["text".to_string()]
}

/// The agent's public description and negotiated capabilities.
///
/// Field names follow the scaffolder's configuration object so an embedding
/// can deserialize it directly from whatever document it loads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub framework: Framework,
    pub name: String,
    pub description: String,
    pub url: String,
    pub version: String,
    #[serde(rename = "defaultInputModes", default = "default_modes")]
    pub default_input_modes: Vec<String>,
    #[serde(rename = "defaultOutputModes", default = "default_modes")]
    pub default_output_modes: Vec<String>,
    #[serde(default)]
    pub capabilities: Capabilities,
    #[serde(default)]
    pub skills: Vec<SkillConfig>,
}

impl AgentConfig {
    pub fn new(
        framework: Framework,
        name: impl Into<String>,
        description: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            framework,
            name: name.into(),
            description: description.into(),
            url: url.into(),
            version: "1.0.0".to_string(),
            default_input_modes: default_modes(),
            default_output_modes: default_modes(),
            capabilities: Capabilities::default(),
            skills: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_streaming(mut self, enabled: bool) -> Self {
        self.capabilities.streaming = enabled;
        self
    }

    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    #[must_use]
    pub fn with_skill(mut self, skill: SkillConfig) -> Self {
        self.skills.push(skill);
        self
    }

    /// Fails unless the configuration targets `expected`.
    pub fn ensure_framework(&self, expected: Framework) -> AgentResult<()> {
        if self.framework == expected {
            Ok(())
        } else {
            Err(AgentError::InvalidConfiguration {
                field: "framework".to_string(),
                reason: format!(
                    "configured for {}, but the server was built for {expected}",
                    self.framework
                ),
            })
        }
    }

    /// Builds the discovery document. Push notifications are never advertised.
    pub fn agent_card(&self) -> AgentCard {
        let mut card = AgentCard::new(&self.name, &self.description, &self.version, &self.url)
            .with_streaming(self.capabilities.streaming)
            .with_push_notifications(false)
            .with_default_input_modes(self.default_input_modes.clone())
            .with_default_output_modes(self.default_output_modes.clone());

        for skill in &self.skills {
            card = card.add_skill(
                AgentSkill::new(&skill.id, &skill.name)
                    .with_description(&skill.description)
                    .with_tags(skill.tags.clone())
                    .with_examples(skill.examples.clone()),
            );
        }

        card
    }
}
