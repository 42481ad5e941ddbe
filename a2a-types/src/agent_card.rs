//! Agent discovery document served at `/.well-known/agent-card.json`.

use serde::{Deserialize, Serialize};

/// Optional protocol features an agent advertises.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct AgentCapabilities {
    /// Whether `message/stream` (SSE) is available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streaming: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "pushNotifications")]
    pub push_notifications: Option<bool>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        rename = "stateTransitionHistory"
    )]
    pub state_transition_history: Option<bool>,
}

/// A capability the agent can be asked to perform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentSkill {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub examples: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", rename = "inputModes", default)]
    pub input_modes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", rename = "outputModes", default)]
    pub output_modes: Vec<String>,
}

impl AgentSkill {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            tags: Vec::new(),
            examples: Vec::new(),
            input_modes: Vec::new(),
            output_modes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    #[must_use]
    pub fn with_examples(mut self, examples: Vec<String>) -> Self {
        self.examples = examples;
        self
    }
}

/// Self-describing manifest of an agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentCard {
    pub name: String,
    pub description: String,
    pub version: String,
    #[serde(rename = "protocolVersion", default = "default_protocol_version")]
    pub protocol_version: String,
    /// Preferred JSON-RPC endpoint.
    pub url: String,
    #[serde(rename = "preferredTransport", default = "default_transport")]
    pub preferred_transport: String,
    pub capabilities: AgentCapabilities,
    #[serde(rename = "defaultInputModes")]
    pub default_input_modes: Vec<String>,
    #[serde(rename = "defaultOutputModes")]
    pub default_output_modes: Vec<String>,
    pub skills: Vec<AgentSkill>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "documentationUrl")]
    pub documentation_url: Option<String>,
}

fn default_protocol_version() -> String {
    crate::PROTOCOL_VERSION.to_string()
}

fn default_transport() -> String {
    "JSONRPC".to_string()
}

impl AgentCard {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        version: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            version: version.into(),
            protocol_version: default_protocol_version(),
            url: url.into(),
            preferred_transport: default_transport(),
            capabilities: AgentCapabilities::default(),
            default_input_modes: vec!["text".to_string()],
            default_output_modes: vec!["text".to_string()],
            skills: Vec::new(),
            documentation_url: None,
        }
    }

    #[must_use]
    pub fn with_streaming(mut self, enabled: bool) -> Self {
        self.capabilities.streaming = Some(enabled);
        self
    }

    #[must_use]
    pub fn with_push_notifications(mut self, enabled: bool) -> Self {
        self.capabilities.push_notifications = Some(enabled);
        self
    }

    #[must_use]
    pub fn with_default_input_modes(mut self, modes: Vec<String>) -> Self {
        self.default_input_modes = modes;
        self
    }

    #[must_use]
    pub fn with_default_output_modes(mut self, modes: Vec<String>) -> Self {
        self.default_output_modes = modes;
        self
    }

    #[must_use]
    pub fn add_skill(mut self, skill: AgentSkill) -> Self {
        self.skills.push(skill);
        self
    }

    /// Whether the card advertises SSE streaming.
    pub fn supports_streaming(&self) -> bool {
        self.capabilities.streaming.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn card_serializes_camel_case_fields() {
        let card = AgentCard::new("Cook", "Recipes", "1.0.0", "http://localhost:8000/")
            .with_streaming(true)
            .with_push_notifications(false)
            .add_skill(
                AgentSkill::new("recipes", "Recipes")
                    .with_description("Step by step cooking")
                    .with_tags(vec!["cooking".into()])
                    .with_examples(vec!["Pad Thai recipe step 1".into()]),
            );

        let value = serde_json::to_value(&card).expect("serialize");
        assert_eq!(value["protocolVersion"], json!("0.3.0"));
        assert_eq!(value["defaultInputModes"], json!(["text"]));
        assert_eq!(value["capabilities"]["streaming"], json!(true));
        assert_eq!(value["capabilities"]["pushNotifications"], json!(false));
        assert_eq!(value["skills"][0]["examples"][0], json!("Pad Thai recipe step 1"));
        assert!(value.get("documentationUrl").is_none());
    }

    #[test]
    fn streaming_defaults_to_disabled() {
        let card = AgentCard::new("a", "b", "0.1.0", "http://x");
        assert!(!card.supports_streaming());
        assert!(card.with_streaming(true).supports_streaming());
    }
}
