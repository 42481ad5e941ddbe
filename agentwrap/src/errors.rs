/// Main error type for agentwrap
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    // === Backend Errors ===
    /// A backend run failed. Displays only the diagnostic so adapters can prefix it.
    #[error("{message}")]
    Backend { message: String },

    #[error("Backend timed out after {duration_ms}ms")]
    BackendTimeout { duration_ms: u64 },

    #[error("LLM provider error ({provider}): {message}")]
    LlmProvider { provider: String, message: String },

    #[error("LLM API authentication failed: {provider}")]
    LlmAuthentication { provider: String },

    #[error("LLM API rate limit exceeded: {provider}")]
    LlmRateLimit { provider: String },

    // === Task Errors ===
    #[error("Task not found: {task_id}")]
    TaskNotFound { task_id: String },

    #[error("Task {task_id} cannot be canceled: {reason}")]
    TaskNotCancelable { task_id: String, reason: String },

    #[error("Unknown task state: {0}")]
    UnknownTaskState(String),

    #[error("Unsupported operation: {operation}")]
    UnsupportedOperation { operation: String },

    // === Configuration Errors ===
    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfiguration { field: String, reason: String },

    #[error("Missing configuration: {field}")]
    MissingConfiguration { field: String },

    // === Input Errors ===
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Missing input: {0}")]
    MissingInput(String),

    // === Network/IO Errors ===
    #[error("Network error: {operation}: {reason}")]
    Network { operation: String, reason: String },

    #[error("Serialization error: {format}: {reason}")]
    Serialization { format: String, reason: String },

    #[error("Internal error: {component}: {reason}")]
    Internal { component: String, reason: String },
}

/// Convenience type alias
pub type AgentResult<T> = std::result::Result<T, AgentError>;

impl AgentError {
    /// Shorthand for a backend failure carrying a diagnostic message.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization {
            format: "json".to_string(),
            reason: error.to_string(),
        }
    }
}

impl From<std::io::Error> for AgentError {
    fn from(error: std::io::Error) -> Self {
        Self::Internal {
            component: "io".to_string(),
            reason: error.to_string(),
        }
    }
}

impl From<tokio::task::JoinError> for AgentError {
    fn from(error: tokio::task::JoinError) -> Self {
        let reason = if error.is_cancelled() {
            "task cancelled".to_string()
        } else if error.is_panic() {
            "task panicked".to_string()
        } else {
            error.to_string()
        };

        Self::Internal {
            component: "task".to_string(),
            reason,
        }
    }
}

impl From<reqwest::Error> for AgentError {
    fn from(error: reqwest::Error) -> Self {
        Self::Network {
            operation: "http_request".to_string(),
            reason: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_displays_bare_diagnostic() {
        assert_eq!(AgentError::backend("timeout").to_string(), "timeout");
    }

    #[test]
    fn configuration_error_names_the_field() {
        let err = AgentError::InvalidConfiguration {
            field: "framework".into(),
            reason: "expected langgraph".into(),
        };
        let message = err.to_string();
        assert!(message.contains("framework"));
        assert!(message.contains("expected langgraph"));
    }
}
