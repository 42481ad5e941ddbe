//! Environment variable resolution for credentials and endpoints.
//!
//! Configuration structs hold [`EnvKey`]s instead of raw secrets; the key is
//! resolved once when the struct is built, through either the process
//! environment or an injected [`EnvResolverFn`] (secret managers, tests).

use crate::errors::AgentError;
use std::fmt;
use std::sync::Arc;

/// A reference to an environment variable or secret key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnvKey(String);

impl EnvKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn key(&self) -> &str {
        &self.0
    }

    /// Resolves the key from the process environment.
    pub fn resolve(&self) -> Result<String, AgentError> {
        default_env_resolver(&self.0)
    }

    /// Resolves the key with `resolver`, or the process environment when `None`.
    pub fn resolve_with(&self, resolver: Option<&EnvResolverFn>) -> Result<String, AgentError> {
        match resolver {
            Some(resolver) => resolver(self.key()),
            None => self.resolve(),
        }
    }

    /// Like [`EnvKey::resolve_with`], but a missing or blank value yields `None`.
    pub fn resolve_optional(&self, resolver: Option<&EnvResolverFn>) -> Option<String> {
        self.resolve_with(resolver)
            .ok()
            .filter(|value| !value.trim().is_empty())
    }
}

impl fmt::Display for EnvKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EnvKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Resolver function mapping a key name to its value.
pub type EnvResolverFn = Arc<dyn Fn(&str) -> Result<String, AgentError> + Send + Sync>;

/// Resolver backed by `std::env::var`.
pub fn default_env_resolver(key: &str) -> Result<String, AgentError> {
    std::env::var(key).map_err(|_| AgentError::MissingConfiguration {
        field: key.to_string(),
    })
}

/// Loads a `.env` file from the working directory (or a parent) if one exists.
///
/// Returns whether a file was loaded. A malformed file is reported as an
/// invalid-configuration error; a missing one is not an error.
pub fn load_dotenv() -> Result<bool, AgentError> {
    match dotenvy::dotenv() {
        Ok(path) => {
            tracing::debug!(path = %path.display(), "loaded .env file");
            Ok(true)
        }
        Err(err) if err.not_found() => Ok(false),
        Err(err) => Err(AgentError::InvalidConfiguration {
            field: ".env".to_string(),
            reason: err.to_string(),
        }),
    }
}

/// Builds a resolver over a fixed set of key/value pairs.
pub fn static_resolver<I, K, V>(pairs: I) -> EnvResolverFn
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let values: std::collections::HashMap<String, String> = pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect();
    Arc::new(move |key| {
        values
            .get(key)
            .cloned()
            .ok_or_else(|| AgentError::MissingConfiguration {
                field: key.to_string(),
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_key_exposes_name() {
        let key: EnvKey = "OPENAI_API_KEY".into();
        assert_eq!(key.key(), "OPENAI_API_KEY");
        assert_eq!(key.to_string(), "OPENAI_API_KEY");
    }

    #[test]
    fn missing_variable_is_missing_configuration() {
        let err = EnvKey::new("AGENTWRAP_SURELY_UNSET_KEY")
            .resolve()
            .expect_err("unset");
        assert!(matches!(err, AgentError::MissingConfiguration { field } if field == "AGENTWRAP_SURELY_UNSET_KEY"));
    }

    #[test]
    fn custom_resolver_takes_precedence() {
        let resolver = static_resolver([("VAULT_SECRET", "from-vault")]);
        let key = EnvKey::new("VAULT_SECRET");
        assert_eq!(key.resolve_with(Some(&resolver)).unwrap(), "from-vault");
        assert!(EnvKey::new("OTHER").resolve_with(Some(&resolver)).is_err());
    }

    #[test]
    fn optional_resolution_treats_blank_as_absent() {
        let resolver = static_resolver([("BLANK", "  "), ("SET", "value")]);
        assert_eq!(EnvKey::new("BLANK").resolve_optional(Some(&resolver)), None);
        assert_eq!(
            EnvKey::new("SET").resolve_optional(Some(&resolver)),
            Some("value".to_string())
        );
    }
}
