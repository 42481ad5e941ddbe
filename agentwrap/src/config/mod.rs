//! Configuration objects passed down from the embedding entry point.
//!
//! Nothing here reads configuration files. The entry point builds these
//! structs once per process (optionally via serde) and hands them to the
//! executor, adapters and tools.

pub mod agent;
pub mod env_resolver;
pub mod providers;

pub use agent::{AgentConfig, Capabilities, Framework, SkillConfig};
pub use env_resolver::{default_env_resolver, load_dotenv, static_resolver, EnvKey, EnvResolverFn};
pub use providers::{OpenAiConfig, RedditConfig, DEFAULT_OPENAI_MODEL};
