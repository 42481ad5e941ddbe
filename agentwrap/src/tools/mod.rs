//! Collaborating tools used by the internship-research agent.
//!
//! These run inside an agent backend, not inside the task lifecycle core.
//! The parser's worker pool is private to the tools and is not coordinated
//! with the executor.

pub mod parser;
pub mod pool;
pub mod post_search;
pub mod search_phrases;
pub mod writer;

pub use parser::{ParsedPost, PostParser};
pub use pool::BoundedPool;
pub use post_search::{search_posts, PostSource, RedditClient, RedditPost, SearchOptions};
pub use search_phrases::SearchPhraseGenerator;
pub use writer::{JsonlWriter, WriteSummary};
