//! Content sources for the changelog pipeline.
//!
//! This crate provides:
//! - [`Source`] — the polymorphic content-fetch capability
//! - [`GithubSource`] — articles from a GitHub repository path, fetched
//!   through the contents API with paginated, concurrent file loads
//! - [`LocalSource`] — a single statically configured document

pub mod github;
pub mod local;

pub use github::GithubSource;
pub use local::LocalSource;

use changelogd_shared::{LoadResult, Pagination, Result};

/// Pluggable content-fetch capability producing raw article bytes from a
/// specific backend.
///
/// `load` is the single operation; cancellation is dropping the returned
/// future, which aborts in-flight fetches. Authentication and caching
/// are not a source's concern: each source issues plain requests through
/// an already-composed transport chain.
#[async_trait::async_trait]
pub trait Source: Send + Sync {
    async fn load(&self, page: Pagination) -> Result<LoadResult>;
}
