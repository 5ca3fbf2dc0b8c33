//! Shared types, error model, and configuration for changelogd.
//!
//! This crate is the foundation depended on by all other changelogd crates.
//! It provides:
//! - [`ChangelogError`] — the unified error type
//! - Domain types ([`Pagination`], [`RawArticle`], [`LoadResult`],
//!   [`SourceDescriptor`], [`ChangelogRecord`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CacheConfig, ChangelogConfig, GithubAuthConfig, config_dir, config_file_path,
    load_config, load_config_from,
};
pub use error::{ChangelogError, Result};
pub use types::{
    ChangelogRecord, DEFAULT_PAGE, DEFAULT_PAGE_SIZE, GithubDescriptor, LoadResult,
    LocalDescriptor, Pagination, RawArticle, SourceDescriptor,
};
