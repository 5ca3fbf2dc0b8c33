//! HTTP transport chain and response cache backends.
//!
//! This crate provides:
//! - [`chain`] — the composable send capability: a base reqwest
//!   transport wrapped by optional auth and response-cache decorators
//! - [`auth`] — token providers (static access token, GitHub App
//!   installation token exchange)
//! - [`cache`] — pluggable cache backends (memory, disk, object store)
//!
//! Chains are composed once at source-construction time and shared
//! across requests; nothing in here mutates global transport state.

pub mod auth;
pub mod cache;
pub mod chain;

pub use auth::{InstallationTokenProvider, StaticToken, TokenProvider};
pub use cache::{CacheBackend, DiskCache, MemoryCache, ObjectStoreCache, build_backend};
pub use chain::{
    AuthTransport, CachedTransport, HttpRequest, HttpResponse, HttpSend, ReqwestTransport,
    build_chain,
};
