//! Request-to-content resolution for changelogd.
//!
//! This crate provides:
//! - [`Store`] — the tenant lookup contract (by ids or by host)
//! - [`ConfigStore`] — the static single-tenant implementation
//! - [`Loader`] — resolves a request to a concrete source, invokes it,
//!   and returns a [`LoadedChangelog`] for the renderer

pub mod loader;
pub mod store;

pub use loader::{LoadedChangelog, Loader};
pub use store::{ConfigStore, Store};
