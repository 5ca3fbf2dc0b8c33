//! Tenant lookup contract and the config-backed implementation.

use changelogd_shared::{AppConfig, ChangelogError, ChangelogRecord, Result};

/// Resolves a request identity to a changelog record.
///
/// Implemented by a persistent multi-tenant store or by [`ConfigStore`]
/// for single-tenant deployments; the loader is agnostic to which.
/// Unknown ids or hosts are a [`ChangelogError::NotFound`], never
/// retried.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    /// Look up by explicit workspace and changelog ids. NotFound if
    /// either id is unknown or the changelog does not belong to the
    /// workspace.
    async fn resolve_by_ids(
        &self,
        workspace_id: &str,
        changelog_id: &str,
    ) -> Result<ChangelogRecord>;

    /// Look up by the request's resolved hostname.
    async fn resolve_by_host(&self, host: &str) -> Result<ChangelogRecord>;
}

/// Single-tenant store: every lookup resolves to the one changelog from
/// `changelogd.toml`.
pub struct ConfigStore {
    record: ChangelogRecord,
}

impl ConfigStore {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let record = config.changelog_record().ok_or_else(|| {
            ChangelogError::config("no [changelog.source] configured for config mode")
        })?;
        Ok(Self { record })
    }
}

#[async_trait::async_trait]
impl Store for ConfigStore {
    async fn resolve_by_ids(
        &self,
        _workspace_id: &str,
        _changelog_id: &str,
    ) -> Result<ChangelogRecord> {
        Ok(self.record.clone())
    }

    async fn resolve_by_host(&self, _host: &str) -> Result<ChangelogRecord> {
        Ok(self.record.clone())
    }
}
