//! Application configuration for changelogd.
//!
//! User config lives at `~/.changelogd/changelogd.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ChangelogError, Result};
use crate::types::{ChangelogRecord, SourceDescriptor};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "changelogd.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".changelogd";

// ---------------------------------------------------------------------------
// Config structs (matching changelogd.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// The single-tenant changelog served in config mode.
    #[serde(default)]
    pub changelog: ChangelogConfig,

    /// GitHub authentication, shared by all GitHub sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<GithubAuthConfig>,

    /// Response cache backend. Absent means no response caching.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheConfig>,
}

/// `[changelog]` section — the fixed descriptor used in config mode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangelogConfig {
    /// Where the changelog content lives.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceDescriptor>,

    /// Whether the changelog is password protected.
    #[serde(default)]
    pub protected: bool,

    /// Password hash for protected changelogs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
}

/// `[github]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GithubAuthConfig {
    /// GitHub App id, paired with `private_key` for installation auth.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<u64>,

    /// Path to the GitHub App RS256 private key PEM file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<PathBuf>,

    /// Static personal access token, used when no app installation
    /// applies to the tenant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

impl GithubAuthConfig {
    /// True if app-installation auth is fully configured.
    pub fn has_app_auth(&self) -> bool {
        self.app_id.is_some() && self.private_key.is_some()
    }
}

/// `[cache]` section. Backends are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CacheConfig {
    /// Process-local in-memory map.
    Memory,
    /// On-disk content store with a maximum byte budget.
    Disk { location: PathBuf, max_size: u64 },
    /// S3-compatible remote object store.
    S3 { endpoint: String, bucket: String },
}

impl AppConfig {
    /// The fixed changelog record served in config mode, if one is
    /// configured.
    pub fn changelog_record(&self) -> Option<ChangelogRecord> {
        self.changelog.source.as_ref().map(|source| ChangelogRecord {
            descriptor: source.clone(),
            protected: self.changelog.protected,
            password_hash: self.changelog.password_hash.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.changelogd/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ChangelogError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.changelogd/changelogd.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file
/// does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ChangelogError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| ChangelogError::config(format!("failed to parse {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_source() {
        let config = AppConfig::default();
        assert!(config.changelog.source.is_none());
        assert!(config.changelog_record().is_none());
        assert!(config.cache.is_none());
    }

    #[test]
    fn config_roundtrip() {
        let toml_str = r#"
[changelog]
protected = true
password_hash = "$2a$10$abcdefghijklmnopqrstuv"

[changelog.source]
type = "github"
owner = "acme"
repo = "product"
path = "changelog"
installation_id = 42

[github]
app_id = 7
private_key = "/etc/changelogd/app.pem"

[cache]
type = "disk"
location = "/var/cache/changelogd"
max_size = 104857600
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        let record = config.changelog_record().expect("record");
        assert!(record.protected);
        match &record.descriptor {
            SourceDescriptor::Github(gh) => assert_eq!(gh.installation_id, Some(42)),
            other => panic!("unexpected descriptor: {other:?}"),
        }
        assert!(config.github.as_ref().unwrap().has_app_auth());
        assert_eq!(
            config.cache,
            Some(CacheConfig::Disk {
                location: "/var/cache/changelogd".into(),
                max_size: 104_857_600,
            })
        );

        let serialized = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&serialized).expect("reparse");
        assert_eq!(parsed.cache, config.cache);
    }

    #[test]
    fn memory_cache_config() {
        let config: AppConfig = toml::from_str(
            r#"
[cache]
type = "memory"
"#,
        )
        .expect("parse");
        assert_eq!(config.cache, Some(CacheConfig::Memory));
    }

    #[test]
    fn access_token_without_app_auth() {
        let config: AppConfig = toml::from_str(
            r#"
[github]
access_token = "ghp_example"
"#,
        )
        .expect("parse");
        let github = config.github.unwrap();
        assert!(!github.has_app_auth());
        assert_eq!(github.access_token.as_deref(), Some("ghp_example"));
    }
}
