//! Resolves which changelog applies to a request, builds the matching
//! source, and invokes it.
//!
//! Resolution precedence is the caller's responsibility: explicit
//! workspace+changelog ids, when both are present in the request, take
//! priority over host-based resolution (with any `X-Forwarded-Host`
//! override applied before calling [`Loader::from_host`]).

use std::collections::HashMap;
use std::sync::Arc;

use tracing::instrument;

use changelogd_shared::{
    AppConfig, ChangelogError, ChangelogRecord, GithubAuthConfig, Pagination, RawArticle, Result,
    SourceDescriptor,
};
use changelogd_source::{GithubSource, LocalSource, Source};
use changelogd_transport::{
    CacheBackend, InstallationTokenProvider, StaticToken, TokenProvider, build_chain,
};

use crate::store::Store;

/// User-Agent for all outbound content requests.
const USER_AGENT: &str = concat!("changelogd/", env!("CARGO_PKG_VERSION"));

/// What the loader hands the renderer: the loaded page of articles plus
/// the tenant-level metadata it needs. Owned exclusively by the caller
/// after return.
#[derive(Debug)]
pub struct LoadedChangelog {
    /// Articles in newest-first order.
    pub articles: Vec<RawArticle>,
    /// True if articles exist beyond the current page.
    pub has_more: bool,
    /// Whether the changelog is password protected.
    pub protected: bool,
    /// Password hash for protected changelogs, verification elsewhere.
    pub password_hash: Option<String>,
}

/// Builds and invokes sources for resolved changelog records.
///
/// The HTTP client, cache backend, and per-installation token providers
/// are created once and shared across requests; composing the transport
/// wrappers per load is allocation-only.
pub struct Loader {
    client: reqwest::Client,
    store: Arc<dyn Store>,
    cache: Option<Arc<dyn CacheBackend>>,
    github: Option<GithubAuthConfig>,
    static_record: Option<ChangelogRecord>,
    api_base: Option<String>,
    providers: tokio::sync::RwLock<HashMap<u64, Arc<InstallationTokenProvider>>>,
}

impl Loader {
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn Store>,
        cache: Option<Arc<dyn CacheBackend>>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ChangelogError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            store,
            cache,
            github: config.github.clone(),
            static_record: config.changelog_record(),
            api_base: None,
            providers: tokio::sync::RwLock::new(HashMap::new()),
        })
    }

    /// Override the GitHub API base URL (tests point this at a mock
    /// server).
    pub fn with_github_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = Some(base.into());
        self
    }

    /// Single-tenant mode: load the process-wide static changelog, no
    /// store lookup.
    #[instrument(skip_all)]
    pub async fn from_config(&self, page: Pagination) -> Result<LoadedChangelog> {
        let record = self
            .static_record
            .clone()
            .ok_or_else(|| ChangelogError::not_found("no changelog configured"))?;
        self.load_record(record, page).await
    }

    /// Explicit-identity mode: look up the changelog by workspace and
    /// changelog ids.
    #[instrument(skip_all, fields(workspace_id, changelog_id))]
    pub async fn from_workspace(
        &self,
        workspace_id: &str,
        changelog_id: &str,
        page: Pagination,
    ) -> Result<LoadedChangelog> {
        let record = self.store.resolve_by_ids(workspace_id, changelog_id).await?;
        self.load_record(record, page).await
    }

    /// Multi-tenant mode: look up the changelog by the request's
    /// resolved hostname.
    #[instrument(skip_all, fields(host))]
    pub async fn from_host(&self, host: &str, page: Pagination) -> Result<LoadedChangelog> {
        let record = self.store.resolve_by_host(host).await?;
        self.load_record(record, page).await
    }

    async fn load_record(
        &self,
        record: ChangelogRecord,
        page: Pagination,
    ) -> Result<LoadedChangelog> {
        let source = self.build_source(&record.descriptor).await?;
        let result = source.load(page).await?;
        Ok(LoadedChangelog {
            articles: result.articles,
            has_more: result.has_more,
            protected: record.protected,
            password_hash: record.password_hash,
        })
    }

    async fn build_source(&self, descriptor: &SourceDescriptor) -> Result<Box<dyn Source>> {
        match descriptor {
            SourceDescriptor::Github(gh) => {
                let provider = match gh.installation_id {
                    Some(id) => self.installation_provider(id).await?,
                    None => None,
                };
                // Installation auth wins for the tenant; a configured
                // static access token is the fallback.
                let provider = provider.or_else(|| {
                    self.github
                        .as_ref()
                        .and_then(|g| g.access_token.as_ref())
                        .map(|token| {
                            Arc::new(StaticToken::new(token.clone())) as Arc<dyn TokenProvider>
                        })
                });

                let chain = build_chain(self.client.clone(), provider, self.cache.clone());
                let mut source = GithubSource::new(gh, chain);
                if let Some(base) = &self.api_base {
                    source = source.with_api_base(base.clone());
                }
                Ok(Box::new(source))
            }
            SourceDescriptor::Local(local) => Ok(Box::new(LocalSource::new(local)?)),
        }
    }

    /// Get or create the token provider for an installation id.
    ///
    /// Providers load credentials at construction, so they are built
    /// once per installation and reused by every subsequent request.
    async fn installation_provider(
        &self,
        installation_id: u64,
    ) -> Result<Option<Arc<dyn TokenProvider>>> {
        let Some(github) = &self.github else {
            return Ok(None);
        };
        let (Some(app_id), Some(key_path)) = (github.app_id, github.private_key.as_ref()) else {
            return Ok(None);
        };

        {
            let providers = self.providers.read().await;
            if let Some(provider) = providers.get(&installation_id) {
                return Ok(Some(provider.clone() as Arc<dyn TokenProvider>));
            }
        }

        let mut providers = self.providers.write().await;
        if let Some(provider) = providers.get(&installation_id) {
            return Ok(Some(provider.clone() as Arc<dyn TokenProvider>));
        }

        let mut provider = InstallationTokenProvider::new(
            app_id,
            installation_id,
            key_path,
            self.client.clone(),
        )?;
        if let Some(base) = &self.api_base {
            provider = provider.with_api_base(base.clone());
        }
        let provider = Arc::new(provider);
        providers.insert(installation_id, provider.clone());
        Ok(Some(provider as Arc<dyn TokenProvider>))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use changelogd_shared::{GithubDescriptor, LocalDescriptor};
    use changelogd_transport::MemoryCache;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// In-memory multi-tenant store for loader tests.
    #[derive(Default)]
    struct MapStore {
        by_ids: HashMap<(String, String), ChangelogRecord>,
        by_host: HashMap<String, ChangelogRecord>,
    }

    #[async_trait::async_trait]
    impl Store for MapStore {
        async fn resolve_by_ids(
            &self,
            workspace_id: &str,
            changelog_id: &str,
        ) -> Result<ChangelogRecord> {
            self.by_ids
                .get(&(workspace_id.to_string(), changelog_id.to_string()))
                .cloned()
                .ok_or_else(|| {
                    ChangelogError::not_found(format!(
                        "no changelog {changelog_id} in workspace {workspace_id}"
                    ))
                })
        }

        async fn resolve_by_host(&self, host: &str) -> Result<ChangelogRecord> {
            self.by_host
                .get(host)
                .cloned()
                .ok_or_else(|| ChangelogError::not_found(format!("no changelog for host {host}")))
        }
    }

    fn inline_record(content: &str) -> ChangelogRecord {
        ChangelogRecord {
            descriptor: SourceDescriptor::Local(LocalDescriptor {
                path: None,
                content: Some(content.into()),
            }),
            protected: true,
            password_hash: Some("$2a$10$hash".into()),
        }
    }

    fn github_record(installation_id: Option<u64>) -> ChangelogRecord {
        ChangelogRecord {
            descriptor: SourceDescriptor::Github(GithubDescriptor {
                owner: "acme".into(),
                repo: "product".into(),
                path: "changelog".into(),
                installation_id,
            }),
            protected: false,
            password_hash: None,
        }
    }

    #[tokio::test]
    async fn from_host_resolves_and_carries_protection() {
        let mut store = MapStore::default();
        store
            .by_host
            .insert("demo.example.com".into(), inline_record("## v1"));

        let loader = Loader::new(&AppConfig::default(), Arc::new(store), None).unwrap();
        let loaded = loader
            .from_host("demo.example.com", Pagination::new(1, 10))
            .await
            .unwrap();

        assert_eq!(loaded.articles.len(), 1);
        assert!(loaded.protected);
        assert_eq!(loaded.password_hash.as_deref(), Some("$2a$10$hash"));
    }

    #[tokio::test]
    async fn unknown_host_is_not_found() {
        let loader =
            Loader::new(&AppConfig::default(), Arc::new(MapStore::default()), None).unwrap();

        let err = loader
            .from_host("unknown.example.com", Pagination::new(1, 10))
            .await
            .err()
            .expect("must fail");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let mut store = MapStore::default();
        store
            .by_ids
            .insert(("ws_1".into(), "cl_1".into()), inline_record("x"));

        let loader = Loader::new(&AppConfig::default(), Arc::new(store), None).unwrap();

        assert!(
            loader
                .from_workspace("ws_1", "cl_1", Pagination::new(1, 10))
                .await
                .is_ok()
        );
        let err = loader
            .from_workspace("ws_1", "cl_other", Pagination::new(1, 10))
            .await
            .err()
            .expect("must fail");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn from_config_without_source_is_not_found() {
        let loader =
            Loader::new(&AppConfig::default(), Arc::new(MapStore::default()), None).unwrap();

        let err = loader
            .from_config(Pagination::new(1, 10))
            .await
            .err()
            .expect("must fail");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn from_config_serves_the_static_descriptor() {
        let mut config = AppConfig::default();
        config.changelog.source = Some(SourceDescriptor::Local(LocalDescriptor {
            path: None,
            content: Some("## v3.1.4".into()),
        }));

        let loader = Loader::new(&config, Arc::new(MapStore::default()), None).unwrap();
        let loaded = loader.from_config(Pagination::all()).await.unwrap();

        assert_eq!(loaded.articles[0].content, b"## v3.1.4");
        assert!(!loaded.has_more);
    }

    #[tokio::test]
    async fn github_source_gets_the_static_access_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/product/contents/changelog"))
            .and(header("Authorization", "Bearer ghp_static"))
            .and(header("Accept", "application/vnd.github.object+json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "type": "file",
                "name": "CHANGELOG.md",
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/product/contents/changelog"))
            .and(header("Authorization", "Bearer ghp_static"))
            .and(header("Accept", "application/vnd.github.raw+json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("# releases"))
            .mount(&server)
            .await;

        let mut store = MapStore::default();
        store
            .by_host
            .insert("demo.example.com".into(), github_record(None));

        let mut config = AppConfig::default();
        config.github = Some(GithubAuthConfig {
            app_id: None,
            private_key: None,
            access_token: Some("ghp_static".into()),
        });

        let loader = Loader::new(&config, Arc::new(store), None)
            .unwrap()
            .with_github_api_base(server.uri());

        let loaded = loader
            .from_host("demo.example.com", Pagination::new(1, 10))
            .await
            .unwrap();
        assert_eq!(loaded.articles.len(), 1);
        assert_eq!(loaded.articles[0].content, b"# releases");
    }

    #[tokio::test]
    async fn shared_cache_serves_repeat_loads() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/product/contents/changelog"))
            .and(header("Accept", "application/vnd.github.object+json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "type": "dir",
                "entries": [{ "name": "2024-01-01.md", "type": "file" }],
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/product/contents/changelog/2024-01-01.md"))
            .respond_with(ResponseTemplate::new(200).set_body_string("# v1"))
            .expect(1)
            .mount(&server)
            .await;

        let mut store = MapStore::default();
        store
            .by_host
            .insert("demo.example.com".into(), github_record(None));

        let loader = Loader::new(
            &AppConfig::default(),
            Arc::new(store),
            Some(Arc::new(MemoryCache::new())),
        )
        .unwrap()
        .with_github_api_base(server.uri());

        let first = loader
            .from_host("demo.example.com", Pagination::new(1, 10))
            .await
            .unwrap();
        let second = loader
            .from_host("demo.example.com", Pagination::new(1, 10))
            .await
            .unwrap();

        assert_eq!(first.articles, second.articles);
        // expect(1) on both mocks asserts the upstream saw one request
        // each; the second load came from the shared cache.
    }
}
