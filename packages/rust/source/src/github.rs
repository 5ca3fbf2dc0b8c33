//! GitHub repository source.
//!
//! Articles are Markdown files under a repository path, listed and
//! fetched through the contents API. A file path yields a single
//! whole-document article; a directory path is filtered, sorted
//! newest-first, paginated, and fetched with bounded concurrent fan-out.

use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, instrument, warn};

use changelogd_shared::{
    ChangelogError, GithubDescriptor, LoadResult, Pagination, RawArticle, Result,
};
use changelogd_transport::{HttpRequest, HttpSend};

use crate::Source;

/// Contents API media type that always returns a JSON object with a
/// `type` field (and `entries` for directories).
const OBJECT_MEDIA_TYPE: &str = "application/vnd.github.object+json";

/// Contents API media type that returns the raw file bytes.
const RAW_MEDIA_TYPE: &str = "application/vnd.github.raw+json";

/// Extension that marks an entry as an article.
const ARTICLE_EXT: &str = ".md";

#[derive(Deserialize)]
struct ContentsObject {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    entries: Option<Vec<ContentsEntry>>,
}

#[derive(Deserialize)]
struct ContentsEntry {
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

/// Articles from `owner/repo` under `path`, through an injected
/// transport chain.
pub struct GithubSource {
    transport: Arc<dyn HttpSend>,
    api_base: String,
    owner: String,
    repo: String,
    path: String,
}

impl GithubSource {
    pub fn new(descriptor: &GithubDescriptor, transport: Arc<dyn HttpSend>) -> Self {
        Self {
            transport,
            api_base: "https://api.github.com".to_string(),
            owner: descriptor.owner.clone(),
            repo: descriptor.repo.clone(),
            path: descriptor.path.trim_matches('/').to_string(),
        }
    }

    /// Override the API base URL (tests point this at a mock server).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    fn contents_url(&self, file: Option<&str>) -> String {
        let mut url = format!(
            "{}/repos/{}/{}/contents",
            self.api_base, self.owner, self.repo
        );
        if !self.path.is_empty() {
            url.push('/');
            url.push_str(&self.path);
        }
        if let Some(file) = file {
            url.push('/');
            url.push_str(file);
        }
        url
    }

    /// Fetch one file's raw bytes through the transport chain.
    async fn fetch_raw(&self, file: Option<&str>) -> Result<Vec<u8>> {
        let url = self.contents_url(file);
        let response = self
            .transport
            .send(HttpRequest::get(&url).header("Accept", RAW_MEDIA_TYPE))
            .await?;
        if !response.is_success() {
            return Err(ChangelogError::Upstream(format!(
                "{url}: HTTP {}",
                response.status
            )));
        }
        Ok(response.body)
    }

    async fn load_dir(&self, entries: Vec<ContentsEntry>, page: Pagination) -> Result<LoadResult> {
        let mut files: Vec<String> = entries
            .into_iter()
            .filter(|e| e.kind == "file" && e.name.ends_with(ARTICLE_EXT))
            .map(|e| e.name)
            .collect();

        // Filenames are date/ordinal prefixed; descending is newest-first.
        files.sort_by(|a, b| b.cmp(a));

        let (start, end) = if page.is_defined() {
            let start = page.start_idx().max(0) as usize;
            (start, start + page.page_size() as usize - 1)
        } else {
            (0, files.len().saturating_sub(1))
        };

        // A page past the end is an empty result, never an error.
        if start >= files.len() {
            return Ok(LoadResult {
                articles: Vec::new(),
                has_more: false,
            });
        }
        let end = end.min(files.len() - 1);
        let has_more = end + 1 < files.len();

        let selected = &files[start..=end];
        debug!(
            total = files.len(),
            selected = selected.len(),
            has_more,
            "loading article range"
        );

        // One task per selected file, bounded by the selection size so
        // fan-out can never outgrow the page. Each task reports its slot
        // index, which keeps the output in descending filename order
        // without re-sorting. A JoinSet owns the tasks: dropping this
        // future (cancellation) aborts every in-flight fetch.
        let semaphore = Arc::new(Semaphore::new(selected.len().max(1)));
        let mut tasks = JoinSet::new();

        for (slot, name) in selected.iter().cloned().enumerate() {
            let transport = self.transport.clone();
            let sem = semaphore.clone();
            let url = self.contents_url(Some(&name));

            tasks.spawn(async move {
                let _permit = sem.acquire().await.expect("semaphore closed");

                let fetch = async {
                    let response = transport
                        .send(HttpRequest::get(&url).header("Accept", RAW_MEDIA_TYPE))
                        .await?;
                    if !response.is_success() {
                        return Err(ChangelogError::Upstream(format!(
                            "{url}: HTTP {}",
                            response.status
                        )));
                    }
                    Ok(RawArticle {
                        filename: Some(name),
                        content: response.body,
                    })
                };
                (slot, fetch.await)
            });
        }

        let mut slots: Vec<Option<RawArticle>> = (0..selected.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((slot, Ok(article))) => slots[slot] = Some(article),
                // A failed file is dropped from the page rather than
                // failing the batch; the rest of the page stays usable.
                Ok((_, Err(e))) => warn!(error = %e, "dropping article that failed to fetch"),
                Err(e) => warn!(error = %e, "article fetch task failed"),
            }
        }
        let articles = slots.into_iter().flatten().collect();

        Ok(LoadResult { articles, has_more })
    }
}

#[async_trait::async_trait]
impl Source for GithubSource {
    #[instrument(skip_all, fields(owner = %self.owner, repo = %self.repo, path = %self.path))]
    async fn load(&self, page: Pagination) -> Result<LoadResult> {
        // A defined pagination with a non-positive page size selects an
        // empty window; short-circuit before any range math.
        if page.is_defined() && page.page_size() < 1 {
            return Ok(LoadResult::default());
        }

        let url = self.contents_url(None);
        let response = self
            .transport
            .send(HttpRequest::get(&url).header("Accept", OBJECT_MEDIA_TYPE))
            .await?;
        if !response.is_success() {
            return Err(ChangelogError::Upstream(format!(
                "contents listing failed: {url}: HTTP {}",
                response.status
            )));
        }

        let object: ContentsObject = serde_json::from_slice(&response.body).map_err(|e| {
            ChangelogError::Upstream(format!("{url}: invalid contents response: {e}"))
        })?;

        if object.kind == "file" {
            // Whole-document mode: the path is one file, pagination
            // does not apply.
            let content = self.fetch_raw(None).await?;
            return Ok(LoadResult {
                articles: vec![RawArticle {
                    filename: object.name,
                    content,
                }],
                has_more: false,
            });
        }

        self.load_dir(object.entries.unwrap_or_default(), page).await
    }
}
