//! Local/config source: a single statically configured document.

use std::path::PathBuf;

use changelogd_shared::{
    ChangelogError, LoadResult, LocalDescriptor, Pagination, RawArticle, Result,
};

use crate::Source;

/// Serves the configured file or inline content as one article.
/// Pagination never applies and `has_more` is always false.
pub struct LocalSource {
    path: Option<PathBuf>,
    content: Option<String>,
}

impl LocalSource {
    /// Build from the descriptor; a descriptor with neither a path nor
    /// inline content fails here, before any load.
    pub fn new(descriptor: &LocalDescriptor) -> Result<Self> {
        if descriptor.path.is_none() && descriptor.content.is_none() {
            return Err(ChangelogError::config(
                "local source needs a path or inline content",
            ));
        }
        Ok(Self {
            path: descriptor.path.clone(),
            content: descriptor.content.clone(),
        })
    }
}

#[async_trait::async_trait]
impl Source for LocalSource {
    async fn load(&self, _page: Pagination) -> Result<LoadResult> {
        let article = match &self.path {
            Some(path) => {
                let content = tokio::fs::read(path)
                    .await
                    .map_err(|e| ChangelogError::io(path, e))?;
                RawArticle {
                    filename: path
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned()),
                    content,
                }
            }
            None => RawArticle {
                filename: None,
                // Checked at construction: no path implies inline content.
                content: self.content.clone().unwrap_or_default().into_bytes(),
            },
        };

        Ok(LoadResult {
            articles: vec![article],
            has_more: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn inline_content_is_the_sole_article() {
        let source = LocalSource::new(&LocalDescriptor {
            path: None,
            content: Some("## v2.0.0".into()),
        })
        .unwrap();

        let result = source.load(Pagination::new(4, 2)).await.unwrap();
        assert_eq!(result.articles.len(), 1);
        assert_eq!(result.articles[0].content, b"## v2.0.0");
        assert!(result.articles[0].filename.is_none());
        assert!(!result.has_more);
    }

    #[tokio::test]
    async fn file_path_is_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("CHANGELOG.md");
        std::fs::write(&file, "# releases").unwrap();

        let source = LocalSource::new(&LocalDescriptor {
            path: Some(file),
            content: None,
        })
        .unwrap();

        let result = source.load(Pagination::all()).await.unwrap();
        assert_eq!(result.articles[0].filename.as_deref(), Some("CHANGELOG.md"));
        assert_eq!(result.articles[0].content, b"# releases");
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let source = LocalSource::new(&LocalDescriptor {
            path: Some("/nonexistent/CHANGELOG.md".into()),
            content: None,
        })
        .unwrap();

        let err = source.load(Pagination::all()).await.err().expect("must fail");
        assert!(matches!(err, ChangelogError::Io { .. }));
    }

    #[test]
    fn empty_descriptor_fails_at_construction() {
        let err = LocalSource::new(&LocalDescriptor::default())
            .err()
            .expect("must fail");
        assert!(matches!(err, ChangelogError::Config { .. }));
    }
}
