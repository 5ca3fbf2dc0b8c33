//! Core domain types for the changelog loading pipeline.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default page number when the query parameter is absent or malformed.
pub const DEFAULT_PAGE: i64 = 1;

/// Default page size when the query parameter is absent or malformed.
pub const DEFAULT_PAGE_SIZE: i64 = 10;

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

/// Page/page-size request semantics with derived index arithmetic.
///
/// An undefined pagination requests all articles (no slicing). A defined
/// pagination selects the half-open article window starting at
/// `(page - 1) * page_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: i64,
    page_size: i64,
    defined: bool,
}

impl Pagination {
    /// A defined pagination for the given 1-based page and page size.
    pub fn new(page: i64, page_size: i64) -> Self {
        Self {
            page,
            page_size,
            defined: true,
        }
    }

    /// An undefined pagination: all articles are requested.
    pub fn all() -> Self {
        Self {
            page: 0,
            page_size: 0,
            defined: false,
        }
    }

    /// Parse pagination from raw query-parameter values.
    ///
    /// Absent or non-numeric values fall back to page 1 / page-size 10
    /// rather than erroring.
    pub fn from_query(page: Option<&str>, page_size: Option<&str>) -> Self {
        let page = page
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(DEFAULT_PAGE);
        let page_size = page_size
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(DEFAULT_PAGE_SIZE);
        Self::new(page, page_size)
    }

    pub fn is_defined(&self) -> bool {
        self.defined
    }

    pub fn page_size(&self) -> i64 {
        self.page_size
    }

    /// First selected index: `(page - 1) * page_size`. May be negative
    /// for page <= 0; consumers clamp to 0. Saturates at the i64 bounds
    /// instead of overflowing, since both inputs come straight from
    /// query parameters.
    pub fn start_idx(&self) -> i64 {
        self.page.saturating_sub(1).saturating_mul(self.page_size)
    }

    /// Last selected index (inclusive): `start_idx + page_size - 1`.
    pub fn end_idx(&self) -> i64 {
        self.start_idx()
            .saturating_add(self.page_size.saturating_sub(1))
    }
}

// ---------------------------------------------------------------------------
// RawArticle / LoadResult
// ---------------------------------------------------------------------------

/// A single unparsed article as produced by a content source.
///
/// The content is opaque bytes; parsing and rendering belong to the
/// renderer, which consumes each article exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawArticle {
    /// Originating filename, when the backend has one.
    pub filename: Option<String>,
    /// Raw article bytes.
    pub content: Vec<u8>,
}

/// Normalized result of a source load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadResult {
    /// Articles in newest-first order (descending by filename when the
    /// backend is a directory of date-prefixed files).
    pub articles: Vec<RawArticle>,
    /// True if more articles exist beyond the current page.
    pub has_more: bool,
}

// ---------------------------------------------------------------------------
// SourceDescriptor
// ---------------------------------------------------------------------------

/// A remote GitHub repository source: articles live under `path` in
/// `owner/repo`, fetched through the contents API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubDescriptor {
    pub owner: String,
    pub repo: String,
    /// Path of the article file or directory within the repository.
    #[serde(default)]
    pub path: String,
    /// GitHub App installation id, when the tenant authenticates via an
    /// app installation instead of a static access token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installation_id: Option<u64>,
}

/// A local/config source: a single document from disk or inline content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalDescriptor {
    /// Path of the article file on disk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Inline article content, used when no path is configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Tenant-scoped description of how/where to fetch changelog content.
///
/// Owned by the store; the loader borrows it read-only per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceDescriptor {
    Github(GithubDescriptor),
    Local(LocalDescriptor),
}

// ---------------------------------------------------------------------------
// ChangelogRecord
// ---------------------------------------------------------------------------

/// What a store lookup resolves to: the source descriptor plus the
/// tenant-level metadata the renderer needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangelogRecord {
    pub descriptor: SourceDescriptor,
    /// Whether the changelog is password protected.
    #[serde(default)]
    pub protected: bool,
    /// Password hash for protected changelogs. Verification is the
    /// caller's concern; this pipeline only carries it through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
}
