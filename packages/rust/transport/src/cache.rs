//! Pluggable response cache backends.
//!
//! Exactly one backend is active per process (or none). All backends are
//! safe for concurrent reads and writes; eviction/TTL policy is each
//! backend's own concern, nothing is layered on top.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::RwLock;

use sha2::{Digest, Sha256};

use changelogd_shared::{CacheConfig, ChangelogError, Result};

/// Get/set contract consumed by the caching transport.
///
/// The key space is whatever the caller defines over method+URL; a
/// backend only stores and retrieves opaque blobs.
#[async_trait::async_trait]
pub trait CacheBackend: Send + Sync {
    /// Look up a cached value. `Ok(None)` is a miss.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store a value under the key, replacing any previous entry.
    async fn set(&self, key: &str, value: &[u8]) -> Result<()>;
}

/// Build the configured backend, if any.
///
/// The object-store backend reuses the given client for its blob
/// requests.
pub fn build_backend(
    config: Option<&CacheConfig>,
    client: &reqwest::Client,
) -> Result<Option<Arc<dyn CacheBackend>>> {
    match config {
        None => Ok(None),
        Some(CacheConfig::Memory) => {
            tracing::info!("using memory cache");
            Ok(Some(Arc::new(MemoryCache::new())))
        }
        Some(CacheConfig::Disk { location, max_size }) => {
            tracing::info!(location = %location.display(), max_size, "using disk cache");
            Ok(Some(Arc::new(DiskCache::new(location.clone(), *max_size)?)))
        }
        Some(CacheConfig::S3 { endpoint, bucket }) => {
            tracing::info!(endpoint, bucket, "using object store cache");
            Ok(Some(Arc::new(ObjectStoreCache::new(
                endpoint.clone(),
                bucket.clone(),
                client.clone(),
            ))))
        }
    }
}

/// Filesystem-safe name for a cache key.
fn key_digest(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// MemoryCache
// ---------------------------------------------------------------------------

/// Process-local in-memory cache.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self
            .entries
            .read()
            .map_err(|e| ChangelogError::Cache(format!("memory cache poisoned: {e}")))?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| ChangelogError::Cache(format!("memory cache poisoned: {e}")))?;
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// DiskCache
// ---------------------------------------------------------------------------

/// On-disk content store with a maximum byte budget.
///
/// Entries are files named by the SHA-256 of the key. When an insert
/// pushes the store over budget, oldest-mtime entries are evicted until
/// it fits again.
pub struct DiskCache {
    base: PathBuf,
    max_size: u64,
    // Serializes eviction scans; individual reads/writes don't take it.
    evict_lock: tokio::sync::Mutex<()>,
}

impl DiskCache {
    pub fn new(base: PathBuf, max_size: u64) -> Result<Self> {
        std::fs::create_dir_all(&base).map_err(|e| ChangelogError::io(&base, e))?;
        Ok(Self {
            base,
            max_size,
            evict_lock: tokio::sync::Mutex::new(()),
        })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.base.join(key_digest(key))
    }

    /// Delete oldest entries until total size fits the budget.
    ///
    /// The directory scan is blocking filesystem work, so it runs on the
    /// blocking pool rather than the async path.
    async fn evict_to_budget(&self) -> Result<()> {
        let _guard = self.evict_lock.lock().await;

        let base = self.base.clone();
        let max_size = self.max_size;
        tokio::task::spawn_blocking(move || evict_scan(&base, max_size))
            .await
            .map_err(|e| ChangelogError::Cache(format!("eviction task failed: {e}")))?
    }
}

/// Synchronous eviction pass over the cache directory.
fn evict_scan(base: &std::path::Path, max_size: u64) -> Result<()> {
    let mut entries: Vec<(PathBuf, u64, std::time::SystemTime)> = Vec::new();
    let read_dir = std::fs::read_dir(base).map_err(|e| ChangelogError::io(base, e))?;
    for entry in read_dir.flatten() {
        if let Ok(meta) = entry.metadata() {
            if meta.is_file() {
                let modified = meta.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH);
                entries.push((entry.path(), meta.len(), modified));
            }
        }
    }

    let mut total: u64 = entries.iter().map(|(_, len, _)| len).sum();
    if total <= max_size {
        return Ok(());
    }

    entries.sort_by_key(|(_, _, modified)| *modified);
    for (path, len, _) in entries {
        if total <= max_size {
            break;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => total = total.saturating_sub(len),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "disk cache eviction failed")
            }
        }
    }
    Ok(())
}

#[async_trait::async_trait]
impl CacheBackend for DiskCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.entry_path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ChangelogError::io(path, e)),
        }
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.entry_path(key);
        tokio::fs::write(&path, value)
            .await
            .map_err(|e| ChangelogError::io(&path, e))?;
        self.evict_to_budget().await
    }
}

// ---------------------------------------------------------------------------
// ObjectStoreCache
// ---------------------------------------------------------------------------

/// Cache backed by an S3-compatible object store over HTTP.
///
/// Blobs live at `{endpoint}/{bucket}/{sha256(key)}`. Any non-2xx GET is
/// treated as a miss; a failed PUT is a cache error the transport layer
/// downgrades to a warning.
pub struct ObjectStoreCache {
    endpoint: String,
    bucket: String,
    client: reqwest::Client,
}

impl ObjectStoreCache {
    pub fn new(endpoint: String, bucket: String, client: reqwest::Client) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket,
            client,
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, key_digest(key))
    }
}

#[async_trait::async_trait]
impl CacheBackend for ObjectStoreCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let url = self.object_url(key);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ChangelogError::Cache(format!("{url}: {e}")))?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ChangelogError::Cache(format!("{url}: body read failed: {e}")))?;
        Ok(Some(body.to_vec()))
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let url = self.object_url(key);
        let response = self
            .client
            .put(&url)
            .body(value.to_vec())
            .send()
            .await
            .map_err(|e| ChangelogError::Cache(format!("{url}: {e}")))?;

        if !response.status().is_success() {
            return Err(ChangelogError::Cache(format!(
                "{url}: HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_cache_get_set() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get("GET https://x/a").await.unwrap(), None);

        cache.set("GET https://x/a", b"hello").await.unwrap();
        assert_eq!(
            cache.get("GET https://x/a").await.unwrap(),
            Some(b"hello".to_vec())
        );

        cache.set("GET https://x/a", b"replaced").await.unwrap();
        assert_eq!(
            cache.get("GET https://x/a").await.unwrap(),
            Some(b"replaced".to_vec())
        );
    }

    #[tokio::test]
    async fn disk_cache_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path().to_path_buf(), 1024 * 1024).unwrap();

        assert_eq!(cache.get("missing").await.unwrap(), None);
        cache.set("k1", b"article body").await.unwrap();
        assert_eq!(cache.get("k1").await.unwrap(), Some(b"article body".to_vec()));
    }

    #[tokio::test]
    async fn disk_cache_evicts_oldest_over_budget() {
        let dir = tempfile::tempdir().unwrap();
        // Budget fits two 10-byte entries, not three.
        let cache = DiskCache::new(dir.path().to_path_buf(), 25).unwrap();

        cache.set("a", &[1u8; 10]).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        cache.set("b", &[2u8; 10]).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        cache.set("c", &[3u8; 10]).await.unwrap();

        // Oldest entry went first.
        assert_eq!(cache.get("a").await.unwrap(), None);
        assert!(cache.get("c").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn object_store_cache_miss_and_hit() {
        let server = wiremock::MockServer::start().await;
        let cache = ObjectStoreCache::new(
            server.uri(),
            "changelog-cache".into(),
            reqwest::Client::new(),
        );

        let digest = key_digest("GET https://api/x");

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path(format!(
                "/changelog-cache/{digest}"
            )))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(cache.get("GET https://api/x").await.unwrap(), None);

        server.reset().await;

        wiremock::Mock::given(wiremock::matchers::method("PUT"))
            .and(wiremock::matchers::path(format!(
                "/changelog-cache/{digest}"
            )))
            .respond_with(wiremock::ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path(format!(
                "/changelog-cache/{digest}"
            )))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_bytes(b"blob".to_vec()))
            .mount(&server)
            .await;

        cache.set("GET https://api/x", b"blob").await.unwrap();
        assert_eq!(
            cache.get("GET https://api/x").await.unwrap(),
            Some(b"blob".to_vec())
        );
    }

    #[test]
    fn backend_selection_from_config() {
        let client = reqwest::Client::new();
        assert!(build_backend(None, &client).unwrap().is_none());
        assert!(
            build_backend(Some(&CacheConfig::Memory), &client)
                .unwrap()
                .is_some()
        );
    }
}
