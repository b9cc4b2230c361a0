//! Named response caches kept under a [`Storage`]:
//! `caches/<name>/<sha256(url)>.meta.json` next to `<sha256(url)>.body`.

use crate::domain::ports::{FetchedResponse, Storage};
use crate::utils::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

const ROOT: &str = "caches";
const META_SUFFIX: &str = ".meta.json";
const BODY_SUFFIX: &str = ".body";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryMeta {
    pub url: String,
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub stored_at: DateTime<Utc>,
}

impl EntryMeta {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The `Date` response header, when present and parseable.
    pub fn response_date(&self) -> Option<DateTime<Utc>> {
        let raw = self.header("date")?;
        DateTime::parse_from_rfc2822(raw.trim())
            .ok()
            .map(|d| d.with_timezone(&Utc))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    pub meta: EntryMeta,
    pub body: Vec<u8>,
}

fn entry_key(url: &str) -> String {
    format!("{:x}", Sha256::digest(url.as_bytes()))
}

/// Every named cache.
#[derive(Debug, Clone)]
pub struct CacheStorage<S: Storage> {
    storage: S,
}

impl<S: Storage> CacheStorage<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn open<'a>(&'a self, name: &str) -> AssetCache<'a, S> {
        AssetCache {
            storage: &self.storage,
            prefix: format!("{ROOT}/{name}/"),
        }
    }

    /// Names of the caches holding at least one file.
    pub async fn keys(&self) -> Result<Vec<String>> {
        let root = format!("{ROOT}/");
        let names: BTreeSet<String> = self
            .storage
            .list_files(&root)
            .await?
            .iter()
            .filter_map(|key| key.strip_prefix(root.as_str())?.split('/').next())
            .filter(|name| !name.is_empty())
            .map(String::from)
            .collect();
        Ok(names.into_iter().collect())
    }

    /// Returns whether the cache existed.
    pub async fn delete(&self, name: &str) -> Result<bool> {
        let prefix = format!("{ROOT}/{name}/");
        let files = self.storage.list_files(&prefix).await?;
        for file in &files {
            self.storage.delete_file(file).await?;
        }
        Ok(!files.is_empty())
    }
}

/// One named cache.
pub struct AssetCache<'a, S: Storage> {
    storage: &'a S,
    prefix: String,
}

impl<S: Storage> AssetCache<'_, S> {
    fn meta_path(&self, url: &str) -> String {
        format!("{}{}{}", self.prefix, entry_key(url), META_SUFFIX)
    }

    fn body_path(&self, url: &str) -> String {
        format!("{}{}{}", self.prefix, entry_key(url), BODY_SUFFIX)
    }

    pub async fn get(&self, url: &str) -> Result<Option<CachedResponse>> {
        let Some(raw_meta) = self.storage.read_file(&self.meta_path(url)).await? else {
            return Ok(None);
        };
        let meta: EntryMeta = match serde_json::from_slice(&raw_meta) {
            Ok(meta) => meta,
            Err(e) => {
                tracing::warn!("Dropping unreadable cache entry for {}: {}", url, e);
                self.delete(url).await?;
                return Ok(None);
            }
        };
        let Some(body) = self.storage.read_file(&self.body_path(url)).await? else {
            return Ok(None);
        };
        Ok(Some(CachedResponse { meta, body }))
    }

    pub async fn put(&self, url: &str, response: &FetchedResponse) -> Result<()> {
        let meta = EntryMeta {
            url: url.to_string(),
            status: response.status,
            headers: response.headers.clone(),
            stored_at: Utc::now(),
        };
        self.storage
            .write_file(&self.body_path(url), &response.body)
            .await?;
        self.storage
            .write_file(&self.meta_path(url), &serde_json::to_vec(&meta)?)
            .await
    }

    /// Returns whether an entry was removed.
    pub async fn delete(&self, url: &str) -> Result<bool> {
        let had_meta = self.storage.delete_file(&self.meta_path(url)).await?;
        let had_body = self.storage.delete_file(&self.body_path(url)).await?;
        Ok(had_meta || had_body)
    }

    /// Metadata of every readable entry.
    pub async fn entries(&self) -> Result<Vec<EntryMeta>> {
        let mut entries = Vec::new();
        for key in self.storage.list_files(&self.prefix).await? {
            if !key.ends_with(META_SUFFIX) {
                continue;
            }
            let Some(raw) = self.storage.read_file(&key).await? else {
                continue;
            };
            match serde_json::from_slice::<EntryMeta>(&raw) {
                Ok(meta) => entries.push(meta),
                Err(e) => tracing::warn!("Skipping unreadable cache entry {}: {}", key, e),
            }
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryStorage;

    fn response(body: &str) -> FetchedResponse {
        FetchedResponse {
            status: 200,
            headers: BTreeMap::from([(
                "date".to_string(),
                "Wed, 01 Oct 2025 10:00:00 GMT".to_string(),
            )]),
            body: body.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let caches = CacheStorage::new(MemoryStorage::new());
        let cache = caches.open("v1");
        let url = "https://app.example.com/app.js";

        assert!(cache.get(url).await.unwrap().is_none());
        cache.put(url, &response("console.log(1)")).await.unwrap();

        let hit = cache.get(url).await.unwrap().unwrap();
        assert_eq!(hit.body, b"console.log(1)".to_vec());
        assert_eq!(hit.meta.url, url);
        assert_eq!(
            hit.meta.response_date().unwrap().to_rfc3339(),
            "2025-10-01T10:00:00+00:00"
        );

        assert!(cache.delete(url).await.unwrap());
        assert!(cache.get(url).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cache_names_and_deletion() {
        let caches = CacheStorage::new(MemoryStorage::new());
        caches.open("old").put("https://a/x", &response("x")).await.unwrap();
        caches.open("new").put("https://a/y", &response("y")).await.unwrap();

        assert_eq!(caches.keys().await.unwrap(), vec!["new", "old"]);
        assert!(caches.delete("old").await.unwrap());
        assert!(!caches.delete("old").await.unwrap());
        assert_eq!(caches.keys().await.unwrap(), vec!["new"]);
    }

    #[test]
    fn test_unparseable_date_is_none() {
        let meta = EntryMeta {
            url: "https://a/x".to_string(),
            status: 200,
            headers: BTreeMap::from([("Date".to_string(), "yesterday".to_string())]),
            stored_at: Utc::now(),
        };
        assert!(meta.response_date().is_none());
    }
}
