//! Cache-first asset serving with network fallback.

use crate::domain::ports::{FetchedResponse, Fetcher, Storage};
use crate::offline::cache::{CacheStorage, CachedResponse};
use crate::offline::manifest::{AssetManifest, CACHE_NAME, MAX_AGE_DAYS, ROOT_DOCUMENT};
use crate::utils::error::{Result, VoucherError};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestDestination {
    /// A page navigation.
    Document,
    #[default]
    Asset,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssetRequest {
    pub method: String,
    pub url: Url,
    pub destination: RequestDestination,
}

impl AssetRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: "GET".to_string(),
            url,
            destination: RequestDestination::Asset,
        }
    }

    pub fn document(url: Url) -> Self {
        Self {
            destination: RequestDestination::Document,
            ..Self::get(url)
        }
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Cache,
    Network,
    /// The cached root document, served because the network failed.
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssetResponse {
    pub source: ResponseSource,
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl AssetResponse {
    fn from_cache(cached: CachedResponse, source: ResponseSource) -> Self {
        Self {
            source,
            status: cached.meta.status,
            headers: cached.meta.headers,
            body: cached.body,
        }
    }

    fn from_network(response: FetchedResponse) -> Self {
        Self {
            source: ResponseSource::Network,
            status: response.status,
            headers: response.headers,
            body: response.body,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub origin: Url,
    pub cache_name: String,
    pub root_document: String,
    pub max_age: Duration,
    pub manifest: AssetManifest,
}

impl WorkerSettings {
    pub fn new(origin: Url) -> Self {
        Self {
            origin,
            cache_name: CACHE_NAME.to_string(),
            root_document: ROOT_DOCUMENT.to_string(),
            max_age: Duration::days(MAX_AGE_DAYS),
            manifest: AssetManifest::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstallReport {
    pub cached: Vec<String>,
    /// Set when pre-caching was abandoned; nothing is cached in that case.
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivateReport {
    pub removed_caches: Vec<String>,
    pub expired: usize,
}

pub struct OfflineWorker<S: Storage, F: Fetcher> {
    caches: CacheStorage<S>,
    fetcher: F,
    settings: WorkerSettings,
}

impl<S: Storage, F: Fetcher> OfflineWorker<S, F> {
    pub fn new(storage: S, fetcher: F, settings: WorkerSettings) -> Self {
        Self {
            caches: CacheStorage::new(storage),
            fetcher,
            settings,
        }
    }

    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    pub fn caches(&self) -> &CacheStorage<S> {
        &self.caches
    }

    /// Pre-caches the whole manifest, all or nothing. Failures are logged
    /// and reported, never returned as errors.
    pub async fn install(&self) -> InstallReport {
        tracing::info!("Installing offline cache '{}'", self.settings.cache_name);
        match self.precache().await {
            Ok(cached) => {
                tracing::info!("Cached {} assets", cached.len());
                InstallReport {
                    cached,
                    error: None,
                }
            }
            Err(e) => {
                tracing::error!("Pre-caching failed: {}", e);
                InstallReport {
                    cached: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn precache(&self) -> Result<Vec<String>> {
        let urls = self.settings.manifest.resolve(&self.settings.origin)?;

        let mut fetched = Vec::with_capacity(urls.len());
        for url in urls {
            let response = self.fetcher.fetch("GET", &url).await?;
            if !(200..300).contains(&response.status) {
                return Err(VoucherError::OfflineError {
                    url: url.to_string(),
                    message: format!("unexpected status {}", response.status),
                });
            }
            fetched.push((url, response));
        }

        let cache = self.caches.open(&self.settings.cache_name);
        let mut cached = Vec::with_capacity(fetched.len());
        for (url, response) in fetched {
            cache.put(url.as_str(), &response).await?;
            cached.push(url.to_string());
        }
        Ok(cached)
    }

    /// Drops every cache but the current one, then expires old entries.
    pub async fn activate(&self, now: DateTime<Utc>) -> Result<ActivateReport> {
        let mut report = ActivateReport::default();
        for name in self.caches.keys().await? {
            if name != self.settings.cache_name {
                tracing::info!("Removing stale cache '{}'", name);
                self.caches.delete(&name).await?;
                report.removed_caches.push(name);
            }
        }
        report.expired = self.cleanup(now).await?;
        Ok(report)
    }

    pub async fn fetch(&self, request: &AssetRequest) -> Result<AssetResponse> {
        if !request.is_get() {
            tracing::debug!("Bypassing cache for {} {}", request.method, request.url);
            let response = self.fetcher.fetch(&request.method, &request.url).await?;
            return Ok(AssetResponse::from_network(response));
        }

        let cache = self.caches.open(&self.settings.cache_name);
        if let Some(hit) = cache.get(request.url.as_str()).await? {
            tracing::debug!("Serving from cache: {}", request.url);
            return Ok(AssetResponse::from_cache(hit, ResponseSource::Cache));
        }

        tracing::debug!("Fetching from network: {}", request.url);
        match self.fetcher.fetch("GET", &request.url).await {
            Ok(response) => {
                if response.status == 200 && self.is_same_origin(&request.url) {
                    if let Err(e) = cache.put(request.url.as_str(), &response).await {
                        tracing::warn!("Could not cache {}: {}", request.url, e);
                    }
                }
                Ok(AssetResponse::from_network(response))
            }
            Err(e) => {
                tracing::error!("Request failed for {}: {}", request.url, e);
                if request.destination == RequestDestination::Document {
                    let root = self.settings.origin.join(&self.settings.root_document)?;
                    if let Some(page) = cache.get(root.as_str()).await? {
                        return Ok(AssetResponse::from_cache(page, ResponseSource::Fallback));
                    }
                }
                Err(e)
            }
        }
    }

    /// Removes entries whose `Date` header is older than the maximum age.
    /// Entries without a readable date stay.
    pub async fn cleanup(&self, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = now - self.settings.max_age;
        let cache = self.caches.open(&self.settings.cache_name);

        let mut removed = 0;
        for entry in cache.entries().await? {
            match entry.response_date() {
                Some(date) if date < cutoff => {
                    tracing::info!("Expiring cached {}", entry.url);
                    if cache.delete(&entry.url).await? {
                        removed += 1;
                    }
                }
                _ => {}
            }
        }
        Ok(removed)
    }

    fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.settings.origin.origin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryStorage;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Serves canned bodies; anything unknown fails like a dropped network.
    #[derive(Clone, Default)]
    struct CannedFetcher {
        routes: BTreeMap<String, (u16, String)>,
        calls: Arc<Mutex<Vec<String>>>,
        offline: bool,
    }

    impl CannedFetcher {
        fn route(mut self, url: &str, status: u16, date: &str) -> Self {
            self.routes
                .insert(url.to_string(), (status, date.to_string()));
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Fetcher for CannedFetcher {
        async fn fetch(&self, method: &str, url: &Url) -> Result<FetchedResponse> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{method} {url}"));
            match self.routes.get(url.as_str()) {
                Some((status, date)) if !self.offline => Ok(FetchedResponse {
                    status: *status,
                    headers: BTreeMap::from([("date".to_string(), date.clone())]),
                    body: format!("body of {}", url.path()).into_bytes(),
                }),
                _ => Err(VoucherError::OfflineError {
                    url: url.to_string(),
                    message: "connection refused".to_string(),
                }),
            }
        }
    }

    const RECENT: &str = "Wed, 01 Oct 2025 10:00:00 GMT";
    const OLD: &str = "Mon, 01 Sep 2025 10:00:00 GMT";

    fn settings(assets: &[&str]) -> WorkerSettings {
        let mut settings = WorkerSettings::new(Url::parse("https://app.example.com").unwrap());
        settings.manifest = AssetManifest::new(assets.iter().map(|a| a.to_string()).collect());
        settings
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-10-03T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[tokio::test]
    async fn test_install_then_serve_from_cache() {
        let fetcher = CannedFetcher::default()
            .route("https://app.example.com/index.html", 200, RECENT)
            .route("https://app.example.com/app.js", 200, RECENT);
        let worker = OfflineWorker::new(
            MemoryStorage::new(),
            fetcher.clone(),
            settings(&["/index.html", "/app.js"]),
        );

        let report = worker.install().await;
        assert_eq!(report.error, None);
        assert_eq!(report.cached.len(), 2);

        let url = Url::parse("https://app.example.com/app.js").unwrap();
        let response = worker.fetch(&AssetRequest::get(url)).await.unwrap();
        assert_eq!(response.source, ResponseSource::Cache);
        assert_eq!(response.body, b"body of /app.js".to_vec());
        assert_eq!(fetcher.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_install_is_all_or_nothing() {
        let fetcher =
            CannedFetcher::default().route("https://app.example.com/index.html", 200, RECENT);
        let storage = MemoryStorage::new();
        let worker = OfflineWorker::new(
            storage.clone(),
            fetcher,
            settings(&["/index.html", "/missing.css"]),
        );

        let report = worker.install().await;
        assert!(report.error.is_some());
        assert!(report.cached.is_empty());
        assert!(storage.list_files("caches/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_only_same_origin_200_gets_cached() {
        let fetcher = CannedFetcher::default()
            .route("https://app.example.com/styles.css", 200, RECENT)
            .route("https://app.example.com/gone.css", 404, RECENT)
            .route("https://cdn.example.net/lib.js", 200, RECENT);
        let worker = OfflineWorker::new(MemoryStorage::new(), fetcher.clone(), settings(&[]));

        for url in [
            "https://app.example.com/styles.css",
            "https://app.example.com/gone.css",
            "https://cdn.example.net/lib.js",
        ] {
            let request = AssetRequest::get(Url::parse(url).unwrap());
            let first = worker.fetch(&request).await.unwrap();
            assert_eq!(first.source, ResponseSource::Network);
            worker.fetch(&request).await.unwrap();
        }

        let cache = worker.caches().open(CACHE_NAME);
        let cached: Vec<String> = cache.entries().await.unwrap().into_iter().map(|e| e.url).collect();
        assert_eq!(cached, vec!["https://app.example.com/styles.css"]);
        assert_eq!(fetcher.calls().len(), 5);
    }

    #[tokio::test]
    async fn test_non_get_bypasses_cache() {
        let fetcher =
            CannedFetcher::default().route("https://app.example.com/api", 200, RECENT);
        let worker = OfflineWorker::new(MemoryStorage::new(), fetcher.clone(), settings(&[]));

        let request = AssetRequest {
            method: "POST".to_string(),
            ..AssetRequest::get(Url::parse("https://app.example.com/api").unwrap())
        };
        worker.fetch(&request).await.unwrap();
        worker.fetch(&request).await.unwrap();

        assert_eq!(fetcher.calls(), vec!["POST https://app.example.com/api"; 2]);
        assert!(worker
            .caches()
            .open(CACHE_NAME)
            .entries()
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_offline_document_falls_back_to_root() {
        let online = CannedFetcher::default()
            .route("https://app.example.com/index.html", 200, RECENT);
        let storage = MemoryStorage::new();
        OfflineWorker::new(storage.clone(), online, settings(&["/index.html"]))
            .install()
            .await;

        let offline = CannedFetcher {
            offline: true,
            ..Default::default()
        };
        let worker = OfflineWorker::new(storage, offline, settings(&["/index.html"]));

        let page = Url::parse("https://app.example.com/vouchers").unwrap();
        let response = worker.fetch(&AssetRequest::document(page.clone())).await.unwrap();
        assert_eq!(response.source, ResponseSource::Fallback);
        assert_eq!(response.body, b"body of /index.html".to_vec());

        let err = worker.fetch(&AssetRequest::get(page)).await.unwrap_err();
        assert!(matches!(err, VoucherError::OfflineError { .. }));
    }

    #[tokio::test]
    async fn test_activate_drops_old_caches_and_expires_entries() {
        let fetcher = CannedFetcher::default()
            .route("https://app.example.com/fresh.js", 200, RECENT)
            .route("https://app.example.com/stale.js", 200, OLD)
            .route("https://app.example.com/undated.js", 200, "not a date");
        let storage = MemoryStorage::new();
        let worker = OfflineWorker::new(
            storage.clone(),
            fetcher,
            settings(&["/fresh.js", "/stale.js", "/undated.js"]),
        );
        worker.install().await;
        worker
            .caches()
            .open("vouchers-system-v0")
            .put(
                "https://app.example.com/old.js",
                &FetchedResponse {
                    status: 200,
                    headers: BTreeMap::new(),
                    body: Vec::new(),
                },
            )
            .await
            .unwrap();

        let report = worker.activate(now()).await.unwrap();
        assert_eq!(report.removed_caches, vec!["vouchers-system-v0"]);
        assert_eq!(report.expired, 1);

        let remaining: Vec<String> = worker
            .caches()
            .open(CACHE_NAME)
            .entries()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.url)
            .collect();
        assert_eq!(remaining.len(), 2);
        assert!(!remaining.iter().any(|u| u.ends_with("stale.js")));
        assert_eq!(worker.caches().keys().await.unwrap(), vec![CACHE_NAME]);
    }
}
