//! Offline asset cache: pre-caching, cache-first serving and expiry.

pub mod cache;
pub mod manifest;
pub mod worker;

pub use cache::{AssetCache, CacheStorage, CachedResponse, EntryMeta};
pub use manifest::{AssetManifest, CACHE_NAME};
pub use worker::{
    AssetRequest, AssetResponse, OfflineWorker, RequestDestination, ResponseSource, WorkerSettings,
};
