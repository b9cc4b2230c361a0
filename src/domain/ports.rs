use crate::utils::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Key-addressed blob storage. Keys are `/`-separated relative paths.
pub trait Storage: Send + Sync {
    /// `Ok(None)` when nothing is stored under `path`.
    fn read_file(
        &self,
        path: &str,
    ) -> impl std::future::Future<Output = Result<Option<Vec<u8>>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    /// Returns whether something was removed.
    fn delete_file(&self, path: &str) -> impl std::future::Future<Output = Result<bool>> + Send;
    /// Every stored key starting with `prefix`, sorted.
    fn list_files(
        &self,
        prefix: &str,
    ) -> impl std::future::Future<Output = Result<Vec<String>>> + Send;
}

/// A loaded form whose named text fields can be written.
pub trait FillableForm {
    fn set_text(&mut self, field: &str, value: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl FetchedResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Network side of the offline cache worker.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, method: &str, url: &url::Url) -> Result<FetchedResponse>;
}
