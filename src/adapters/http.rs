use crate::domain::ports::{FetchedResponse, Fetcher};
use crate::utils::error::{Result, VoucherError};
use async_trait::async_trait;
use reqwest::{Client, Method};
use std::collections::BTreeMap;
use std::time::Duration;

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, method: &str, url: &url::Url) -> Result<FetchedResponse> {
        let method = Method::from_bytes(method.as_bytes()).map_err(|e| VoucherError::OfflineError {
            url: url.to_string(),
            message: format!("invalid method: {}", e),
        })?;

        tracing::debug!("Making {} request to: {}", method, url);
        let response = self.client.request(method, url.clone()).send().await?;
        tracing::debug!("Response status: {}", response.status());

        let status = response.status().as_u16();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        Ok(FetchedResponse {
            status,
            headers,
            body,
        })
    }
}
