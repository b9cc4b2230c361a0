use crate::utils::error::Result;
use serde::{Deserialize, Serialize};
use url::Url;

pub const CACHE_NAME: &str = "vouchers-system-v1";
pub const ROOT_DOCUMENT: &str = "/index.html";
pub const MAX_AGE_DAYS: i64 = 7;

pub const DEFAULT_ASSETS: &[&str] = &[
    "/",
    "/index.html",
    "/styles.css",
    "/app.js",
    "/manifest.json",
    "/icon-192.svg",
    "/icon-512.svg",
    "https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.4.0/css/all.min.css",
    "https://cdnjs.cloudflare.com/ajax/libs/jspdf/2.5.1/jspdf.umd.min.js",
];

/// Assets fetched at install time. Relative entries resolve against the
/// application origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetManifest {
    pub assets: Vec<String>,
}

impl Default for AssetManifest {
    fn default() -> Self {
        Self {
            assets: DEFAULT_ASSETS.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl AssetManifest {
    pub fn new(assets: Vec<String>) -> Self {
        Self { assets }
    }

    pub fn resolve(&self, origin: &Url) -> Result<Vec<Url>> {
        self.assets
            .iter()
            .map(|asset| Ok(origin.join(asset)?))
            .collect()
    }
}
