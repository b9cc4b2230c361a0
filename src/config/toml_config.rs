use crate::offline::{AssetManifest, WorkerSettings, CACHE_NAME};
use crate::utils::error::{Result, VoucherError};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_range, validate_url, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;
use url::Url;

/// Optional settings file. Every section and key has a default, so an
/// empty file is a valid configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub export: ExportConfig,
    pub offline: OfflineConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub output_dir: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: "./vouchers".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OfflineConfig {
    pub origin: String,
    pub cache_dir: String,
    pub cache_name: String,
    pub root_document: String,
    pub max_age_days: i64,
    pub timeout_seconds: u64,
    /// Replaces the built-in asset list when set.
    pub assets: Option<Vec<String>>,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:8080".to_string(),
            cache_dir: "./data".to_string(),
            cache_name: CACHE_NAME.to_string(),
            root_document: "/index.html".to_string(),
            max_age_days: 7,
            timeout_seconds: 30,
            assets: None,
        }
    }
}

impl AppConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// Reads `path` when given, otherwise the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                tracing::debug!("Loading configuration from {}", path.display());
                Self::from_file(path)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content);

        toml::from_str(&processed).map_err(|e| VoucherError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value; unknown variables are
    /// left as written.
    fn substitute_env_vars(content: &str) -> String {
        static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
        let re = PLACEHOLDER
            .get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("static pattern is valid"));

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
    }

    pub fn worker_settings(&self) -> Result<WorkerSettings> {
        let mut settings = WorkerSettings::new(Url::parse(&self.offline.origin)?);
        settings.cache_name = self.offline.cache_name.clone();
        settings.root_document = self.offline.root_document.clone();
        settings.max_age = chrono::Duration::days(self.offline.max_age_days);
        if let Some(assets) = &self.offline.assets {
            settings.manifest = AssetManifest::new(assets.clone());
        }
        Ok(settings)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.offline.timeout_seconds)
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        validate_path("storage.data_dir", &self.storage.data_dir)?;
        validate_path("export.output_dir", &self.export.output_dir)?;
        validate_path("offline.cache_dir", &self.offline.cache_dir)?;
        validate_url("offline.origin", &self.offline.origin)?;
        validate_non_empty_string("offline.cache_name", &self.offline.cache_name)?;
        validate_range("offline.max_age_days", self.offline.max_age_days, 1, 365)?;
        validate_range("offline.timeout_seconds", self.offline.timeout_seconds, 1, 300)?;

        if !self.offline.root_document.starts_with('/') {
            return Err(VoucherError::InvalidConfigValueError {
                field: "offline.root_document".to_string(),
                value: self.offline.root_document.clone(),
                reason: "Must be an absolute path such as /index.html".to_string(),
            });
        }
        if matches!(&self.offline.assets, Some(assets) if assets.is_empty()) {
            return Err(VoucherError::ConfigValidationError {
                field: "offline.assets".to_string(),
                message: "Asset list cannot be empty; remove the key to use the defaults"
                    .to_string(),
            });
        }
        Ok(())
    }
}
