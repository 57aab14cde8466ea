use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Static storage settings read once when the adapter is constructed.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub bucket: String,
    /// Public base URL objects are served from, e.g. `https://cdn.example.com`.
    pub hostname: String,
    /// Key prefix under which every managed object lives.
    pub prefix: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint for S3-compatible stores. Defaults to AWS.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub access_key_id: String,
    #[serde(default)]
    pub secret_access_key: String,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl StorageConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
        Self::from_toml(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config {}: {}", path.display(), e))
    }

    /// Parse, fill credentials from the environment, normalise and validate.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let mut config: StorageConfig = toml::from_str(content)?;
        config.fill_credentials_from_env();
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    fn fill_credentials_from_env(&mut self) {
        if self.access_key_id.is_empty() {
            self.access_key_id = std::env::var("AWS_ACCESS_KEY_ID").unwrap_or_default();
        }
        if self.secret_access_key.is_empty() {
            self.secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY").unwrap_or_default();
        }
    }

    pub fn normalize(&mut self) {
        self.prefix = self.prefix.trim_matches('/').to_string();
        self.hostname = self.hostname.trim_end_matches('/').to_string();
        if let Some(ep) = self.endpoint.as_mut() {
            *ep = ep.trim_end_matches('/').to_string();
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bucket.is_empty() {
            anyhow::bail!("bucket must not be empty");
        }
        if self.hostname.is_empty() {
            anyhow::bail!("hostname must not be empty");
        }
        if self.prefix.is_empty() {
            anyhow::bail!("prefix must not be empty");
        }
        if self.region.is_empty() {
            anyhow::bail!("region must not be empty");
        }
        if self.access_key_id.is_empty() || self.secret_access_key.is_empty() {
            anyhow::bail!("S3 credentials not found in config or AWS_ACCESS_KEY_ID/AWS_SECRET_ACCESS_KEY");
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }
}
