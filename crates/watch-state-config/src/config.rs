use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub remote: Option<RemoteConfig>,
    #[serde(default)]
    pub stats: Option<StatsConfig>,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Connection settings for the hosted watch-state backend (PostgREST + auth
/// endpoints behind one base URL, authorized by the project's anon key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub url: String,
    pub anon_key: String,
}

/// Where the counter service lives. Absent means stats calls are skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    #[serde(default = "default_stats_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Continue-watching entries kept per owner; oldest beyond this are evicted.
    #[serde(default = "default_continue_watching_cap")]
    pub continue_watching_cap: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Overrides the platform data directory for local-tier files.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

fn default_stats_base_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_continue_watching_cap() -> usize {
    10
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            continue_watching_cap: default_continue_watching_cap(),
        }
    }
}

impl Config {
    pub fn load_from_file(path: &PathBuf) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &PathBuf) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(ref remote) = self.remote {
            if remote.url.is_empty() {
                return Err(anyhow::anyhow!("remote.url cannot be empty"));
            }
            if !remote.url.starts_with("http://") && !remote.url.starts_with("https://") {
                return Err(anyhow::anyhow!(
                    "remote.url must be an http(s) URL, got: {}",
                    remote.url
                ));
            }
            if remote.anon_key.is_empty() {
                return Err(anyhow::anyhow!("remote.anon_key cannot be empty"));
            }
        }

        if self.retention.continue_watching_cap == 0 {
            return Err(anyhow::anyhow!(
                "retention.continue_watching_cap must be at least 1"
            ));
        }

        Ok(())
    }

    pub fn is_remote_configured(&self) -> bool {
        self.remote
            .as_ref()
            .map(|r| !r.url.is_empty() && !r.anon_key.is_empty())
            .unwrap_or(false)
    }
}
