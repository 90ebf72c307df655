use crate::error::{EngineError, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub blob: Option<BlobConfig>,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Per-adapter deadline for one cascade call. A slow provider costs at
    /// most its own timeout, never the whole request.
    #[serde(default = "default_adapter_timeout")]
    pub adapter_timeout_seconds: u64,
    /// Bounding-box radius for coordinate queries when no station id is known.
    #[serde(default = "default_search_radius")]
    pub search_radius_miles: f64,
}

fn default_user_agent() -> String {
    "wq-engine/0.1.0".to_string()
}

fn default_adapter_timeout() -> u64 {
    12
}

fn default_search_radius() -> f64 {
    10.0
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            adapter_timeout_seconds: default_adapter_timeout(),
            search_radius_miles: default_search_radius(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Angular grid resolution in degrees. 0.1 degree is roughly 11 km.
    #[serde(default = "default_grid_resolution")]
    pub grid_resolution_degrees: f64,
    /// A build lock held longer than this is treated as abandoned and
    /// auto-cleared on the next check.
    #[serde(default = "default_lock_timeout")]
    pub build_lock_timeout_minutes: u64,
    #[serde(default = "default_disk_path")]
    pub disk_path: String,
}

fn default_grid_resolution() -> f64 {
    0.1
}

fn default_lock_timeout() -> u64 {
    12
}

fn default_disk_path() -> String {
    "data/nwps-cache.json".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            grid_resolution_degrees: default_grid_resolution(),
            build_lock_timeout_minutes: default_lock_timeout(),
            disk_path: default_disk_path(),
        }
    }
}

/// Remote blob tier for the gauge cache. Optional; when absent the cache
/// persists to local disk only.
#[derive(Debug, Deserialize, Clone)]
pub struct BlobConfig {
    pub endpoint: String,
    pub bucket: String,
    #[serde(default = "default_blob_key")]
    pub key: String,
}

fn default_blob_key() -> String {
    "nwps-cache.json".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    #[serde(default = "default_rebuild_interval")]
    pub rebuild_interval_minutes: u64,
    #[serde(default = "default_initial_delay")]
    pub initial_delay_seconds: u64,
}

fn default_rebuild_interval() -> u64 {
    360
}

fn default_initial_delay() -> u64 {
    10
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            rebuild_interval_minutes: default_rebuild_interval(),
            initial_delay_seconds: default_initial_delay(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RegistryConfig {
    /// Endpoint serving the auto-discovered region table as JSON. Optional;
    /// without it the registry serves hand-curated entries only.
    #[serde(default)]
    pub discovery_url: Option<String>,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        // Substitute environment variables
        let expanded = expand_env_vars(&content)?;

        let config: Config = serde_yaml::from_str(&expanded)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    ///
    /// Checks for:
    /// - Positive timeouts and intervals
    /// - Sane grid resolution
    /// - Valid HTTPS blob/discovery endpoints
    pub fn validate(&self) -> Result<()> {
        if self.fetch.adapter_timeout_seconds == 0 {
            return Err(EngineError::Config(
                "fetch.adapter_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.fetch.adapter_timeout_seconds > 60 {
            tracing::warn!(
                "Adapter timeout of {}s is very long; slow providers will stall their tier",
                self.fetch.adapter_timeout_seconds
            );
        }

        if self.fetch.search_radius_miles <= 0.0 {
            return Err(EngineError::Config(
                "fetch.search_radius_miles must be positive".to_string(),
            ));
        }

        if self.cache.grid_resolution_degrees <= 0.0 || self.cache.grid_resolution_degrees > 1.0 {
            return Err(EngineError::Config(format!(
                "cache.grid_resolution_degrees {} out of range (0, 1]",
                self.cache.grid_resolution_degrees
            )));
        }

        if self.cache.build_lock_timeout_minutes == 0 {
            return Err(EngineError::Config(
                "cache.build_lock_timeout_minutes must be greater than 0".to_string(),
            ));
        }

        if self.cache.disk_path.is_empty() {
            return Err(EngineError::Config(
                "cache.disk_path cannot be empty".to_string(),
            ));
        }

        if self.scheduler.rebuild_interval_minutes == 0 {
            return Err(EngineError::Config(
                "scheduler.rebuild_interval_minutes must be greater than 0".to_string(),
            ));
        }

        if self.scheduler.rebuild_interval_minutes < 30 {
            tracing::warn!(
                "Rebuild interval of {} minutes is very short for a full gauge sweep",
                self.scheduler.rebuild_interval_minutes
            );
        }

        if let Some(blob) = &self.blob {
            if blob.endpoint.contains("${") {
                return Err(EngineError::Config(
                    "blob.endpoint contains an unexpanded environment variable. \
                     Set it or create a .env file."
                        .to_string(),
                ));
            }
            validate_https_url("blob.endpoint", &blob.endpoint)?;
            if blob.bucket.is_empty() {
                return Err(EngineError::Config(
                    "blob.bucket cannot be empty".to_string(),
                ));
            }
        }

        if let Some(url) = &self.registry.discovery_url {
            validate_https_url("registry.discovery_url", url)?;
        }

        Ok(())
    }
}

fn validate_https_url(field: &str, value: &str) -> Result<()> {
    let parsed = url::Url::parse(value)
        .map_err(|e| EngineError::Config(format!("Invalid {} '{}': {}", field, value, e)))?;
    if parsed.scheme() != "https" {
        return Err(EngineError::Config(format!(
            "{} must use HTTPS, got: {}",
            field,
            parsed.scheme()
        )));
    }
    Ok(())
}

fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = content.to_string();
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}").unwrap();

    let mut missing_vars = Vec::new();

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(value) => {
                result = result.replace(&cap[0], &value);
            }
            Err(_) => {
                missing_vars.push(var_name.to_string());
            }
        }
    }

    if !missing_vars.is_empty() {
        return Err(EngineError::Config(format!(
            "Missing required environment variable{}: {}",
            if missing_vars.len() > 1 { "s" } else { "" },
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}
