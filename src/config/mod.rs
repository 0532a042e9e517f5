use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Media directory and retention
    pub media: MediaConfig,

    /// External service credentials and endpoints
    pub services: ServicesConfig,

    /// Pipeline limits
    pub pipeline: PipelineConfig,

    /// Database location
    pub database_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Shared directory for downloaded media and transcripts
    pub root: PathBuf,

    /// Files older than this are removed by the cleanup sweep
    pub retention_hours: u64,

    /// Run the cleanup sweep periodically while serving (0 disables it)
    pub cleanup_interval_minutes: u64,

    /// Path or name of the yt-dlp executable
    pub yt_dlp_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    /// AssemblyAI API key (AAI_API_KEY)
    pub assemblyai_api_key: Option<String>,

    pub assemblyai_base_url: String,

    /// Fallback OpenAI key for the CLI; HTTP callers send their own (OPENAI_API_KEY)
    pub openai_api_key: Option<String>,

    pub openai_base_url: String,

    /// Timeout for a single HTTP request to either service
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Upper bound for any single stage (download, transcription, translation)
    pub stage_timeout_secs: u64,

    /// Upper bound for waiting on a transcription job
    pub transcription_timeout_secs: u64,

    /// Initial delay between transcription status checks
    pub poll_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
            },
            media: MediaConfig {
                root: PathBuf::from("media"),
                retention_hours: 24,
                cleanup_interval_minutes: 60,
                yt_dlp_path: "yt-dlp".to_string(),
            },
            services: ServicesConfig {
                assemblyai_api_key: None,
                assemblyai_base_url: "https://api.assemblyai.com".to_string(),
                openai_api_key: None,
                openai_base_url: "https://api.openai.com".to_string(),
                request_timeout_secs: 120,
            },
            pipeline: PipelineConfig {
                stage_timeout_secs: 900,
                transcription_timeout_secs: 600,
                poll_interval_secs: 3,
            },
            database_url: "sqlite://translations.db".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file or create default, then apply environment overrides
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        let mut config = if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            serde_yaml::from_str::<Config>(&content)
                .context("Failed to parse config file")?
        } else {
            let config = Self::default();
            config.save().await?;
            config
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("translation-generator").join("config.yaml"))
    }

    /// Override file values with whatever the environment provides
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("AAI_API_KEY") {
            self.services.assemblyai_api_key = Some(key);
        }
        if let Some(key) = non_empty("OPENAI_API_KEY") {
            self.services.openai_api_key = Some(key);
        }
        if let Some(root) = non_empty("MEDIA_ROOT") {
            self.media.root = PathBuf::from(root);
        }
        if let Some(url) = non_empty("DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(host) = non_empty("HOST") {
            self.server.host = host;
        }
        if let Some(port) = non_empty("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.media.root.as_os_str().is_empty() {
            anyhow::bail!("Media root must be configured");
        }

        if self.pipeline.stage_timeout_secs == 0 || self.pipeline.transcription_timeout_secs == 0 {
            anyhow::bail!("Pipeline timeouts must be greater than zero");
        }

        if self.services.request_timeout_secs == 0 {
            anyhow::bail!("Request timeout must be greater than zero");
        }

        if self.media.retention_hours == 0 {
            anyhow::bail!("Media retention must be at least one hour");
        }

        Ok(())
    }

    /// The AssemblyAI key; pipeline construction fails without it
    pub fn require_assemblyai_key(&self) -> Result<&str> {
        self.services
            .assemblyai_api_key
            .as_deref()
            .context("AssemblyAI API key is not configured (set AAI_API_KEY)")
    }

    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline.stage_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.services.request_timeout_secs)
    }

    pub fn retention(&self) -> Duration {
        crate::cleanup::hours(self.media.retention_hours)
    }

    /// Period of the background sweep while serving; `None` when disabled
    pub fn cleanup_interval(&self) -> Option<Duration> {
        let minutes = self.media.cleanup_interval_minutes;
        (minutes > 0).then(|| Duration::from_secs(minutes.saturating_mul(60)))
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Listen: {}:{}", self.server.host, self.server.port);
        println!("  Media Root: {}", self.media.root.display());
        println!("  Retention: {}h", self.media.retention_hours);
        println!("  Database: {}", self.database_url);
        println!("  AssemblyAI Key: {}", mask(self.services.assemblyai_api_key.as_deref()));
        println!("  OpenAI Key: {}", mask(self.services.openai_api_key.as_deref()));
        println!("  Stage Timeout: {}s", self.pipeline.stage_timeout_secs);
    }
}

fn mask(key: Option<&str>) -> String {
    match key {
        Some(k) if k.len() > 8 && k.is_ascii() => format!("{}…{}", &k[..3], &k[k.len() - 4..]),
        Some(_) => "set".to_string(),
        None => "not set".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.media.retention_hours, 24);
        assert_eq!(config.retention(), Duration::from_secs(86_400));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("AAI_API_KEY", "aai-key"),
            ("MEDIA_ROOT", "/srv/media"),
            ("PORT", "9000"),
            ("OPENAI_API_KEY", "   "),
        ]);

        let mut config = Config::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.services.assemblyai_api_key.as_deref(), Some("aai-key"));
        assert_eq!(config.media.root, PathBuf::from("/srv/media"));
        assert_eq!(config.server.port, 9000);
        assert!(config.services.openai_api_key.is_none());
    }

    #[test]
    fn test_yaml_round_trip_keeps_sections() {
        let yaml = serde_yaml::to_string(&Config::default()).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.services.openai_base_url, "https://api.openai.com");
        assert_eq!(parsed.pipeline.poll_interval_secs, 3);
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let mut config = Config::default();
        config.pipeline.stage_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_huge_durations_do_not_wrap() {
        let mut config = Config::default();
        config.media.retention_hours = u64::MAX / 60;
        config.media.cleanup_interval_minutes = u64::MAX / 10;

        assert!(config.retention() > Duration::from_secs(86_400 * 365));
        assert_eq!(config.cleanup_interval(), Some(Duration::from_secs(u64::MAX)));

        config.media.cleanup_interval_minutes = 0;
        assert_eq!(config.cleanup_interval(), None);
    }

    #[test]
    fn test_missing_assemblyai_key() {
        let config = Config::default();
        assert!(config.require_assemblyai_key().is_err());
    }

    #[test]
    fn test_mask() {
        assert_eq!(mask(None), "not set");
        assert_eq!(mask(Some("short")), "set");
        assert_eq!(mask(Some("sk-abcdefghijkl")), "sk-…ijkl");
    }
}
