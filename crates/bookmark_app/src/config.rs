//! RON configuration for the `bookmarks` binary.
//!
//! Every field has a default, so a partial file (or no file at all) is valid.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bookmark_engine::{FetchSettings, GenerationOptions, LivenessSettings, SummarizerConfig};
use bookmark_logging::pipeline_info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "bookmarks.ron";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub input_path: PathBuf,
    pub broken_urls_path: PathBuf,
    pub valid_urls_path: PathBuf,
    pub concurrency: usize,
    pub fetch: FetchConfig,
    pub liveness: LivenessConfig,
    pub ollama: OllamaConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("urls.redb"),
            input_path: PathBuf::from("bmurllist.txt"),
            broken_urls_path: PathBuf::from("broken_urls.txt"),
            valid_urls_path: PathBuf::from("valid_urls.txt"),
            concurrency: 1,
            fetch: FetchConfig::default(),
            liveness: LivenessConfig::default(),
            ollama: OllamaConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub redirect_limit: usize,
    pub max_bytes: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        let settings = FetchSettings::default();
        Self {
            connect_timeout_secs: settings.connect_timeout.as_secs(),
            request_timeout_secs: settings.request_timeout.as_secs(),
            redirect_limit: settings.redirect_limit,
            max_bytes: settings.max_bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    pub timeout_secs: u64,
    pub concurrency: usize,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            timeout_secs: LivenessSettings::default().timeout.as_secs(),
            concurrency: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub system_prompt_path: Option<PathBuf>,
    pub end_marker: String,
    pub timeout_secs: u64,
    pub temperature: Option<f32>,
    pub top_k: Option<u32>,
    pub top_p: Option<f32>,
    pub context_length: Option<u32>,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        let summarizer = SummarizerConfig::default();
        Self {
            base_url: summarizer.base_url,
            model: summarizer.model,
            system_prompt_path: Some(PathBuf::from("prompts/system.txt")),
            end_marker: summarizer.end_marker,
            timeout_secs: summarizer.request_timeout.as_secs(),
            temperature: None,
            top_k: None,
            top_p: None,
            context_length: None,
        }
    }
}

impl AppConfig {
    /// Load the config file.
    ///
    /// An explicitly named file must exist. When none is named, the default
    /// file is used if present and built-in defaults otherwise.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };

        let text = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config = Self::from_ron(&text).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        pipeline_info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn from_ron(text: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(text)
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            connect_timeout: Duration::from_secs(self.fetch.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.fetch.request_timeout_secs),
            redirect_limit: self.fetch.redirect_limit,
            max_bytes: self.fetch.max_bytes,
        }
    }

    pub fn liveness_settings(&self) -> LivenessSettings {
        LivenessSettings {
            timeout: Duration::from_secs(self.liveness.timeout_secs),
            ..LivenessSettings::default()
        }
    }

    pub fn summarizer_config(&self) -> SummarizerConfig {
        let ollama = &self.ollama;
        SummarizerConfig {
            base_url: ollama.base_url.clone(),
            model: ollama.model.clone(),
            system_prompt_path: ollama.system_prompt_path.clone(),
            end_marker: ollama.end_marker.clone(),
            request_timeout: Duration::from_secs(ollama.timeout_secs),
            options: GenerationOptions {
                temperature: ollama.temperature,
                top_k: ollama.top_k,
                top_p: ollama.top_p,
                context_length: ollama.context_length,
            },
            ..SummarizerConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = AppConfig::from_ron(
            r#"(
                concurrency: 4,
                ollama: (model: "llama3:8b", temperature: Some(0.3)),
            )"#,
        )
        .unwrap();

        assert_eq!(config.concurrency, 4);
        assert_eq!(config.ollama.model, "llama3:8b");
        assert_eq!(config.ollama.base_url, "http://localhost:11434");
        assert_eq!(config.database_path, PathBuf::from("urls.redb"));
        assert_eq!(config.fetch, FetchConfig::default());
    }

    #[test]
    fn summarizer_config_carries_sampling_options() {
        let mut config = AppConfig::default();
        config.ollama.top_k = Some(40);
        config.ollama.context_length = Some(8192);
        config.ollama.timeout_secs = 60;

        let summarizer = config.summarizer_config();
        assert_eq!(summarizer.options.top_k, Some(40));
        assert_eq!(summarizer.options.context_length, Some(8192));
        assert_eq!(summarizer.request_timeout, Duration::from_secs(60));
        assert_eq!(summarizer.model, "mistral:latest");
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = AppConfig::load(Some(&dir.path().join("nope.ron"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.ron");
        fs::write(&path, "(concurrency: \"many\")").unwrap();

        let err = AppConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn default_config_round_trips_through_ron() {
        let config = AppConfig::default();
        let text = ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::new()).unwrap();
        assert_eq!(AppConfig::from_ron(&text).unwrap(), config);
    }
}
