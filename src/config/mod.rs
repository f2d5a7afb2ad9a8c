use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

const DEFAULT_MODEL: &str = "llama3";
const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_CONFIG_PATH: &str = "config/briefgen.toml";

/// Long inference runs are expected on local hardware; the original
/// deployment used the same generous bound.
const DEFAULT_TIMEOUT_SECS: u64 = 1000;
const DEFAULT_FAQ_CHUNK_SIZE: usize = 2500;
const DEFAULT_FAQ_SINGLE_CALL_LIMIT: usize = 3000;
const DEFAULT_MAX_OUTPUT_CHARS: usize = 10_000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub model: String,
    pub server_url: String,
    pub timeout_secs: u64,
    pub faq_chunk_size: usize,
    pub faq_single_call_limit: usize,
    pub max_output_chars: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config from {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config from {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    model: Option<String>,
    server_url: Option<String>,
    timeout_secs: Option<u64>,
    faq_chunk_size: Option<usize>,
    faq_single_call_limit: Option<usize>,
    max_output_chars: Option<usize>,
}

impl AppConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return read_config(path);
        }
        let default_path = Path::new(DEFAULT_CONFIG_PATH);
        match read_config(default_path) {
            Ok(config) => Ok(config),
            Err(ConfigError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                info!("Configuration file not found; using defaults");
                Ok(Self::default())
            }
            Err(other) => Err(other),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    debug!(path = %path.display(), "Reading configuration file");
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed: RawConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parsed.into())
}

impl From<RawConfig> for AppConfig {
    fn from(raw: RawConfig) -> Self {
        Self {
            model: raw.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            server_url: raw
                .server_url
                .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string()),
            timeout_secs: raw.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            faq_chunk_size: raw.faq_chunk_size.unwrap_or(DEFAULT_FAQ_CHUNK_SIZE),
            faq_single_call_limit: raw
                .faq_single_call_limit
                .unwrap_or(DEFAULT_FAQ_SINGLE_CALL_LIMIT),
            max_output_chars: raw.max_output_chars.unwrap_or(DEFAULT_MAX_OUTPUT_CHARS),
        }
    }
}
