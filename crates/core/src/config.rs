use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub ai: AiConfig,
    pub cache: CacheConfig,
    pub generator: GeneratorConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct AiConfig {
    pub provider: AiProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
    pub max_entries: u32,
    pub min_query_len: usize,
}

#[derive(Clone, Debug)]
pub struct GeneratorConfig {
    pub history_limit: u32,
    pub knowledge_limit: u32,
    pub min_similarity: f32,
    pub cache_write_confidence: f32,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiProvider {
    OpenAi,
    Anthropic,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://maitred.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            ai: AiConfig {
                provider: AiProvider::Ollama,
                api_key: None,
                base_url: Some("http://localhost:11434".to_string()),
                model: "llama3.1".to_string(),
                timeout_secs: 30,
                max_retries: 2,
            },
            cache: CacheConfig {
                enabled: true,
                ttl_secs: 24 * 60 * 60,
                max_entries: 500,
                min_query_len: 12,
            },
            generator: GeneratorConfig {
                history_limit: 10,
                knowledge_limit: 3,
                min_similarity: 0.55,
                cache_write_confidence: 0.7,
                max_tokens: 400,
                temperature: 0.4,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for AiProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported ai provider `{other}` (expected openai|anthropic|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    ai: Option<AiPatch>,
    cache: Option<CachePatch>,
    generator: Option<GeneratorPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AiPatch {
    provider: Option<AiProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct CachePatch {
    enabled: Option<bool>,
    ttl_secs: Option<u64>,
    max_entries: Option<u32>,
    min_query_len: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct GeneratorPatch {
    history_limit: Option<u32>,
    knowledge_limit: Option<u32>,
    min_similarity: Option<f32>,
    cache_write_confidence: Option<f32>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("maitred.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(ai) = patch.ai {
            if let Some(provider) = ai.provider {
                self.ai.provider = provider;
            }
            if let Some(api_key_value) = ai.api_key {
                self.ai.api_key = Some(api_key_value.into());
            }
            if let Some(base_url) = ai.base_url {
                self.ai.base_url = Some(base_url);
            }
            if let Some(model) = ai.model {
                self.ai.model = model;
            }
            if let Some(timeout_secs) = ai.timeout_secs {
                self.ai.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = ai.max_retries {
                self.ai.max_retries = max_retries;
            }
        }

        if let Some(cache) = patch.cache {
            if let Some(enabled) = cache.enabled {
                self.cache.enabled = enabled;
            }
            if let Some(ttl_secs) = cache.ttl_secs {
                self.cache.ttl_secs = ttl_secs;
            }
            if let Some(max_entries) = cache.max_entries {
                self.cache.max_entries = max_entries;
            }
            if let Some(min_query_len) = cache.min_query_len {
                self.cache.min_query_len = min_query_len;
            }
        }

        if let Some(generator) = patch.generator {
            if let Some(history_limit) = generator.history_limit {
                self.generator.history_limit = history_limit;
            }
            if let Some(knowledge_limit) = generator.knowledge_limit {
                self.generator.knowledge_limit = knowledge_limit;
            }
            if let Some(min_similarity) = generator.min_similarity {
                self.generator.min_similarity = min_similarity;
            }
            if let Some(cache_write_confidence) = generator.cache_write_confidence {
                self.generator.cache_write_confidence = cache_write_confidence;
            }
            if let Some(max_tokens) = generator.max_tokens {
                self.generator.max_tokens = max_tokens;
            }
            if let Some(temperature) = generator.temperature {
                self.generator.temperature = temperature;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("MAITRED_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("MAITRED_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("MAITRED_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("MAITRED_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("MAITRED_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("MAITRED_AI_PROVIDER") {
            self.ai.provider = value.parse()?;
        }
        if let Some(value) = read_env("MAITRED_AI_API_KEY") {
            self.ai.api_key = Some(value.into());
        }
        if let Some(value) = read_env("MAITRED_AI_BASE_URL") {
            self.ai.base_url = Some(value);
        }
        if let Some(value) = read_env("MAITRED_AI_MODEL") {
            self.ai.model = value;
        }

        if let Some(value) = read_env("MAITRED_CACHE_ENABLED") {
            self.cache.enabled = parse_bool("MAITRED_CACHE_ENABLED", &value)?;
        }
        if let Some(value) = read_env("MAITRED_CACHE_TTL_SECS") {
            self.cache.ttl_secs = parse_u64("MAITRED_CACHE_TTL_SECS", &value)?;
        }
        if let Some(value) = read_env("MAITRED_CACHE_MAX_ENTRIES") {
            self.cache.max_entries = parse_u32("MAITRED_CACHE_MAX_ENTRIES", &value)?;
        }
        if let Some(value) = read_env("MAITRED_CACHE_MIN_QUERY_LEN") {
            self.cache.min_query_len = parse_usize("MAITRED_CACHE_MIN_QUERY_LEN", &value)?;
        }

        if let Some(value) = read_env("MAITRED_GENERATOR_HISTORY_LIMIT") {
            self.generator.history_limit = parse_u32("MAITRED_GENERATOR_HISTORY_LIMIT", &value)?;
        }
        if let Some(value) = read_env("MAITRED_GENERATOR_KNOWLEDGE_LIMIT") {
            self.generator.knowledge_limit =
                parse_u32("MAITRED_GENERATOR_KNOWLEDGE_LIMIT", &value)?;
        }
        if let Some(value) = read_env("MAITRED_GENERATOR_MIN_SIMILARITY") {
            self.generator.min_similarity = parse_f32("MAITRED_GENERATOR_MIN_SIMILARITY", &value)?;
        }
        if let Some(value) = read_env("MAITRED_GENERATOR_CACHE_WRITE_CONFIDENCE") {
            self.generator.cache_write_confidence =
                parse_f32("MAITRED_GENERATOR_CACHE_WRITE_CONFIDENCE", &value)?;
        }
        if let Some(value) = read_env("MAITRED_GENERATOR_MAX_TOKENS") {
            self.generator.max_tokens = parse_u32("MAITRED_GENERATOR_MAX_TOKENS", &value)?;
        }
        if let Some(value) = read_env("MAITRED_GENERATOR_TEMPERATURE") {
            self.generator.temperature = parse_f32("MAITRED_GENERATOR_TEMPERATURE", &value)?;
        }

        if let Some(value) = read_env("MAITRED_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env("MAITRED_LOG_FORMAT") {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Validation("database.url must not be empty".to_string()));
        }
        if self.cache.max_entries == 0 {
            return Err(ConfigError::Validation("cache.max_entries must be positive".to_string()));
        }
        if self.cache.ttl_secs == 0 {
            return Err(ConfigError::Validation("cache.ttl_secs must be positive".to_string()));
        }
        for (name, value) in [
            ("generator.min_similarity", self.generator.min_similarity),
            ("generator.cache_write_confidence", self.generator.cache_write_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Validation(format!(
                    "{name} must be within 0..=1, got {value}"
                )));
            }
        }
        if self.generator.history_limit == 0 {
            return Err(ConfigError::Validation(
                "generator.history_limit must be positive".to_string(),
            ));
        }
        if matches!(self.ai.provider, AiProvider::OpenAi | AiProvider::Anthropic)
            && self.ai.api_key.is_none()
        {
            return Err(ConfigError::Validation(format!(
                "ai.api_key is required for provider {:?}",
                self.ai.provider
            )));
        }
        Ok(())
    }
}

fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }
    let default = PathBuf::from("maitred.toml");
    default.exists().then_some(default)
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    let interpolated = interpolate_env(&raw)?;
    toml::from_str(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

/// Expands `${VAR}` references so secrets can stay out of the file on disk.
fn interpolate_env(raw: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            return Err(ConfigError::UnterminatedInterpolation);
        };
        let var = &after[..end];
        let value = env::var(var)
            .map_err(|_| ConfigError::MissingEnvInterpolation { var: var.to_string() })?;
        output.push_str(&value);
        rest = &after[end + 1..];
    }
    output.push_str(rest);
    Ok(output)
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f32(key: &str, value: &str) -> Result<f32, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidEnvOverride {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}
