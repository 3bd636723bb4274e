use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{AgentConfig, ClientConfig};
use crate::error::{ChofeshError, Result};

/// Environment variable names read by [`Settings::from_env`].
pub const ENV_API_KEY: &str = "CHOFESH_API_KEY";
pub const ENV_API_URL: &str = "CHOFESH_API_URL";
pub const ENV_MODEL: &str = "CHOFESH_MODEL";
pub const ENV_TIMEOUT_SECS: &str = "CHOFESH_TIMEOUT_SECS";

/// One configuration layer. Unset fields defer to lower layers, then to defaults.
///
/// File format (`config.toml`):
///
/// ```toml
/// model = "gpt-oss-120b"
/// api_url = "https://chofesh.ai/api"
/// timeout_secs = 60
/// temperature = 0.7
/// max_tool_iterations = 5
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub temperature: Option<f64>,
    pub max_tool_iterations: Option<usize>,
}

impl Settings {
    /// Config file followed by environment, environment winning.
    pub fn load() -> Result<Self> {
        let file = match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        Ok(file.merge(Self::from_env()?))
    }

    /// `<config dir>/chofesh/config.toml` for the current user.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("ai", "chofesh", "chofesh")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
            .map_err(|e| ChofeshError::Configuration(format!("{}: {e}", path.display())))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| ChofeshError::Configuration(e.to_string()))
    }

    /// Read process environment (after loading `.env` if present).
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a layer from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let timeout_secs = lookup(ENV_TIMEOUT_SECS)
            .map(|raw| {
                raw.trim().parse::<u64>().map_err(|_| {
                    ChofeshError::Configuration(format!("{ENV_TIMEOUT_SECS} must be whole seconds, got '{raw}'"))
                })
            })
            .transpose()?;

        Ok(Self {
            model: lookup(ENV_MODEL),
            api_key: lookup(ENV_API_KEY),
            api_url: lookup(ENV_API_URL),
            timeout_secs,
            ..Self::default()
        })
    }

    /// Overlay `higher` on top of `self`.
    pub fn merge(self, higher: Settings) -> Settings {
        Settings {
            model: higher.model.or(self.model),
            api_key: higher.api_key.or(self.api_key),
            api_url: higher.api_url.or(self.api_url),
            timeout_secs: higher.timeout_secs.or(self.timeout_secs),
            temperature: higher.temperature.or(self.temperature),
            max_tool_iterations: higher.max_tool_iterations.or(self.max_tool_iterations),
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        let defaults = ClientConfig::default();
        ClientConfig {
            model: self.model.clone().unwrap_or(defaults.model),
            api_key: self.api_key.clone(),
            base_url: self.api_url.clone().unwrap_or(defaults.base_url),
            timeout: self.timeout_secs.map(Duration::from_secs).unwrap_or(defaults.timeout),
            ..defaults
        }
    }

    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig::builder()
            .maybe_temperature(self.temperature)
            .maybe_max_tool_iterations(self.max_tool_iterations)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_BASE_URL, DEFAULT_MAX_TOOL_ITERATIONS, DEFAULT_TEMPERATURE};
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn empty_layers_produce_documented_defaults() {
        let settings = Settings::default();
        let client = settings.client_config();
        assert_eq!(client.base_url, DEFAULT_BASE_URL);
        assert_eq!(client.model, "gpt-oss-120b");
        assert_eq!(client.timeout, Duration::from_secs(60));
        assert!(client.api_key.is_none());

        let agent = settings.agent_config();
        assert_eq!(agent.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(agent.max_tool_iterations, DEFAULT_MAX_TOOL_ITERATIONS);
    }

    #[test]
    fn env_layer_overrides_file_layer() {
        let file = Settings::from_toml_str(
            r#"
            model = "file-model"
            api_url = "https://file.example/api"
            timeout_secs = 10
            max_tool_iterations = 2
            "#,
        )
        .unwrap();
        let env = Settings::from_lookup(lookup(&[
            (ENV_API_KEY, "env-key"),
            (ENV_MODEL, "env-model"),
        ]))
        .unwrap();

        let merged = file.merge(env);
        let client = merged.client_config();
        assert_eq!(client.model, "env-model");
        assert_eq!(client.api_key.as_deref(), Some("env-key"));
        assert_eq!(client.base_url, "https://file.example/api");
        assert_eq!(client.timeout, Duration::from_secs(10));
        assert_eq!(merged.agent_config().max_tool_iterations, 2);
    }

    #[test]
    fn bad_timeout_is_a_configuration_error() {
        let err = Settings::from_lookup(lookup(&[(ENV_TIMEOUT_SECS, "soon")])).unwrap_err();
        assert!(matches!(err, ChofeshError::Configuration(_)));
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        let err = Settings::from_toml_str("modle = \"typo\"").unwrap_err();
        assert!(matches!(err, ChofeshError::Configuration(_)));
    }

    #[test]
    fn from_file_reads_toml() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "temperature = 0.2\n").unwrap();
        let settings = Settings::from_file(&path).unwrap();
        assert_eq!(settings.agent_config().temperature, 0.2);
    }
}
