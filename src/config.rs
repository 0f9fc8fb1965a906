use serde::{Deserialize, Serialize};
use std::fs;

use crate::url::{Url, UrlError};

const DEFAULT_CONFIG_PATH: &str = "config.toml";
const ENV_PREFIX: &str = "REGISTRY_";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub registry: RegistryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// 注册中心地址，同时作为注册中心标识
    pub address: String,
    /// 启动时注册的端点
    #[serde(default)]
    pub export: Vec<String>,
    /// 启动时订阅的查询
    #[serde(default)]
    pub subscribe: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

// 环境变量覆盖项（REGISTRY_ADDRESS、REGISTRY_LOG_LEVEL、REGISTRY_CONFIG）
#[derive(Debug, Default, Deserialize)]
struct EnvOverrides {
    config: Option<String>,
    address: Option<String>,
    log_level: Option<String>,
}

/// 配置加载错误
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid environment override: {0}")]
    Env(#[from] envy::Error),
    #[error("Invalid registry address: {0}")]
    Address(#[from] UrlError),
}

impl Config {
    /// 读取 .env、配置文件并应用 `REGISTRY_*` 环境变量覆盖
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let overrides: EnvOverrides = envy::prefixed(ENV_PREFIX).from_env()?;

        let path = overrides
            .config
            .clone()
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
        let config_str = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;

        let mut config = Self::from_toml_str(&config_str)?;
        config.apply_overrides(overrides);
        Ok(config)
    }

    pub fn from_toml_str(config_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(config_str)?)
    }

    fn apply_overrides(&mut self, overrides: EnvOverrides) {
        if let Some(address) = overrides.address {
            self.registry.address = address;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }

    pub fn registry_url(&self) -> Result<Url, ConfigError> {
        Ok(Url::parse(&self.registry.address)?)
    }

    pub fn export_urls(&self) -> Result<Vec<Url>, ConfigError> {
        parse_all(&self.registry.export)
    }

    pub fn subscribe_urls(&self) -> Result<Vec<Url>, ConfigError> {
        parse_all(&self.registry.subscribe)
    }
}

fn parse_all(urls: &[String]) -> Result<Vec<Url>, ConfigError> {
    urls.iter()
        .map(|url| Url::parse(url).map_err(ConfigError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[registry]
address = "registry://127.0.0.1:9090"
export = ["svc://10.0.0.1:20880/com.acme.Foo?version=1.0"]
subscribe = ["svc://*:*/com.acme.Foo"]
"#;

    #[test]
    fn parses_sample_config() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.registry_url().unwrap().port(), Some(9090));
        assert_eq!(config.export_urls().unwrap().len(), 1);
        assert_eq!(config.subscribe_urls().unwrap()[0].host(), "*");
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut config = Config::from_toml_str(SAMPLE).unwrap();
        config.apply_overrides(EnvOverrides {
            config: None,
            address: Some("registry://10.1.1.1:9091".to_string()),
            log_level: Some("debug".to_string()),
        });
        assert_eq!(config.registry.address, "registry://10.1.1.1:9091");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn missing_registry_section_is_an_error() {
        assert!(matches!(
            Config::from_toml_str("[logging]\nlevel = \"warn\"\n"),
            Err(ConfigError::Parse(_))
        ));
    }
}
