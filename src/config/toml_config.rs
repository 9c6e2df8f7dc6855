use crate::adapters::webservice::xml::{MAX_BYTES_CEILING, MAX_DEPTH_CEILING, MAX_NODES_CEILING};
use crate::adapters::webservice::{CodecVersion, DecodeLimits, SoapCodec};
use crate::domain::model::Credentials;
use crate::domain::ports::ConfigProvider;
use crate::utils::error::ConfigError;
use crate::utils::validation::{
    validate_one_of, validate_path, validate_range, validate_secret,
    validate_url, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use url::Url;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_LABEL_FORMAT: &str = "PDF_10x15_300dpi";
const LABEL_FORMATS: &[&str] = &[
    "PDF_10x15_300dpi",
    "PDF_A4_300dpi",
    "ZPL_10x15_203dpi",
    "ZPL_10x15_300dpi",
    "DPL_10x15_203dpi",
    "DPL_10x15_300dpi",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub webservice: WebserviceConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub label: LabelConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    pub logging: Option<LoggingConfig>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct WebserviceConfig {
    pub endpoint: Url,
    pub login: String,
    pub password: String,
    #[serde(default)]
    pub codec: CodecVersion,
    pub timeout_seconds: Option<u64>,
    pub auth_fault_codes: Option<Vec<String>>,
}

impl fmt::Debug for WebserviceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebserviceConfig")
            .field("endpoint", &self.endpoint.as_str())
            .field("login", &self.login)
            .field("password", &"***")
            .field("codec", &self.codec)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("auth_fault_codes", &self.auth_fault_codes)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_depth: usize,
    pub max_bytes: usize,
    pub max_nodes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        let limits = DecodeLimits::default();
        Self {
            max_depth: limits.max_depth,
            max_bytes: limits.max_bytes,
            max_nodes: limits.max_nodes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    pub format: String,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            format: DEFAULT_LABEL_FORMAT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
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

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub json: Option<bool>,
}

impl TomlConfig {
    /// Loads the configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// Parses the configuration from a TOML string, after `${VAR}` substitution.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let processed_content = Self::substitute_env_vars(content)?;
        Ok(toml::from_str(&processed_content)?)
    }

    /// Replaces `${VAR_NAME}` with the variable's value; unset variables are
    /// left in place and caught by validation.
    fn substitute_env_vars(content: &str) -> Result<String, ConfigError> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ConfigError::InvalidValue {
            field: "environment".to_string(),
            value: String::new(),
            reason: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<(), ConfigError> {
        validate_url("webservice.endpoint", self.webservice.endpoint.as_str())?;
        self.webservice
            .codec
            .codec()
            .service_url(&self.webservice.endpoint)
            .map_err(|e| ConfigError::InvalidValue {
                field: "webservice.endpoint".to_string(),
                value: self.webservice.endpoint.to_string(),
                reason: e.to_string(),
            })?;
        validate_secret("webservice.login", &self.webservice.login)?;
        validate_secret("webservice.password", &self.webservice.password)?;
        if let Some(timeout) = self.webservice.timeout_seconds {
            validate_range("webservice.timeout_seconds", timeout, 1, 300)?;
        }

        // A SOAP envelope alone needs a handful of levels.
        validate_range("limits.max_depth", self.limits.max_depth, 8, MAX_DEPTH_CEILING)?;
        validate_range("limits.max_bytes", self.limits.max_bytes, 1024, MAX_BYTES_CEILING)?;
        validate_range("limits.max_nodes", self.limits.max_nodes, 16, MAX_NODES_CEILING)?;

        validate_one_of("label.format", &self.label.format, LABEL_FORMATS)?;
        validate_path("storage.data_dir", &self.storage.data_dir)?;
        Ok(())
    }

    pub fn codec(&self) -> CodecVersion {
        self.webservice.codec
    }

    pub fn decode_limits(&self) -> DecodeLimits {
        DecodeLimits {
            max_depth: self.limits.max_depth,
            max_bytes: self.limits.max_bytes,
            max_nodes: self.limits.max_nodes,
        }
    }

    pub fn auth_fault_codes(&self) -> Vec<String> {
        self.webservice
            .auth_fault_codes
            .clone()
            .unwrap_or_default()
    }

    pub fn data_dir(&self) -> &str {
        &self.storage.data_dir
    }

    /// Command line override of the configured codec.
    pub fn with_codec(mut self, codec: CodecVersion) -> Self {
        self.webservice.codec = codec;
        self
    }

    pub fn json_logs(&self) -> bool {
        self.logging
            .as_ref()
            .and_then(|logging| logging.json)
            .unwrap_or(false)
    }
}

impl ConfigProvider for TomlConfig {
    fn endpoint(&self) -> &Url {
        &self.webservice.endpoint
    }

    fn credentials(&self) -> Credentials {
        Credentials {
            login: self.webservice.login.clone(),
            password: self.webservice.password.clone(),
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(
            self.webservice
                .timeout_seconds
                .unwrap_or(DEFAULT_TIMEOUT_SECONDS),
        )
    }

    fn label_format(&self) -> &str {
        &self.label.format
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.validate_config()
    }
}
