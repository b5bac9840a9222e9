use crate::envelope::SharedSecrets;
use crate::error::GatewayError;
use crate::logging::DEFAULT_RETENTION_DAYS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    10970
}
fn default_callback_path() -> String {
    "/wechat".into()
}
fn default_log_retention_days() -> i64 {
    DEFAULT_RETENTION_DAYS
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Shared secret used for `msg_signature`.
    #[serde(default)]
    pub token: String,
    /// 43-character key; its presence switches the endpoint to encrypted mode.
    #[serde(default)]
    pub encoding_aes_key: Option<String>,
    #[serde(default, alias = "app_id")]
    pub corp_id: String,
    #[serde(default)]
    pub corp_secret: Option<String>,
    #[serde(default)]
    pub agent_id: Option<i64>,
    #[serde(default)]
    pub access_token_file: Option<String>,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_callback_path")]
    pub callback_path: String,
    #[serde(default)]
    pub log_dir: Option<String>,
    #[serde(default = "default_log_retention_days")]
    pub log_retention_days: i64,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    pub fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>, GatewayError> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(GatewayError::Config(format!(
                "config file does not exist: {}",
                path.display()
            )));
        }
        if let Ok(custom) = std::env::var("WXGATE_CONFIG") {
            if Path::new(&custom).exists() {
                return Ok(Some(PathBuf::from(custom)));
            }
            return Err(GatewayError::Config(format!(
                "WXGATE_CONFIG points to non-existent file: {custom}"
            )));
        }
        for candidate in ["./wxgate.config.yaml", "./wxgate.config.yml"] {
            if Path::new(candidate).exists() {
                return Ok(Some(PathBuf::from(candidate)));
            }
        }
        Ok(None)
    }

    /// Load and validate config from YAML.
    pub fn load(explicit: Option<&Path>) -> Result<Self, GatewayError> {
        let Some(path) = Self::resolve_config_path(explicit)? else {
            return Err(GatewayError::Config(
                "No wxgate.config.yaml found. Set WXGATE_CONFIG or pass --config.".into(),
            ));
        };
        let content = std::fs::read_to_string(&path).map_err(|e| {
            GatewayError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_yaml(&content).map_err(|e| match e {
            GatewayError::Config(msg) => GatewayError::Config(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    pub fn from_yaml(content: &str) -> Result<Self, GatewayError> {
        let mut config: Config = serde_yaml::from_str(content)
            .map_err(|e| GatewayError::Config(format!("Failed to parse config: {e}")))?;
        config.post_deserialize()?;
        Ok(config)
    }

    /// Normalize fields and reject configurations the gateway cannot serve.
    pub(crate) fn post_deserialize(&mut self) -> Result<(), GatewayError> {
        self.token = self.token.trim().to_string();
        self.corp_id = self.corp_id.trim().to_string();
        self.encoding_aes_key = non_empty(self.encoding_aes_key.take());
        self.corp_secret = non_empty(self.corp_secret.take());
        self.access_token_file = non_empty(self.access_token_file.take());
        self.log_dir = non_empty(self.log_dir.take());

        if self.token.is_empty() {
            return Err(GatewayError::Config("token is required".into()));
        }
        if self.corp_id.is_empty() {
            return Err(GatewayError::Config("corp_id (or app_id) is required".into()));
        }
        if self.host.trim().is_empty() {
            self.host = default_host();
        }
        self.callback_path = self.callback_path.trim().to_string();
        if !self.callback_path.starts_with('/') {
            return Err(GatewayError::Config(format!(
                "callback_path must start with '/': {}",
                self.callback_path
            )));
        }
        if self.log_retention_days <= 0 {
            self.log_retention_days = default_log_retention_days();
        }
        // Decode the key now so a bad key fails at startup, not on first push.
        self.shared_secrets()?;
        Ok(())
    }

    pub fn encrypt_mode(&self) -> bool {
        self.encoding_aes_key.is_some()
    }

    pub fn shared_secrets(&self) -> Result<SharedSecrets, GatewayError> {
        SharedSecrets::new(
            &self.token,
            self.encoding_aes_key.as_deref(),
            &self.corp_id,
        )
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
