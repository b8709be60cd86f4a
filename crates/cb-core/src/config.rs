//! Configuration management
//!
//! 設定は以下の優先順位で読み込まれます:
//! 1. 環境変数
//! 2. chatbot-bridge.toml 設定ファイル
//! 3. デフォルト値
//!
//! 設定ファイル内では `${VAR_NAME}` 形式で環境変数を展開できます。

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Default config file looked up by [`Config::load`]
pub const DEFAULT_CONFIG_FILE: &str = "chatbot-bridge.toml";

/// Main configuration for chatbot-bridge
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Inbound HTTP API configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// External chatbot service
    #[serde(default)]
    pub chatbot: ChatbotConfig,

    /// WhatsApp session
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Shared API key.
    ///
    /// Callers of the outbound route must present it in `X-API-Key`, and the
    /// bridge presents it to the chatbot service.
    #[serde(skip_serializing)]
    pub key: Option<String>,

    /// Port for HTTP API server
    #[serde(default = "default_api_port")]
    pub port: u16,

    /// Allowed CORS origins. None means permissive.
    #[serde(default)]
    pub allowed_origins: Option<Vec<String>>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            key: None,
            port: default_api_port(),
            allowed_origins: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatbotConfig {
    /// Full URL the inbound relay POSTs queries to
    pub endpoint: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_chatbot_timeout")]
    pub timeout_secs: u64,
}

impl Default for ChatbotConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: default_chatbot_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    /// Fixed session identifier for this deployment
    #[serde(default = "default_session_id")]
    pub session_id: String,

    /// Base URL of the session sidecar
    #[serde(default = "default_sidecar_url")]
    pub sidecar_url: String,

    /// Credential directory handed to the sidecar (`auth_<session_id>` when unset)
    #[serde(default)]
    pub auth_dir: Option<String>,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            session_id: default_session_id(),
            sidecar_url: default_sidecar_url(),
            auth_dir: None,
        }
    }
}

impl WhatsAppConfig {
    /// Effective credential directory for the session
    pub fn auth_dir(&self) -> String {
        self.auth_dir
            .clone()
            .unwrap_or_else(|| format!("auth_{}", self.session_id))
    }
}

fn default_api_port() -> u16 {
    3000
}

fn default_chatbot_timeout() -> u64 {
    30
}

fn default_session_id() -> String {
    "chatbot_session".to_string()
}

fn default_sidecar_url() -> String {
    "http://127.0.0.1:3001".to_string()
}

impl Config {
    /// 設定ファイルから環境変数を展開する
    ///
    /// `${VAR_NAME}` 形式の文字列を環境変数の値に置換します。
    /// 環境変数が存在しない場合は空文字列になります。
    fn expand_env_vars<F>(value: &str, lookup: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut result = String::new();
        let mut chars = value.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek() == Some(&'{') {
                chars.next(); // '{' を消費

                let mut var_name = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    var_name.push(c);
                }

                if let Some(env_value) = lookup(&var_name) {
                    result.push_str(&env_value);
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    /// TOML 文字列から設定を読み込む (環境変数による上書きなし)
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let expanded = Self::expand_env_vars(content, |name| std::env::var(name).ok());
        toml::from_str(&expanded).map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))
    }

    /// TOML 設定ファイルから設定を読み込む
    ///
    /// 設定ファイル内の `${VAR_NAME}` は環境変数の値に置換され、
    /// その後で環境変数による上書きが適用されます。
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let mut cfg = Self::from_toml_str(&content)?;
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env_overrides();
        cfg
    }

    /// 設定を読み込む
    ///
    /// 明示的なパス、`./chatbot-bridge.toml`、環境変数のみ、の順に試します。
    pub fn load(path: Option<&str>) -> Result<Self> {
        match path {
            Some(p) => Self::from_toml_file(p),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_toml_file(DEFAULT_CONFIG_FILE)
            }
            None => Ok(Self::from_env()),
        }
    }

    /// 環境変数で設定を上書きする
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary variable source.
    ///
    /// Empty values are ignored so a blank line in `.env` does not erase a
    /// value from the TOML file.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        // API 設定
        if let Some(key) = get("API_KEY") {
            self.api.key = Some(key);
        }
        if let Some(port) = get("API_PORT") {
            match port.parse() {
                Ok(p) => self.api.port = p,
                Err(_) => tracing::warn!("Ignoring invalid API_PORT: {}", port),
            }
        }
        if let Some(origins) = get("API_ALLOWED_ORIGINS") {
            self.api.allowed_origins = Some(
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            );
        }

        // Chatbot 設定
        if let Some(endpoint) = get("PYTHON_CHATBOT_ENDPOINT").or_else(|| get("CHATBOT_ENDPOINT")) {
            self.chatbot.endpoint = Some(endpoint);
        }
        if let Some(secs) = get("CHATBOT_TIMEOUT_SECS") {
            match secs.parse() {
                Ok(s) => self.chatbot.timeout_secs = s,
                Err(_) => tracing::warn!("Ignoring invalid CHATBOT_TIMEOUT_SECS: {}", secs),
            }
        }

        // WhatsApp 設定
        if let Some(id) = get("SESSION_ID") {
            self.whatsapp.session_id = id;
        }
        if let Some(url) = get("WHATSAPP_SIDECAR_URL") {
            self.whatsapp.sidecar_url = url;
        }
        if let Some(dir) = get("WHATSAPP_AUTH_DIR") {
            self.whatsapp.auth_dir = Some(dir);
        }
    }

    /// Check that everything the relays need is present
    pub fn validate(&self) -> Result<()> {
        if self.api.key.as_deref().is_none_or(str::is_empty) {
            return Err(Error::Config("API_KEY not set".to_string()));
        }
        if self.chatbot.endpoint.as_deref().is_none_or(str::is_empty) {
            return Err(Error::Config(
                "PYTHON_CHATBOT_ENDPOINT or CHATBOT_ENDPOINT not set".to_string(),
            ));
        }
        if self.whatsapp.session_id.trim().is_empty() {
            return Err(Error::Config("session id must not be empty".to_string()));
        }
        Ok(())
    }

    /// The configured API key, empty when unset
    pub fn api_key(&self) -> &str {
        self.api.key.as_deref().unwrap_or_default()
    }
}
