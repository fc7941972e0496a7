use serde::Deserialize;

use crate::utils::constants::{
    DEFAULT_ACCESS_KEY, DEFAULT_COOKIE_PATH, DEFAULT_HTTP_TIMEOUT_MS, DEFAULT_LOGIN_PATH,
    DEFAULT_LOGOUT_PATH, DEFAULT_REFRESH_COOKIE_NAME, DEFAULT_REFRESH_PATH, DEFAULT_REGISTER_PATH, DEFAULT_USER_PATH,
};

/// ================================
/// Full service configuration
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub settings: SettingsConfig,
}

/// ================================
/// Global service-wide settings
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct SettingsConfig {
    pub api: ApiConfig,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    /// e.g. http://localhost/api, endpoint paths are appended to it
    pub base_url: String,
    pub timeout_ms: Option<u64>,
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), timeout_ms: Some(DEFAULT_HTTP_TIMEOUT_MS) }
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms.unwrap_or(DEFAULT_HTTP_TIMEOUT_MS)
    }
}

/// Remote auth endpoints, relative to `api.base_url`
#[derive(Debug, Deserialize, Clone)]
pub struct EndpointsConfig {
    #[serde(default = "default_login_path")]
    pub login: String,
    #[serde(default = "default_register_path")]
    pub register: String,
    #[serde(default = "default_logout_path")]
    pub logout: String,
    #[serde(default = "default_refresh_path")]
    pub refresh: String,
    /// Profile of the logged in user, called through the request pipeline
    #[serde(default = "default_user_path")]
    pub user: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            login: default_login_path(),
            register: default_register_path(),
            logout: default_logout_path(),
            refresh: default_refresh_path(),
            user: default_user_path(),
        }
    }
}

/// ================================
/// Credential storage
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(rename = "type", default)]
    pub storage_type: StorageType,
    /// directory holding the key-value file and the cookie file
    /// invariant: required for `file`
    pub dir: Option<String>,
    #[serde(default = "default_access_key")]
    pub access_key: String,
    #[serde(default)]
    pub refresh_cookie: RefreshCookieConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_type: StorageType::default(),
            dir: None,
            access_key: default_access_key(),
            refresh_cookie: RefreshCookieConfig::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// volatile, lost on restart
    #[default]
    Memory,
    File,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RefreshCookieConfig {
    #[serde(default = "default_cookie_name")]
    pub name: String,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    /// cookie expiry relative to the moment it is written, session cookie if absent
    pub max_age_seconds: Option<u64>,
}

impl Default for RefreshCookieConfig {
    fn default() -> Self {
        Self {
            name: default_cookie_name(),
            path: default_cookie_path(),
            max_age_seconds: None,
        }
    }
}

/// ================================
/// Logging
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String, // allowed: trace, debug, info, warn, error
    pub format: LogFormat,
}

impl LoggingConfig {
    pub fn new (level: String, format: LogFormat) -> Self {
        Self { level, format }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Compact,
}

impl LogFormat {
    pub fn from_env() -> Self {
        match std::env::var("LOG_FORMAT")
            .unwrap_or_else(|_| "compact".to_string())
            .to_lowercase()
            .as_str()
        {
            "json" => LogFormat::Json,
            _ => LogFormat::Compact,
        }
    }
}

fn default_login_path() -> String {
    DEFAULT_LOGIN_PATH.to_string()
}

fn default_register_path() -> String {
    DEFAULT_REGISTER_PATH.to_string()
}

fn default_logout_path() -> String {
    DEFAULT_LOGOUT_PATH.to_string()
}

fn default_refresh_path() -> String {
    DEFAULT_REFRESH_PATH.to_string()
}

fn default_user_path() -> String {
    DEFAULT_USER_PATH.to_string()
}

fn default_access_key() -> String {
    DEFAULT_ACCESS_KEY.to_string()
}

fn default_cookie_name() -> String {
    DEFAULT_REFRESH_COOKIE_NAME.to_string()
}

fn default_cookie_path() -> String {
    DEFAULT_COOKIE_PATH.to_string()
}
