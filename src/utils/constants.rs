//! Shared constants and invariants

pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_CONFIG_PATH: &str = "session-agent.yaml";

// Remote auth endpoints
pub const DEFAULT_LOGIN_PATH: &str = "/auth/login";
pub const DEFAULT_REGISTER_PATH: &str = "/auth/register";
pub const DEFAULT_LOGOUT_PATH: &str = "/auth/logout";
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";
pub const DEFAULT_USER_PATH: &str = "/user";

// Persisted credentials
pub const DEFAULT_ACCESS_KEY: &str = "access-token";
pub const DEFAULT_REFRESH_COOKIE_NAME: &str = "refresh-token";
pub const DEFAULT_COOKIE_PATH: &str = "/";
pub const KV_STORAGE_FILE: &str = "storage.json";
pub const COOKIE_JAR_FILE: &str = "cookies.txt";
pub const GENERATION_KEY_SUFFIX: &str = ".generation";

pub const BEARER_PREFIX: &str = "Bearer ";
