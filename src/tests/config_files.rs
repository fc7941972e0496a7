// Loading session-agent.yaml from disk: env expansion, defaults and validation

#[cfg(test)]
mod test {

    use std::fs;

    use serial_test::serial;
    use tempfile::tempdir;

    use crate::config::proc_loader::parse_config;
    use crate::config::settings::{LogFormat, StorageType};
    use crate::utils::config_loader;

    const FULL_CONFIG: &str = r#"
settings:
  api:
    base_url: "http://localhost:8000/api/"
    timeout_ms: 2500
  endpoints:
    login: "/v1/login"
    register: "/v1/register"
    logout: "/v1/logout"
    refresh: "/v1/refresh"
    user: "/v1/me"
  storage:
    type: file
    dir: "/var/lib/session-agent"
    access_key: "token"
    refresh_cookie:
      name: "rt"
      path: "/api"
      max_age_seconds: 604800
  logging:
    level: debug
    format: json
"#;

    #[tokio::test]
    async fn full_config_is_parsed() {
        let cfg = parse_config(FULL_CONFIG.to_string()).await.unwrap();
        let settings = cfg.settings;

        assert_eq!(settings.api.base_url, "http://localhost:8000/api");
        assert_eq!(settings.api.timeout_ms(), 2500);
        assert_eq!(settings.endpoints.refresh, "/v1/refresh");
        assert_eq!(settings.endpoints.user, "/v1/me");
        assert_eq!(settings.storage.storage_type, StorageType::File);
        assert_eq!(settings.storage.dir.as_deref(), Some("/var/lib/session-agent"));
        assert_eq!(settings.storage.access_key, "token");
        assert_eq!(settings.storage.refresh_cookie.name, "rt");
        assert_eq!(settings.storage.refresh_cookie.max_age_seconds, Some(604800));
        let logging = settings.logging.unwrap();
        assert_eq!(logging.level, "debug");
        assert_eq!(logging.format, LogFormat::Json);
    }

    #[tokio::test]
    async fn minimal_config_gets_defaults() {
        let cfg = parse_config("settings:\n  api:\n    base_url: http://localhost/api\n".to_string())
            .await
            .unwrap();
        let settings = cfg.settings;

        assert_eq!(settings.endpoints.login, "/auth/login");
        assert_eq!(settings.endpoints.refresh, "/auth/refresh");
        assert_eq!(settings.endpoints.user, "/user");
        assert_eq!(settings.storage.storage_type, StorageType::Memory);
        assert_eq!(settings.storage.access_key, "access-token");
        assert_eq!(settings.storage.refresh_cookie.name, "refresh-token");
        assert_eq!(settings.logging.unwrap().level, "info");
    }

    #[tokio::test]
    #[serial]
    async fn config_file_expands_environment() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session-agent.yaml");
        fs::write(
            &path,
            "settings:\n  api:\n    base_url: ${SESSION_AGENT_IT_URL}\n  storage:\n    type: file\n    dir: ${SESSION_AGENT_IT_DIR:/tmp/session-agent}\n",
        )
        .unwrap();
        std::env::set_var("SESSION_AGENT_IT_URL", "https://api.example.org");
        std::env::remove_var("SESSION_AGENT_IT_DIR");

        let cfg = config_loader::run(path.to_str().unwrap()).await.unwrap();
        std::env::remove_var("SESSION_AGENT_IT_URL");

        assert_eq!(cfg.settings.api.base_url, "https://api.example.org");
        assert_eq!(cfg.settings.storage.dir.as_deref(), Some("/tmp/session-agent"));
    }

    #[tokio::test]
    async fn invalid_config_lists_issues() {
        let err = parse_config(
            "settings:\n  api:\n    base_url: localhost\n    timeout_ms: 0\n  storage:\n    type: file\n".to_string(),
        )
        .await
        .unwrap_err()
        .to_string();

        assert!(err.starts_with("invalid config"), "{}", err);
        assert!(err.contains("storage.dir"), "{}", err);
        assert!(err.contains("timeout"), "{}", err);
    }

    #[tokio::test]
    async fn missing_file_names_the_path() {
        let err = config_loader::run("/definitely/not/here.yaml").await.unwrap_err();

        assert!(err.to_string().contains("/definitely/not/here.yaml"));
    }

    #[tokio::test]
    async fn unknown_storage_type_is_rejected() {
        let result = parse_config(
            "settings:\n  api:\n    base_url: http://localhost\n  storage:\n    type: redis\n".to_string(),
        )
        .await;

        assert!(result.is_err());
    }
}
