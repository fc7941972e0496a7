//! Configuration validation with aggregated errors.
//! - Aggregates all issues into Vec<String>
//! - Validates:
//!   * api base url (absolute http/https, no query or fragment)
//!   * endpoint paths (relative to base url, start with '/', distinct)
//!   * storage invariants (file storage has a directory, cookie attributes are valid)
//!   * logging level

use regex::Regex;
use std::collections::HashSet;
use tracing::{error, info};
use url::Url;

use crate::config::settings::{
    ApiConfig, EndpointsConfig, RefreshCookieConfig, ServiceConfig, SettingsConfig, StorageConfig,
    StorageType,
};
use crate::observability::metrics::get_metrics;

/// Public entrypoint: returns Ok(()) or Err(Vec<String>) containing all issues.
pub async fn validate_service_config(cfg: &ServiceConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    validate_settings(&cfg.settings, &mut errors);

    if errors.is_empty() {
        info!("config valid");
        Ok(())
    } else {
        error!("configuration validation errors ({}):", errors.len());
        for e in &errors {
            error!(" - {}", e);
        }
        get_metrics().config_validation_errors.inc();
        Err(errors)
    }
}

/// SETTINGS VALIDATION
fn validate_settings(settings: &SettingsConfig, errors: &mut Vec<String>) {
    validate_api(&settings.api, errors);
    validate_endpoints(&settings.endpoints, errors);
    validate_storage(&settings.storage, errors);

    // logging level
    if let Some(logging) = &settings.logging {
        let valid = ["trace", "debug", "info", "warn", "error"];
        if !valid.contains(&logging.level.to_lowercase().as_str()) {
            errors.push(format!(
                "settings.logging.level '{}' invalid; allowed: {:?}",
                logging.level, valid
            ));
        }
    }
}

fn validate_api(api: &ApiConfig, errors: &mut Vec<String>) {
    match Url::parse(&api.base_url) {
        Ok(url) => {
            if url.scheme() != "http" && url.scheme() != "https" {
                errors.push(format!(
                    "settings.api.base_url '{}' must use http or https",
                    api.base_url
                ));
            }
            if url.query().is_some() || url.fragment().is_some() {
                errors.push(format!(
                    "settings.api.base_url '{}' must not carry a query or fragment",
                    api.base_url
                ));
            }
        }
        Err(e) => errors.push(format!(
            "settings.api.base_url '{}' is not a valid url: {}",
            api.base_url, e
        )),
    }

    if api.timeout_ms == Some(0) {
        errors.push("settings.api.timeout_ms must be greater than 0".to_string());
    }
}

fn validate_endpoints(endpoints: &EndpointsConfig, errors: &mut Vec<String>) {
    let named = [
        ("login", &endpoints.login),
        ("register", &endpoints.register),
        ("logout", &endpoints.logout),
        ("refresh", &endpoints.refresh),
        ("user", &endpoints.user),
    ];

    let mut seen: HashSet<&str> = HashSet::new();
    for (name, path) in named {
        if !path.starts_with('/') {
            errors.push(format!(
                "settings.endpoints.{} '{}' must start with '/'",
                name, path
            ));
        }
        if !seen.insert(path.as_str()) {
            errors.push(format!(
                "settings.endpoints.{} '{}' duplicates another endpoint",
                name, path
            ));
        }
    }
}

fn validate_storage(storage: &StorageConfig, errors: &mut Vec<String>) {
    if storage.storage_type == StorageType::File
        && storage.dir.as_ref().map(|d| d.trim().is_empty()).unwrap_or(true)
    {
        errors.push("settings.storage.dir is required when storage type is 'file'".to_string());
    }

    if storage.access_key.trim().is_empty() {
        errors.push("settings.storage.access_key must not be empty".to_string());
    }

    validate_refresh_cookie(&storage.refresh_cookie, errors);
}

fn validate_refresh_cookie(cookie: &RefreshCookieConfig, errors: &mut Vec<String>) {
    // RFC 6265 cookie-name is an RFC 2616 token
    let token = Regex::new(r"^[A-Za-z0-9!#$%&'*+.^_`|~-]+$").expect("static regex");
    if !token.is_match(&cookie.name) {
        errors.push(format!(
            "settings.storage.refresh_cookie.name '{}' is not a valid cookie name",
            cookie.name
        ));
    }

    if !cookie.path.starts_with('/') || cookie.path.contains(';') {
        errors.push(format!(
            "settings.storage.refresh_cookie.path '{}' must start with '/' and must not contain ';'",
            cookie.path
        ));
    }

    if cookie.max_age_seconds == Some(0) {
        errors.push(
            "settings.storage.refresh_cookie.max_age_seconds must be greater than 0".to_string(),
        );
    }
}
