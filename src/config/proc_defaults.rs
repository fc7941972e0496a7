use crate::config::settings::{LogFormat, LoggingConfig, ServiceConfig};

pub fn initiate_default_values(mut config: ServiceConfig) -> ServiceConfig {
    if config.settings.logging.is_none() {
        config.settings.logging = Some(LoggingConfig::new("info".to_owned(), LogFormat::Compact));
    }

    // endpoint paths are appended to the base url, keep exactly one slash between them
    let base_url = config.settings.api.base_url.trim().trim_end_matches('/').to_owned();
    config.settings.api.base_url = base_url;

    config
}
