use std::collections::HashSet;

use super::{types::Config, ConfigError};

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.scheduler.interval_secs == 0 {
        return Err(invalid("scheduler.interval_secs cannot be 0"));
    }

    if config.offload.max_concurrent == 0 {
        return Err(invalid("offload.max_concurrent cannot be 0"));
    }
    if config.offload.store_slots == 0 {
        return Err(invalid("offload.store_slots cannot be 0"));
    }
    if config.offload.call_timeout_ms == 0 {
        return Err(invalid("offload.call_timeout_ms cannot be 0"));
    }

    if config.store.retry.max_attempts == 0 {
        return Err(invalid("store.retry.max_attempts cannot be 0"));
    }

    if config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }

    let mut names = HashSet::new();
    for source in &config.sources {
        if source.url.trim().is_empty() {
            return Err(invalid(format!("source '{}' has an empty url", source.name)));
        }
        if !names.insert(source.name.as_str()) {
            return Err(invalid(format!("duplicate source name '{}'", source.name)));
        }
    }

    if config.sources.iter().any(|s| s.enabled) {
        if config.parser.is_none() {
            return Err(invalid("enabled sources require a [parser] section"));
        }
        if config.gateway.is_none() {
            return Err(invalid("enabled sources require a [gateway] section"));
        }
    }

    if let (Some(_), Some(telegram)) = (&config.content.translate_to, &config.telegram) {
        if telegram.secondary_channel.is_none() {
            return Err(invalid(
                "content.translate_to is set but telegram.secondary_channel is missing",
            ));
        }
    }

    Ok(())
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;
    use tokio_test::{assert_err, assert_ok};

    fn config(toml: &str) -> Config {
        load_config_from_str(toml).unwrap()
    }

    #[test]
    fn test_validate_default_config() {
        assert_ok!(validate_config(&config("")));
    }

    #[test]
    fn test_validate_zero_values_fail() {
        for toml in [
            "[scheduler]\ninterval_secs = 0",
            "[offload]\nmax_concurrent = 0",
            "[offload]\nstore_slots = 0",
            "[offload]\ncall_timeout_ms = 0",
            "[store.retry]\nmax_attempts = 0",
            "[server]\nport = 0",
        ] {
            let result = validate_config(&config(toml));
            assert!(
                matches!(result, Err(ConfigError::ValidationError(_))),
                "expected failure for {}",
                toml
            );
        }
    }

    #[test]
    fn test_validate_duplicate_source_names() {
        let toml = r#"
[[sources]]
name = "a"
url = "https://a.example"

[[sources]]
name = "a"
url = "https://b.example"
"#;
        let err = validate_config(&config(toml)).unwrap_err();
        assert!(err.to_string().contains("duplicate source name 'a'"));
    }

    #[test]
    fn test_validate_empty_source_url() {
        let toml = r#"
[[sources]]
name = "a"
url = " "
"#;
        assert_err!(validate_config(&config(toml)));
    }

    #[test]
    fn test_enabled_sources_need_parser_and_gateway() {
        let toml = r#"
[[sources]]
name = "a"
url = "https://a.example"
"#;
        let err = validate_config(&config(toml)).unwrap_err();
        assert!(err.to_string().contains("[parser]"));

        let toml = r#"
[[sources]]
name = "a"
url = "https://a.example"

[parser]
url = "http://parser"
"#;
        let err = validate_config(&config(toml)).unwrap_err();
        assert!(err.to_string().contains("[gateway]"));

        let toml = r#"
[[sources]]
name = "a"
url = "https://a.example"
enabled = false
"#;
        assert_ok!(validate_config(&config(toml)));
    }

    #[test]
    fn test_translation_needs_secondary_channel() {
        let toml = r#"
[content]
translate_to = "Russian"

[telegram]
bot_token = "1:a"
admin_chat_id = "-1"
main_channel = "@main"
"#;
        let err = validate_config(&config(toml)).unwrap_err();
        assert!(err.to_string().contains("secondary_channel"));
    }
}
