use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::template::RendererConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub renderer: RendererSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RendererSettings {
    /// Master switch for the render cache
    #[serde(default = "default_cache_enabled")]
    pub cache_enabled: bool,
    /// Render cache TTL in seconds
    #[serde(default = "default_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,
    /// Maximum cached renders
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: usize,
    /// Locale applied when callers do not pass one
    #[serde(default = "default_locale")]
    pub default_locale: String,
    /// Timezone applied when callers do not pass one
    #[serde(default = "default_timezone")]
    pub default_timezone: String,
    /// Collapse whitespace in rendered output
    #[serde(default = "default_normalize_whitespace")]
    pub normalize_whitespace: bool,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_ttl_seconds() -> u64 {
    300 // 5 minutes
}

fn default_cache_max_entries() -> usize {
    10_000
}

fn default_locale() -> String {
    "zh-CN".to_string()
}

fn default_timezone() -> String {
    "Asia/Shanghai".to_string()
}

fn default_normalize_whitespace() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format: "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("renderer.cache_enabled", true)?
            .set_default("renderer.cache_ttl_seconds", 300)?
            .set_default("renderer.cache_max_entries", 10_000)?
            .set_default("renderer.default_locale", "zh-CN")?
            .set_default("renderer.default_timezone", "Asia/Shanghai")?
            .set_default("renderer.normalize_whitespace", true)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables
            // TEMPLATE_RENDERER__CACHE_TTL_SECONDS, TEMPLATE_LOGGING__FORMAT, etc.
            .add_source(
                Environment::with_prefix("TEMPLATE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    pub fn renderer_config(&self) -> RendererConfig {
        RendererConfig::from(&self.renderer)
    }
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            cache_enabled: default_cache_enabled(),
            cache_ttl_seconds: default_cache_ttl_seconds(),
            cache_max_entries: default_cache_max_entries(),
            default_locale: default_locale(),
            default_timezone: default_timezone(),
            normalize_whitespace: default_normalize_whitespace(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl From<&RendererSettings> for RendererConfig {
    fn from(settings: &RendererSettings) -> Self {
        Self {
            cache_enabled: settings.cache_enabled,
            cache_ttl: Duration::from_secs(settings.cache_ttl_seconds),
            cache_max_entries: settings.cache_max_entries,
            normalize_whitespace: settings.normalize_whitespace,
        }
    }
}

impl RendererSettings {
    /// Render options carrying the configured locale and timezone
    pub fn default_options(&self) -> crate::template::RenderOptions {
        crate::template::RenderOptions {
            enable_cache: self.cache_enabled,
            cache_key: None,
            locale: self.default_locale.clone(),
            timezone: self.default_timezone.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let renderer = RendererSettings::default();
        assert!(renderer.cache_enabled);
        assert_eq!(renderer.cache_ttl_seconds, 300);
        assert_eq!(renderer.default_locale, "zh-CN");
        assert_eq!(renderer.default_timezone, "Asia/Shanghai");

        let logging = LoggingConfig::default();
        assert_eq!(logging.level, "info");
        assert_eq!(logging.format, "pretty");
    }

    #[test]
    fn test_renderer_config_from_settings() {
        let settings = RendererSettings {
            cache_ttl_seconds: 60,
            normalize_whitespace: false,
            ..RendererSettings::default()
        };
        let config = RendererConfig::from(&settings);
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
        assert!(!config.normalize_whitespace);
        assert_eq!(config.cache_max_entries, 10_000);
    }

    #[test]
    fn test_default_options() {
        let settings = RendererSettings {
            default_locale: "en-US".to_string(),
            ..RendererSettings::default()
        };
        let options = settings.default_options();
        assert_eq!(options.locale, "en-US");
        assert_eq!(options.timezone, "Asia/Shanghai");
        assert!(options.enable_cache);
    }

    #[test]
    fn test_settings_load_with_defaults() {
        let settings = Settings::new().unwrap();
        assert!(settings.renderer.cache_max_entries > 0);
        assert!(!settings.logging.level.is_empty());
    }
}
