use std::time::Duration;

use tracing::warn;

use crate::extractor::DEFAULT_YT_DLP_BINARY;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8787";
pub const DEFAULT_EXTRACTION_TIMEOUT_SECONDS: u64 = 8;
pub const DEFAULT_STREAM_QUALITY: &str = "720p";
pub const AUDIO_QUALITY: &str = "audio";
/// Qualities the stream endpoint and the form accept.
pub const STREAM_QUALITIES: [&str; 5] = ["1080p", "720p", "480p", "360p", AUDIO_QUALITY];

const DEV_ORIGINS: [&str; 2] = ["http://127.0.0.1:5173", "http://localhost:5173"];

/// Startup configuration, read once from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: String,
    pub allowed_origins: Vec<String>,
    pub yt_dlp_binary: String,
    pub extraction_timeout: Duration,
    pub default_quality: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |name: &str| {
            lookup(name).and_then(|value| non_empty(&value).map(ToString::to_string))
        };

        let bind_addr = read("APP_ADDR")
            .or_else(|| {
                read("PORT")
                    .and_then(|value| value.parse::<u16>().ok())
                    .map(|port| format!("0.0.0.0:{port}"))
            })
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        let configured_origins = read("ALLOWED_ORIGINS")
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        let allowed_origins = if configured_origins.is_empty() {
            warn!("ALLOWED_ORIGINS is not set. Falling back to local development origins.");
            DEV_ORIGINS.iter().map(ToString::to_string).collect()
        } else {
            configured_origins
        };

        let extraction_timeout = match read("EXTRACTION_TIMEOUT_SECONDS") {
            Some(value) => match value.parse::<u64>() {
                Ok(seconds) if seconds > 0 => seconds,
                _ => {
                    warn!(
                        %value,
                        fallback_secs = DEFAULT_EXTRACTION_TIMEOUT_SECONDS,
                        "Ignoring invalid EXTRACTION_TIMEOUT_SECONDS"
                    );
                    DEFAULT_EXTRACTION_TIMEOUT_SECONDS
                }
            },
            None => DEFAULT_EXTRACTION_TIMEOUT_SECONDS,
        };

        let default_quality = match read("DEFAULT_QUALITY") {
            Some(value) if STREAM_QUALITIES.contains(&value.as_str()) => value,
            Some(value) => {
                warn!("Ignoring DEFAULT_QUALITY={value:?}; using {DEFAULT_STREAM_QUALITY}.");
                DEFAULT_STREAM_QUALITY.to_string()
            }
            None => DEFAULT_STREAM_QUALITY.to_string(),
        };

        Self {
            bind_addr,
            allowed_origins,
            yt_dlp_binary: read("YT_DLP_PATH")
                .unwrap_or_else(|| DEFAULT_YT_DLP_BINARY.to_string()),
            extraction_timeout: Duration::from_secs(extraction_timeout),
            default_quality,
        }
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> AppConfig {
        let vars = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = config_from(&[]);
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(config.allowed_origins, DEV_ORIGINS.to_vec());
        assert_eq!(config.yt_dlp_binary, "yt-dlp");
        assert_eq!(
            config.extraction_timeout,
            Duration::from_secs(DEFAULT_EXTRACTION_TIMEOUT_SECONDS)
        );
        assert_eq!(config.default_quality, "720p");
    }

    #[test]
    fn app_addr_wins_over_port() {
        let config = config_from(&[("APP_ADDR", "10.0.0.1:9000"), ("PORT", "3000")]);
        assert_eq!(config.bind_addr, "10.0.0.1:9000");

        let config = config_from(&[("PORT", " 3000 ")]);
        assert_eq!(config.bind_addr, "0.0.0.0:3000");

        let config = config_from(&[("PORT", "not-a-port")]);
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
    }

    #[test]
    fn origins_are_split_and_trimmed() {
        let config = config_from(&[(
            "ALLOWED_ORIGINS",
            "https://a.example, https://b.example:8443 ,,",
        )]);
        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example", "https://b.example:8443"]
        );
    }

    #[test]
    fn invalid_timeout_and_quality_fall_back() {
        let config = config_from(&[
            ("EXTRACTION_TIMEOUT_SECONDS", "0"),
            ("DEFAULT_QUALITY", "4k"),
        ]);
        assert_eq!(
            config.extraction_timeout,
            Duration::from_secs(DEFAULT_EXTRACTION_TIMEOUT_SECONDS)
        );
        assert_eq!(config.default_quality, DEFAULT_STREAM_QUALITY);

        let config = config_from(&[
            ("EXTRACTION_TIMEOUT_SECONDS", "15"),
            ("DEFAULT_QUALITY", "480p"),
            ("YT_DLP_PATH", "/opt/bin/yt-dlp"),
        ]);
        assert_eq!(config.extraction_timeout, Duration::from_secs(15));
        assert_eq!(config.default_quality, "480p");
        assert_eq!(config.yt_dlp_binary, "/opt/bin/yt-dlp");
    }
}
