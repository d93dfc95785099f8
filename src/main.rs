mod config;
mod error;
mod extractor;
mod page;
mod pipeline;
mod routes;
mod selector;
mod validation;

use std::{collections::HashSet, sync::Arc};

use axum::http::{HeaderValue, Method, header::CONTENT_DISPOSITION};
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, info};
use url::Url;

use crate::{
    config::AppConfig,
    error::ApiError,
    extractor::YtDlpExtractor,
    pipeline::Pipeline,
    routes::AppState,
    selector::FormatSelector,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "video_relay=info,tower_http=info".to_string()),
        )
        .init();

    if let Err(error) = run().await {
        eprintln!("Server error: {}", error.message);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), ApiError> {
    let config = AppConfig::from_env();
    info!(
        "Extracting with {:?}, deadline {}s, default quality {}",
        config.yt_dlp_binary,
        config.extraction_timeout.as_secs(),
        config.default_quality
    );

    let pipeline = Pipeline::new(
        Arc::new(YtDlpExtractor::new(config.yt_dlp_binary.clone())),
        FormatSelector::default(),
        config.extraction_timeout,
    );
    let state = AppState {
        pipeline: Arc::new(pipeline),
        default_quality: Arc::from(config.default_quality.as_str()),
    };

    let cors = build_cors_layer(&config.allowed_origins)?;
    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .map_err(|error| {
            ApiError::internal(format!("Could not bind {}: {error}", config.bind_addr))
        })?;

    info!("Listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .await
        .map_err(|error| ApiError::internal(format!("HTTP server error: {error}")))
}

fn build_cors_layer(origins: &[String]) -> Result<CorsLayer, ApiError> {
    let normalized_origins = origins
        .iter()
        .map(|origin| {
            normalize_origin(origin).ok_or_else(|| {
                ApiError::internal(format!("Invalid origin in ALLOWED_ORIGINS: {origin}"))
            })
        })
        .collect::<Result<HashSet<_>, _>>()?;
    let allowed_origins = Arc::new(normalized_origins);
    info!(
        "CORS allow-list has {} origin(s): {:?}",
        allowed_origins.len(),
        allowed_origins
    );

    let allow_origin = AllowOrigin::predicate({
        let allowed_origins = Arc::clone(&allowed_origins);
        move |origin: &HeaderValue, _| {
            let normalized = origin.to_str().ok().and_then(normalize_origin);
            let allowed = normalized
                .as_ref()
                .is_some_and(|value| allowed_origins.contains(value));
            debug!(
                "CORS origin check raw={:?} normalized={:?} allowed={}",
                origin, normalized, allowed
            );
            allowed
        }
    });

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
        .expose_headers([CONTENT_DISPOSITION]))
}

/// `scheme://host[:port]` with the default port dropped; anything carrying a
/// path, query or fragment is not an origin.
fn normalize_origin(value: &str) -> Option<String> {
    let parsed = Url::parse(value).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    let scheme = parsed.scheme();
    if !matches!(scheme, "http" | "https") {
        return None;
    }

    if parsed.path() != "/" || parsed.query().is_some() || parsed.fragment().is_some() {
        return None;
    }

    // `Url::port` is already `None` for the scheme's default port.
    match parsed.port() {
        Some(port) => Some(format!("{scheme}://{host}:{port}")),
        None => Some(format!("{scheme}://{host}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origins_are_normalized() {
        assert_eq!(
            normalize_origin("https://Example.com").as_deref(),
            Some("https://example.com")
        );
        assert_eq!(
            normalize_origin("https://example.com:443/").as_deref(),
            Some("https://example.com")
        );
        assert_eq!(
            normalize_origin("http://localhost:5173").as_deref(),
            Some("http://localhost:5173")
        );
    }

    #[test]
    fn non_origins_are_rejected() {
        assert!(normalize_origin("https://example.com/app").is_none());
        assert!(normalize_origin("https://example.com/?q=1").is_none());
        assert!(normalize_origin("ftp://example.com").is_none());
        assert!(normalize_origin("example.com").is_none());
    }

    #[test]
    fn cors_layer_requires_valid_origins() {
        assert!(build_cors_layer(&["https://example.com".to_string()]).is_ok());
        let Err(error) = build_cors_layer(&["not an origin".to_string()]) else {
            panic!("invalid origin accepted");
        };
        assert!(error.message.contains("ALLOWED_ORIGINS"));
    }
}
