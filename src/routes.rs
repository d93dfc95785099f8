use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_DISPOSITION, LOCATION},
    },
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

use crate::{
    config::{AUDIO_QUALITY, STREAM_QUALITIES},
    error::ApiError,
    extractor::{FormatDescriptor, VideoMetadata},
    page::INDEX_HTML,
    pipeline::{DOWNLOAD, INFO, Pipeline, STREAM},
    selector::SelectionRequest,
};

const MAX_FILENAME_CHARS: usize = 100;
const FALLBACK_FILENAME: &str = "video";

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub default_quality: Arc<str>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/health", get(health))
        .route("/api/info", post(video_info))
        .route("/api/stream", post(resolve_stream))
        .route("/api/download", get(download_redirect))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct InfoRequest {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoResponse {
    title: String,
    duration: String,
    thumbnail: Option<String>,
    author: String,
    video_id: String,
    formats: Vec<FormatSummary>,
}

#[derive(Debug, Serialize)]
pub struct FormatSummary {
    quality: String,
    container: String,
    size: Option<u64>,
    itag: u32,
}

#[derive(Debug, Deserialize)]
pub struct StreamRequest {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    quality: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamResponse {
    stream_url: String,
    title: String,
    duration: String,
    thumbnail: Option<String>,
    quality: String,
    container: String,
    size: Option<u64>,
    itag: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    url: Option<String>,
    itag: Option<String>,
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

async fn video_info(
    State(state): State<AppState>,
    payload: Result<Json<InfoRequest>, JsonRejection>,
) -> Result<Json<InfoResponse>, ApiError> {
    let Json(payload) = payload.map_err(reject_body)?;
    let metadata = state
        .pipeline
        .resolve(&INFO, payload.url.as_deref())
        .await?;

    let formats = state
        .pipeline
        .selector()
        .candidates(&metadata.formats, &INFO.policy)
        .into_iter()
        .map(|format| FormatSummary {
            quality: format.quality.clone(),
            container: format.container.clone(),
            size: format.content_length,
            itag: format.itag,
        })
        .collect();

    Ok(Json(InfoResponse {
        thumbnail: metadata.preferred_thumbnail().map(ToString::to_string),
        duration: metadata.duration_seconds.to_string(),
        video_id: metadata.id,
        title: metadata.title,
        author: metadata.author,
        formats,
    }))
}

async fn resolve_stream(
    State(state): State<AppState>,
    payload: Result<Json<StreamRequest>, JsonRejection>,
) -> Result<Json<StreamResponse>, ApiError> {
    let Json(payload) = payload.map_err(reject_body)?;
    let quality = requested_quality(payload.quality.as_deref(), &state.default_quality);
    let metadata = state
        .pipeline
        .resolve(&STREAM, payload.url.as_deref())
        .await?;

    let format = if quality == AUDIO_QUALITY {
        state.pipeline.select_audio(&STREAM, &metadata)?
    } else {
        let request = SelectionRequest {
            preferred_itag: None,
            preferred_quality: Some(quality.to_string()),
        };
        state.pipeline.select(&STREAM, &metadata, &request)?
    };

    info!(
        video_id = %metadata.id,
        itag = format.itag,
        requested = quality,
        "Resolved stream"
    );

    Ok(Json(stream_response(&metadata, format, quality)))
}

async fn download_redirect(
    State(state): State<AppState>,
    query: Result<Query<DownloadQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query.map_err(|rejection| {
        warn!("Rejected download query: {rejection}");
        ApiError::bad_request("Invalid query string")
    })?;

    let preferred_itag = match query.itag.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<u32>().map_err(|_| {
            warn!("Rejected itag {raw:?}");
            ApiError::bad_request("Invalid itag")
        })?),
    };

    let metadata = state
        .pipeline
        .resolve(&DOWNLOAD, query.url.as_deref())
        .await?;
    let request = SelectionRequest {
        preferred_itag,
        preferred_quality: None,
    };
    let format = state.pipeline.select(&DOWNLOAD, &metadata, &request)?;

    let filename = format!(
        "{}.{}",
        sanitize_filename(&metadata.title),
        sanitize_extension(&format.container)
    );
    let location = HeaderValue::from_str(&format.url).map_err(|_| {
        warn!(itag = format.itag, "Media URL is not a valid header value");
        ApiError::internal(DOWNLOAD.failure_message)
    })?;
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
        .map_err(|_| ApiError::internal(DOWNLOAD.failure_message))?;

    info!(video_id = %metadata.id, itag = format.itag, %filename, "Redirecting download");

    let mut headers = HeaderMap::new();
    headers.insert(LOCATION, location);
    headers.insert(CONTENT_DISPOSITION, disposition);
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));

    Ok((StatusCode::FOUND, headers).into_response())
}

fn reject_body(rejection: JsonRejection) -> ApiError {
    warn!("Rejected request body: {rejection}");
    ApiError::bad_request("Invalid request body")
}

/// Unknown or missing qualities fall back to the configured default.
fn requested_quality<'a>(requested: Option<&'a str>, default_quality: &'a str) -> &'a str {
    requested
        .map(str::trim)
        .filter(|quality| STREAM_QUALITIES.contains(quality))
        .unwrap_or(default_quality)
}

fn stream_response(
    metadata: &VideoMetadata,
    format: &FormatDescriptor,
    requested: &str,
) -> StreamResponse {
    let quality = if requested == AUDIO_QUALITY {
        AUDIO_QUALITY.to_string()
    } else {
        format.quality.clone()
    };

    StreamResponse {
        stream_url: format.url.clone(),
        title: metadata.title.clone(),
        duration: metadata.duration_seconds.to_string(),
        thumbnail: metadata.preferred_thumbnail().map(ToString::to_string),
        quality,
        container: format.container.clone(),
        size: format.content_length,
        itag: format.itag,
        expires_at: media_url_expiry(&format.url),
    }
}

/// Direct media URLs carry their expiry as a unix timestamp in `expire`.
fn media_url_expiry(media_url: &str) -> Option<DateTime<Utc>> {
    let parsed = Url::parse(media_url).ok()?;
    let (_, value) = parsed.query_pairs().find(|(key, _)| key == "expire")?;
    let timestamp = value.parse::<i64>().ok()?;
    DateTime::<Utc>::from_timestamp(timestamp, 0)
}

/// Keeps ASCII word characters, spaces and hyphens, at most 100 of them.
fn sanitize_filename(title: &str) -> String {
    let sanitized = title
        .chars()
        .filter_map(|character| {
            if character.is_ascii_alphanumeric() || matches!(character, '_' | '-') {
                Some(character)
            } else if character.is_whitespace() {
                Some(' ')
            } else {
                None
            }
        })
        .take(MAX_FILENAME_CHARS)
        .collect::<String>();

    let compact = sanitized.trim();
    if compact.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        compact.to_string()
    }
}

fn sanitize_extension(container: &str) -> String {
    let extension = container
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>();
    if extension.is_empty() {
        "bin".to_string()
    } else {
        extension
    }
}
