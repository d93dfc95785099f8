//! The validate -> extract -> select flow shared by every endpoint.
//!
//! Endpoints differ only in their [`Endpoint`] profile: which formats they
//! accept, which extraction failures they report with their own status and
//! the wording of their errors.

use std::{sync::Arc, time::Duration};

use tokio::time::timeout;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::{
    error::{ApiError, ErrorKind},
    extractor::{ExtractionError, Extractor, FormatDescriptor, VideoMetadata},
    selector::{FormatSelector, SelectionPolicy, SelectionRequest},
    validation::validate,
};

pub const INVALID_URL_MESSAGE: &str = "Invalid YouTube URL";
pub const TIMEOUT_MESSAGE: &str = "Request timeout";

#[derive(Debug, Clone, Copy)]
pub struct Endpoint {
    pub name: &'static str,
    pub policy: SelectionPolicy,
    /// Extraction failures reported with their own status; the rest become
    /// `Unknown` with `failure_message`.
    pub surfaced: &'static [ErrorKind],
    pub not_found_message: &'static str,
    pub failure_message: &'static str,
}

pub const INFO: Endpoint = Endpoint {
    name: "info",
    policy: SelectionPolicy {
        required_container: None,
        video_only_fallback: false,
    },
    surfaced: &[ErrorKind::Unavailable, ErrorKind::Restricted],
    not_found_message: "No formats found",
    failure_message: "Failed to fetch video information. Please try again.",
};

pub const STREAM: Endpoint = Endpoint {
    name: "stream",
    policy: SelectionPolicy {
        required_container: Some("mp4"),
        video_only_fallback: true,
    },
    surfaced: &[ErrorKind::Timeout],
    not_found_message: "No matching format found",
    failure_message: "Failed to process video",
};

pub const DOWNLOAD: Endpoint = Endpoint {
    name: "download",
    policy: SelectionPolicy {
        required_container: None,
        video_only_fallback: false,
    },
    surfaced: &[],
    not_found_message: "No suitable format found",
    failure_message: "Failed to process download",
};

impl Endpoint {
    pub fn translate(&self, error: &ExtractionError) -> ApiError {
        let kind = error.kind();
        warn!(endpoint = self.name, ?kind, "Extraction failed: {error}");

        if self.surfaced.contains(&kind) {
            ApiError::new(kind, surfaced_message(kind))
        } else {
            ApiError::internal(self.failure_message)
        }
    }
}

fn surfaced_message(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Unavailable => "This video is no longer available",
        ErrorKind::Restricted => "This video is age or region restricted",
        ErrorKind::Timeout => TIMEOUT_MESSAGE,
        ErrorKind::InvalidInput => INVALID_URL_MESSAGE,
        ErrorKind::NotFound | ErrorKind::Unknown => "Failed to process request",
    }
}

/// Shared by all handlers; holds no mutable state.
pub struct Pipeline {
    extractor: Arc<dyn Extractor>,
    selector: FormatSelector,
    extraction_timeout: Duration,
}

impl Pipeline {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        selector: FormatSelector,
        extraction_timeout: Duration,
    ) -> Self {
        Self {
            extractor,
            selector,
            extraction_timeout,
        }
    }

    pub fn selector(&self) -> &FormatSelector {
        &self.selector
    }

    /// Validates the raw URL and runs one extraction bounded by the
    /// configured deadline. A missed deadline drops the extraction future.
    pub async fn resolve(
        &self,
        endpoint: &Endpoint,
        raw_url: Option<&str>,
    ) -> Result<VideoMetadata, ApiError> {
        let span = info_span!("pipeline", endpoint = endpoint.name, request_id = %Uuid::new_v4());

        async {
            let Some(video_id) = raw_url.and_then(validate) else {
                warn!("Rejected URL {:?}", raw_url.unwrap_or_default());
                return Err(ApiError::bad_request(INVALID_URL_MESSAGE));
            };

            info!(%video_id, "Fetching metadata");
            let target = video_id.watch_url();
            let outcome = timeout(self.extraction_timeout, self.extractor.fetch_metadata(&target))
                .await
                .unwrap_or(Err(ExtractionError::Timeout));

            match outcome {
                Ok(metadata) => {
                    info!(
                        %video_id,
                        formats = metadata.formats.len(),
                        "Metadata fetched"
                    );
                    Ok(metadata)
                }
                Err(error) => Err(endpoint.translate(&error)),
            }
        }
        .instrument(span)
        .await
    }

    pub fn select<'a>(
        &self,
        endpoint: &Endpoint,
        metadata: &'a VideoMetadata,
        request: &SelectionRequest,
    ) -> Result<&'a FormatDescriptor, ApiError> {
        self.selector
            .select(&metadata.formats, &endpoint.policy, request)
            .ok_or_else(|| not_found(endpoint, metadata, request))
    }

    pub fn select_audio<'a>(
        &self,
        endpoint: &Endpoint,
        metadata: &'a VideoMetadata,
    ) -> Result<&'a FormatDescriptor, ApiError> {
        self.selector
            .select_audio(&metadata.formats)
            .ok_or_else(|| not_found(endpoint, metadata, &SelectionRequest::default()))
    }
}

fn not_found(
    endpoint: &Endpoint,
    metadata: &VideoMetadata,
    request: &SelectionRequest,
) -> ApiError {
    warn!(
        endpoint = endpoint.name,
        video_id = %metadata.id,
        ?request,
        available = metadata.formats.len(),
        "No format satisfies the request"
    );
    ApiError::not_found(endpoint.not_found_message)
}

#[cfg(test)]
pub(crate) mod fake {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    /// Replays a canned outcome, optionally after a delay, and records the
    /// targets it was asked for.
    pub struct FakeExtractor {
        outcome: Result<VideoMetadata, ExtractionError>,
        delay: Option<Duration>,
        pub targets: Mutex<Vec<String>>,
    }

    impl FakeExtractor {
        pub fn returning(metadata: VideoMetadata) -> Self {
            Self {
                outcome: Ok(metadata),
                delay: None,
                targets: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(error: ExtractionError) -> Self {
            Self {
                outcome: Err(error),
                delay: None,
                targets: Mutex::new(Vec::new()),
            }
        }

        pub fn delayed(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }
    }

    #[async_trait]
    impl Extractor for FakeExtractor {
        async fn fetch_metadata(&self, target: &str) -> Result<VideoMetadata, ExtractionError> {
            self.targets.lock().unwrap().push(target.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.outcome.clone()
        }
    }

    pub fn metadata(formats: Vec<FormatDescriptor>) -> VideoMetadata {
        VideoMetadata {
            id: "dQw4w9WgXcQ".to_string(),
            title: "Never Gonna Give You Up".to_string(),
            duration_seconds: 212,
            author: "Rick Astley".to_string(),
            thumbnails: vec![
                "https://i.ytimg.com/vi/dQw4w9WgXcQ/default.jpg".to_string(),
                "https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg".to_string(),
            ],
            formats,
        }
    }

    pub fn pipeline(extractor: FakeExtractor) -> (Arc<FakeExtractor>, Pipeline) {
        pipeline_with_timeout(extractor, Duration::from_secs(5))
    }

    pub fn pipeline_with_timeout(
        extractor: FakeExtractor,
        extraction_timeout: Duration,
    ) -> (Arc<FakeExtractor>, Pipeline) {
        let extractor = Arc::new(extractor);
        let pipeline = Pipeline::new(
            extractor.clone(),
            FormatSelector::default(),
            extraction_timeout,
        );
        (extractor, pipeline)
    }
}
