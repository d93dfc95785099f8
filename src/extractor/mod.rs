mod models;
mod ytdlp;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::ErrorKind;

pub use models::{FormatDescriptor, VideoMetadata};
pub use ytdlp::{DEFAULT_YT_DLP_BINARY, YtDlpExtractor};

/// Failures reported by an extraction backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    /// The host reports the video as removed, private or blocked.
    #[error("video unavailable: {0}")]
    Unavailable(String),

    /// Age, sign-in or region gate.
    #[error("video restricted: {0}")]
    Restricted(String),

    #[error("extraction timed out")]
    Timeout,

    #[error("extraction failed: {0}")]
    Unknown(String),
}

impl ExtractionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unavailable(_) => ErrorKind::Unavailable,
            Self::Restricted(_) => ErrorKind::Restricted,
            Self::Timeout => ErrorKind::Timeout,
            Self::Unknown(_) => ErrorKind::Unknown,
        }
    }
}

/// Turns a video URL into metadata plus its currently available formats.
///
/// Implementations perform a single attempt and do not bound their own
/// running time; callers apply the deadline.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn fetch_metadata(&self, target: &str) -> Result<VideoMetadata, ExtractionError>;
}
