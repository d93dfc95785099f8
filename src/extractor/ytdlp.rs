use std::{io::ErrorKind as IoErrorKind, process::Stdio};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use super::{ExtractionError, Extractor, FormatDescriptor, VideoMetadata};

pub const DEFAULT_YT_DLP_BINARY: &str = "yt-dlp";

const RESTRICTED_MARKERS: [&str; 8] = [
    "sign in to confirm your age",
    "age-restricted",
    "age restricted",
    "inappropriate for some users",
    "available in your country",
    "geo restriction",
    "geo-restrict",
    "members-only",
];

const UNAVAILABLE_MARKERS: [&str; 9] = [
    "video unavailable",
    "private video",
    "has been removed",
    "no longer available",
    "has been terminated",
    "copyright",
    "http error 410",
    "status code: 410",
    "this video is not available",
];

/// Runs the `yt-dlp` binary once per call and maps its JSON dump.
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    binary: String,
}

impl YtDlpExtractor {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    async fn fetch_metadata(&self, target: &str) -> Result<VideoMetadata, ExtractionError> {
        debug!("Running {} for {target}", self.binary);

        // Dropping the future (deadline hit) must also stop the child.
        let output = Command::new(&self.binary)
            .args(["-J", "--no-playlist", "--no-warnings", target])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|error| {
                if error.kind() == IoErrorKind::NotFound {
                    ExtractionError::Unknown(format!(
                        "{} is not installed or not on PATH",
                        self.binary
                    ))
                } else {
                    ExtractionError::Unknown(format!("could not run {}: {error}", self.binary))
                }
            })?;

        if !output.status.success() {
            return Err(classify_failure(&output.stderr));
        }

        let info: YtDlpVideoInfo = serde_json::from_slice(&output.stdout).map_err(|error| {
            ExtractionError::Unknown(format!("unreadable {} output: {error}", self.binary))
        })?;

        Ok(info.into_metadata())
    }
}

/// Maps yt-dlp's stderr to a failure category. The last non-empty line
/// carries the message.
pub(crate) fn classify_failure(stderr: &[u8]) -> ExtractionError {
    let text = String::from_utf8_lossy(stderr);
    let message = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .next_back()
        .map(|line| line.trim_start_matches("ERROR:").trim().to_string())
        .unwrap_or_else(|| "yt-dlp exited without output".to_string());
    let lower = text.to_ascii_lowercase();

    if RESTRICTED_MARKERS.iter().any(|marker| lower.contains(marker)) {
        ExtractionError::Restricted(message)
    } else if UNAVAILABLE_MARKERS.iter().any(|marker| lower.contains(marker)) {
        ExtractionError::Unavailable(message)
    } else if lower.contains("timed out") {
        ExtractionError::Timeout
    } else {
        ExtractionError::Unknown(message)
    }
}

#[derive(Debug, Deserialize)]
struct YtDlpVideoInfo {
    id: String,
    title: Option<String>,
    duration: Option<f64>,
    uploader: Option<String>,
    channel: Option<String>,
    thumbnail: Option<String>,
    #[serde(default)]
    thumbnails: Vec<YtDlpThumbnail>,
    #[serde(default)]
    formats: Vec<YtDlpFormat>,
}

#[derive(Debug, Deserialize)]
struct YtDlpThumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
struct YtDlpFormat {
    format_id: String,
    url: Option<String>,
    ext: Option<String>,
    vcodec: Option<String>,
    acodec: Option<String>,
    height: Option<u32>,
    format_note: Option<String>,
    filesize: Option<f64>,
    filesize_approx: Option<f64>,
    tbr: Option<f64>,
}

impl YtDlpVideoInfo {
    fn into_metadata(self) -> VideoMetadata {
        let mut thumbnails = self
            .thumbnails
            .into_iter()
            .map(|thumbnail| thumbnail.url)
            .filter(|url| !url.is_empty())
            .collect::<Vec<_>>();
        if thumbnails.is_empty()
            && let Some(thumbnail) = self.thumbnail
        {
            thumbnails.push(thumbnail);
        }

        VideoMetadata {
            id: self.id,
            title: self.title.unwrap_or_default(),
            duration_seconds: self
                .duration
                .filter(|seconds| seconds.is_finite() && *seconds > 0.0)
                .map(|seconds| seconds.floor() as u64)
                .unwrap_or_default(),
            author: self.uploader.or(self.channel).unwrap_or_default(),
            thumbnails,
            formats: self
                .formats
                .into_iter()
                .filter_map(YtDlpFormat::into_descriptor)
                .collect(),
        }
    }
}

impl YtDlpFormat {
    /// Storyboards and other non-numeric ids are not addressable by itag.
    fn into_descriptor(self) -> Option<FormatDescriptor> {
        let itag = self.format_id.parse::<u32>().ok()?;
        let url = self.url.filter(|url| !url.is_empty())?;
        let quality = quality_label(self.format_note.as_deref(), self.height);

        Some(FormatDescriptor {
            itag,
            quality,
            container: self.ext.unwrap_or_else(|| "unknown".to_string()),
            content_length: self
                .filesize
                .or(self.filesize_approx)
                .filter(|bytes| *bytes > 0.0)
                .map(|bytes| bytes as u64),
            bitrate: self
                .tbr
                .filter(|kbps| *kbps > 0.0)
                .map(|kbps| (kbps * 1000.0).round() as u64),
            has_video: codec_present(self.vcodec.as_deref()),
            has_audio: codec_present(self.acodec.as_deref()),
            url,
        })
    }
}

fn codec_present(codec: Option<&str>) -> bool {
    matches!(codec, Some(value) if !value.is_empty() && value != "none")
}

/// `720p`, `1080p60` and the like are kept verbatim; otherwise the height
/// decides.
fn quality_label(note: Option<&str>, height: Option<u32>) -> String {
    if let Some(note) = note.map(str::trim)
        && looks_like_resolution(note)
    {
        return note.to_string();
    }

    match height {
        Some(height) if height > 0 => format!("{height}p"),
        _ => "unknown".to_string(),
    }
}

fn looks_like_resolution(note: &str) -> bool {
    let digits = note.chars().take_while(char::is_ascii_digit).count();
    digits > 0 && note[digits..].starts_with('p')
}
