//! Request-scoped values produced by an extraction call.

/// One encoded variant of a video. `url` is a time-limited direct media URL
/// issued by the host; it is handed back to the caller and never kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatDescriptor {
    pub itag: u32,
    pub quality: String,
    pub container: String,
    pub content_length: Option<u64>,
    /// Bits per second.
    pub bitrate: Option<u64>,
    pub has_video: bool,
    pub has_audio: bool,
    pub url: String,
}

impl FormatDescriptor {
    pub fn is_audio_only(&self) -> bool {
        self.has_audio && !self.has_video
    }

    pub fn is_video_only(&self) -> bool {
        self.has_video && !self.has_audio
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoMetadata {
    pub id: String,
    pub title: String,
    pub duration_seconds: u64,
    pub author: String,
    /// Ordered smallest to largest.
    pub thumbnails: Vec<String>,
    pub formats: Vec<FormatDescriptor>,
}

impl VideoMetadata {
    pub fn preferred_thumbnail(&self) -> Option<&str> {
        self.thumbnails.last().map(String::as_str)
    }
}
