use std::collections::HashSet;

use crate::extractor::FormatDescriptor;

/// Highest resolution first.
pub const DEFAULT_QUALITY_ORDER: &[&str] = &[
    "2160p", "1440p", "1080p", "720p", "480p", "360p", "240p", "144p",
];

const VIDEO_ONLY_FALLBACK_LIMIT: usize = 3;

/// Per-endpoint filtering rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionPolicy {
    pub required_container: Option<&'static str>,
    pub video_only_fallback: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionRequest {
    pub preferred_itag: Option<u32>,
    pub preferred_quality: Option<String>,
}

/// Pure format selection over the descriptors of a single extraction call.
#[derive(Debug, Clone, Copy)]
pub struct FormatSelector {
    priority: &'static [&'static str],
}

impl Default for FormatSelector {
    fn default() -> Self {
        Self::new(DEFAULT_QUALITY_ORDER)
    }
}

impl FormatSelector {
    pub fn new(priority: &'static [&'static str]) -> Self {
        Self { priority }
    }

    /// Muxed formats (or the video-only fallback), one per quality label,
    /// best first. Labels missing from the priority list keep their input
    /// order after the known ones.
    pub fn candidates<'a>(
        &self,
        formats: &'a [FormatDescriptor],
        policy: &SelectionPolicy,
    ) -> Vec<&'a FormatDescriptor> {
        let container_ok = |format: &&FormatDescriptor| {
            policy
                .required_container
                .is_none_or(|container| format.container.eq_ignore_ascii_case(container))
        };

        let mut candidates = formats
            .iter()
            .filter(|format| format.has_video && format.has_audio)
            .filter(container_ok)
            .collect::<Vec<_>>();

        if candidates.is_empty() && policy.video_only_fallback {
            candidates = formats
                .iter()
                .filter(|format| format.is_video_only())
                .filter(container_ok)
                .take(VIDEO_ONLY_FALLBACK_LIMIT)
                .collect();
        }

        let mut seen = HashSet::new();
        candidates.retain(|format| seen.insert(format.quality.clone()));
        candidates.sort_by_key(|format| self.rank(&format.quality));
        candidates
    }

    pub fn select<'a>(
        &self,
        formats: &'a [FormatDescriptor],
        policy: &SelectionPolicy,
        request: &SelectionRequest,
    ) -> Option<&'a FormatDescriptor> {
        if let Some(itag) = request.preferred_itag
            && let Some(format) = formats.iter().find(|format| format.itag == itag)
        {
            return Some(format);
        }

        let candidates = self.candidates(formats, policy);
        request
            .preferred_quality
            .as_deref()
            .and_then(|quality| {
                candidates
                    .iter()
                    .copied()
                    .find(|format| format.quality == quality)
            })
            .or_else(|| candidates.first().copied())
    }

    /// Best audio-only format by bitrate; ties keep input order.
    pub fn select_audio<'a>(
        &self,
        formats: &'a [FormatDescriptor],
    ) -> Option<&'a FormatDescriptor> {
        formats
            .iter()
            .filter(|format| format.is_audio_only())
            .rev()
            .max_by_key(|format| format.bitrate.unwrap_or_default())
    }

    fn rank(&self, quality: &str) -> usize {
        self.priority
            .iter()
            .position(|known| *known == quality)
            .unwrap_or(self.priority.len())
    }
}

#[cfg(test)]
pub(crate) fn descriptor(
    itag: u32,
    quality: &str,
    container: &str,
    video: bool,
    audio: bool,
) -> FormatDescriptor {
    FormatDescriptor {
        itag,
        quality: quality.to_string(),
        container: container.to_string(),
        content_length: None,
        bitrate: None,
        has_video: video,
        has_audio: audio,
        url: format!("https://media.example/{itag}"),
    }
}
