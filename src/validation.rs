use std::fmt;

use url::Url;

const WATCH_HOSTS: [&str; 4] = [
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
];
const SHORT_LINK_HOSTS: [&str; 2] = ["youtu.be", "www.youtu.be"];
const NOCOOKIE_HOSTS: [&str; 2] = ["youtube-nocookie.com", "www.youtube-nocookie.com"];
const VIDEO_ID_LEN: usize = 11;

/// Identifier of a single video, only obtainable through [`validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoId(String);

impl VideoId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical URL handed to the extractor, whatever shape the user pasted.
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts watch, shortened, embed and shorts URLs and returns the embedded
/// identifier. Anything else is rejected; the input is never scanned for an
/// identifier outside those shapes.
pub fn validate(input: &str) -> Option<VideoId> {
    let parsed = Url::parse(input.trim()).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }

    let host = parsed.host_str()?.to_ascii_lowercase();
    let mut segments = parsed.path_segments()?.collect::<Vec<_>>();
    if segments.len() > 1 && segments.last() == Some(&"") {
        segments.pop();
    }

    let candidate = if WATCH_HOSTS.contains(&host.as_str()) {
        match segments.as_slice() {
            ["watch"] => parsed
                .query_pairs()
                .find(|(key, _)| key == "v")
                .map(|(_, value)| value.into_owned()),
            ["embed", id] | ["shorts", id] => Some((*id).to_string()),
            _ => None,
        }
    } else if SHORT_LINK_HOSTS.contains(&host.as_str()) {
        match segments.as_slice() {
            [id] => Some((*id).to_string()),
            _ => None,
        }
    } else if NOCOOKIE_HOSTS.contains(&host.as_str()) {
        match segments.as_slice() {
            ["embed", id] => Some((*id).to_string()),
            _ => None,
        }
    } else {
        None
    };

    candidate.filter(|id| is_video_id(id)).map(VideoId)
}

fn is_video_id(value: &str) -> bool {
    value.len() == VIDEO_ID_LEN
        && value
            .chars()
            .all(|character| character.is_ascii_alphanumeric() || matches!(character, '-' | '_'))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "dQw4w9WgXcQ";

    fn id_of(input: &str) -> Option<String> {
        validate(input).map(|id| id.as_str().to_string())
    }

    #[test]
    fn accepts_watch_urls() {
        assert_eq!(id_of("https://youtube.com/watch?v=dQw4w9WgXcQ").as_deref(), Some(ID));
        assert_eq!(
            id_of("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42s").as_deref(),
            Some(ID)
        );
        assert_eq!(
            id_of("http://m.youtube.com/watch?feature=share&v=dQw4w9WgXcQ").as_deref(),
            Some(ID)
        );
        assert_eq!(
            id_of("  https://music.youtube.com/watch?v=dQw4w9WgXcQ  ").as_deref(),
            Some(ID)
        );
    }

    #[test]
    fn accepts_short_embed_and_shorts_urls() {
        assert_eq!(id_of("https://youtu.be/dQw4w9WgXcQ").as_deref(), Some(ID));
        assert_eq!(id_of("https://youtu.be/dQw4w9WgXcQ?si=abc").as_deref(), Some(ID));
        assert_eq!(
            id_of("https://www.youtube.com/embed/dQw4w9WgXcQ").as_deref(),
            Some(ID)
        );
        assert_eq!(
            id_of("https://www.youtube-nocookie.com/embed/dQw4w9WgXcQ").as_deref(),
            Some(ID)
        );
        assert_eq!(
            id_of("https://youtube.com/shorts/dQw4w9WgXcQ/").as_deref(),
            Some(ID)
        );
    }

    #[test]
    fn host_match_ignores_case() {
        assert_eq!(
            id_of("https://WWW.YouTube.com/watch?v=dQw4w9WgXcQ").as_deref(),
            Some(ID)
        );
    }

    #[test]
    fn rejects_non_urls_and_foreign_hosts() {
        for input in [
            "",
            "   ",
            "not a url",
            "dQw4w9WgXcQ",
            "youtube.com/watch?v=dQw4w9WgXcQ",
            "ftp://youtube.com/watch?v=dQw4w9WgXcQ",
            "https://vimeo.com/watch?v=dQw4w9WgXcQ",
            "https://notyoutube.com/watch?v=dQw4w9WgXcQ",
            "https://youtube.com.evil.example/watch?v=dQw4w9WgXcQ",
        ] {
            assert!(validate(input).is_none(), "accepted {input:?}");
        }
    }

    #[test]
    fn rejects_identifiers_outside_known_shapes() {
        for input in [
            "https://youtube.com/watch/dQw4w9WgXcQ",
            "https://youtube.com/results?search_query=dQw4w9WgXcQ",
            "https://youtube.com/?v=dQw4w9WgXcQ",
            "https://youtu.be/embed/dQw4w9WgXcQ",
            "https://youtube.com/shorts/dQw4w9WgXcQ/extra",
            "https://youtube-nocookie.com/watch?v=dQw4w9WgXcQ",
            "https://example.com/redirect?to=https://youtu.be/dQw4w9WgXcQ",
        ] {
            assert!(validate(input).is_none(), "accepted {input:?}");
        }
    }

    #[test]
    fn rejects_malformed_identifiers() {
        for input in [
            "https://youtube.com/watch?v=short",
            "https://youtube.com/watch?v=dQw4w9WgXcQX",
            "https://youtube.com/watch?v=dQw4w9WgX%21Q",
            "https://youtube.com/watch?v=",
            "https://youtu.be/",
        ] {
            assert!(validate(input).is_none(), "accepted {input:?}");
        }
    }

    #[test]
    fn canonical_watch_url_uses_identifier() {
        let id = validate("https://youtu.be/dQw4w9WgXcQ").expect("valid url");
        assert_eq!(id.watch_url(), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
        assert_eq!(id.to_string(), ID);
    }
}
