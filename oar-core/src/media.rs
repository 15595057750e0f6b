use std::sync::LazyLock;

use regex::Regex;

static JSON_MEDIA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^application/([a-z0-9!#$&^_.\-]+\+)?json\s*(;.*)?$").expect("valid regex")
});

static FORM_MEDIA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(multipart/form-data|application/x-www-form-urlencoded)\s*(;.*)?$")
        .expect("valid regex")
});

static TEXT_MEDIA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^text/plain\s*(;.*)?$").expect("valid regex"));

pub const APPLICATION_JSON: &str = "application/json";
pub const TEXT_PLAIN: &str = "text/plain";
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";

/// Body family a media type belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Json,
    Form,
    Text,
    Other,
}

impl MediaKind {
    pub fn of(media_type: &str) -> Self {
        let media_type = media_type.trim();
        if JSON_MEDIA.is_match(media_type) {
            MediaKind::Json
        } else if FORM_MEDIA.is_match(media_type) {
            MediaKind::Form
        } else if TEXT_MEDIA.is_match(media_type) {
            MediaKind::Text
        } else {
            MediaKind::Other
        }
    }
}

pub fn is_json(media_type: &str) -> bool {
    MediaKind::of(media_type) == MediaKind::Json
}

pub fn is_form(media_type: &str) -> bool {
    MediaKind::of(media_type) == MediaKind::Form
}

pub fn is_multipart(media_type: &str) -> bool {
    media_type
        .trim()
        .to_ascii_lowercase()
        .starts_with(MULTIPART_FORM_DATA)
}
