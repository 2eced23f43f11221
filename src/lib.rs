pub mod config;
pub mod envelope;
pub mod error;
pub mod format;
pub mod http;
pub mod transcript;
pub mod youtube;

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub use error::{CoreError, ErrorKind, Result};
pub use http::{HttpClient, HttpResponse, TransportError};

/// Length of a canonical YouTube video ID
pub const VIDEO_ID_LENGTH: usize = 11;

static RE_YOUTUBE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)(?:youtube\.com/(?:(?:v|e(?:mbed)?|shorts|live)/|[^/]+/.+/|.*[?&]v=)|youtu\.be/)([^"&?/\s]{11})"#,
    )
    .unwrap()
});

/// Human-readable details about a video, as found on its watch page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: Option<String>,
    pub channel: Option<String>,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub published_at: Option<String>,
}

/// One language-specific caption stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionTrack {
    pub language_code: String,
    pub base_url: String,
    pub name: Option<String>,
    pub is_generated: bool,
}

/// Caption tracks available for a video, in the order the site lists them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptionManifest {
    pub video_id: String,
    pub tracks: Vec<CaptionTrack>,
}

/// A single captioned fragment; offsets are seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedSegment {
    pub text: String,
    pub start: f64,
    pub duration: f64,
    pub language: String,
}

/// Options shared by every entry point
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Exact language code of the caption track to use; `None` picks the site's default
    pub lang: Option<String>,
}

impl FetchOptions {
    pub fn with_lang(lang: impl Into<String>) -> Self {
        Self { lang: Some(lang.into()) }
    }

    /// The language hint, ignoring an empty string
    pub fn lang(&self) -> Option<&str> {
        self.lang.as_deref().filter(|l| !l.is_empty())
    }
}

/// Complete transcript for a video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub video_id: String,
    pub metadata: VideoMetadata,
    pub language: String,
    pub segments: Vec<TimedSegment>,
    pub formatted_text: String,
}

/// Extract video ID from a raw ID or any common YouTube URL shape
pub fn extract_video_id(input: &str) -> Result<String> {
    // Length in UTF-16 units, as browsers measure it; no trimming or charset checks here
    if input.encode_utf16().count() == VIDEO_ID_LENGTH {
        return Ok(input.to_string());
    }

    RE_YOUTUBE
        .captures(input.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| CoreError::InvalidIdentifier {
            input: input.to_string(),
        })
}

/// Resolve an identifier, pick a caption track and reflow it into prose.
pub async fn fetch_transcript<C: HttpClient + ?Sized>(
    client: &C,
    identifier: &str,
    options: &FetchOptions,
) -> Result<Transcript> {
    let resolved = youtube::resolve(client, identifier, options).await?;
    let assembled = transcript::assemble(client, &resolved.manifest, options.lang()).await?;

    debug!(
        "Transcript ready for {}: {} segments, {} chars",
        resolved.video_id,
        assembled.segments.len(),
        assembled.formatted_text.len()
    );

    Ok(Transcript {
        video_id: resolved.video_id,
        metadata: resolved.metadata,
        language: assembled.language,
        segments: assembled.segments,
        formatted_text: assembled.formatted_text,
    })
}
