use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Everything that can go wrong between a video identifier and a formatted transcript.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("Unable to retrieve a YouTube video ID from \"{input}\"")]
    InvalidIdentifier { input: String },

    #[error("Too many requests to YouTube from this IP. Captcha solving required.")]
    RateLimited,

    #[error("Failed to fetch video page ({video_id}): {reason}")]
    PageFetchFailed {
        video_id: String,
        status: Option<u16>,
        reason: String,
    },

    #[error("Failed to parse video page ({video_id}): {reason}")]
    PageParseFailed { video_id: String, reason: String },

    #[error("The video is no longer available ({video_id})")]
    VideoUnavailable { video_id: String },

    #[error("Transcript is disabled on this video ({video_id})")]
    TranscriptsDisabled { video_id: String },

    #[error("No transcripts are available for this video ({video_id})")]
    NoTranscriptsAvailable { video_id: String },

    #[error(
        "No transcripts available in \"{requested}\" for this video ({video_id}). Available languages: {}",
        available.join(", ")
    )]
    LanguageUnavailable {
        video_id: String,
        requested: String,
        available: Vec<String>,
    },

    #[error("Failed to fetch transcript data ({video_id}): {reason}")]
    TranscriptFetchFailed {
        video_id: String,
        status: Option<u16>,
        reason: String,
    },

    #[error("Failed to parse transcript data ({video_id}): {reason}")]
    TranscriptParseFailed { video_id: String, reason: String },
}

/// Stable, machine-readable code for each `CoreError` variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidIdentifier,
    RateLimited,
    PageFetchFailed,
    PageParseFailed,
    VideoUnavailable,
    TranscriptsDisabled,
    NoTranscriptsAvailable,
    LanguageUnavailable,
    TranscriptFetchFailed,
    TranscriptParseFailed,
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::InvalidIdentifier { .. } => ErrorKind::InvalidIdentifier,
            CoreError::RateLimited => ErrorKind::RateLimited,
            CoreError::PageFetchFailed { .. } => ErrorKind::PageFetchFailed,
            CoreError::PageParseFailed { .. } => ErrorKind::PageParseFailed,
            CoreError::VideoUnavailable { .. } => ErrorKind::VideoUnavailable,
            CoreError::TranscriptsDisabled { .. } => ErrorKind::TranscriptsDisabled,
            CoreError::NoTranscriptsAvailable { .. } => ErrorKind::NoTranscriptsAvailable,
            CoreError::LanguageUnavailable { .. } => ErrorKind::LanguageUnavailable,
            CoreError::TranscriptFetchFailed { .. } => ErrorKind::TranscriptFetchFailed,
            CoreError::TranscriptParseFailed { .. } => ErrorKind::TranscriptParseFailed,
        }
    }

    /// Whether re-running the whole pipeline could plausibly succeed.
    ///
    /// Only transport errors and 5xx responses qualify; rate limiting never does.
    pub fn is_transient(&self) -> bool {
        match self {
            CoreError::PageFetchFailed { status, .. } | CoreError::TranscriptFetchFailed { status, .. } => {
                status.is_none_or(|s| s >= 500)
            }
            _ => false,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = match self {
            ErrorKind::InvalidIdentifier => "invalid_identifier",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::PageFetchFailed => "page_fetch_failed",
            ErrorKind::PageParseFailed => "page_parse_failed",
            ErrorKind::VideoUnavailable => "video_unavailable",
            ErrorKind::TranscriptsDisabled => "transcripts_disabled",
            ErrorKind::NoTranscriptsAvailable => "no_transcripts_available",
            ErrorKind::LanguageUnavailable => "language_unavailable",
            ErrorKind::TranscriptFetchFailed => "transcript_fetch_failed",
            ErrorKind::TranscriptParseFailed => "transcript_parse_failed",
        };
        write!(f, "{code}")
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
