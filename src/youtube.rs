use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::http::{HttpClient, USER_AGENT};
use crate::{CaptionManifest, CaptionTrack, CoreError, FetchOptions, Result, VideoMetadata, extract_video_id};

const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

// Textual bounds of the captions section inside the player response
const CAPTIONS_START: &str = "\"captions\":";
const CAPTIONS_END: &str = ",\"videoDetails";

const CAPTCHA_MARKER: &str = "class=\"g-recaptcha\"";
const PLAYABILITY_MARKER: &str = "\"playabilityStatus\":";

static RE_PLAYER_RESPONSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"ytInitialPlayerResponse\s*=\s*\{").unwrap());

#[derive(Debug, Deserialize)]
struct PlayerResponse {
    #[serde(rename = "videoDetails")]
    video_details: Option<VideoDetails>,
    microformat: Option<Microformat>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoDetails {
    title: Option<String>,
    author: Option<String>,
    short_description: Option<String>,
    thumbnail: Option<ThumbnailList>,
    publish_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ThumbnailList {
    #[serde(default)]
    thumbnails: Vec<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Microformat {
    #[serde(rename = "playerMicroformatRenderer")]
    player_microformat_renderer: Option<MicroformatRenderer>,
}

#[derive(Debug, Deserialize)]
struct MicroformatRenderer {
    #[serde(rename = "publishDate")]
    publish_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CaptionsData {
    #[serde(rename = "playerCaptionsTracklistRenderer")]
    player_captions_tracklist_renderer: Option<CaptionTracklistRenderer>,
}

#[derive(Debug, Deserialize)]
struct CaptionTracklistRenderer {
    #[serde(rename = "captionTracks")]
    caption_tracks: Option<Vec<RawCaptionTrack>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCaptionTrack {
    base_url: String,
    language_code: String,
    name: Option<TrackName>,
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackName {
    simple_text: Option<String>,
    runs: Option<Vec<TextRun>>,
}

#[derive(Debug, Deserialize)]
struct TextRun {
    text: String,
}

impl From<RawCaptionTrack> for CaptionTrack {
    fn from(raw: RawCaptionTrack) -> Self {
        let name = raw.name.and_then(|n| {
            n.simple_text
                .or_else(|| n.runs.map(|runs| runs.into_iter().map(|r| r.text).collect()))
        });

        CaptionTrack {
            language_code: raw.language_code,
            base_url: raw.base_url,
            name,
            is_generated: raw.kind.as_deref() == Some("asr"),
        }
    }
}

/// Everything the watch page tells us about a video
#[derive(Debug, Clone)]
pub struct ResolvedVideo {
    pub video_id: String,
    pub metadata: VideoMetadata,
    pub manifest: CaptionManifest,
}

pub fn watch_url(video_id: &str) -> String {
    format!("{WATCH_URL}{video_id}")
}

/// Turn an identifier into a video ID, then fetch and dissect its watch page
pub async fn resolve<C: HttpClient + ?Sized>(client: &C, identifier: &str, options: &FetchOptions) -> Result<ResolvedVideo> {
    let video_id = extract_video_id(identifier)?;
    debug!("Resolved identifier {identifier:?} to video ID {video_id}");

    let html = fetch_video_page(client, &video_id, options.lang()).await?;
    let metadata = parse_video_details(&html, &video_id)?;
    let manifest = parse_captions(&html, &video_id)?;

    debug!(
        "Video {video_id}: title={:?}, {} caption track(s)",
        metadata.title,
        manifest.tracks.len()
    );

    Ok(ResolvedVideo {
        video_id,
        metadata,
        manifest,
    })
}

/// Fetch the watch page HTML, classifying HTTP and transport failures
pub async fn fetch_video_page<C: HttpClient + ?Sized>(client: &C, video_id: &str, lang: Option<&str>) -> Result<String> {
    let url = watch_url(video_id);
    debug!("Fetching watch page: {url}");

    let mut headers = vec![("User-Agent", USER_AGENT)];
    if let Some(lang) = lang {
        headers.push(("Accept-Language", lang));
    }

    let resp = client.get(&url, &headers).await.map_err(|e| CoreError::PageFetchFailed {
        video_id: video_id.to_string(),
        status: None,
        reason: e.to_string(),
    })?;

    if resp.status == 429 {
        warn!("Watch page for {video_id} returned 429");
        return Err(CoreError::RateLimited);
    }

    if !resp.is_success() {
        warn!("Watch page for {video_id} returned {}", resp.status);
        return Err(CoreError::PageFetchFailed {
            video_id: video_id.to_string(),
            status: Some(resp.status),
            reason: format!("HTTP status {}", resp.status),
        });
    }

    Ok(resp.body)
}

/// Extract video metadata from the `ytInitialPlayerResponse` blob
pub fn parse_video_details(html: &str, video_id: &str) -> Result<VideoMetadata> {
    let parse_failed = |reason: String| CoreError::PageParseFailed {
        video_id: video_id.to_string(),
        reason,
    };

    let m = RE_PLAYER_RESPONSE
        .find(html)
        .ok_or_else(|| parse_failed("failed to extract initial player response".to_string()))?;

    // The object runs from its opening brace; whatever script follows it is ignored
    let json = &html[m.end() - 1..];
    let response: PlayerResponse = serde_json::Deserializer::from_str(json)
        .into_iter::<PlayerResponse>()
        .next()
        .ok_or_else(|| parse_failed("initial player response is empty".to_string()))?
        .map_err(|e| parse_failed(format!("failed to parse initial player response JSON: {e}")))?;

    let details = response
        .video_details
        .ok_or_else(|| parse_failed("video details not found in initial player response".to_string()))?;

    let thumbnail_url = details
        .thumbnail
        .and_then(|t| t.thumbnails.into_iter().last())
        .and_then(|t| t.url)
        .filter(|url| !url.is_empty());

    let published_at = details.publish_date.or_else(|| {
        response
            .microformat
            .and_then(|m| m.player_microformat_renderer)
            .and_then(|r| r.publish_date)
    });

    Ok(VideoMetadata {
        title: details.title,
        channel: details.author,
        description: details.short_description,
        thumbnail_url,
        published_at,
    })
}

/// Extract the caption track manifest from the page's captions section
pub fn parse_captions(html: &str, video_id: &str) -> Result<CaptionManifest> {
    let fragment = html
        .split_once(CAPTIONS_START)
        .map(|(_, rest)| rest.split_once(CAPTIONS_END).map_or(rest, |(captions, _)| captions))
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let Some(fragment) = fragment else {
        return Err(classify_missing_captions(html, video_id));
    };

    let disabled = || CoreError::TranscriptsDisabled {
        video_id: video_id.to_string(),
    };

    let captions: CaptionsData = serde_json::from_str(fragment).map_err(|e| {
        debug!("Captions section for {video_id} is not valid JSON: {e}");
        disabled()
    })?;

    let renderer = captions.player_captions_tracklist_renderer.ok_or_else(disabled)?;
    let tracks = renderer
        .caption_tracks
        .unwrap_or_default()
        .into_iter()
        .map(CaptionTrack::from)
        .collect();

    Ok(CaptionManifest {
        video_id: video_id.to_string(),
        tracks,
    })
}

fn classify_missing_captions(html: &str, video_id: &str) -> CoreError {
    let err = if html.contains(CAPTCHA_MARKER) {
        CoreError::RateLimited
    } else if !html.contains(PLAYABILITY_MARKER) {
        CoreError::VideoUnavailable {
            video_id: video_id.to_string(),
        }
    } else {
        CoreError::TranscriptsDisabled {
            video_id: video_id.to_string(),
        }
    };
    warn!("No captions section for {video_id}: {}", err.kind());
    err
}
