use log::{debug, warn};
use once_cell::sync::Lazy;
use quick_xml::events::BytesStart;
use regex::Regex;

use crate::format::reflow;
use crate::http::{HttpClient, USER_AGENT};
use crate::{CaptionManifest, CaptionTrack, CoreError, Result, TimedSegment};

// Element attributes may not end in '/', which keeps self-closing <text/> out
static RE_TEXT_ELEMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<text(\s[^>]*[^/>])?\s*>(.*?)</text>").unwrap());

static RE_INLINE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Segments of the selected track, raw and reflowed
#[derive(Debug, Clone)]
pub struct AssembledTranscript {
    pub language: String,
    pub segments: Vec<TimedSegment>,
    pub formatted_text: String,
}

/// Sorted, de-duplicated language codes offered by the manifest
pub fn list_languages(manifest: &CaptionManifest) -> Vec<String> {
    let mut langs: Vec<String> = manifest.tracks.iter().map(|t| t.language_code.clone()).collect();
    langs.sort();
    langs.dedup();
    langs
}

/// Pick the track matching `lang` exactly, or the site's first track when no hint is given
pub fn select_track<'a>(manifest: &'a CaptionManifest, lang: Option<&str>) -> Result<&'a CaptionTrack> {
    let Some(first) = manifest.tracks.first() else {
        return Err(CoreError::NoTranscriptsAvailable {
            video_id: manifest.video_id.clone(),
        });
    };

    let Some(lang) = lang else {
        return Ok(first);
    };

    manifest
        .tracks
        .iter()
        .find(|t| t.language_code == lang)
        .ok_or_else(|| CoreError::LanguageUnavailable {
            video_id: manifest.video_id.clone(),
            requested: lang.to_string(),
            available: list_languages(manifest),
        })
}

/// Fetch a track's timed-text document
pub async fn fetch_timed_text<C: HttpClient + ?Sized>(client: &C, video_id: &str, track: &CaptionTrack) -> Result<String> {
    debug!("Fetching timed text: lang={} url={}", track.language_code, track.base_url);

    let resp = client
        .get(&track.base_url, &[("User-Agent", USER_AGENT)])
        .await
        .map_err(|e| CoreError::TranscriptFetchFailed {
            video_id: video_id.to_string(),
            status: None,
            reason: e.to_string(),
        })?;

    if !resp.is_success() {
        warn!("Timed text for {video_id} returned {}", resp.status);
        return Err(CoreError::TranscriptFetchFailed {
            video_id: video_id.to_string(),
            status: Some(resp.status),
            reason: format!("HTTP status {}", resp.status),
        });
    }

    Ok(resp.body)
}

/// Every `<text start=".." dur="..">` element in document order.
///
/// Anything around the elements is ignored, so a truncated or otherwise malformed document still
/// yields whatever elements it contains.
pub fn parse_timed_text(body: &str, language: &str) -> Vec<TimedSegment> {
    RE_TEXT_ELEMENT
        .captures_iter(body)
        .map(|caps| {
            let (start, duration) = caps.get(1).map_or((0.0, 0.0), |attrs| parse_timing(attrs.as_str()));
            let inner = caps.get(2).map_or("", |m| m.as_str());
            TimedSegment {
                text: decode_text(inner),
                start,
                duration,
                language: language.to_string(),
            }
        })
        .collect()
}

fn parse_timing(attrs: &str) -> (f64, f64) {
    let element = BytesStart::from_content(attrs, 0);
    let mut start = 0.0;
    let mut duration = 0.0;

    for attr in element.html_attributes().flatten() {
        let value = || {
            String::from_utf8_lossy(&attr.value)
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .unwrap_or(0.0)
        };
        match attr.key.as_ref() {
            b"start" => start = value(),
            b"dur" => duration = value(),
            _ => {}
        }
    }

    (start, duration)
}

// Caption payloads are escaped twice (`&amp;#39;`), so entities are decoded in two passes
fn decode_text(raw: &str) -> String {
    let stripped = RE_INLINE_TAG.replace_all(raw, "");
    let once = html_escape::decode_html_entities(&stripped);
    html_escape::decode_html_entities(&once).into_owned()
}

/// Select a track, fetch its timed text and reflow it into prose
pub async fn assemble<C: HttpClient + ?Sized>(
    client: &C,
    manifest: &CaptionManifest,
    lang: Option<&str>,
) -> Result<AssembledTranscript> {
    let track = select_track(manifest, lang)?;
    debug!("Using caption track: lang={}", track.language_code);

    let body = fetch_timed_text(client, &manifest.video_id, track).await?;
    let segments = parse_timed_text(&body, &track.language_code);

    if segments.is_empty() {
        return Err(CoreError::TranscriptParseFailed {
            video_id: manifest.video_id.clone(),
            reason: "no <text> elements found".to_string(),
        });
    }
    debug!("Parsed {} timed-text segments", segments.len());

    let formatted_text = reflow(&segments);

    Ok(AssembledTranscript {
        language: track.language_code.clone(),
        segments,
        formatted_text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::MockHttp;

    fn track(lang: &str) -> CaptionTrack {
        CaptionTrack {
            language_code: lang.to_string(),
            base_url: format!("https://t/{lang}"),
            name: None,
            is_generated: false,
        }
    }

    fn manifest(langs: &[&str]) -> CaptionManifest {
        CaptionManifest {
            video_id: "dQw4w9WgXcQ".to_string(),
            tracks: langs.iter().map(|l| track(l)).collect(),
        }
    }

    #[test]
    fn test_select_track_default_is_first() {
        let m = manifest(&["es", "en"]);
        assert_eq!(select_track(&m, None).unwrap().language_code, "es");
    }

    #[test]
    fn test_select_track_exact_match() {
        let m = manifest(&["en", "en-GB"]);
        assert_eq!(select_track(&m, Some("en-GB")).unwrap().language_code, "en-GB");
    }

    #[test]
    fn test_select_track_first_duplicate_wins() {
        let mut m = manifest(&["en", "en"]);
        m.tracks[1].base_url = "https://t/second".to_string();
        assert_eq!(select_track(&m, Some("en")).unwrap().base_url, "https://t/en");
    }

    #[test]
    fn test_select_track_is_case_sensitive() {
        let m = manifest(&["en"]);
        assert!(matches!(
            select_track(&m, Some("EN")),
            Err(CoreError::LanguageUnavailable { .. })
        ));
    }

    #[test]
    fn test_select_track_language_unavailable() {
        let m = manifest(&["es", "en"]);
        assert_eq!(
            select_track(&m, Some("fr")),
            Err(CoreError::LanguageUnavailable {
                video_id: "dQw4w9WgXcQ".to_string(),
                requested: "fr".to_string(),
                available: vec!["en".to_string(), "es".to_string()],
            })
        );
    }

    #[test]
    fn test_select_track_empty_manifest() {
        let m = manifest(&[]);
        assert!(matches!(select_track(&m, None), Err(CoreError::NoTranscriptsAvailable { .. })));
        assert!(matches!(
            select_track(&m, Some("en")),
            Err(CoreError::NoTranscriptsAvailable { .. })
        ));
    }

    #[test]
    fn test_list_languages_sorted_unique() {
        let m = manifest(&["pt", "en", "de", "en"]);
        assert_eq!(list_languages(&m), ["de", "en", "pt"]);
    }

    #[test]
    fn test_parse_timed_text_basic() {
        let xml = r#"<?xml version="1.0" encoding="utf-8" ?>
<transcript>
    <text start="0.21" dur="2.34">Hello world</text>
    <text start="2.55" dur="1.50">This is a test</text>
</transcript>"#;

        let segments = parse_timed_text(xml, "en");
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "Hello world");
        assert!((segments[0].start - 0.21).abs() < f64::EPSILON);
        assert!((segments[0].duration - 2.34).abs() < f64::EPSILON);
        assert_eq!(segments[0].language, "en");
        assert_eq!(segments[1].text, "This is a test");
    }

    #[test]
    fn test_parse_timed_text_entities() {
        let xml = r#"<transcript>
    <text start="0.0" dur="1.0">it&amp;#39;s a &amp;quot;test&amp;quot;</text>
    <text start="1.0" dur="1.0">don&#39;t &lt;stop&gt; &amp; go&nbsp;on</text>
    <text start="2.0" dur="1.0">caf&#233; &#x263A;</text>
</transcript>"#;

        let segments = parse_timed_text(xml, "en");
        assert_eq!(segments[0].text, "it's a \"test\"");
        assert_eq!(segments[1].text, "don't <stop> & go\u{a0}on");
        assert_eq!(segments[2].text, "café ☺");
    }

    #[test]
    fn test_parse_timed_text_attribute_defaults() {
        let xml = r#"<text dur="2.5" start="1.5">swapped</text><text>bare</text><text start="abc" dur="">junk</text>"#;
        let segments = parse_timed_text(xml, "en");
        assert_eq!(segments.len(), 3);
        assert_eq!((segments[0].start, segments[0].duration), (1.5, 2.5));
        assert_eq!((segments[1].start, segments[1].duration), (0.0, 0.0));
        assert_eq!((segments[2].start, segments[2].duration), (0.0, 0.0));
    }

    #[test]
    fn test_parse_timed_text_tolerates_malformed_document() {
        let xml = r#"<transcript><bogus <text start="1" dur="1">kept</text><text start="2" dur="1">also kept"#;
        let segments = parse_timed_text(xml, "en");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "kept");
    }

    #[test]
    fn test_parse_timed_text_skips_self_closing_and_strips_inline_tags() {
        let xml = r#"<text start="0" dur="1"/><text start="1" dur="1"><font color="red">loud</font> noise</text>"#;
        let segments = parse_timed_text(xml, "en");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "loud noise");
        assert_eq!(segments[0].start, 1.0);
    }

    #[test]
    fn test_parse_timed_text_empty() {
        let xml = r#"<?xml version="1.0" encoding="utf-8" ?><transcript></transcript>"#;
        assert!(parse_timed_text(xml, "en").is_empty());
    }

    #[tokio::test]
    async fn test_assemble_default_track() {
        let client = MockHttp::new().respond(
            "https://t/en",
            200,
            r#"<transcript><text start="0" dur="1">don&amp;#39;t panic</text><text start="1.2" dur="1">ok</text></transcript>"#,
        );

        let assembled = assemble(&client, &manifest(&["en", "es"]), None).await.unwrap();

        assert_eq!(assembled.language, "en");
        assert_eq!(assembled.segments.len(), 2);
        assert_eq!(assembled.formatted_text, "Don't panic ok.");
        assert_eq!(client.header_for("https://t/en", "User-Agent").as_deref(), Some(USER_AGENT));
    }

    #[tokio::test]
    async fn test_assemble_language_unavailable_skips_fetch() {
        let client = MockHttp::new();
        let err = assemble(&client, &manifest(&["en", "es"]), Some("fr")).await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::LanguageUnavailable);
        assert!(client.requested_urls().is_empty());
    }

    #[tokio::test]
    async fn test_assemble_no_transcripts() {
        let client = MockHttp::new();
        let err = assemble(&client, &manifest(&[]), None).await.unwrap_err();
        assert_eq!(
            err,
            CoreError::NoTranscriptsAvailable {
                video_id: "dQw4w9WgXcQ".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_assemble_fetch_failed() {
        let client = MockHttp::new().respond("https://t/es", 404, "");
        let err = assemble(&client, &manifest(&["en", "es"]), Some("es")).await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::TranscriptFetchFailed {
                status: Some(404),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_assemble_parse_failed() {
        let client = MockHttp::new().respond("https://t/en", 200, "<transcript></transcript>");
        let err = assemble(&client, &manifest(&["en"]), None).await.unwrap_err();
        assert!(matches!(err, CoreError::TranscriptParseFailed { .. }));
    }
}
