use crate::{TimedSegment, Transcript};

/// Gap between segments, in seconds, beyond which a new paragraph starts
pub const PARAGRAPH_PAUSE_SECS: f64 = 0.5;

const PARAGRAPH_BREAK: &str = "\n\n";

fn ends_with_terminal(text: &str) -> bool {
    matches!(text.chars().last(), Some('.' | '?' | '!' | '\n'))
}

fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Reflow timed segments into punctuated prose.
///
/// Segments are joined with a space unless the previous text already ends a sentence, and a pause
/// longer than [`PARAGRAPH_PAUSE_SECS`] starts a new paragraph. The first letter of the transcript
/// and of every paragraph is capitalized, and the result always ends with terminal punctuation.
pub fn reflow(segments: &[TimedSegment]) -> String {
    let mut out = String::new();
    let mut previous: Option<&TimedSegment> = None;

    for segment in segments {
        let text = segment.text.trim();

        if let Some(prev) = previous {
            let pause = segment.start - (prev.start + prev.duration);
            if pause > PARAGRAPH_PAUSE_SECS {
                out.push_str(PARAGRAPH_BREAK);
            } else if !ends_with_terminal(&out) {
                out.push(' ');
            }
        }

        if out.is_empty() || out.ends_with(PARAGRAPH_BREAK) {
            out.push_str(&capitalize_first(text));
        } else {
            out.push_str(text);
        }

        previous = Some(segment);
    }

    if segments.is_empty() {
        return out;
    }

    if !ends_with_terminal(&out) {
        out.push('.');
    }

    out
}

/// Render the reflowed prose, optionally under a short metadata header
pub fn render_text(transcript: &Transcript, with_metadata: bool) -> String {
    if !with_metadata {
        return transcript.formatted_text.clone();
    }

    let meta = &transcript.metadata;
    let mut header = String::new();
    if let Some(title) = &meta.title {
        header.push_str(&format!("# {title}\n"));
    }
    if let Some(channel) = &meta.channel {
        header.push_str(&format!("Channel: {channel}\n"));
    }
    if let Some(published) = &meta.published_at {
        header.push_str(&format!("Published: {published}\n"));
    }
    header.push_str(&format!("Video: https://www.youtube.com/watch?v={}\n", transcript.video_id));
    header.push_str(&format!("Language: {}\n\n", transcript.language));

    header + &transcript.formatted_text
}

/// Render transcript as plain text (one segment per line, no timestamps)
pub fn render_raw(transcript: &Transcript) -> String {
    transcript
        .segments
        .iter()
        .map(|s| s.text.trim())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_json(transcript: &Transcript) -> serde_json::Result<String> {
    serde_json::to_string_pretty(transcript)
}

/// Render transcript as SubRip subtitles
pub fn render_srt(transcript: &Transcript) -> String {
    transcript
        .segments
        .iter()
        .enumerate()
        .map(|(i, s)| {
            format!(
                "{}\n{} --> {}\n{}\n",
                i + 1,
                srt_timestamp(s.start),
                srt_timestamp(s.start + s.duration),
                s.text.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn srt_timestamp(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let mins = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let ms = total_ms % 1000;
    format!("{hours:02}:{mins:02}:{secs:02},{ms:03}")
}
