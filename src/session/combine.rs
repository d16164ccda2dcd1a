use crate::provider::types::TranscriptPart;
use regex::Regex;
use std::sync::OnceLock;

/// Combine per-chunk results into one transcript.
///
/// Chunk texts are cleaned and concatenated in order; durations are summed.
/// Speaker labels and timestamps are not reconciled across chunk boundaries,
/// so an utterance spanning two chunks stays split.
pub fn combine_parts(parts: &[TranscriptPart]) -> TranscriptPart {
    let mut full_text = String::new();
    let mut total_duration = 0.0f32;

    for part in parts {
        let cleaned = clean_transcript(&part.text);
        if !cleaned.is_empty() {
            if !full_text.is_empty() {
                full_text.push(' ');
            }
            full_text.push_str(&cleaned);
        }
        total_duration += part.duration_secs;
    }

    TranscriptPart {
        text: full_text,
        duration_secs: total_duration,
    }
}

/// Strip bracketed timestamp artifacts some synchronous responses carry and
/// collapse runs of whitespace.
pub fn clean_transcript(text: &str) -> String {
    static TS_RE: OnceLock<Regex> = OnceLock::new();
    let re = TS_RE.get_or_init(|| {
        Regex::new(r"\[\d{2}:\d{2}.*?\]|\(\d{2}:\d{2}\)").expect("valid timestamp regex")
    });
    let stripped = re.replace_all(text, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}
