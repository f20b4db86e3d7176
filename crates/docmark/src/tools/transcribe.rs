//! Speech-to-text adapter.
//!
//! The transcriber is whatever program the deployment configures under
//! `[tools.transcriber]`. It must print JSON on stdout in one of two shapes:
//!
//! - openai-whisper: `{"segments": [{"start": 0.0, "end": 2.5, "text": "..."}]}`
//! - whisper.cpp: `{"transcription": [{"offsets": {"from": 0, "to": 2500}, "text": "..."}]}`
//!
//! A bare `{"text": "..."}` is accepted as a single untimed segment.

use crate::Result;
use crate::core::config::ToolConfig;
use crate::tools::runner::ToolRunner;
use crate::types::TranscriptSegment;
use serde::Deserialize;
use std::path::Path;
use tokio_util::sync::CancellationToken;

pub const TRANSCRIBER_ARGS: &[&str] = &["{input}"];

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TranscriptJson {
    Whisper { segments: Vec<WhisperSegment> },
    WhisperCpp { transcription: Vec<WhisperCppSegment> },
    Plain { text: String },
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    start: f64,
    end: f64,
    text: String,
}

#[derive(Debug, Deserialize)]
struct WhisperCppSegment {
    offsets: WhisperCppOffsets,
    text: String,
}

#[derive(Debug, Deserialize)]
struct WhisperCppOffsets {
    from: u64,
    to: u64,
}

#[derive(Debug, Clone)]
pub struct Transcriber {
    runner: ToolRunner,
}

impl Transcriber {
    pub fn new(config: ToolConfig) -> Self {
        Self {
            runner: ToolRunner::new("transcriber", config, TRANSCRIBER_ARGS),
        }
    }

    /// Transcribe `input` into segments ordered by start time.
    pub async fn transcribe(
        &self,
        input: &Path,
        workspace: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<TranscriptSegment>> {
        let output = self.runner.run(input, workspace, cancel).await?;
        parse_transcript(&output.stdout).map_err(|e| self.runner.unparseable(e))
    }
}

pub(crate) fn parse_transcript(stdout: &[u8]) -> std::result::Result<Vec<TranscriptSegment>, String> {
    let parsed: TranscriptJson =
        serde_json::from_slice(stdout).map_err(|e| format!("unrecognized transcript JSON: {}", e))?;

    let mut segments: Vec<TranscriptSegment> = match parsed {
        TranscriptJson::Whisper { segments } => segments
            .into_iter()
            .map(|s| TranscriptSegment {
                start_secs: s.start,
                end_secs: s.end,
                text: s.text,
            })
            .collect(),
        TranscriptJson::WhisperCpp { transcription } => transcription
            .into_iter()
            .map(|s| TranscriptSegment {
                start_secs: s.offsets.from as f64 / 1000.0,
                end_secs: s.offsets.to as f64 / 1000.0,
                text: s.text,
            })
            .collect(),
        TranscriptJson::Plain { text } => vec![TranscriptSegment {
            start_secs: 0.0,
            end_secs: 0.0,
            text,
        }],
    };

    segments.retain_mut(|segment| {
        segment.text = segment.text.trim().to_string();
        !segment.text.is_empty()
    });
    segments.sort_by(|a, b| a.start_secs.total_cmp(&b.start_secs));
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whisper_segments_sorted() {
        let json = br#"{"text": "ignored", "segments": [
            {"id": 1, "start": 2.5, "end": 4.0, "text": " world"},
            {"id": 0, "start": 0.0, "end": 2.5, "text": " Hello"},
            {"id": 2, "start": 4.0, "end": 5.0, "text": "   "}
        ]}"#;

        let segments = parse_transcript(json).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "Hello");
        assert_eq!(segments[1].start_secs, 2.5);
    }

    #[test]
    fn test_whisper_cpp_offsets() {
        let json = br#"{"transcription": [
            {"timestamps": {"from": "00:00:01,000", "to": "00:00:02,500"}, "offsets": {"from": 1000, "to": 2500}, "text": " Second"},
            {"timestamps": {"from": "00:00:00,000", "to": "00:00:01,000"}, "offsets": {"from": 0, "to": 1000}, "text": " First"}
        ]}"#;

        let segments = parse_transcript(json).unwrap();
        assert_eq!(
            segments,
            vec![
                TranscriptSegment {
                    start_secs: 0.0,
                    end_secs: 1.0,
                    text: "First".to_string()
                },
                TranscriptSegment {
                    start_secs: 1.0,
                    end_secs: 2.5,
                    text: "Second".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_plain_text() {
        let segments = parse_transcript(br#"{"text": "just words"}"#).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "just words");
    }

    #[test]
    fn test_unrecognized_shape() {
        assert!(parse_transcript(br#"{"words": []}"#).is_err());
        assert!(parse_transcript(b"plain text").is_err());
    }
}
