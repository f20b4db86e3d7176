//! Audio and video converter.
//!
//! Container and stream details come from ffprobe. When a transcriber is configured and
//! the file has an audio stream, the transcript follows under a `Transcript` heading, one
//! timestamped paragraph per segment.

use crate::Result;
use crate::core::context::ConversionContext;
use crate::core::formats;
use crate::plugins::{Capability, Converter, ConverterDescriptor, FormatMatcher, Plugin};
use crate::tools::MediaProbe;
use crate::types::{Block, InputDocument, Intermediate, TranscriptSegment};
use async_trait::async_trait;
use std::sync::Arc;

pub const MEDIA_PRIORITY: i32 = 60;

pub struct MediaConverter;

impl MediaConverter {
    pub fn new() -> Self {
        Self
    }

    /// `transcribe` adds the transcription capability to the descriptor.
    pub fn descriptor(transcribe: bool) -> ConverterDescriptor {
        let formats = formats::AUDIO_FORMATS.iter().chain(formats::VIDEO_FORMATS).copied();
        let descriptor = ConverterDescriptor::new(Arc::new(Self::new()), FormatMatcher::formats(formats))
            .with_priority(MEDIA_PRIORITY)
            .with_capability(Capability::ExternalTool);
        if transcribe {
            descriptor.with_capability(Capability::Transcription)
        } else {
            descriptor
        }
    }
}

impl Default for MediaConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for MediaConverter {
    fn name(&self) -> &str {
        "media"
    }

    fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    fn description(&self) -> &str {
        "Describes audio and video files and transcribes their speech"
    }
}

#[async_trait]
impl Converter for MediaConverter {
    async fn convert(&self, document: &InputDocument, context: &ConversionContext) -> Result<Intermediate> {
        let path = context.materialize(document).await?;
        let probe = context
            .tools()
            .ffprobe
            .probe(&path, context.workspace(), context.cancellation())
            .await?;

        let mut output = Intermediate::new();
        output.metadata = probe.to_metadata();
        output.title = probe.tags.get("title").cloned();
        if let Some(summary) = summarize(&probe) {
            output.push(Block::paragraph(summary));
        }

        if let Some(transcriber) = &context.tools().transcriber
            && probe.has_audio()
        {
            match transcriber
                .transcribe(&path, context.workspace(), context.cancellation())
                .await
            {
                Ok(segments) if !segments.is_empty() => {
                    output.insert_metadata("transcript_segments", segments.len());
                    output.push(Block::heading(2, "Transcript"));
                    for segment in &segments {
                        output.push(Block::paragraph(format_segment(segment)));
                    }
                }
                Ok(_) => output.warn("Transcriber returned no speech"),
                Err(e) => output.warn(format!("Transcription unavailable: {}", e)),
            }
        }

        Ok(output)
    }
}

/// One line such as `Video (QuickTime / MOV), 1920x1080, 00:12.`
fn summarize(probe: &MediaProbe) -> Option<String> {
    let kind = if probe.video.is_some() {
        "Video"
    } else if probe.audio.is_some() {
        "Audio"
    } else {
        return None;
    };

    let mut parts = vec![match probe.format_long_name.as_ref().or(probe.format_name.as_ref()) {
        Some(container) => format!("{} ({})", kind, container),
        None => kind.to_string(),
    }];
    if let Some(video) = &probe.video {
        parts.push(format!("{}x{}", video.width, video.height));
    }
    if let Some(duration) = probe.duration_secs {
        parts.push(timestamp(duration));
    }
    Some(format!("{}.", parts.join(", ")))
}

fn format_segment(segment: &TranscriptSegment) -> String {
    format!("[{}] {}", timestamp(segment.start_secs), segment.text)
}

/// `mm:ss`, or `h:mm:ss` past the hour.
fn timestamp(secs: f64) -> String {
    let total = secs.max(0.0).floor() as u64;
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}
