//! ffprobe adapter: container and stream metadata for audio and video files.

use crate::Result;
use crate::core::config::ToolConfig;
use crate::tools::runner::ToolRunner;
use crate::types::Metadata;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tokio_util::sync::CancellationToken;

pub const FFPROBE_ARGS: &[&str] = &[
    "-v",
    "quiet",
    "-print_format",
    "json",
    "-show_format",
    "-show_streams",
    "{input}",
];

/// Parsed subset of ffprobe's JSON report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaProbe {
    pub format_name: Option<String>,
    pub format_long_name: Option<String>,
    pub duration_secs: Option<f64>,
    pub bit_rate: Option<u64>,
    pub tags: BTreeMap<String, String>,
    pub video: Option<VideoStream>,
    pub audio: Option<AudioStream>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoStream {
    pub codec: Option<String>,
    pub width: u32,
    pub height: u32,
    pub fps: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioStream {
    pub codec: Option<String>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u32>,
}

impl MediaProbe {
    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    /// Flatten into converter metadata.
    pub fn to_metadata(&self) -> Metadata {
        let mut metadata = Metadata::new();
        if let Some(name) = self.format_long_name.as_ref().or(self.format_name.as_ref()) {
            metadata.insert("container".to_string(), name.clone().into());
        }
        if let Some(duration) = self.duration_secs {
            metadata.insert("duration_secs".to_string(), duration.into());
        }
        if let Some(bit_rate) = self.bit_rate {
            metadata.insert("bit_rate".to_string(), bit_rate.into());
        }
        if let Some(video) = &self.video {
            if let Some(codec) = &video.codec {
                metadata.insert("video_codec".to_string(), codec.clone().into());
            }
            metadata.insert(
                "resolution".to_string(),
                format!("{}x{}", video.width, video.height).into(),
            );
            if let Some(fps) = video.fps {
                metadata.insert("fps".to_string(), ((fps * 100.0).round() / 100.0).into());
            }
        }
        if let Some(audio) = &self.audio {
            if let Some(codec) = &audio.codec {
                metadata.insert("audio_codec".to_string(), codec.clone().into());
            }
            if let Some(sample_rate) = audio.sample_rate {
                metadata.insert("sample_rate".to_string(), sample_rate.into());
            }
            if let Some(channels) = audio.channels {
                metadata.insert("channels".to_string(), channels.into());
            }
        }
        for (key, value) in &self.tags {
            metadata.insert(key.to_ascii_lowercase(), value.clone().into());
        }
        metadata
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    format_name: Option<String>,
    format_long_name: Option<String>,
    duration: Option<String>,
    bit_rate: Option<String>,
    tags: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct FfProbe {
    runner: ToolRunner,
}

impl FfProbe {
    pub fn new(config: ToolConfig) -> Self {
        Self {
            runner: ToolRunner::new("ffprobe", config, FFPROBE_ARGS),
        }
    }

    pub async fn probe(&self, input: &Path, workspace: &Path, cancel: &CancellationToken) -> Result<MediaProbe> {
        let output = self.runner.run(input, workspace, cancel).await?;
        parse_ffprobe_json(&output.stdout).map_err(|e| self.runner.unparseable(e))
    }
}

pub(crate) fn parse_ffprobe_json(stdout: &[u8]) -> std::result::Result<MediaProbe, String> {
    let output: FfprobeOutput = serde_json::from_slice(stdout).map_err(|e| format!("invalid JSON: {}", e))?;

    if output.format.is_none() && output.streams.is_empty() {
        return Err("no format or stream information".to_string());
    }

    let mut probe = MediaProbe::default();
    if let Some(format) = output.format {
        probe.format_name = format.format_name;
        probe.format_long_name = format.format_long_name;
        probe.duration_secs = format.duration.and_then(|d| d.parse().ok());
        probe.bit_rate = format.bit_rate.and_then(|b| b.parse().ok());
        probe.tags = format.tags.unwrap_or_default();
    }

    probe.video = output
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .map(|stream| VideoStream {
            codec: stream.codec_name.clone(),
            width: stream.width.unwrap_or(0),
            height: stream.height.unwrap_or(0),
            fps: stream.r_frame_rate.as_deref().and_then(parse_frame_rate),
        });

    probe.audio = output
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"))
        .map(|stream| AudioStream {
            codec: stream.codec_name.clone(),
            sample_rate: stream.sample_rate.as_deref().and_then(|s| s.parse().ok()),
            channels: stream.channels,
        });

    Ok(probe)
}

/// Parse `"30000/1001"` or `"25"`.
fn parse_frame_rate(rate: &str) -> Option<f64> {
    match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            (den != 0.0).then(|| num / den)
        }
        None => rate.parse().ok(),
    }
}
