//! Encoding a staged transition to a file.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::command::{check_ffmpeg, FfmpegCommand, FfmpegRunner};
use crate::compositor::TransitionResult;
use crate::error::MediaResult;

/// Writes one staged composite to a destination file.
#[async_trait]
pub trait Exporter: Send {
    async fn export(self: Box<Self>, destination: &Path) -> MediaResult<()>;
}

/// Builds an exporter around a transition result.
///
/// Construction takes ownership of the result; it may fail before any
/// file is written.
pub trait ExporterFactory: Send + Sync {
    fn create(&self, result: TransitionResult) -> MediaResult<Box<dyn Exporter>>;
}

/// Encoder settings shared by every FFmpeg export.
#[derive(Debug, Clone)]
pub struct EncodeSettings {
    pub codec: String,
    pub crf: u8,
    pub preset: String,
    /// Kill the encoder after this long
    pub timeout: Option<Duration>,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            codec: "libx264".to_string(),
            crf: 20,
            preset: "veryfast".to_string(),
            timeout: None,
        }
    }
}

/// Factory for [`FfmpegExporter`]s.
#[derive(Debug, Clone, Default)]
pub struct FfmpegExporterFactory {
    settings: EncodeSettings,
}

impl FfmpegExporterFactory {
    pub fn new(settings: EncodeSettings) -> Self {
        Self { settings }
    }
}

impl ExporterFactory for FfmpegExporterFactory {
    fn create(&self, result: TransitionResult) -> MediaResult<Box<dyn Exporter>> {
        check_ffmpeg()?;
        Ok(Box::new(FfmpegExporter {
            result,
            settings: self.settings.clone(),
        }))
    }
}

/// Renders a transition graph with the FFmpeg CLI.
#[derive(Debug)]
pub struct FfmpegExporter {
    result: TransitionResult,
    settings: EncodeSettings,
}

impl FfmpegExporter {
    fn command(&self, destination: &Path) -> FfmpegCommand {
        FfmpegCommand::new(&self.result.inputs, destination)
            .filter_complex(self.result.filter_graph.clone())
            .map(self.result.output_label.clone())
            .video_codec(self.settings.codec.clone())
            .crf(self.settings.crf)
            .preset(self.settings.preset.clone())
            .pixel_format("yuv420p")
            .output_arg("-an")
            .output_args(["-movflags", "+faststart"])
    }
}

#[async_trait]
impl Exporter for FfmpegExporter {
    async fn export(self: Box<Self>, destination: &Path) -> MediaResult<()> {
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let cmd = self.command(destination);
        let mut runner = FfmpegRunner::new();
        if let Some(timeout) = self.settings.timeout {
            runner = runner.with_timeout(timeout);
        }

        let effect = self.result.effect;
        let total_ms = self.result.output_duration.as_millis() as i64;

        let result = runner
            .run_with_progress(&cmd, move |progress| {
                debug!(
                    effect = %effect,
                    percent = progress.percentage(total_ms),
                    frame = progress.frame,
                    "Encode progress"
                );
            })
            .await;

        if let Err(e) = result {
            // Best effort; a partial file is useless to everyone.
            let _ = tokio::fs::remove_file(destination).await;
            return Err(e);
        }

        info!(effect = %effect, path = %destination.display(), "Encoded transition");
        Ok(())
    }
}
