//! FFmpeg CLI collaborators for transition batches.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with multiple inputs
//! - Progress parsing from `-progress pipe:2`
//! - Clip probing via ffprobe
//! - The transition compositor (merge) and exporter (encode) interfaces,
//!   with `xfade`-based default implementations

pub mod command;
pub mod compositor;
pub mod error;
pub mod export;
pub mod probe;
pub mod progress;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use compositor::{validate_clips, xfade_name, TransitionCompositor, TransitionResult, XfadeCompositor};
pub use error::{MediaError, MediaResult};
pub use export::{EncodeSettings, Exporter, ExporterFactory, FfmpegExporter, FfmpegExporterFactory};
pub use probe::{probe_clip, probe_video, VideoInfo};
pub use progress::FfmpegProgress;
