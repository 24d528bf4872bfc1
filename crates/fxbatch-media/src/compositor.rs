//! Transition compositing.
//!
//! Merging does not render anything: it validates the clips and stages an
//! FFmpeg filter graph that chains every clip through an `xfade` transition.
//! The staged graph is consumed by an [`crate::export::Exporter`].

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use fxbatch_models::{ClipSet, Effect};
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Label of the final video stream in a staged filter graph.
pub const OUTPUT_LABEL: &str = "[vout]";

/// Staged composite produced by a merge.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionResult {
    /// Effect the composite renders
    pub effect: Effect,
    /// Input files, in `-i` order
    pub inputs: Vec<PathBuf>,
    /// FFmpeg `-filter_complex` graph
    pub filter_graph: String,
    /// Stream label to map to the output
    pub output_label: String,
    /// Duration of the rendered output
    pub output_duration: Duration,
}

/// Merges a clip set into a transition composite.
#[async_trait]
pub trait TransitionCompositor: Send + Sync {
    async fn merge(
        &self,
        clips: &ClipSet,
        effect: Effect,
        duration: Duration,
    ) -> MediaResult<TransitionResult>;
}

/// FFmpeg `xfade` transition name for an effect.
pub fn xfade_name(effect: Effect) -> &'static str {
    match effect {
        Effect::Fade => "fade",
        Effect::FadeBlack => "fadeblack",
        Effect::FadeWhite => "fadewhite",
        Effect::FadeGrays => "fadegrays",
        Effect::Dissolve => "dissolve",
        Effect::Pixelize => "pixelize",
        Effect::WipeLeft => "wipeleft",
        Effect::WipeRight => "wiperight",
        Effect::WipeUp => "wipeup",
        Effect::WipeDown => "wipedown",
        Effect::SlideLeft => "slideleft",
        Effect::SlideRight => "slideright",
        Effect::SlideUp => "slideup",
        Effect::SlideDown => "slidedown",
        Effect::SmoothLeft => "smoothleft",
        Effect::SmoothRight => "smoothright",
        Effect::CircleOpen => "circleopen",
        Effect::CircleClose => "circleclose",
        Effect::CircleCrop => "circlecrop",
        Effect::RectCrop => "rectcrop",
        Effect::Radial => "radial",
        Effect::Distance => "distance",
        Effect::HorzOpen => "horzopen",
        Effect::VertOpen => "vertopen",
        Effect::ZoomIn => "zoomin",
        Effect::SqueezeH => "squeezeh",
    }
}

/// Compositor that chains clips with FFmpeg's `xfade` filter.
///
/// Every input is normalized to the same frame size, rate and pixel format
/// first, since `xfade` refuses mismatched streams.
#[derive(Debug, Clone)]
pub struct XfadeCompositor {
    width: u32,
    height: u32,
    fps: u32,
}

impl Default for XfadeCompositor {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fps: 30,
        }
    }
}

impl XfadeCompositor {
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self { width, height, fps }
    }

    /// Build the filter graph for already-validated clips.
    fn build_graph(&self, clips: &ClipSet, effect: Effect, duration: Duration) -> String {
        let transition = xfade_name(effect);
        let mut parts = Vec::with_capacity(clips.len() * 2);

        for i in 0..clips.len() {
            parts.push(format!(
                "[{i}:v]scale={w}:{h}:force_original_aspect_ratio=decrease,\
                 pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={fps},format=yuv420p,settb=AVTB[v{i}]",
                i = i,
                w = self.width,
                h = self.height,
                fps = self.fps,
            ));
        }

        let mut previous = "[v0]".to_string();
        let mut elapsed = Duration::ZERO;

        for (k, clip) in clips.iter().enumerate().take(clips.len() - 1) {
            let k = k + 1;
            elapsed += clip.duration;
            // The k-th transition starts `duration` before the end of the
            // timeline built so far, which already lost (k - 1) overlaps.
            let offset = elapsed.saturating_sub(duration * k as u32);

            let label = if k == clips.len() - 1 {
                OUTPUT_LABEL.to_string()
            } else {
                format!("[x{k}]")
            };

            parts.push(format!(
                "{previous}[v{k}]xfade=transition={transition}:duration={:.3}:offset={:.3}{label}",
                duration.as_secs_f64(),
                offset.as_secs_f64(),
            ));
            previous = label;
        }

        parts.join(";")
    }
}

/// Check that a clip set can carry a transition of `duration`.
///
/// The first and last clips must be at least one transition long; inner
/// clips overlap on both sides and need two.
pub fn validate_clips(clips: &ClipSet, duration: Duration) -> MediaResult<()> {
    if clips.len() < 2 {
        return Err(MediaError::invalid_input(format!(
            "A transition needs at least two clips, got {}",
            clips.len()
        )));
    }

    if duration.is_zero() {
        return Err(MediaError::invalid_input("Transition duration must be positive"));
    }

    let last = clips.len() - 1;
    for (i, clip) in clips.iter().enumerate() {
        let required = if i == 0 || i == last { duration } else { duration * 2 };
        if clip.duration < required {
            return Err(MediaError::invalid_input(format!(
                "Clip {} ({}) is {:.3}s, shorter than the required {:.3}s",
                i,
                clip.path.display(),
                clip.duration.as_secs_f64(),
                required.as_secs_f64()
            )));
        }
    }

    Ok(())
}

#[async_trait]
impl TransitionCompositor for XfadeCompositor {
    async fn merge(
        &self,
        clips: &ClipSet,
        effect: Effect,
        duration: Duration,
    ) -> MediaResult<TransitionResult> {
        validate_clips(clips, duration)?;

        for clip in clips.iter() {
            if !tokio::fs::try_exists(&clip.path).await.unwrap_or(false) {
                return Err(MediaError::FileNotFound(clip.path.clone()));
            }
        }

        let filter_graph = self.build_graph(clips, effect, duration);
        let overlaps = duration * (clips.len() as u32 - 1);
        let output_duration = clips.total_duration().saturating_sub(overlaps);

        debug!(
            effect = %effect,
            clips = clips.len(),
            output_secs = output_duration.as_secs_f64(),
            "Staged transition graph"
        );

        Ok(TransitionResult {
            effect,
            inputs: clips.iter().map(|c| c.path.clone()).collect(),
            filter_graph,
            output_label: OUTPUT_LABEL.to_string(),
            output_duration,
        })
    }
}
