//! Source clip handles.

use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// A single source media clip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaClip {
    /// Path to the media file
    pub path: PathBuf,
    /// Playback duration of the clip
    pub duration: Duration,
}

impl MediaClip {
    pub fn new(path: impl Into<PathBuf>, duration: Duration) -> Self {
        Self {
            path: path.into(),
            duration,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Ordered, immutable set of source clips shared by every job in a batch.
///
/// Cloning a `ClipSet` shares the underlying slice; there is no way to
/// mutate it once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipSet(Arc<[MediaClip]>);

impl ClipSet {
    pub fn new(clips: impl Into<Vec<MediaClip>>) -> Self {
        Self(Arc::from(clips.into()))
    }

    /// Sum of all clip durations.
    pub fn total_duration(&self) -> Duration {
        self.0.iter().map(|c| c.duration).sum()
    }

    /// Number of handles sharing this set (including `self`).
    pub fn share_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl Deref for ClipSet {
    type Target = [MediaClip];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<MediaClip>> for ClipSet {
    fn from(clips: Vec<MediaClip>) -> Self {
        Self::new(clips)
    }
}
