//! Transition effect definitions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Available transition effects.
///
/// Each variant names one transition variant a job renders between
/// consecutive clips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    /// Cross-fade
    Fade,
    /// Fade through black
    FadeBlack,
    /// Fade through white
    FadeWhite,
    /// Fade through grayscale
    FadeGrays,
    /// Random pixel dissolve
    Dissolve,
    /// Pixelate out and back in
    Pixelize,
    WipeLeft,
    WipeRight,
    WipeUp,
    WipeDown,
    SlideLeft,
    SlideRight,
    SlideUp,
    SlideDown,
    SmoothLeft,
    SmoothRight,
    CircleOpen,
    CircleClose,
    CircleCrop,
    RectCrop,
    /// Clock-hand sweep
    Radial,
    /// Distance-field blend
    Distance,
    HorzOpen,
    VertOpen,
    ZoomIn,
    SqueezeH,
}

impl Effect {
    /// All available effects, in declaration order.
    pub const ALL: &'static [Effect] = &[
        Effect::Fade,
        Effect::FadeBlack,
        Effect::FadeWhite,
        Effect::FadeGrays,
        Effect::Dissolve,
        Effect::Pixelize,
        Effect::WipeLeft,
        Effect::WipeRight,
        Effect::WipeUp,
        Effect::WipeDown,
        Effect::SlideLeft,
        Effect::SlideRight,
        Effect::SlideUp,
        Effect::SlideDown,
        Effect::SmoothLeft,
        Effect::SmoothRight,
        Effect::CircleOpen,
        Effect::CircleClose,
        Effect::CircleCrop,
        Effect::RectCrop,
        Effect::Radial,
        Effect::Distance,
        Effect::HorzOpen,
        Effect::VertOpen,
        Effect::ZoomIn,
        Effect::SqueezeH,
    ];

    /// Expand a list of effect names, handling the "all" keyword.
    ///
    /// Duplicates are dropped (first occurrence wins) and unknown names
    /// are silently filtered out.
    pub fn expand(names: &[String]) -> Vec<Effect> {
        let mut result = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for name in names {
            let lower = name.trim().to_lowercase();
            if lower == "all" {
                for effect in Self::ALL {
                    if seen.insert(*effect) {
                        result.push(*effect);
                    }
                }
            } else if let Ok(effect) = lower.parse::<Effect>() {
                if seen.insert(effect) {
                    result.push(effect);
                }
            }
        }

        result
    }

    /// Returns the effect name as used in filenames.
    pub fn as_str(&self) -> &'static str {
        match self {
            Effect::Fade => "fade",
            Effect::FadeBlack => "fade_black",
            Effect::FadeWhite => "fade_white",
            Effect::FadeGrays => "fade_grays",
            Effect::Dissolve => "dissolve",
            Effect::Pixelize => "pixelize",
            Effect::WipeLeft => "wipe_left",
            Effect::WipeRight => "wipe_right",
            Effect::WipeUp => "wipe_up",
            Effect::WipeDown => "wipe_down",
            Effect::SlideLeft => "slide_left",
            Effect::SlideRight => "slide_right",
            Effect::SlideUp => "slide_up",
            Effect::SlideDown => "slide_down",
            Effect::SmoothLeft => "smooth_left",
            Effect::SmoothRight => "smooth_right",
            Effect::CircleOpen => "circle_open",
            Effect::CircleClose => "circle_close",
            Effect::CircleCrop => "circle_crop",
            Effect::RectCrop => "rect_crop",
            Effect::Radial => "radial",
            Effect::Distance => "distance",
            Effect::HorzOpen => "horz_open",
            Effect::VertOpen => "vert_open",
            Effect::ZoomIn => "zoom_in",
            Effect::SqueezeH => "squeeze_h",
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Effect {
    type Err = EffectParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        Effect::ALL
            .iter()
            .copied()
            .find(|effect| effect.as_str() == lower)
            .ok_or_else(|| EffectParseError(s.to_string()))
    }
}

#[derive(Debug, Error)]
#[error("Unknown effect: {0}")]
pub struct EffectParseError(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effect_roundtrip_names() {
        for effect in Effect::ALL {
            assert_eq!(effect.as_str().parse::<Effect>().unwrap(), *effect);
        }
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("Wipe_Left".parse::<Effect>().unwrap(), Effect::WipeLeft);
        assert!("angular".parse::<Effect>().is_err());
    }

    #[test]
    fn test_expand_all_keyword() {
        let effects = Effect::expand(&["all".to_string()]);
        assert_eq!(effects, Effect::ALL.to_vec());
    }

    #[test]
    fn test_expand_dedups_and_filters() {
        let effects = Effect::expand(&[
            "fade".to_string(),
            "bogus".to_string(),
            "radial".to_string(),
            "FADE".to_string(),
        ]);
        assert_eq!(effects, vec![Effect::Fade, Effect::Radial]);
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&Effect::CircleOpen).unwrap();
        assert_eq!(json, "\"circle_open\"");
    }
}
