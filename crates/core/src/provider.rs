//! Provider identities and the adapter selection policy.
//!
//! Selection is a pure function of `(mode, nsfw)` read from a fixed table,
//! with a secondary video-style key that overrides the choice for video
//! jobs. The table covers every `(mode, nsfw)` pair, so selection is total.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::job::MediaMode;

// ---------------------------------------------------------------------------
// Provider identity
// ---------------------------------------------------------------------------

/// One external generation backend integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderId {
    /// Hosted text/image-to-image model, usually answers synchronously.
    #[serde(rename = "fal-image")]
    FalImage,
    /// Prediction-API image model without content filtering.
    #[serde(rename = "replicate-image")]
    ReplicateImage,
    /// Task-API image-to-video model.
    #[serde(rename = "kling-video")]
    KlingVideo,
    /// Prediction-API video model (character swap).
    #[serde(rename = "replicate-video")]
    ReplicateVideo,
}

impl ProviderId {
    pub const ALL: [ProviderId; 4] = [
        ProviderId::FalImage,
        ProviderId::ReplicateImage,
        ProviderId::KlingVideo,
        ProviderId::ReplicateVideo,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            ProviderId::FalImage => "fal-image",
            ProviderId::ReplicateImage => "replicate-image",
            ProviderId::KlingVideo => "kling-video",
            ProviderId::ReplicateVideo => "replicate-video",
        }
    }

    /// Media kind the provider produces.
    pub fn mode(self) -> MediaMode {
        match self {
            ProviderId::FalImage | ProviderId::ReplicateImage => MediaMode::Image,
            ProviderId::KlingVideo | ProviderId::ReplicateVideo => MediaMode::Video,
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

// ---------------------------------------------------------------------------
// Video style
// ---------------------------------------------------------------------------

/// Secondary selector among video adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStyle {
    /// Animate the source image.
    Motion,
    /// Re-render the source video with the persona swapped in.
    Swap,
}

pub const VALID_VIDEO_STYLES: &[&str] = &["motion", "swap"];

impl FromStr for VideoStyle {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "motion" => Ok(VideoStyle::Motion),
            "swap" => Ok(VideoStyle::Swap),
            other => Err(CoreError::Validation(format!(
                "Invalid video_style '{other}'. Must be one of: {}",
                VALID_VIDEO_STYLES.join(", ")
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Selection tables
// ---------------------------------------------------------------------------

/// `(mode, nsfw) -> provider`. Must list every pair exactly once.
const SELECTION_TABLE: [(MediaMode, bool, ProviderId); 4] = [
    (MediaMode::Image, false, ProviderId::FalImage),
    (MediaMode::Image, true, ProviderId::ReplicateImage),
    (MediaMode::Video, false, ProviderId::KlingVideo),
    (MediaMode::Video, true, ProviderId::ReplicateVideo),
];

/// Video-style overrides, applied only when the mode is video.
const VIDEO_STYLE_TABLE: [(VideoStyle, ProviderId); 2] = [
    (VideoStyle::Motion, ProviderId::KlingVideo),
    (VideoStyle::Swap, ProviderId::ReplicateVideo),
];

/// Pick the provider adapter for a request.
pub fn select_provider(mode: MediaMode, nsfw: bool, video_style: Option<VideoStyle>) -> ProviderId {
    if mode == MediaMode::Video {
        if let Some(style) = video_style {
            if let Some((_, provider)) = VIDEO_STYLE_TABLE.iter().find(|(s, _)| *s == style) {
                return *provider;
            }
        }
    }

    match SELECTION_TABLE
        .iter()
        .find(|(m, flag, _)| *m == mode && *flag == nsfw)
    {
        Some((_, _, provider)) => *provider,
        // Unreachable while SELECTION_TABLE covers every pair (see tests).
        None => match mode {
            MediaMode::Image => ProviderId::FalImage,
            MediaMode::Video => ProviderId::KlingVideo,
        },
    }
}
