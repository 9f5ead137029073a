//! Typed view over the opaque per-request settings bag.
//!
//! The bag is stored and forwarded as-is. Only the keys below have meaning
//! to the broker itself; adapters read the model-specific ones they know
//! and ignore the rest.

use serde_json::{Map, Value};

use crate::artifact::ArtifactQuality;
use crate::error::CoreError;
use crate::provider::VideoStyle;

pub const KEY_NSFW: &str = "nsfw";
pub const KEY_NSFW_ALIAS: &str = "enable_nsfw";
pub const KEY_VIDEO_STYLE: &str = "video_style";
pub const KEY_PROMPT: &str = "prompt";
pub const KEY_NEGATIVE_PROMPT: &str = "negative_prompt";
pub const KEY_ASPECT_RATIO: &str = "aspect_ratio";
pub const KEY_RESOLUTION: &str = "resolution";
pub const KEY_DURATION: &str = "duration";
pub const KEY_QUALITY: &str = "quality";
pub const KEY_SHOT_TYPE: &str = "shot_type";

/// Borrowed accessor over a settings value. Non-object values behave like
/// an empty bag.
#[derive(Debug, Clone, Copy)]
pub struct GenerationSettings<'a> {
    map: Option<&'a Map<String, Value>>,
}

impl<'a> GenerationSettings<'a> {
    pub fn new(value: &'a Value) -> Self {
        Self {
            map: value.as_object(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.map.and_then(|m| m.get(key))
    }

    /// Non-empty trimmed string value for `key`.
    pub fn str_value(&self, key: &str) -> Option<&'a str> {
        self.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// NSFW flag. Accepts JSON booleans, `"true"`/`"1"`/`"yes"`, and non-zero
    /// numbers; everything else is `false`.
    pub fn nsfw(&self) -> bool {
        self.get(KEY_NSFW)
            .or_else(|| self.get(KEY_NSFW_ALIAS))
            .map(truthy)
            .unwrap_or(false)
    }

    /// Video style sub-selector. An unknown style name is rejected.
    pub fn video_style(&self) -> Result<Option<VideoStyle>, CoreError> {
        self.str_value(KEY_VIDEO_STYLE)
            .map(str::parse::<VideoStyle>)
            .transpose()
    }

    pub fn prompt(&self) -> Option<&'a str> {
        self.str_value(KEY_PROMPT)
    }

    pub fn negative_prompt(&self) -> Option<&'a str> {
        self.str_value(KEY_NEGATIVE_PROMPT)
    }

    pub fn aspect_ratio(&self) -> Option<&'a str> {
        self.str_value(KEY_ASPECT_RATIO)
    }

    pub fn resolution(&self) -> Option<&'a str> {
        self.str_value(KEY_RESOLUTION)
    }

    /// Clip duration in seconds, from a number or numeric string.
    pub fn duration_secs(&self) -> Option<u32> {
        match self.get(KEY_DURATION)? {
            Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn quality(&self) -> ArtifactQuality {
        self.str_value(KEY_QUALITY)
            .map(ArtifactQuality::from_name)
            .unwrap_or_default()
    }

    pub fn shot_type(&self) -> Option<&'a str> {
        self.str_value(KEY_SHOT_TYPE)
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes" | "on"
        ),
        _ => false,
    }
}
