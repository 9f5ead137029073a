//! Durably stored output of a successful job.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::job::MediaMode;
use crate::types::{ArtifactId, JobId, Timestamp};

/// Status written on every artifact row; artifacts are created only once
/// the media sits at its durable address.
pub const ARTIFACT_STATUS_READY: &str = "ready";

/// Quality classification consumed by downstream distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactQuality {
    #[default]
    Standard,
    Premium,
}

impl ArtifactQuality {
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactQuality::Standard => "standard",
            ArtifactQuality::Premium => "premium",
        }
    }

    /// Lenient parse: anything that is not `premium` is `standard`.
    pub fn from_name(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("premium") {
            ArtifactQuality::Premium
        } else {
            ArtifactQuality::Standard
        }
    }
}

impl fmt::Display for ArtifactQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `media_generations` row. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Artifact {
    pub id: ArtifactId,
    pub job_id: JobId,
    pub kind: MediaMode,
    pub url: String,
    /// Provider model identifier that produced the media.
    pub model: String,
    pub prompt: String,
    pub settings: serde_json::Value,
    pub quality: ArtifactQuality,
    pub status: String,
    pub created_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_defaults_to_standard() {
        assert_eq!(ArtifactQuality::default(), ArtifactQuality::Standard);
        assert_eq!(ArtifactQuality::from_name("whatever"), ArtifactQuality::Standard);
        assert_eq!(ArtifactQuality::from_name(" Premium "), ArtifactQuality::Premium);
    }
}
