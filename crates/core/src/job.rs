//! Job record and its status state machine.
//!
//! A job moves strictly forward: `pending -> processing -> {completed | failed}`.
//! Terminal states never transition again. Every store implementation
//! enforces this through [`JobStatus::can_transition_to`] (memory) or an
//! equivalent conditional `UPDATE` (PostgreSQL).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::artifact::Artifact;
use crate::error::CoreError;
use crate::request::ValidatedRequest;
use crate::types::{ArtifactId, JobId, Timestamp};

// ---------------------------------------------------------------------------
// Media mode
// ---------------------------------------------------------------------------

/// Kind of media a job produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaMode {
    Image,
    Video,
}

/// All accepted mode names, used in validation messages.
pub const VALID_MODES: &[&str] = &["image", "video"];

impl MediaMode {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaMode::Image => "image",
            MediaMode::Video => "video",
        }
    }

    /// Default file extension when neither the provider nor the URL reveal one.
    pub fn default_extension(self) -> &'static str {
        match self {
            MediaMode::Image => "png",
            MediaMode::Video => "mp4",
        }
    }
}

impl FromStr for MediaMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(MediaMode::Image),
            "video" => Ok(MediaMode::Video),
            other => Err(CoreError::Validation(format!(
                "Unsupported mode '{other}'. Must be one of: {}",
                VALID_MODES.join(", ")
            ))),
        }
    }
}

impl fmt::Display for MediaMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Job status
// ---------------------------------------------------------------------------

/// Status ID type matching SMALLINT in the `job_statuses` lookup table.
pub type StatusId = i16;

/// Job lifecycle status. Discriminants match the `job_statuses` seed data.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending = 1,
    Processing = 2,
    Completed = 3,
    Failed = 4,
}

impl JobStatus {
    /// Return the database status ID.
    pub fn id(self) -> StatusId {
        self as StatusId
    }

    pub fn from_id(id: StatusId) -> Option<Self> {
        match id {
            1 => Some(JobStatus::Pending),
            2 => Some(JobStatus::Processing),
            3 => Some(JobStatus::Completed),
            4 => Some(JobStatus::Failed),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether `self -> next` is an edge of the state machine.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }

    /// Statuses from which `self` may be entered.
    pub fn allowed_predecessors(self) -> &'static [JobStatus] {
        match self {
            JobStatus::Pending => &[],
            JobStatus::Processing => &[JobStatus::Pending],
            JobStatus::Completed | JobStatus::Failed => &[JobStatus::Processing],
        }
    }
}

impl FromStr for JobStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(CoreError::Validation(format!("Invalid job status '{other}'"))),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Job record
// ---------------------------------------------------------------------------

/// One generation request's tracked lifecycle record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    pub id: JobId,
    pub persona_id: String,
    pub mode: MediaMode,
    pub platform: String,
    pub source_url: String,
    /// Normalized shot framing; `None` lets the adapter pick a default.
    pub shot_type: Option<String>,
    /// Opaque settings bag passed through to adapters.
    pub settings: serde_json::Value,
    pub status: JobStatus,
    pub error_message: Option<String>,
    /// Backlink to the produced artifact, set together with `completed`.
    pub media_generation_id: Option<ArtifactId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Job {
    /// A freshly accepted job in `pending` status.
    pub fn pending(id: JobId, request: ValidatedRequest, now: Timestamp) -> Self {
        Self {
            id,
            persona_id: request.persona_id,
            mode: request.mode,
            platform: request.platform,
            source_url: request.source_url,
            shot_type: request.shot_type,
            settings: request.settings,
            status: JobStatus::Pending,
            error_message: None,
            media_generation_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A job together with its artifact, as returned by the status lookup.
#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    #[serde(flatten)]
    pub job: Job,
    pub artifact: Option<Artifact>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [JobStatus; 4] = [
        JobStatus::Pending,
        JobStatus::Processing,
        JobStatus::Completed,
        JobStatus::Failed,
    ];

    #[test]
    fn job_status_ids_match_seed_data() {
        assert_eq!(JobStatus::Pending.id(), 1);
        assert_eq!(JobStatus::Processing.id(), 2);
        assert_eq!(JobStatus::Completed.id(), 3);
        assert_eq!(JobStatus::Failed.id(), 4);
        for status in ALL {
            assert_eq!(JobStatus::from_id(status.id()), Some(status));
        }
        assert_eq!(JobStatus::from_id(9), None);
    }

    #[test]
    fn only_forward_edges_are_allowed() {
        let allowed = [
            (JobStatus::Pending, JobStatus::Processing),
            (JobStatus::Processing, JobStatus::Completed),
            (JobStatus::Processing, JobStatus::Failed),
        ];
        for from in ALL {
            for to in ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for to in ALL {
            assert!(!JobStatus::Completed.can_transition_to(to));
            assert!(!JobStatus::Failed.can_transition_to(to));
        }
    }

    #[test]
    fn predecessors_agree_with_transition_table() {
        for to in ALL {
            for from in ALL {
                assert_eq!(
                    to.allowed_predecessors().contains(&from),
                    from.can_transition_to(to)
                );
            }
        }
    }

    #[test]
    fn mode_parsing_is_case_insensitive() {
        assert_eq!("Image".parse::<MediaMode>().unwrap(), MediaMode::Image);
        assert_eq!(" video ".parse::<MediaMode>().unwrap(), MediaMode::Video);
    }

    #[test]
    fn unsupported_mode_is_a_validation_error() {
        let err = "audio".parse::<MediaMode>().unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert!(err.to_string().contains("audio"));
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(JobStatus::Processing).unwrap(),
            serde_json::json!("processing")
        );
    }
}
