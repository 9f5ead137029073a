//! Id generation port.
//!
//! Production uses UUIDv7: time-ordered with 74 random bits, so ids from
//! concurrent submissions across processes do not collide. Tests inject
//! [`SequentialIdGenerator`] for predictable ids.

use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

use crate::types::{ArtifactId, JobId};

pub trait IdGenerator: Send + Sync {
    fn job_id(&self) -> JobId;

    fn artifact_id(&self) -> ArtifactId;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UuidV7Generator;

impl IdGenerator for UuidV7Generator {
    fn job_id(&self) -> JobId {
        JobId::from_uuid(Uuid::now_v7())
    }

    fn artifact_id(&self) -> ArtifactId {
        ArtifactId::from_uuid(Uuid::now_v7())
    }
}

/// Deterministic ids: `00000000-0000-0000-0000-000000000001`, `...002`, ...
/// Job and artifact ids share one counter.
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    next: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_uuid(&self) -> Uuid {
        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        Uuid::from_u128(u128::from(n))
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn job_id(&self) -> JobId {
        JobId::from_uuid(self.next_uuid())
    }

    fn artifact_id(&self) -> ArtifactId {
        ArtifactId::from_uuid(self.next_uuid())
    }
}
