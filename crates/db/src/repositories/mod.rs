//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods
//! that accept `&PgPool` as the first argument.

pub mod artifact_repo;
pub mod job_repo;
pub mod reference_repo;

pub use artifact_repo::ArtifactRepo;
pub use job_repo::JobRepo;
pub use reference_repo::ReferenceRepo;
