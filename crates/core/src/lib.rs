//! Domain model and policy for the generation broker.
//!
//! Pure types and functions shared by every other crate: job and artifact
//! records, the job status state machine, provider selection, shot-framing
//! normalization, blob naming, and the port traits the pipeline depends on.
//! This crate performs no I/O.

pub mod artifact;
pub mod clock;
pub mod error;
pub mod framing;
pub mod ids;
pub mod job;
pub mod naming;
pub mod ports;
pub mod provider;
pub mod reference;
pub mod request;
pub mod settings;
pub mod types;
