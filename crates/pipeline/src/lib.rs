//! Job orchestration: accepting requests, driving providers, polling, and
//! persisting the produced media.

pub mod blob;
pub mod broker;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod memory;
pub mod orchestrator;
pub mod poller;
pub mod queue;
pub mod reconciler;

pub use broker::Broker;
pub use error::{JobFailure, PipelineError, QueueError};
pub use orchestrator::{Orchestrator, OrchestratorDeps, RunOutcome};
pub use poller::{PollOutcome, Poller};
pub use queue::{JobQueue, WorkerPool};
pub use reconciler::{RecoveryReport, Reconciler};
