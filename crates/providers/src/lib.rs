//! Provider adapters for the external media-generation APIs.
//!
//! Every adapter hides its provider's wire schema behind
//! [`adapter::ProviderAdapter`]: a submission yields either an immediate
//! artifact URL or a task handle, and a status check yields the
//! provider-agnostic [`adapter::TaskStatus`] tri-state.

pub mod adapter;
pub mod config;
pub mod fal;
pub mod http;
pub mod kling;
pub mod registry;
pub mod replicate;

pub use adapter::{
    AdapterError, AdapterRequest, AdapterResult, PollPolicy, ProviderAdapter, TaskHandle,
    TaskStatus,
};
pub use config::ProviderConfig;
pub use registry::ProviderRegistry;
