//! Turns a pending provider task into a terminal outcome.
//!
//! The poller only understands the provider-agnostic [`TaskStatus`]; each
//! adapter maps its own status vocabulary before the poller sees it.

use std::future::Future;
use std::time::Duration;

use genbroker_providers::{AdapterError, TaskHandle, TaskStatus};

/// Terminal result of one polling loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Completed(String),
    Failed(String),
    /// Every one of `attempts` checks reported the task as still pending.
    TimedOut { attempts: u32 },
}

pub struct Poller;

impl Poller {
    /// Sleep `interval`, check, and repeat until the task is terminal or
    /// `max_attempts` checks have been spent.
    ///
    /// Checks are strictly sequential. A failed status check is logged and
    /// counted as a still-pending observation.
    pub async fn await_completion<F, Fut>(
        task: &TaskHandle,
        mut check: F,
        interval: Duration,
        max_attempts: u32,
    ) -> PollOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<TaskStatus, AdapterError>>,
    {
        for attempt in 1..=max_attempts {
            tokio::time::sleep(interval).await;

            match check().await {
                Ok(TaskStatus::Pending) => {
                    tracing::debug!(task_id = %task.id, attempt, max_attempts, "Task still pending");
                }
                Ok(TaskStatus::Succeeded { url }) => {
                    tracing::debug!(task_id = %task.id, attempt, "Task succeeded");
                    return PollOutcome::Completed(url);
                }
                Ok(TaskStatus::Failed { reason }) => {
                    tracing::debug!(task_id = %task.id, attempt, reason = %reason, "Task failed");
                    return PollOutcome::Failed(reason);
                }
                Err(e) => {
                    tracing::warn!(
                        task_id = %task.id,
                        attempt,
                        error = %e,
                        "Status check failed, treating as pending",
                    );
                }
            }
        }

        PollOutcome::TimedOut {
            attempts: max_attempts,
        }
    }
}
