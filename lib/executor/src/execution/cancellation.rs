use std::{fmt, future::Future, time::Duration};

use federation_executor_config::execution::CancellationPolicy;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation state of one plan execution: an external token plus an optional deadline.
#[derive(Debug, Clone)]
pub struct ExecutionCancellation {
    pub token: CancellationToken,
    pub deadline: Option<Instant>,
    pub policy: CancellationPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancellationReason {
    Cancelled,
    DeadlineExceeded,
}

impl fmt::Display for CancellationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancellationReason::Cancelled => write!(f, "execution was cancelled"),
            CancellationReason::DeadlineExceeded => write!(f, "execution deadline exceeded"),
        }
    }
}

pub enum Guarded<T> {
    Completed(T),
    Cancelled(CancellationReason),
}

impl Default for ExecutionCancellation {
    fn default() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
            policy: CancellationPolicy::default(),
        }
    }
}

impl ExecutionCancellation {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn cancellation_reason(&self) -> Option<CancellationReason> {
        if self.token.is_cancelled() {
            Some(CancellationReason::Cancelled)
        } else if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            Some(CancellationReason::DeadlineExceeded)
        } else {
            None
        }
    }

    async fn wait(&self) -> CancellationReason {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.token.cancelled() => CancellationReason::Cancelled,
                _ = tokio::time::sleep_until(deadline) => CancellationReason::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                CancellationReason::Cancelled
            }
        }
    }

    /// Runs `call` unless the execution is already cancelled, racing it against cancellation.
    ///
    /// With `run_to_completion`, a call overtaken by cancellation is still awaited.
    /// Its output is dropped.
    pub async fn guard<F>(&self, call: F) -> Guarded<F::Output>
    where
        F: Future,
    {
        if let Some(reason) = self.cancellation_reason() {
            return Guarded::Cancelled(reason);
        }

        tokio::pin!(call);
        tokio::select! {
            biased;
            output = &mut call => Guarded::Completed(output),
            reason = self.wait() => {
                if self.policy == CancellationPolicy::RunToCompletion {
                    let _ = call.await;
                }
                Guarded::Cancelled(reason)
            }
        }
    }
}
