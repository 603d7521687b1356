// Copyright 2020-2022 Farcaster Devs & LNP/BP Standards Association
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use super::task::{panic_message, TaskHandle, TaskOutcome};
use super::tasks::TradeTask;
use super::TaskContext;
use crate::{Error, LogStyle};

/// Hook called when a task is entered, an error fails the task before its body runs
pub trait TaskInterceptor: Send + Sync {
    fn intercept(&self, task: TradeTask, ctx: &TaskContext) -> Result<(), Error>;
}

/// Runs a task sequence in order and stops at the first failure
pub struct TaskRunner {
    ctx: TaskContext,
    timeout: Option<Duration>,
    interceptor: Option<Arc<dyn TaskInterceptor>>,
}

impl TaskRunner {
    pub fn new(ctx: TaskContext) -> Self {
        TaskRunner {
            ctx,
            timeout: None,
            interceptor: None,
        }
    }

    /// Fails a task still waiting on a callback once `timeout` elapsed
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_interceptor(mut self, interceptor: Option<Arc<dyn TaskInterceptor>>) -> Self {
        self.interceptor = interceptor;
        self
    }

    pub async fn run(&self, tasks: &[TradeTask]) -> Result<(), Error> {
        let trade_id = self.ctx.trade_id();
        for &task in tasks {
            debug!(
                "{} | Run task {}",
                trade_id.trade_id(),
                task.bright_blue_bold()
            );
            match self.run_task(task, &trade_id).await {
                TaskOutcome::Completed => {
                    trace!("{} | Task {} completed", trade_id.trade_id(), task);
                    if let Err(err) = self.ctx.request_persistence() {
                        let reason = format!("Persisting trade failed: {}", err);
                        return Err(self.on_fault(&trade_id, task, reason));
                    }
                }
                TaskOutcome::Failed(reason) => return Err(self.on_fault(&trade_id, task, reason)),
            }
        }
        Ok(())
    }

    async fn run_task(&self, task: TradeTask, trade_id: &str) -> TaskOutcome {
        let (handle, mut receiver) = TaskHandle::new(task, trade_id);
        let entered = match &self.interceptor {
            Some(interceptor) => interceptor.intercept(task, &self.ctx),
            None => Ok(()),
        };
        let result = entered.and_then(|_| {
            let body_handle = handle.clone();
            let ctx = &self.ctx;
            match panic::catch_unwind(AssertUnwindSafe(|| task.run(ctx, body_handle))) {
                Ok(result) => result,
                Err(payload) => Err(Error::Protocol(panic_message(payload.as_ref()))),
            }
        });
        if let Err(err) = result {
            handle.failed(err.to_string());
        }

        let outcome = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, &mut receiver).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    handle.failed(format!(
                        "Timeout reached. Protocol did not complete in {} sec.",
                        timeout.as_secs()
                    ));
                    drop(handle);
                    receiver.await
                }
            },
            None => {
                drop(handle);
                receiver.await
            }
        };
        // every handle dropped without a terminal call
        outcome.unwrap_or_else(|_| {
            TaskOutcome::Failed(format!("Task {} ended without completing", task))
        })
    }

    fn on_fault(&self, trade_id: &str, task: TradeTask, reason: String) -> Error {
        error!(
            "{} | Task {} failed: {}",
            trade_id.trade_id(),
            task.red_bold(),
            reason.err_details()
        );
        self.ctx.lock().trade.append_error_message(&reason);
        if let Err(err) = self.ctx.request_persistence() {
            error!(
                "{} | Persisting failed trade: {}",
                trade_id.trade_id(),
                err.err()
            );
        }
        Error::TaskFailed { task, reason }
    }
}
