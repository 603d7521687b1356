// Copyright 2020-2022 Farcaster Devs & LNP/BP Standards Association
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Completion handle of a running task.
//!
//! A task finishes either synchronously in its body or later from a collaborator callback. Both
//! share one [`TaskHandle`]; the first terminal call claims it and every later call is a no-op.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use super::tasks::TradeTask;
use crate::{Error, LogStyle};

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
#[display(Debug)]
#[repr(u8)]
pub enum TaskState {
    Pending = 0,
    /// Claimed, the winning call is applying its trade mutation
    Settling = 1,
    Completed = 2,
    Failed = 3,
}

impl From<u8> for TaskState {
    fn from(value: u8) -> Self {
        match value {
            0 => TaskState::Pending,
            1 => TaskState::Settling,
            2 => TaskState::Completed,
            _ => TaskState::Failed,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    Failed(String),
}

struct Inner {
    task: TradeTask,
    trade_id: String,
    state: AtomicU8,
    sender: Mutex<Option<oneshot::Sender<TaskOutcome>>>,
}

#[derive(Clone)]
pub struct TaskHandle {
    inner: Arc<Inner>,
}

impl TaskHandle {
    /// Creates the handle of one task run, the receiver yields its outcome
    pub fn new(task: TradeTask, trade_id: &str) -> (Self, oneshot::Receiver<TaskOutcome>) {
        let (sender, receiver) = oneshot::channel();
        let handle = TaskHandle {
            inner: Arc::new(Inner {
                task,
                trade_id: trade_id.to_string(),
                state: AtomicU8::new(TaskState::Pending as u8),
                sender: Mutex::new(Some(sender)),
            }),
        };
        (handle, receiver)
    }

    pub fn task(&self) -> TradeTask {
        self.inner.task
    }

    pub fn state(&self) -> TaskState {
        self.inner.state.load(Ordering::Acquire).into()
    }

    pub fn is_completed(&self) -> bool {
        self.state() == TaskState::Completed
    }

    pub fn complete(&self) -> bool {
        self.complete_with(|| Ok(()))
    }

    pub fn failed(&self, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        self.failed_with(reason, || Ok(()))
    }

    /// Claims the handle, applies `mutation` and reports success. An error or a panic in
    /// `mutation` fails the task instead. Returns false if the task was already settled.
    pub fn complete_with<F>(&self, mutation: F) -> bool
    where
        F: FnOnce() -> Result<(), Error>,
    {
        self.settle_with("complete", || match guarded(mutation) {
            Ok(()) => TaskOutcome::Completed,
            Err(reason) => TaskOutcome::Failed(reason),
        })
    }

    /// Claims the handle, applies `mutation` recording the fault, and reports the failure
    pub fn failed_with<F>(&self, reason: String, mutation: F) -> bool
    where
        F: FnOnce() -> Result<(), Error>,
    {
        self.settle_with("fail", || match guarded(mutation) {
            Ok(()) => TaskOutcome::Failed(reason),
            Err(err) => TaskOutcome::Failed(format!("{}\n{}", reason, err)),
        })
    }

    fn settle_with<F>(&self, action: &str, settle: F) -> bool
    where
        F: FnOnce() -> TaskOutcome,
    {
        let claimed = self
            .inner
            .state
            .compare_exchange(
                TaskState::Pending as u8,
                TaskState::Settling as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if !claimed {
            debug!(
                "{} | Task {} already {}, ignoring late {}",
                self.inner.trade_id.trade_id(),
                self.inner.task,
                self.state(),
                action
            );
            return false;
        }
        let outcome = settle();
        let terminal = match outcome {
            TaskOutcome::Completed => TaskState::Completed,
            TaskOutcome::Failed(_) => TaskState::Failed,
        };
        self.inner.state.store(terminal as u8, Ordering::Release);
        let sender = self
            .inner
            .sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(sender) = sender {
            // the runner may have stopped listening
            let _ = sender.send(outcome);
        }
        true
    }
}

fn guarded<F>(mutation: F) -> Result<(), String>
where
    F: FnOnce() -> Result<(), Error>,
{
    match panic::catch_unwind(AssertUnwindSafe(mutation)) {
        Ok(result) => result.map_err(|err| err.to_string()),
        Err(payload) => Err(panic_message(payload.as_ref())),
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}
