//! Task handles
//!
//! Page loads behave like promises: once started they run to completion
//! whether or not anyone awaits them. [`Pending`] wraps an executor task so
//! that dropping the handle detaches the task instead of cancelling it.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use smol::Task;

/// Handle to a running page load
#[must_use = "await the handle or call `detach` to let it run in the background"]
pub struct Pending<T> {
    task: Option<Task<T>>,
}

impl<T> Pending<T> {
    pub(crate) fn new(task: Task<T>) -> Self {
        Self { task: Some(task) }
    }

    /// Let the task run to completion without waiting for it
    pub fn detach(mut self) {
        if let Some(task) = self.task.take() {
            task.detach();
        }
    }

    /// Whether the task has already produced its output
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(Task::is_finished)
    }
}

impl<T> Future for Pending<T> {
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let Some(task) = self.task.as_mut() else {
            return Poll::Pending;
        };
        match Pin::new(task).poll(cx) {
            Poll::Ready(output) => {
                self.task = None;
                Poll::Ready(output)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> Drop for Pending<T> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.detach();
        }
    }
}

impl<T> std::fmt::Debug for Pending<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pending")
            .field("finished", &self.is_finished())
            .finish()
    }
}
