use std::future::Future;
use tokio::task::JoinHandle;
use tokio::time::Duration;

/// Restartable one-shot timer. Each `schedule` cancels the pending job, so a burst of calls
/// inside the window runs only the last one.
///
/// Only the wait is cancellable: once the delay elapses the job runs on its own task and a later
/// `schedule` no longer affects it.
#[derive(Debug)]
pub struct Debouncer {
    name: &'static str,
    delay: Duration,
    pending: Option<JoinHandle<()>>,
    closed: bool,
}

impl Debouncer {
    pub fn new(name: &'static str, delay: Duration) -> Self {
        Self {
            name,
            delay,
            pending: None,
            closed: false,
        }
    }

    pub fn schedule<F>(&mut self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.closed {
            tracing::trace!(debouncer = self.name, "ignoring schedule after close");
            return;
        }
        if self.cancel() {
            tracing::trace!(debouncer = self.name, "restarted pending timer");
        }
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tokio::spawn(job);
        }));
    }

    /// Returns whether a pending job was dropped.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                true
            }
            _ => false,
        }
    }

    /// Cancels the pending job and turns every later `schedule` into a no-op.
    pub fn close(&mut self) {
        self.closed = true;
        self.cancel();
    }

    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
