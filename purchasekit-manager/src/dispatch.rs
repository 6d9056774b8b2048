//! Execution context for observer notifications.
//!
//! Foreground calls and the background update listener both notify through
//! the manager's [`Dispatcher`], so every callback lands on the same context:
//!
//! - [`Dispatcher::Inline`] runs callbacks immediately on whichever task
//!   produced them.
//! - [`Dispatcher::queued`] hands callbacks to a [`DispatchQueue`] that the
//!   owning context (a UI loop, a dedicated task) drains.
//!
//! # Example
//!
//! ```ignore
//! let (dispatcher, queue) = Dispatcher::queued();
//! let manager = PurchaseManager::builder(store).dispatcher(dispatcher).build()?;
//!
//! // On the designated context:
//! tokio::spawn(queue.run());
//! ```

use tokio::sync::mpsc;

/// A unit of notification work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Where observer notifications run.
#[derive(Clone, Default)]
pub enum Dispatcher {
    /// Run on the calling task.
    #[default]
    Inline,
    /// Send to a [`DispatchQueue`].
    Queued(mpsc::UnboundedSender<Job>),
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inline => write!(f, "Dispatcher::Inline"),
            Self::Queued(_) => write!(f, "Dispatcher::Queued"),
        }
    }
}

impl Dispatcher {
    /// Create a queued dispatcher and the queue its jobs land on.
    pub fn queued() -> (Self, DispatchQueue) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::Queued(tx), DispatchQueue { rx })
    }

    pub(crate) fn dispatch(&self, job: Job) {
        match self {
            Self::Inline => job(),
            Self::Queued(tx) => {
                if tx.send(job).is_err() {
                    tracing::debug!("dispatch queue closed, notification dropped");
                }
            }
        }
    }
}

/// Receiving end of a queued dispatcher.
pub struct DispatchQueue {
    rx: mpsc::UnboundedReceiver<Job>,
}

impl DispatchQueue {
    /// Run every job queued so far without waiting. Returns how many ran.
    pub fn drain(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            ran += 1;
        }
        ran
    }

    /// Wait for the next job and run it. Returns false once every sender is gone.
    pub async fn run_next(&mut self) -> bool {
        match self.rx.recv().await {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Run jobs until the owning manager and its listener are gone.
    pub async fn run(mut self) {
        while self.run_next().await {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_inline_runs_immediately() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        Dispatcher::Inline.dispatch(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_queued_runs_on_drain() {
        let (dispatcher, mut queue) = Dispatcher::queued();
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let counter = hits.clone();
            dispatcher.dispatch(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(queue.drain(), 3);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_ends_when_senders_drop() {
        let (dispatcher, queue) = Dispatcher::queued();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        dispatcher.dispatch(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        drop(dispatcher);
        queue.run().await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
