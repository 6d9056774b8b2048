//! Background consumer of the provider's live update feed.
//!
//! The listener is a two-state machine, `Stopped` and `Listening`. Starting
//! spawns one task that opens the feed and processes events in delivery
//! order; stopping signals the task, aborts it and closes the gate on its
//! pending notifications.
//!
//! # Lifecycle
//!
//! ```text
//! Stopped --start()--> Listening --stop() / drop--> Stopped
//!                          |
//!                          +--feed ends or fails to open--> (task finished)
//! ```
//!
//! A finished task counts as stopped: `is_listening()` reports false and the
//! next `start()` opens a fresh feed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;

use purchasekit_lib::{PurchaseKitError, Result};

use crate::observer::Notification;
use crate::reconcile::Reconciler;

/// Owner of the listener task.
pub(crate) struct UpdateListener {
    state: Mutex<ListenerState>,
}

enum ListenerState {
    Stopped,
    Listening(Session),
}

struct Session {
    cancel: oneshot::Sender<()>,
    stopped: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl UpdateListener {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(ListenerState::Stopped),
        }
    }

    /// Start listening. Returns `Ok(false)` if a listener is already running.
    ///
    /// Spawns on `runtime` when given, otherwise on the ambient runtime.
    pub(crate) fn start(&self, core: &Arc<Reconciler>, runtime: Option<&Handle>) -> Result<bool> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let ListenerState::Listening(session) = &*state {
            if !session.task.is_finished() {
                tracing::debug!("update listener already running");
                return Ok(false);
            }
        }

        let handle = match runtime {
            Some(handle) => handle.clone(),
            None => Handle::try_current()
                .map_err(|e| PurchaseKitError::ListenerUnavailable(e.to_string()))?,
        };

        let (cancel, cancelled) = oneshot::channel();
        let stopped = Arc::new(AtomicBool::new(false));
        let task = handle.spawn(run(Arc::clone(core), cancelled, Arc::clone(&stopped)));

        *state = ListenerState::Listening(Session {
            cancel,
            stopped,
            task,
        });
        tracing::info!("update listener started");
        Ok(true)
    }

    /// Stop listening. Returns false if the listener was not running.
    ///
    /// Once this returns, the listener emits no further notifications. A
    /// callback already executing on another thread runs to completion.
    pub(crate) fn stop(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let ListenerState::Listening(session) = std::mem::replace(&mut *state, ListenerState::Stopped)
        else {
            return false;
        };

        session.stopped.store(true, Ordering::SeqCst);
        let _ = session.cancel.send(());
        session.task.abort();
        tracing::info!("update listener stopped");
        true
    }

    pub(crate) fn is_listening(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match &*state {
            ListenerState::Listening(session) => !session.task.is_finished(),
            ListenerState::Stopped => false,
        }
    }
}

impl Drop for UpdateListener {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run(core: Arc<Reconciler>, mut cancelled: oneshot::Receiver<()>, stopped: Arc<AtomicBool>) {
    let opened = tokio::select! {
        biased;
        _ = &mut cancelled => return,
        opened = core.call("live_updates", core.provider().live_updates()) => opened,
    };

    let mut updates = match opened {
        Ok(updates) => updates,
        Err(err) => {
            tracing::warn!(error = %err, "could not open live update feed");
            core.notify_unless_stopped(Notification::PurchaseFailed(err), &stopped);
            return;
        }
    };
    tracing::debug!("live update feed open");

    loop {
        tokio::select! {
            biased;
            _ = &mut cancelled => {
                tracing::debug!("update listener cancelled");
                return;
            }
            next = updates.next() => match next {
                Some(envelope) => core.handle_update(envelope, &stopped).await,
                None => {
                    tracing::warn!("live update feed ended");
                    core.notify_unless_stopped(
                        Notification::PurchaseFailed(PurchaseKitError::ListenerUnavailable(
                            "live update feed ended".into(),
                        )),
                        &stopped,
                    );
                    return;
                }
            }
        }
    }
}
