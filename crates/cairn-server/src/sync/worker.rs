//! Background sync worker.
//!
//! A single task drains an unbounded channel of [`SyncAction`]s and applies
//! them in submission order, running each blocking store call on the blocking
//! pool. Connection tasks only ever `send`, so a slow store adds no latency
//! to gameplay.

use cairn_core::{Environment, SyncAction};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

use super::StateSynchronizer;
use crate::storage::Storage;

/// Messages accepted by the worker.
#[derive(Debug)]
enum SyncCommand {
    /// Apply one action
    Apply(SyncAction),
    /// Signal once everything queued before this is applied
    Flush(oneshot::Sender<()>),
}

/// Sending side of the sync worker.
///
/// Cheap to clone. A disabled handle (no store configured) drops everything.
#[derive(Debug, Clone, Default)]
pub struct SyncHandle {
    tx: Option<mpsc::UnboundedSender<SyncCommand>>,
}

impl SyncHandle {
    /// Handle that discards all actions.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Whether actions reach a store.
    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Queue an action. Never blocks.
    pub fn submit(&self, action: SyncAction) {
        let Some(tx) = &self.tx else {
            return;
        };

        if let Err(mpsc::error::SendError(SyncCommand::Apply(action))) =
            tx.send(SyncCommand::Apply(action))
        {
            tracing::warn!(
                character_id = %action.character_id(),
                "sync worker stopped, dropping action"
            );
        }
    }

    /// Queue several actions in order.
    pub fn submit_all(&self, actions: impl IntoIterator<Item = SyncAction>) {
        for action in actions {
            self.submit(action);
        }
    }

    /// Wait until every action queued before this call has been applied.
    ///
    /// Returns immediately for a disabled handle or a stopped worker.
    pub async fn flush(&self) {
        let Some(tx) = &self.tx else {
            return;
        };

        let (done, wait) = oneshot::channel();
        if tx.send(SyncCommand::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }
}

/// Spawn the worker on the current runtime.
///
/// The worker exits once every [`SyncHandle`] clone is dropped and the queue
/// is drained.
pub fn spawn<S: Storage, E: Environment>(
    sync: StateSynchronizer<S, E>,
) -> (SyncHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run(sync, rx));
    (SyncHandle { tx: Some(tx) }, task)
}

async fn run<S: Storage, E: Environment>(
    sync: StateSynchronizer<S, E>,
    mut rx: mpsc::UnboundedReceiver<SyncCommand>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            SyncCommand::Apply(action) => {
                tracing::trace!(?action, "applying sync action");
                let sync = sync.clone();
                let character_id = action.character_id().to_string();

                match tokio::task::spawn_blocking(move || sync.apply(&action)).await {
                    Ok(Ok(())) => {},
                    Ok(Err(err)) => {
                        tracing::warn!(%character_id, error = %err, "state sync failed");
                    },
                    Err(err) => {
                        tracing::error!(%character_id, error = %err, "state sync task failed");
                    },
                }
            },
            SyncCommand::Flush(done) => {
                let _ = done.send(());
            },
        }
    }

    tracing::debug!("sync worker stopped");
}
