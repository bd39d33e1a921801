use std::sync::{Arc, Mutex, PoisonError};

use quiz_core::model::{LeaderboardEntry, rank};
use storage::repository::ProfileRepository;
use tokio::task::JoinHandle;

use crate::error::LeaderboardError;

type Callback = Box<dyn FnMut(Vec<LeaderboardEntry>) + Send>;

/// Ranked participation stats, on demand or as a live feed.
#[derive(Clone)]
pub struct LeaderboardService {
    profiles: Arc<dyn ProfileRepository>,
}

impl LeaderboardService {
    #[must_use]
    pub fn new(profiles: Arc<dyn ProfileRepository>) -> Self {
        Self { profiles }
    }

    /// Users with at least one answer, most active first.
    ///
    /// # Errors
    ///
    /// Returns `LeaderboardError::Storage` if profiles cannot be read.
    pub async fn snapshot(&self) -> Result<Vec<LeaderboardEntry>, LeaderboardError> {
        snapshot(self.profiles.as_ref()).await
    }

    /// Deliver the ranking now and again after every change to user counters.
    ///
    /// Bursts of changes may be folded into one delivery; each delivery is a
    /// complete ranking. A failed read is logged and the feed keeps waiting.
    /// The callback must not cancel its own subscription.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn subscribe<F>(&self, on_update: F) -> Subscription
    where
        F: FnMut(Vec<LeaderboardEntry>) + Send + 'static,
    {
        let slot: Arc<Mutex<Option<Callback>>> = Arc::new(Mutex::new(Some(Box::new(on_update))));
        let profiles = Arc::clone(&self.profiles);
        let task_slot = Arc::clone(&slot);

        // Subscribe before the first read so no change can slip in between.
        let mut changes = profiles.watch_profiles();
        let task = tokio::spawn(async move {
            loop {
                changes.borrow_and_update();
                match snapshot(profiles.as_ref()).await {
                    Ok(entries) => {
                        let mut guard = task_slot.lock().unwrap_or_else(PoisonError::into_inner);
                        match guard.as_mut() {
                            Some(callback) => callback(entries),
                            None => break,
                        }
                    }
                    Err(err) => tracing::warn!(error = %err, "leaderboard refresh failed"),
                }
                if changes.changed().await.is_err() {
                    tracing::debug!("users feed closed, ending leaderboard subscription");
                    break;
                }
            }
        });

        Subscription {
            slot,
            task: Some(task),
        }
    }
}

async fn snapshot(
    profiles: &dyn ProfileRepository,
) -> Result<Vec<LeaderboardEntry>, LeaderboardError> {
    let all = profiles.list_profiles().await?;
    Ok(rank(&all))
}

/// Handle to a live leaderboard feed. Dropping it cancels the feed.
pub struct Subscription {
    slot: Arc<Mutex<Option<Callback>>>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Stop deliveries. Once this returns the callback is never invoked
    /// again; a delivery already in progress finishes first.
    pub fn cancel(&mut self) {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}
