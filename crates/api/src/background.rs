use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::state::AppState;

const PRESENCE_SWEEP_EVERY: Duration = Duration::from_secs(60);
const DEFERRED_RELEASE_EVERY: Duration = Duration::from_secs(30);

/// Starts the periodic jobs that keep cached and derived state honest.
pub fn spawn_all(state: &AppState) -> Vec<JoinHandle<()>> {
    let sweep_every = Duration::from_secs(state.settings.cache.sweep_interval_secs.max(1));
    vec![
        state.user_cache.spawn_sweeper(sweep_every),
        spawn_presence_sweep(state.clone()),
        spawn_deferred_release(state.clone()),
    ]
}

/// Users whose last heartbeat fell outside the presence window are flagged
/// offline. Covers processes that died without closing their sockets.
fn spawn_presence_sweep(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PRESENCE_SWEEP_EVERY);
        loop {
            ticker.tick().await;
            let cutoff = chrono::Utc::now() - state.online_window();
            match state
                .users
                .mark_stale_offline(bson::DateTime::from_chrono(cutoff))
                .await
            {
                Ok(0) => {}
                Ok(count) => info!(count, "Marked stale users offline"),
                Err(e) => warn!(%e, "Presence sweep failed"),
            }
        }
    })
}

/// Pushes notifications whose quiet-hours deferral has elapsed.
fn spawn_deferred_release(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(DEFERRED_RELEASE_EVERY);
        loop {
            ticker.tick().await;
            match state.notifier.release_due().await {
                Ok(0) => {}
                Ok(count) => debug!(count, "Released deferred notifications"),
                Err(e) => warn!(%e, "Deferred notification release failed"),
            }
        }
    })
}
