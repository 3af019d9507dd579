use std::time::Duration;

use tracing::{info, warn};

use crate::state::AppState;

const PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Background maintenance loop, spawned once at startup. Runs on its own
/// timer and never touches request state; failures are logged and the next
/// tick tries again.
pub fn spawn_maintenance(state: AppState) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PURGE_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match state.sessions.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => info!(purged, "expired sessions purged"),
                Err(e) => warn!(error = %e, "session purge failed"),
            }
        }
    });
}
