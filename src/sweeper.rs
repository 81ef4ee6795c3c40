use std::sync::Arc;
use std::time::Instant;
use tokio::time::{Duration, interval};
use tracing::{debug, info};

use crate::state::AppState;

// Background sweep - drops expired quota windows and idle sessions
pub async fn sweeper(state: Arc<AppState>, every: Duration) {
    let mut interval = interval(every);

    info!("Sweeper started (interval: {:?})", every);

    loop {
        interval.tick().await;

        let (windows, sessions) = state.sweep(Instant::now());
        if windows > 0 || sessions > 0 {
            debug!(windows, sessions, "swept expired state");
        }
    }
}
