use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use flowgate_core::config::FlowsConfig;
use flowgate_core::session::SessionStore;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SweepSettings {
    pub ttl: Duration,
    pub interval: Duration,
}

impl SweepSettings {
    pub fn from_config(config: &FlowsConfig) -> Self {
        Self {
            ttl: Duration::from_secs(config.session_ttl_secs),
            interval: Duration::from_secs(config.sweep_interval_secs),
        }
    }
}

/// Runs until `shutdown` flips to `true` or its sender is dropped.
pub fn spawn(
    sessions: Arc<dyn SessionStore>,
    settings: SweepSettings,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => { sweep_once(sessions.as_ref(), settings.ttl); }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!(event_name = "session.sweeper.stopped", correlation_id = "shutdown", "session sweeper stopped");
    })
}

fn sweep_once(sessions: &dyn SessionStore, ttl: Duration) -> usize {
    let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
    let removed = sessions.sweep_expired(Utc::now(), ttl);
    if removed > 0 {
        info!(
            event_name = "session.sweeper.expired",
            correlation_id = "sweeper",
            removed,
            remaining = sessions.len(),
            "expired flow sessions removed"
        );
    } else {
        debug!(event_name = "session.sweeper.idle", correlation_id = "sweeper", "no expired sessions");
    }
    removed
}
