//! Edge-triggered network availability
//!
//! [`ConnectivityMonitor`] holds the last known network state in a
//! `watch` channel and only notifies subscribers when the state flips.
//! Something outside the engine feeds it: the daemon polls an
//! [`INetworkProbe`] through [`watch_probe`], tests call
//! [`set_available`](ConnectivityMonitor::set_available) directly.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use phototag_core::ports::INetworkProbe;

/// A change in network availability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkEvent {
    /// The network came up
    Available,
    /// The network went away
    Lost,
}

/// Last known network state with change notification
#[derive(Debug)]
pub struct ConnectivityMonitor {
    state: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    /// Creates a monitor with the given initial state
    pub fn new(available: bool) -> Self {
        let (state, _) = watch::channel(available);
        Self { state }
    }

    /// Returns the last known state
    pub fn is_available(&self) -> bool {
        *self.state.borrow()
    }

    /// Records the current state, returning the edge if it changed
    pub fn set_available(&self, available: bool) -> Option<NetworkEvent> {
        let changed = self.state.send_if_modified(|current| {
            if *current == available {
                return false;
            }
            *current = available;
            true
        });
        if !changed {
            return None;
        }

        let event = if available {
            NetworkEvent::Available
        } else {
            NetworkEvent::Lost
        };
        info!(event = ?event, "Network availability changed");
        Some(event)
    }

    /// Subscribes to state changes
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }
}

/// Polls `probe` every `interval` and feeds the result into `monitor`
///
/// Runs until `cancel` fires.
pub async fn watch_probe(
    probe: Arc<dyn INetworkProbe + Send + Sync>,
    monitor: Arc<ConnectivityMonitor>,
    interval: Duration,
    cancel: CancellationToken,
) {
    info!(
        interval_ms = interval.as_millis() as u64,
        "Network watcher starting"
    );

    let mut timer = tokio::time::interval(interval);
    timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = timer.tick() => {
                let available = probe.has_network().await;
                if monitor.set_available(available).is_none() {
                    debug!(available, "Network state unchanged");
                }
            }
        }
    }

    info!("Network watcher stopped");
}
