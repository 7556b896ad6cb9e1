//! Periodic server check
//!
//! While mutations are pending and the server is unreachable, the engine
//! polls the server on a fixed interval and replays the queue once it
//! answers. [`ServerCheck`] owns that timer: it can be armed and disarmed
//! any number of times, and both operations are idempotent.
//!
//! ## Lifecycle
//!
//! ```text
//! arm() ──→ tick (immediately) ──→ tick (+interval) ──→ ... ──→ disarm() / Break
//!                                                              │
//!                                   shutdown() cancels every armed timer
//! ```

use std::future::Future;
use std::ops::ControlFlow;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Armable, cancellable periodic task
#[derive(Debug)]
pub struct ServerCheck {
    interval: Duration,
    /// Token of the currently armed timer, if any
    armed: Mutex<Option<CancellationToken>>,
    /// Parent of every timer token; cancelled on shutdown
    shutdown: CancellationToken,
}

impl ServerCheck {
    /// Creates a disarmed check that ticks every `interval` once armed
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            armed: Mutex::new(None),
            shutdown: CancellationToken::new(),
        }
    }

    /// Returns the tick interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Starts ticking if not already armed
    ///
    /// `tick` runs once immediately and then every interval until the check
    /// is disarmed, shut down, or `tick` returns [`ControlFlow::Break`].
    /// Ticks never overlap. Returns true if a new timer was started.
    pub fn arm<F, Fut>(&self, tick: F) -> bool
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        if self.shutdown.is_cancelled() {
            return false;
        }

        let mut armed = self.armed.lock().unwrap_or_else(PoisonError::into_inner);
        if armed.as_ref().is_some_and(|token| !token.is_cancelled()) {
            return false;
        }

        let token = self.shutdown.child_token();
        *armed = Some(token.clone());
        drop(armed);

        let interval = self.interval;
        info!(interval_secs = interval.as_secs(), "Periodic server check armed");

        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = timer.tick() => {
                        debug!("Executing periodic server check");
                        if tick().await.is_break() {
                            token.cancel();
                            break;
                        }
                    }
                }
            }

            debug!("Periodic server check stopped");
        });

        true
    }

    /// Stops the timer if armed; a tick in progress runs to completion
    pub fn disarm(&self) {
        let mut armed = self.armed.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = armed.take() {
            if !token.is_cancelled() {
                info!("Periodic server check disarmed");
            }
            token.cancel();
        }
    }

    /// Returns true while a timer is running
    pub fn is_armed(&self) -> bool {
        self.armed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }

    /// Disarms permanently; later calls to [`arm`](Self::arm) do nothing
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.disarm();
    }
}
