//! Background bridge task and the config value it keeps current.
//!
//! # Lifecycle
//!
//! 1. At startup the config text from [`crate::config::Config`] seeds a
//!    [`ConfigStore`] and a [`StaticConfig`] source.
//! 2. [`spawn`] starts a Tokio task that polls the source once per period and
//!    publishes any new value into the store.
//! 3. Poll errors are logged and retried on the next tick; they never reach
//!    request handling.
//! 4. The task exits between ticks once its [`CancellationToken`] fires, so a
//!    publish is never interrupted.

pub mod store;

pub use store::ConfigStore;

use std::time::Duration;

use tokio::{
    task::{self, JoinHandle},
    time,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Producer of config text, polled on the bridge schedule.
#[cfg_attr(test, mockall::automock)]
pub trait ConfigSource: Send {
    /// Called once per tick on the blocking pool, so it may wait on an
    /// external call. `Ok(Some(text))` publishes `text`; `Ok(None)` leaves the
    /// current value in place.
    fn poll(&mut self) -> anyhow::Result<Option<String>>;
}

/// Source that yields the startup config text once and never changes it.
#[derive(Debug)]
pub struct StaticConfig {
    pending: Option<String>,
}

impl StaticConfig {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            pending: Some(text.into()),
        }
    }
}

impl ConfigSource for StaticConfig {
    fn poll(&mut self) -> anyhow::Result<Option<String>> {
        Ok(self.pending.take())
    }
}

/// Spawn the bridge task.
///
/// The first poll happens immediately, then once every `period`.
pub fn spawn<S>(
    mut source: S,
    store: ConfigStore,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()>
where
    S: ConfigSource + 'static,
{
    tokio::spawn(async move {
        info!(period_ms = period.as_millis() as u64, "bridge task started");
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let polled = task::spawn_blocking(move || {
                let result = source.poll();
                (source, result)
            })
            .await;
            let result = match polled {
                Ok((returned, result)) => {
                    source = returned;
                    result
                }
                Err(e) => {
                    error!(error = %e, "bridge poll panicked; bridge task stopping");
                    return;
                }
            };
            match result {
                Ok(Some(text)) => {
                    debug!(bytes = text.len(), "config published");
                    store.publish(text);
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "bridge poll failed; retrying next period"),
            }
        }
        info!("bridge task stopped");
    })
}
