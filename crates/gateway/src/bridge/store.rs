//! [`ConfigStore`]: the config text shared between the bridge and request handlers.

use std::sync::Arc;

use arc_swap::ArcSwap;

/// Lock-free holder for the raw configuration text served at `/config.yaml`.
///
/// Backed by [`ArcSwap`]: the bridge task publishes a complete new string and
/// readers load whichever value is current, so a reader never observes a
/// half-written config and never waits on the writer.
#[derive(Clone, Debug)]
pub struct ConfigStore {
    inner: Arc<ArcSwap<String>>,
}

impl ConfigStore {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(initial.into())),
        }
    }

    /// The current config text.
    pub fn current(&self) -> Arc<String> {
        self.inner.load_full()
    }

    /// Atomically replace the config text.
    pub fn publish(&self, text: String) {
        self.inner.store(Arc::new(text));
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(String::new())
    }
}
