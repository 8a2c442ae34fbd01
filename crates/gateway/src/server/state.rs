//! Shared application state injected into every Axum handler.

use std::{path::PathBuf, sync::Arc};

use crate::bridge::ConfigStore;
use crate::packages::PackageLocator;

/// Application state shared across all request handlers.
///
/// All fields are cheaply cloneable so that Axum can clone the state for each
/// request without copying expensive data.
#[derive(Clone)]
pub struct AppState {
    /// Live config text, kept current by the bridge task.
    pub config: ConfigStore,
    /// Canonical directory of the frontend bundle. Fixed for the process lifetime.
    pub frontend_root: Arc<PathBuf>,
    /// Lookup for `/models/packages/...` requests.
    pub packages: Arc<dyn PackageLocator>,
}

impl AppState {
    pub fn new(
        config: ConfigStore,
        frontend_root: PathBuf,
        packages: Arc<dyn PackageLocator>,
    ) -> Self {
        Self {
            config,
            frontend_root: Arc::new(frontend_root),
            packages,
        }
    }
}
