//! Installed package lookup and sandboxed file resolution.
//!
//! Packages are located through the ament resource index: a package `foo` is
//! installed under prefix `P` when the marker
//! `P/share/ament_index/resource_index/packages/foo` exists, and its files
//! live in `P/share/foo`. Prefixes come from `AMENT_PREFIX_PATH` and are
//! searched in order.

pub mod resolver;

pub use resolver::resolve_package_file;

use std::path::{Path, PathBuf};

use crate::config::Config;

/// Maps a package name to its root (share) directory.
pub trait PackageLocator: Send + Sync {
    /// Root directory of `package`, or `None` if it is not installed.
    fn locate(&self, package: &str) -> Option<PathBuf>;
}

/// [`PackageLocator`] backed by the ament resource index.
#[derive(Debug, Clone, Default)]
pub struct AmentIndex {
    prefixes: Vec<PathBuf>,
}

impl AmentIndex {
    pub fn new(prefixes: Vec<PathBuf>) -> Self {
        Self { prefixes }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.ament_prefixes())
    }
}

impl PackageLocator for AmentIndex {
    fn locate(&self, package: &str) -> Option<PathBuf> {
        if !is_valid_package_name(package) {
            return None;
        }
        self.prefixes
            .iter()
            .find(|prefix| marker_path(prefix, package).exists())
            .map(|prefix| prefix.join("share").join(package))
    }
}

fn marker_path(prefix: &Path, package: &str) -> PathBuf {
    prefix
        .join("share/ament_index/resource_index/packages")
        .join(package)
}

/// A package name is a single plain path component.
fn is_valid_package_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}
