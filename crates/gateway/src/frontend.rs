//! Locating the prebuilt frontend bundle.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::packages::PackageLocator;

/// Bundle location inside the frontend package's share directory.
const INSTALLED_SUBDIR: &str = "frontend/dist";

/// Entry document served for `/` and for every unmatched route.
pub const INDEX_HTML: &str = "index.html";

/// Candidate bundle directories, in probe order: installed first, then development.
pub fn candidates(locator: &dyn PackageLocator, package: &str, dev_dir: &Path) -> Vec<PathBuf> {
    let mut out = Vec::with_capacity(2);
    if let Some(share) = locator.locate(package) {
        out.push(share.join(INSTALLED_SUBDIR));
    }
    out.push(dev_dir.to_path_buf());
    out
}

/// Return the canonical path of the first candidate that is a directory.
pub fn find_frontend_root(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates.iter().find_map(|candidate| {
        let found = candidate.is_dir().then(|| candidate.canonicalize().ok()).flatten();
        debug!(found = found.is_some(), "probed frontend candidate");
        found
    })
}
