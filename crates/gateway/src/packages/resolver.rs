//! Resolve package-relative file paths without letting them leave the package.

use std::path::{Component, Path, PathBuf};

use common::ServiceError;
use thiserror::Error;

use super::PackageLocator;

/// Why a package file could not be served.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// The package is not installed.
    #[error("package {0} not found")]
    PackageNotFound(String),

    /// The path stays inside the package but names no regular file.
    #[error("file {file} not found in package {package}")]
    FileNotFound { package: String, file: String },

    /// The path points outside the package root.
    #[error("access denied")]
    AccessDenied,
}

impl From<ResolveError> for ServiceError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::AccessDenied => ServiceError::Forbidden(e.to_string()),
            _ => ServiceError::NotFound(e.to_string()),
        }
    }
}

/// Resolve `relative` inside the root of `package`.
///
/// The containment check runs on the canonical (symlink-expanded) path and
/// compares whole components, so `..` segments, absolute overrides and
/// symlinks pointing out of the package are all rejected with
/// [`ResolveError::AccessDenied`]. Targets that do not exist are checked
/// after lexical normalisation instead.
///
/// Blocks on filesystem metadata calls.
pub fn resolve_package_file(
    locator: &dyn PackageLocator,
    package: &str,
    relative: &str,
) -> Result<PathBuf, ResolveError> {
    let package_not_found = || ResolveError::PackageNotFound(package.to_owned());
    let root = locator.locate(package).ok_or_else(package_not_found)?;
    let root = root.canonicalize().map_err(|_| package_not_found())?;

    let file_not_found = || ResolveError::FileNotFound {
        package: package.to_owned(),
        file: relative.to_owned(),
    };

    let joined = root.join(relative);
    match joined.canonicalize() {
        Ok(canonical) => {
            if !canonical.starts_with(&root) {
                return Err(ResolveError::AccessDenied);
            }
            if !canonical.is_file() {
                return Err(file_not_found());
            }
            Ok(canonical)
        }
        Err(_) if normalize_lexically(&joined).starts_with(&root) => Err(file_not_found()),
        Err(_) => Err(ResolveError::AccessDenied),
    }
}

/// Collapse `.` and `..` without touching the filesystem.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
