//! [`CertificateBundle`]: on-disk PEM files backing the HTTPS listener.

use std::{
    fmt, io,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

/// Paths of the PEM certificate and PKCS#8 private key written at startup.
///
/// Both files are created with owner-only permissions. The bundle is owned by
/// the server lifecycle and removed with [`CertificateBundle::cleanup`] on
/// every exit path.
pub struct CertificateBundle {
    certificate_path: PathBuf,
    private_key_path: PathBuf,
}

impl CertificateBundle {
    pub(super) fn new(certificate_path: PathBuf, private_key_path: PathBuf) -> Self {
        Self {
            certificate_path,
            private_key_path,
        }
    }

    pub fn certificate_path(&self) -> &Path {
        &self.certificate_path
    }

    pub fn private_key_path(&self) -> &Path {
        &self.private_key_path
    }

    /// Read back `(certificate_pem, private_key_pem)`.
    pub fn read_pem(&self) -> io::Result<(Vec<u8>, Vec<u8>)> {
        let cert = std::fs::read(self.certificate_path())?;
        let key = std::fs::read(self.private_key_path())?;
        Ok((cert, key))
    }

    /// Delete both files. Safe to call more than once.
    pub fn cleanup(&self) {
        cleanup_certificate_files(&[&self.certificate_path, &self.private_key_path]);
    }
}

impl fmt::Debug for CertificateBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // File locations stay out of logs and error reports.
        f.write_str("CertificateBundle([REDACTED])")
    }
}

/// Best-effort removal of certificate material.
///
/// A file that is already gone counts as removed. Any other failure is logged
/// at warn level and otherwise ignored so shutdown always runs to completion.
pub fn cleanup_certificate_files<P: AsRef<Path>>(paths: &[P]) {
    for (index, path) in paths.iter().enumerate() {
        match std::fs::remove_file(path.as_ref()) {
            Ok(()) => debug!(file = index, "certificate material removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(file = index, error = %e, "failed to remove certificate material"),
        }
    }
}
