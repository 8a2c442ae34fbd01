//! TLS listener setup using rustls with the bootstrap certificate.
//!
//! The certificate and private key are generated at startup (see
//! [`crate::certificate`]) and read back from their temporary files here to
//! construct a `rustls::ServerConfig`.

use anyhow::{Context, Result};
use rustls::ServerConfig;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;

use crate::certificate::CertificateBundle;

/// Build a [`rustls::ServerConfig`] from PEM-encoded certificate and private key bytes.
///
/// Uses the ring crypto provider and advertises HTTP/2 and HTTP/1.1 via ALPN.
///
/// # Errors
///
/// Returns an error if the certificate or key cannot be parsed, or if rustls
/// rejects the configuration.
pub fn build_server_config(cert_pem: &[u8], key_pem: &[u8]) -> Result<Arc<ServerConfig>> {
    let certs = rustls_pemfile::certs(&mut std::io::BufReader::new(cert_pem))
        .collect::<Result<Vec<_>, _>>()
        .context("failed to parse TLS certificate chain")?;
    if certs.is_empty() {
        anyhow::bail!("no certificate found in PEM data");
    }

    let key = rustls_pemfile::private_key(&mut std::io::BufReader::new(key_pem))
        .context("failed to read TLS private key")?
        .context("no private key found in PEM data")?;

    let mut config =
        ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .context("ring provider does not support the default protocol versions")?
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .context("failed to build rustls ServerConfig")?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}

/// Build a [`TlsAcceptor`] from the files of `bundle`.
///
/// # Errors
///
/// Returns an error if the files cannot be read or do not form a valid pair.
pub fn acceptor_from_bundle(bundle: &CertificateBundle) -> Result<TlsAcceptor> {
    let (cert_pem, key_pem) = bundle
        .read_pem()
        .context("failed to read certificate material")?;
    let config = build_server_config(&cert_pem, &key_pem)?;
    Ok(TlsAcceptor::from(config))
}
