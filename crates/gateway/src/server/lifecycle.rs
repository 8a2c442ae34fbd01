//! Server lifecycle: startup, the HTTPS accept loop, and shutdown.
//!
//! ```text
//! Initializing ──► CertReady ──► Listening ──► Draining ──► Stopped
//!       │              │
//!       └──────────────┴──► FailedFatal
//! ```
//!
//! Once the certificate exists it is removed on every path out of [`run`],
//! whether startup fails later or the server drains normally.

use std::{
    future::Future,
    io,
    net::SocketAddr,
    path::{Path, PathBuf},
    pin::pin,
    sync::Arc,
    time::Duration,
};

use anyhow::Context;
use axum::Router;
use hyper::{body::Incoming, Request};
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto,
};
use thiserror::Error;
use tokio::{net::TcpListener, time};
use tokio_rustls::TlsAcceptor;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tower::Service;
use tracing::{debug, error, info, warn};

use super::{middleware::TLS_HANDSHAKE_TIMEOUT, router, state::AppState, tls};
use crate::bridge::{self, ConfigStore, StaticConfig};
use crate::certificate::{self, CertificateBundle, CertificateError};
use crate::config::Config;
use crate::frontend;
use crate::packages::{AmentIndex, PackageLocator};

/// Pause after a failed `accept` so a persistent error does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Lifecycle phases, in the order a clean run passes through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    CertReady,
    Listening,
    Draining,
    Stopped,
    FailedFatal,
}

impl Phase {
    /// Whether `self → next` is a legal transition.
    pub fn can_advance_to(self, next: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, next),
            (Initializing, CertReady)
                | (Initializing, FailedFatal)
                | (CertReady, Listening)
                | (CertReady, FailedFatal)
                | (Listening, Draining)
                | (Draining, Stopped)
        )
    }
}

/// Fatal startup failures. The process exits non-zero on any of these.
#[derive(Debug, Error)]
pub enum StartupError {
    /// No candidate frontend directory exists.
    #[error("frontend bundle not found; build the frontend or install the package ({checked} locations checked)")]
    FrontendMissing { checked: usize },

    /// The self-signed certificate could not be produced.
    #[error(transparent)]
    Certificate(#[from] CertificateError),

    /// The TLS context could not be built from the certificate.
    #[error("TLS setup failed: {0:#}")]
    Tls(anyhow::Error),

    /// The listening socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
}

/// Tracks the current [`Phase`] and logs each transition.
#[derive(Debug)]
struct Lifecycle {
    phase: Phase,
}

impl Lifecycle {
    fn new() -> Self {
        Self {
            phase: Phase::Initializing,
        }
    }

    fn advance(&mut self, next: Phase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "illegal lifecycle transition {:?} -> {next:?}",
            self.phase
        );
        info!(from = ?self.phase, to = ?next, "lifecycle transition");
        self.phase = next;
    }

    fn fail(&mut self, err: StartupError) -> StartupError {
        error!(error = %err, "fatal startup failure");
        self.advance(Phase::FailedFatal);
        err
    }
}

/// Run the gateway until `shutdown` resolves.
///
/// # Errors
///
/// Returns [`StartupError`] if the server never reached `Listening`. Once
/// listening, serving errors are logged per connection and `run` returns
/// `Ok(())` after draining.
pub async fn run<F>(cfg: Config, shutdown: F) -> Result<(), StartupError>
where
    F: Future<Output = ()> + Send,
{
    let mut lifecycle = Lifecycle::new();

    let packages: Arc<dyn PackageLocator> = Arc::new(AmentIndex::from_config(&cfg));
    let candidates = frontend::candidates(
        packages.as_ref(),
        &cfg.frontend_package,
        Path::new(&cfg.frontend_dev_dir),
    );
    let Some(frontend_root) = frontend::find_frontend_root(&candidates) else {
        return Err(lifecycle.fail(StartupError::FrontendMissing {
            checked: candidates.len(),
        }));
    };
    info!(frontend_root = %frontend_root.display(), "frontend bundle located");

    let bundle = match certificate::generate_server_certificate(&cfg.certificate_dir()) {
        Ok(bundle) => bundle,
        Err(e) => return Err(lifecycle.fail(e.into())),
    };
    lifecycle.advance(Phase::CertReady);

    let result = listen_and_serve(&cfg, &bundle, frontend_root, packages, &mut lifecycle, shutdown).await;

    bundle.cleanup();
    match result {
        Ok(()) => {
            lifecycle.advance(Phase::Stopped);
            Ok(())
        }
        Err(e) => Err(lifecycle.fail(e)),
    }
}

async fn listen_and_serve<F>(
    cfg: &Config,
    bundle: &CertificateBundle,
    frontend_root: PathBuf,
    packages: Arc<dyn PackageLocator>,
    lifecycle: &mut Lifecycle,
    shutdown: F,
) -> Result<(), StartupError>
where
    F: Future<Output = ()> + Send,
{
    let acceptor = tls::acceptor_from_bundle(bundle).map_err(StartupError::Tls)?;

    let addr = format!("{}:{}", cfg.host, cfg.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| StartupError::Bind {
            addr: addr.clone(),
            source,
        })?;

    let store = ConfigStore::new(cfg.config.clone());
    let stop = CancellationToken::new();
    let bridge_task = bridge::spawn(
        StaticConfig::new(cfg.config.clone()),
        store.clone(),
        cfg.bridge_poll_interval(),
        stop.child_token(),
    );

    let app = router::build(AppState::new(store, frontend_root, packages));
    lifecycle.advance(Phase::Listening);
    match listener.local_addr() {
        Ok(local) => info!(addr = %local, "listening"),
        Err(_) => info!(addr = %addr, "listening"),
    }

    serve(listener, acceptor, app, stop.clone(), cfg.shutdown_grace(), shutdown).await;
    lifecycle.advance(Phase::Draining);

    stop.cancel();
    if let Err(e) = bridge_task.await {
        warn!(error = %e, "bridge task ended abnormally");
    }
    Ok(())
}

/// Accept TLS connections on `listener` until `shutdown` resolves, then stop
/// accepting, ask open connections to finish, and wait up to `grace` for them.
///
/// Each connection runs on its own task, so slow clients never block others.
pub async fn serve<F>(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    app: Router,
    stop: CancellationToken,
    grace: Duration,
    shutdown: F,
) where
    F: Future<Output = ()> + Send,
{
    let tracker = TaskTracker::new();
    let mut shutdown = pin!(shutdown);

    loop {
        let (stream, peer) = tokio::select! {
            _ = &mut shutdown => break,
            _ = stop.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            },
        };

        let acceptor = acceptor.clone();
        let app = app.clone();
        let stop = stop.clone();
        tracker.spawn(async move {
            if let Err(e) = serve_connection(stream, peer, acceptor, app, stop).await {
                debug!(%peer, error = %e, "connection closed with error");
            }
        });
    }

    drop(listener);
    info!(open = tracker.len(), "shutdown requested; draining connections");
    stop.cancel();
    tracker.close();
    if time::timeout(grace, tracker.wait()).await.is_err() {
        warn!(open = tracker.len(), "grace period elapsed with connections still open");
    }
}

async fn serve_connection(
    stream: tokio::net::TcpStream,
    peer: SocketAddr,
    acceptor: TlsAcceptor,
    app: Router,
    stop: CancellationToken,
) -> anyhow::Result<()> {
    let tls = tokio::select! {
        handshake = time::timeout(TLS_HANDSHAKE_TIMEOUT, acceptor.accept(stream)) => {
            handshake
                .context("TLS handshake timed out")?
                .context("TLS handshake failed")?
        }
        _ = stop.cancelled() => return Ok(()),
    };
    debug!(%peer, "TLS session established");

    let service = hyper::service::service_fn(move |request: Request<Incoming>| {
        app.clone().call(request)
    });
    let builder = auto::Builder::new(TokioExecutor::new());
    let mut conn = pin!(builder.serve_connection_with_upgrades(TokioIo::new(tls), service));

    tokio::select! {
        result = conn.as_mut() => return result.map_err(|e| anyhow::anyhow!(e)),
        _ = stop.cancelled() => {}
    }
    conn.as_mut().graceful_shutdown();
    conn.await.map_err(|e| anyhow::anyhow!(e))
}

/// Future that resolves on SIGINT (Ctrl-C) or, on Unix, SIGTERM.
///
/// On Unix the handlers are installed when this is called, not when the future
/// is first polled, so a signal that arrives during startup is held until the
/// accept loop sees it instead of killing the process with the certificate
/// files still on disk.
#[cfg(unix)]
pub fn shutdown_signal() -> impl Future<Output = ()> + Send {
    use tokio::signal::unix::{signal, SignalKind};

    let install = |kind: SignalKind, name: &'static str| match signal(kind) {
        Ok(stream) => Some(stream),
        Err(e) => {
            warn!(error = %e, signal = name, "signal handler unavailable");
            None
        }
    };
    let mut term = install(SignalKind::terminate(), "SIGTERM");
    let mut int = install(SignalKind::interrupt(), "SIGINT");

    async move {
        tokio::select! {
            _ = recv_signal(term.as_mut()) => {}
            _ = recv_signal(int.as_mut()) => {}
        }
        info!("shutdown signal received");
    }
}

#[cfg(unix)]
async fn recv_signal(stream: Option<&mut tokio::signal::unix::Signal>) {
    match stream {
        Some(stream) => {
            stream.recv().await;
        }
        None => std::future::pending().await,
    }
}

/// Future that resolves on Ctrl-C.
#[cfg(not(unix))]
pub fn shutdown_signal() -> impl Future<Output = ()> + Send {
    async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Ctrl-C handler unavailable");
            std::future::pending::<()>().await;
        }
        info!("shutdown signal received");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustls::pki_types::{CertificateDer, ServerName};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::sync::oneshot;
    use tokio_rustls::TlsConnector;

    const INDEX_BODY: &str = "<!doctype html><title>robot</title>";

    #[test]
    fn legal_transitions() {
        use Phase::*;
        assert!(Initializing.can_advance_to(CertReady));
        assert!(CertReady.can_advance_to(Listening));
        assert!(Listening.can_advance_to(Draining));
        assert!(Draining.can_advance_to(Stopped));
        assert!(Initializing.can_advance_to(FailedFatal));
        assert!(CertReady.can_advance_to(FailedFatal));
    }

    #[test]
    fn illegal_transitions() {
        use Phase::*;
        assert!(!Initializing.can_advance_to(Listening));
        assert!(!Listening.can_advance_to(FailedFatal));
        assert!(!Stopped.can_advance_to(Listening));
        assert!(!FailedFatal.can_advance_to(CertReady));
        assert!(!Draining.can_advance_to(Listening));
    }

    #[tokio::test]
    async fn missing_frontend_is_fatal() {
        let scratch = tempfile::tempdir().unwrap();
        let cfg = Config {
            host: "127.0.0.1".into(),
            port: 1,
            frontend_dev_dir: scratch.path().join("dist").display().to_string(),
            ..Config::default()
        };
        let err = run(cfg, std::future::ready(())).await.unwrap_err();
        assert!(matches!(err, StartupError::FrontendMissing { checked: 1 }));
    }

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn bind_failure_is_fatal_and_removes_certificate() {
        let frontend = tempfile::tempdir().unwrap();
        let certs = tempfile::tempdir().unwrap();
        let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = occupied.local_addr().unwrap().port();
        let cfg = Config {
            host: "127.0.0.1".into(),
            port,
            frontend_dev_dir: frontend.path().display().to_string(),
            cert_dir: Some(certs.path().display().to_string()),
            ..Config::default()
        };
        let err = run(cfg, std::future::pending()).await.unwrap_err();
        assert!(matches!(err, StartupError::Bind { .. }));
        assert_eq!(entries(certs.path()), 0);
    }

    #[tokio::test]
    async fn clean_shutdown_removes_certificate() {
        let frontend = tempfile::tempdir().unwrap();
        let certs = tempfile::tempdir().unwrap();
        let cfg = Config {
            host: "127.0.0.1".into(),
            port: free_port(),
            frontend_dev_dir: frontend.path().display().to_string(),
            cert_dir: Some(certs.path().display().to_string()),
            ..Config::default()
        };

        let (tx, rx) = oneshot::channel::<()>();
        let server = tokio::spawn(run(cfg, async move {
            let _ = rx.await;
        }));

        // Both files exist while the server is up.
        let deadline = time::Instant::now() + Duration::from_secs(5);
        while entries(certs.path()) < 2 {
            assert!(time::Instant::now() < deadline, "certificate files never appeared");
            time::sleep(Duration::from_millis(10)).await;
        }

        tx.send(()).unwrap();
        time::timeout(Duration::from_secs(10), server)
            .await
            .expect("run did not return")
            .unwrap()
            .unwrap();
        assert_eq!(entries(certs.path()), 0);
    }

    fn free_port() -> u16 {
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        probe.local_addr().unwrap().port()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn sigterm_before_first_poll_is_held() {
        let signal = shutdown_signal();
        let status = std::process::Command::new("sh")
            .arg("-c")
            .arg(format!("kill -TERM {}", std::process::id()))
            .status()
            .unwrap();
        assert!(status.success());
        time::timeout(Duration::from_secs(5), signal)
            .await
            .expect("SIGTERM was not delivered to the shutdown future");
    }

    fn client_config(cert_pem: &[u8]) -> Arc<rustls::ClientConfig> {
        let mut roots = rustls::RootCertStore::empty();
        for cert in rustls_pemfile::certs(&mut std::io::BufReader::new(cert_pem)) {
            let cert: CertificateDer<'static> = cert.unwrap();
            roots.add(cert).unwrap();
        }
        let config = rustls::ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_root_certificates(roots)
        .with_no_client_auth();
        Arc::new(config)
    }

    /// Minimal HTTP/1.1 response: the header block and the decoded body.
    struct RawResponse {
        head: String,
        body: String,
    }

    fn parse_response(raw: &str) -> RawResponse {
        let (head, rest) = raw.split_once("\r\n\r\n").expect("no header terminator");
        let chunked = head
            .to_ascii_lowercase()
            .contains("transfer-encoding: chunked");
        let body = if chunked {
            let mut body = String::new();
            let mut rest = rest;
            loop {
                let (size, tail) = rest.split_once("\r\n").expect("truncated chunk size");
                let size = usize::from_str_radix(size.trim(), 16).unwrap();
                if size == 0 {
                    break;
                }
                body.push_str(&tail[..size]);
                rest = &tail[size + 2..];
            }
            body
        } else {
            rest.to_owned()
        };
        RawResponse {
            head: head.to_owned(),
            body,
        }
    }

    async fn https_get(addr: SocketAddr, connector: &TlsConnector, path: &str) -> RawResponse {
        let tcp = tokio::net::TcpStream::connect(addr).await.unwrap();
        let name = ServerName::try_from("localhost").unwrap();
        let mut tls = connector.connect(name, tcp).await.unwrap();
        let request =
            format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        tls.write_all(request.as_bytes()).await.unwrap();
        let mut response = Vec::new();
        // A missing close_notify surfaces as an error after the full body.
        let _ = tls.read_to_end(&mut response).await;
        parse_response(&String::from_utf8_lossy(&response))
    }

    #[tokio::test]
    async fn serves_https_and_drains_on_shutdown() {
        let frontend = tempfile::tempdir().unwrap();
        std::fs::write(frontend.path().join("index.html"), INDEX_BODY).unwrap();

        let bundle = certificate::generate_server_certificate(&std::env::temp_dir()).unwrap();
        let acceptor = tls::acceptor_from_bundle(&bundle).unwrap();
        let (cert_pem, _) = bundle.read_pem().unwrap();
        let connector = TlsConnector::from(client_config(&cert_pem));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = AppState::new(
            ConfigStore::new("robot: alpha\n"),
            frontend.path().canonicalize().unwrap(),
            Arc::new(AmentIndex::default()),
        );
        let (tx, rx) = oneshot::channel::<()>();
        let server = tokio::spawn(serve(
            listener,
            acceptor,
            router::build(state),
            CancellationToken::new(),
            Duration::from_secs(2),
            async move {
                let _ = rx.await;
            },
        ));

        let index = https_get(addr, &connector, "/").await;
        assert!(index.head.starts_with("HTTP/1.1 200"), "{}", index.head);
        assert_eq!(index.body, INDEX_BODY);

        let spa = https_get(addr, &connector, "/robots/1/teleop").await;
        assert_eq!(spa.body, INDEX_BODY);

        let config = https_get(addr, &connector, "/config.yaml").await;
        assert!(config.head.contains("text/yaml"), "{}", config.head);
        assert_eq!(config.body, "robot: alpha\n");

        tx.send(()).unwrap();
        time::timeout(Duration::from_secs(5), server)
            .await
            .expect("server did not drain")
            .unwrap();
        assert!(tokio::net::TcpStream::connect(addr).await.is_err());

        bundle.cleanup();
    }
}
