//! Configuration loading and validation for the gateway.
//!
//! All values are read from environment variables at startup. The process will
//! exit with a clear error message if any variable is invalid.

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

/// Validated gateway configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Address the HTTPS listener binds to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port the HTTPS listener binds to.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Raw configuration text served at `/config.yaml`.
    #[serde(default)]
    pub config: String,

    /// Optional file whose contents replace [`Config::config`] at startup.
    #[serde(default)]
    pub config_file: Option<String>,

    /// Colon-separated install prefixes searched for packages (`AMENT_PREFIX_PATH`).
    #[serde(default)]
    pub ament_prefix_path: Option<String>,

    /// Directory for the generated certificate and key. System temp dir when unset.
    #[serde(default)]
    pub cert_dir: Option<String>,

    /// Package whose share directory holds the installed frontend bundle.
    #[serde(default = "default_frontend_package")]
    pub frontend_package: String,

    /// Development location of the frontend bundle, probed after the installed one.
    #[serde(default = "default_frontend_dev_dir")]
    pub frontend_dev_dir: String,

    /// Period of the background bridge task, in milliseconds.
    #[serde(default = "default_bridge_poll_interval")]
    pub bridge_poll_interval_ms: u64,

    /// How long in-flight connections may take to finish after a shutdown signal.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// OTLP endpoint for span export. Logs only when unset.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}
fn default_frontend_package() -> String {
    "web_robot_control".into()
}
fn default_frontend_dev_dir() -> String {
    "frontend/dist".into()
}
fn default_bridge_poll_interval() -> u64 {
    100
}
fn default_shutdown_grace() -> u64 {
    5
}
fn default_log_level() -> String {
    "info".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            config: String::new(),
            config_file: None,
            ament_prefix_path: None,
            cert_dir: None,
            frontend_package: default_frontend_package(),
            frontend_dev_dir: default_frontend_dev_dir(),
            bridge_poll_interval_ms: default_bridge_poll_interval(),
            shutdown_grace_secs: default_shutdown_grace(),
            log_level: default_log_level(),
            otel_exporter_otlp_endpoint: None,
        }
    }
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// When `CONFIG_FILE` is set the file is read here, so a missing file is a
    /// startup error rather than an empty config endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if any variable cannot be parsed or fails validation.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build configuration from environment")?;

        let mut c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        if let Some(path) = c.config_file.as_deref().filter(|p| !p.trim().is_empty()) {
            c.config = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read CONFIG_FILE {path}"))?;
        }

        c.validate()?;
        Ok(c)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            anyhow::bail!("HOST is required and must not be empty");
        }
        if self.port == 0 {
            anyhow::bail!("PORT must be in 1..=65535");
        }
        if self.frontend_package.trim().is_empty() {
            anyhow::bail!("FRONTEND_PACKAGE must not be empty");
        }
        if self.bridge_poll_interval_ms == 0 {
            anyhow::bail!("BRIDGE_POLL_INTERVAL_MS must be > 0");
        }
        Ok(())
    }

    /// Install prefixes listed in `AMENT_PREFIX_PATH`, in search order.
    pub fn ament_prefixes(&self) -> Vec<PathBuf> {
        self.ament_prefix_path
            .as_deref()
            .map(|raw| std::env::split_paths(raw).filter(|p| !p.as_os_str().is_empty()).collect())
            .unwrap_or_default()
    }

    /// Where the certificate files are created.
    pub fn certificate_dir(&self) -> PathBuf {
        self.cert_dir
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir)
    }

    pub fn bridge_poll_interval(&self) -> Duration {
        Duration::from_millis(self.bridge_poll_interval_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Log a warning when the config text is not YAML. It is served verbatim either way.
    pub fn warn_if_config_not_yaml(&self) {
        if self.config.trim().is_empty() {
            return;
        }
        if let Err(e) = serde_yaml::from_str::<serde_yaml::Value>(&self.config) {
            warn!(error = %e, "config text is not valid YAML; serving it unchanged");
        }
    }
}
