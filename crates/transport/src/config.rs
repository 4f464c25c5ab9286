//! Server configuration file parsing.

use std::path::{Path, PathBuf};

use color_eyre::eyre::WrapErr as _;
use color_eyre::Result;

/// Listener configuration, read from a TOML file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// host:port to bind.
    pub address: String,

    /// Root directory CHECK and COPY paths resolve under.
    pub base: PathBuf,

    /// Advisory ceiling on concurrent handlers; zero means no ceiling.
    /// Crossings are logged, connections are still served.
    pub client_limit: usize,

    /// TLS material; when present the listener terminates TLS.
    pub certificate: Option<TlsConfig>,
}

/// TLS key material for the listener.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct TlsConfig {
    /// Server certificate chain (PEM).
    pub pem: PathBuf,
    /// Server private key (PEM).
    pub key: PathBuf,
    /// Client-CA bundle; when present client certificates are required.
    #[serde(default)]
    pub root: Option<PathBuf>,
}

impl ServerConfig {
    /// Load the configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("read config {}", path.display()))?;
        toml::from_str(&raw).wrap_err_with(|| format!("parse config {}", path.display()))
    }
}
