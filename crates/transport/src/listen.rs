//! TCP listener with optional TLS termination.

use std::fs::File;
use std::io::BufReader;
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use color_eyre::eyre::{eyre, WrapErr as _};
use color_eyre::Result;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConnection, StreamOwned};
use tracing::{debug, info, warn};

use crate::config::{ServerConfig, TlsConfig};
use crate::server::Handler;

/// Accept connections forever, one handler thread per connection.
///
/// The client limit is advisory: crossings are logged and the connection
/// is served anyway.
pub fn serve(cfg: &ServerConfig) -> Result<()> {
    let listener =
        TcpListener::bind(&cfg.address).wrap_err_with(|| format!("bind {}", cfg.address))?;
    let tls = cfg.certificate.as_ref().map(tls_acceptor).transpose()?;
    let active = Arc::new(AtomicUsize::new(0));

    info!(address = %cfg.address, base = %cfg.base.display(), tls = tls.is_some(), "listening");

    for conn in listener.incoming() {
        let conn = conn?;
        let live = active.load(Ordering::Acquire);
        if cfg.client_limit > 0 && live >= cfg.client_limit {
            warn!(
                "{live} live sessions at or over the advisory client limit {}",
                cfg.client_limit
            );
        }

        let base = cfg.base.clone();
        let tls = tls.clone();
        let active = Arc::clone(&active);
        active.fetch_add(1, Ordering::AcqRel);
        thread::spawn(move || {
            let peer = conn
                .peer_addr()
                .map_or_else(|_| "?".to_string(), |addr| addr.to_string());
            debug!(%peer, "connection accepted");

            let outcome = match tls {
                Some(tls) => serve_tls(conn, tls, base),
                None => serve_plain(conn, base),
            };
            if let Err(err) = outcome {
                warn!(%peer, "session ended with error: {err}");
            }
            active.fetch_sub(1, Ordering::AcqRel);
        });
    }
    Ok(())
}

fn serve_plain(conn: TcpStream, base: PathBuf) -> treesum_core::Result<()> {
    Handler::new(conn, base)?.run()
}

fn serve_tls(
    conn: TcpStream,
    tls: Arc<rustls::ServerConfig>,
    base: PathBuf,
) -> treesum_core::Result<()> {
    let session = ServerConnection::new(tls)
        .map_err(|err| treesum_core::Error::Protocol(err.to_string()))?;
    let stream = StreamOwned::new(session, conn);
    Handler::new(stream, base)?.run()
}

/// Build the rustls server configuration from the PEM material named in the
/// listener config. The client-CA pool comes from the `root` bundle when
/// one is named, from the system trust store otherwise; client certificates
/// are verified against it either way.
pub fn tls_acceptor(tls: &TlsConfig) -> Result<Arc<rustls::ServerConfig>> {
    let certs = load_certs(&tls.pem)?;
    let key = load_key(&tls.key)?;

    let roots = client_roots(tls.root.as_deref())?;
    let verifier = WebPkiClientVerifier::builder(Arc::new(roots))
        .build()
        .wrap_err("build client verifier")?;

    let config = rustls::ServerConfig::builder()
        .with_client_cert_verifier(verifier)
        .with_single_cert(certs, key)
        .wrap_err("assemble TLS configuration")?;

    Ok(Arc::new(config))
}

fn client_roots(root: Option<&Path>) -> Result<RootCertStore> {
    let mut store = RootCertStore::empty();
    match root {
        Some(path) => {
            for cert in load_certs(path)? {
                store.add(cert).wrap_err("add client CA certificate")?;
            }
        }
        None => {
            // System stores routinely hold certificates webpki rejects;
            // skip those instead of refusing to start.
            for cert in
                rustls_native_certs::load_native_certs().wrap_err("load system trust store")?
            {
                let _ = store.add(cert);
            }
        }
    }
    Ok(store)
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path).wrap_err_with(|| format!("open {}", path.display()))?;
    rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<std::io::Result<Vec<_>>>()
        .wrap_err_with(|| format!("parse certificates in {}", path.display()))
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let file = File::open(path).wrap_err_with(|| format!("open {}", path.display()))?;
    rustls_pemfile::private_key(&mut BufReader::new(file))
        .wrap_err_with(|| format!("parse key in {}", path.display()))?
        .ok_or_else(|| eyre!("no private key found in {}", path.display()))
}
