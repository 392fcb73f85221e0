//! TLS termination material.

use crate::config::{ServerConfig, TlsFiles};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls_pemfile::{certs, private_key};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio_rustls::TlsAcceptor;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum TlsError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("No certificates found in {0}")]
    EmptyCertChain(String),

    #[error("No private key found in {0}")]
    EmptyPrivateKey(String),

    #[error("Invalid TLS configuration: {0}")]
    Config(String),
}

impl TlsError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

fn load_cert_chain(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let mut reader =
        std::io::BufReader::new(std::fs::File::open(path).map_err(|e| TlsError::io(path, e))?);
    let cert_chain = certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TlsError::io(path, e))?;
    if cert_chain.is_empty() {
        return Err(TlsError::EmptyCertChain(path.display().to_string()));
    }
    Ok(cert_chain)
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    let mut reader =
        std::io::BufReader::new(std::fs::File::open(path).map_err(|e| TlsError::io(path, e))?);
    private_key(&mut reader)
        .map_err(|e| TlsError::io(path, e))?
        .ok_or_else(|| TlsError::EmptyPrivateKey(path.display().to_string()))
}

pub fn build_server_config(files: &TlsFiles) -> Result<Arc<rustls::ServerConfig>, TlsError> {
    let cert_chain = load_cert_chain(&files.cert_file)?;
    let key = load_private_key(&files.key_file)?;

    let mut server_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(cert_chain, key)
        .map_err(|e| TlsError::Config(e.to_string()))?;
    server_config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(Arc::new(server_config))
}

/// Decides how the listener is secured.
///
/// Without cert/key the server runs plain HTTP. With cert/key a load
/// failure aborts startup unless plaintext fallback was requested.
pub fn acceptor_for(config: &ServerConfig) -> Result<Option<TlsAcceptor>, TlsError> {
    let Some(files) = &config.tls else {
        warn!("No certificate configured, serving plain HTTP");
        return Ok(None);
    };

    match build_server_config(files) {
        Ok(server_config) => {
            info!(cert = %files.cert_file.display(), "TLS enabled");
            Ok(Some(TlsAcceptor::from(server_config)))
        }
        Err(err) if config.plaintext_fallback => {
            error!(error = %err, "Could not create TLS context, falling back to plain HTTP");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}
