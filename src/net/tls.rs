//! TLS certificate loading.

use axum_server::tls_rustls::RustlsConfig;
use std::io;
use std::path::Path;

use crate::config::TlsConfig;

/// Load the listener's certificate chain and key (PEM).
pub async fn load_tls_config(tls: &TlsConfig) -> io::Result<RustlsConfig> {
    let cert = Path::new(&tls.cert_path);
    let key = Path::new(&tls.key_path);

    for (label, path) in [("certificate", cert), ("private key", key)] {
        if !path.exists() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("TLS {} not found: {}", label, path.display()),
            ));
        }
    }

    RustlsConfig::from_pem_file(cert, key).await.inspect_err(|e| {
        tracing::error!(error = %e, cert = %tls.cert_path, "Failed to load TLS material");
    })
}
