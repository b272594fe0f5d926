//! TLS client session

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName};
use tokio_rustls::rustls::{self, ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;
use tracing::debug;

use crate::common::{Result, Stream};
use crate::error::Error;

/// TLS client configuration, decoded from connection arguments
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TlsClientConfig {
    /// Server name for SNI and certificate verification. Defaults to the
    /// host part of the dialed address.
    #[serde(default, alias = "ServerName")]
    pub server_name: Option<String>,

    /// Accept any server certificate
    #[serde(default, alias = "InsecureSkipVerify")]
    pub insecure_skip_verify: bool,

    /// ALPN protocols
    #[serde(default, alias = "NextProtos")]
    pub alpn: Vec<String>,

    /// PEM file with extra trusted roots, added to the webpki set
    #[serde(default, alias = "RootCAs")]
    pub root_ca_file: Option<String>,
}

/// TLS client session wrapping an established stream
pub struct TlsSession {
    config: TlsClientConfig,
    connector: TlsConnector,
}

impl TlsSession {
    pub fn new(config: TlsClientConfig) -> Result<Self> {
        let connector = Self::build_connector(&config)?;
        Ok(Self { config, connector })
    }

    fn build_connector(config: &TlsClientConfig) -> Result<TlsConnector> {
        let mut root_store = RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        if let Some(path) = &config.root_ca_file {
            for cert in Self::load_certs(path)? {
                root_store
                    .add(cert)
                    .map_err(|e| Error::Config(format!("Invalid root certificate in {}: {}", path, e)))?;
            }
        }

        let mut tls_config = ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        if !config.alpn.is_empty() {
            tls_config.alpn_protocols = config
                .alpn
                .iter()
                .map(|s| s.as_bytes().to_vec())
                .collect();
        }

        if config.insecure_skip_verify {
            tls_config
                .dangerous()
                .set_certificate_verifier(Arc::new(InsecureVerifier));
        }

        Ok(TlsConnector::from(Arc::new(tls_config)))
    }

    fn load_certs(path: &str) -> Result<Vec<CertificateDer<'static>>> {
        let file = File::open(path)
            .map_err(|e| Error::Config(format!("Failed to open certificate file {}: {}", path, e)))?;
        let mut reader = BufReader::new(file);
        let certs = rustls_pemfile::certs(&mut reader)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Config(format!("Failed to parse certificates: {}", e)))?;
        Ok(certs)
    }

    /// Run the client handshake over `stream`.
    ///
    /// `default_host` is used for SNI when no server name is configured.
    /// On failure the dialed stream is shut down before the error is returned.
    pub async fn handshake(&self, stream: Stream, default_host: &str) -> std::io::Result<Stream> {
        let server_name = self
            .config
            .server_name
            .clone()
            .unwrap_or_else(|| default_host.to_string());

        let domain = match ServerName::try_from(server_name.clone()) {
            Ok(domain) => domain,
            Err(_) => {
                close_quietly(stream).await;
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("Invalid server name: {}", server_name),
                ));
            }
        };

        match self.connector.connect(domain, stream).into_fallible().await {
            Ok(tls_stream) => Ok(Box::new(tls_stream)),
            Err((err, stream)) => {
                debug!("TLS handshake with {} failed: {}", server_name, err);
                close_quietly(stream).await;
                Err(err)
            }
        }
    }
}

async fn close_quietly(mut stream: Stream) {
    let _ = stream.shutdown().await;
}

/// Certificate verifier that accepts anything, for `insecure_skip_verify`
#[derive(Debug)]
struct InsecureVerifier;

impl rustls::client::danger::ServerCertVerifier for InsecureVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        vec![
            rustls::SignatureScheme::RSA_PKCS1_SHA256,
            rustls::SignatureScheme::RSA_PKCS1_SHA384,
            rustls::SignatureScheme::RSA_PKCS1_SHA512,
            rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            rustls::SignatureScheme::ECDSA_NISTP384_SHA384,
            rustls::SignatureScheme::ECDSA_NISTP521_SHA512,
            rustls::SignatureScheme::RSA_PSS_SHA256,
            rustls::SignatureScheme::RSA_PSS_SHA384,
            rustls::SignatureScheme::RSA_PSS_SHA512,
            rustls::SignatureScheme::ED25519,
        ]
    }
}
