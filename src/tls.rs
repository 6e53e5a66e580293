//! TLS configuration helpers for the expiration probe.
//!
//! The probe must complete a handshake with a device whose certificate may be
//! self-signed or expired, so the client configuration here never aborts on
//! chain validation. Instead [`RecordingVerifier`] runs the normal WebPKI
//! checks and remembers the verdict for the caller.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};

use crate::error::{RenewError, Result};

/// Crypto provider shared by every TLS configuration in this crate.
pub fn crypto_provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Build a root store from Mozilla's roots plus optional extra PEM anchors.
pub fn build_root_store(extra_anchors: Option<&Path>) -> Result<RootCertStore> {
    let mut root_store = RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    if let Some(path) = extra_anchors {
        let pem = std::fs::read(path).map_err(|e| {
            RenewError::tls(format!("Failed to read CA bundle {}: {}", path.display(), e))
        })?;
        for cert in parse_pem_certificates(&pem)? {
            root_store
                .add(cert)
                .map_err(|e| RenewError::tls(format!("Failed to add CA cert: {}", e)))?;
        }
    }

    Ok(root_store)
}

/// Build a client configuration that completes the handshake regardless of
/// trust, returning the verifier that holds the verdict.
pub fn build_probe_config(
    root_store: RootCertStore,
) -> Result<(Arc<ClientConfig>, Arc<RecordingVerifier>)> {
    let provider = crypto_provider();
    let verifier = Arc::new(RecordingVerifier::new(root_store, provider.clone())?);

    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| RenewError::tls(format!("Failed to select protocol versions: {}", e)))?
        .dangerous()
        .with_custom_certificate_verifier(verifier.clone())
        .with_no_client_auth();

    Ok((Arc::new(config), verifier))
}

/// Certificate verifier that never rejects, but records whether the chain
/// would have passed WebPKI validation.
///
/// Handshake signatures are still checked against the presented leaf key.
#[derive(Debug)]
pub struct RecordingVerifier {
    inner: Arc<WebPkiServerVerifier>,
    provider: Arc<CryptoProvider>,
    verdict: Mutex<Option<std::result::Result<(), String>>>,
}

impl RecordingVerifier {
    /// Create a verifier validating against `root_store`.
    pub fn new(root_store: RootCertStore, provider: Arc<CryptoProvider>) -> Result<Self> {
        let inner =
            WebPkiServerVerifier::builder_with_provider(Arc::new(root_store), provider.clone())
                .build()
                .map_err(|e| RenewError::tls(format!("Failed to build verifier: {}", e)))?;

        Ok(Self {
            inner,
            provider,
            verdict: Mutex::new(None),
        })
    }

    /// Verdict of the last handshake.
    ///
    /// `None` if no certificate has been presented yet, `Some(Err(reason))`
    /// if the chain did not validate.
    pub fn verdict(&self) -> Option<std::result::Result<(), String>> {
        self.verdict
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    fn record(&self, verdict: std::result::Result<(), String>) {
        match self.verdict.lock() {
            Ok(mut guard) => *guard = Some(verdict),
            Err(poisoned) => *poisoned.into_inner() = Some(verdict),
        }
    }
}

impl ServerCertVerifier for RecordingVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        let verdict = self
            .inner
            .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
            .map(|_| ())
            .map_err(|e| e.to_string());
        self.record(verdict);
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Parse PEM-encoded certificates.
pub fn parse_pem_certificates(pem_data: &[u8]) -> Result<Vec<CertificateDer<'static>>> {
    let mut reader = std::io::BufReader::new(pem_data);
    let certs: Vec<_> = rustls_pemfile::certs(&mut reader)
        .filter_map(|result| result.ok())
        .collect();

    if certs.is_empty() {
        return Err(RenewError::invalid_pem("No certificates found in PEM data"));
    }

    Ok(certs)
}
