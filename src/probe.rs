// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Expiration probe for the device's current certificate.
//!
//! The probe connects to the device over TLS without enforcing trust, so a
//! self-signed or expired certificate can still be read. Probe failures are
//! informational: they are logged, persisted as the invalid-certificate
//! marker, and reported as [`ProbeReport::Unknown`].
//!
//! # Security Warning
//!
//! Nothing read here is trusted. The only use of the extracted certificate is
//! deciding when to renew.
//!
//! # Example
//!
//! ```no_run
//! use printer_cert_renew::marker::InvalidCertMarker;
//! use printer_cert_renew::probe::{ExpirationProbe, TlsCertificateSource};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let source = TlsCertificateSource::new(443, Duration::from_secs(5), None)?;
//! let marker = InvalidCertMarker::new("cert_invalid.flag");
//!
//! let report = ExpirationProbe::new(&source, &marker)
//!     .probe("printer.example.com")
//!     .await;
//! println!("{report:?}");
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use der::Decode;
use rustls::pki_types::ServerName;
use rustls::RootCertStore;
use sha2::{Digest, Sha256};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tracing::{debug, info, warn};
use x509_cert::time::Time;
use x509_cert::Certificate;

use crate::error::{RenewError, Result};
use crate::marker::InvalidCertMarker;
use crate::tls;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Validity window and identity of the device's current leaf certificate.
///
/// Obtained transiently, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRecord {
    /// Subject distinguished name.
    pub subject: String,
    /// Start of validity.
    pub not_before: SystemTime,
    /// End of validity.
    pub not_after: SystemTime,
    /// SHA-256 fingerprint of the DER encoding.
    pub fingerprint: [u8; 32],
}

impl CertificateRecord {
    /// Parse a DER-encoded certificate.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let cert = Certificate::from_der(der).map_err(|e| {
            RenewError::certificate_parsing(format!("Failed to decode leaf certificate: {}", e))
        })?;
        let validity = &cert.tbs_certificate.validity;

        let mut hasher = Sha256::new();
        hasher.update(der);

        Ok(Self {
            subject: cert.tbs_certificate.subject.to_string(),
            not_before: to_system_time(&validity.not_before),
            not_after: to_system_time(&validity.not_after),
            fingerprint: hasher.finalize().into(),
        })
    }

    /// Remaining validity in whole days at `now`.
    ///
    /// Rounds toward negative infinity, so a certificate that expired an hour
    /// ago has -1 days left.
    pub fn remaining_days(&self, now: SystemTime) -> i64 {
        let remaining = unix_seconds(self.not_after) - unix_seconds(now);
        remaining.div_euclid(SECONDS_PER_DAY)
    }

    /// Fingerprint as a colon-separated hex string.
    pub fn format_fingerprint(&self) -> String {
        self.fingerprint
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(":")
    }
}

fn to_system_time(x509_time: &Time) -> SystemTime {
    let duration = match x509_time {
        Time::UtcTime(utc) => utc.to_unix_duration(),
        Time::GeneralTime(r#gen) => r#gen.to_unix_duration(),
    };
    UNIX_EPOCH + duration
}

fn unix_seconds(t: SystemTime) -> i64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    }
}

/// Render a timestamp as RFC 3339 for logs.
pub fn format_time(t: SystemTime) -> String {
    use time::format_description::well_known::Rfc3339;

    time::OffsetDateTime::from(t)
        .format(&Rfc3339)
        .unwrap_or_else(|_| format!("{}s since epoch", unix_seconds(t)))
}

/// A leaf certificate as presented by the device, with the chain verdict.
#[derive(Debug, Clone)]
pub struct ObservedCertificate {
    /// Parsed leaf certificate.
    pub record: CertificateRecord,
    /// Why the chain did not validate, `None` if it did.
    pub chain_error: Option<String>,
}

/// Source of the device's current certificate.
#[async_trait]
pub trait CertificateSource: Send + Sync {
    /// Fetch the leaf certificate presented by `host`.
    async fn fetch(&self, host: &str) -> Result<ObservedCertificate>;
}

/// Reads the certificate from a live TLS handshake.
pub struct TlsCertificateSource {
    port: u16,
    timeout: Duration,
    root_store: RootCertStore,
}

impl TlsCertificateSource {
    /// Create a source probing `port` with Mozilla's roots plus optional
    /// extra PEM anchors.
    pub fn new(port: u16, timeout: Duration, ca_bundle: Option<&Path>) -> Result<Self> {
        Ok(Self {
            port,
            timeout,
            root_store: tls::build_root_store(ca_bundle)?,
        })
    }
}

#[async_trait]
impl CertificateSource for TlsCertificateSource {
    async fn fetch(&self, host: &str) -> Result<ObservedCertificate> {
        let (config, verifier) = tls::build_probe_config(self.root_store.clone())?;
        let connector = TlsConnector::from(config);
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|e| RenewError::probe(format!("Invalid server name '{}': {}", host, e)))?;

        debug!("Connecting to {}:{}", host, self.port);
        let tcp = timeout(self.timeout, TcpStream::connect((host, self.port)))
            .await
            .map_err(|_| RenewError::probe(format!("Connection to {} timed out", host)))?
            .map_err(|e| RenewError::probe(format!("Connection to {} failed: {}", host, e)))?;

        let stream = timeout(self.timeout, connector.connect(server_name, tcp))
            .await
            .map_err(|_| RenewError::probe(format!("TLS handshake with {} timed out", host)))?
            .map_err(|e| RenewError::probe(format!("TLS handshake with {} failed: {}", host, e)))?;

        let (_, connection) = stream.get_ref();
        let leaf = connection
            .peer_certificates()
            .and_then(|certs| certs.first())
            .ok_or_else(|| RenewError::probe(format!("{} presented no certificate", host)))?;

        let record = CertificateRecord::from_der(leaf.as_ref())?;
        let chain_error = match verifier.verdict() {
            Some(Ok(())) => None,
            Some(Err(reason)) => Some(reason),
            None => Some("certificate was never verified".to_string()),
        };

        Ok(ObservedCertificate {
            record,
            chain_error,
        })
    }
}

/// Outcome of an expiration probe.
#[derive(Debug, Clone)]
pub enum ProbeReport {
    /// The chain validated; remaining validity is known.
    Trusted(CertificateRecord),

    /// A certificate was read but its chain did not validate.
    Untrusted {
        /// The certificate as presented.
        record: CertificateRecord,
        /// Validation failure.
        reason: String,
    },

    /// Nothing could be read.
    Unknown {
        /// Connection, handshake, or parse failure.
        reason: String,
    },
}

impl ProbeReport {
    /// Returns true if the device presented a valid certificate.
    pub fn is_trusted(&self) -> bool {
        matches!(self, Self::Trusted(_))
    }

    /// The certificate that was read, trusted or not.
    pub fn record(&self) -> Option<&CertificateRecord> {
        match self {
            Self::Trusted(record) | Self::Untrusted { record, .. } => Some(record),
            Self::Unknown { .. } => None,
        }
    }

    /// Remaining days usable for the renewal decision.
    ///
    /// Only a trusted certificate's expiration counts; anything else is
    /// `None`, meaning renewal is due.
    pub fn remaining_days(&self, now: SystemTime) -> Option<i64> {
        match self {
            Self::Trusted(record) => Some(record.remaining_days(now)),
            _ => None,
        }
    }
}

/// Probes a device and persists the marker on failure.
pub struct ExpirationProbe<'a> {
    source: &'a dyn CertificateSource,
    marker: &'a InvalidCertMarker,
}

impl<'a> ExpirationProbe<'a> {
    /// Create a probe reading from `source` and writing `marker` on failure.
    pub fn new(source: &'a dyn CertificateSource, marker: &'a InvalidCertMarker) -> Self {
        Self { source, marker }
    }

    /// Probe `host`. Never fails; failures become [`ProbeReport::Unknown`].
    pub async fn probe(&self, host: &str) -> ProbeReport {
        match self.source.fetch(host).await {
            Ok(ObservedCertificate {
                record,
                chain_error: None,
            }) => {
                info!(
                    "Device certificate '{}' valid until {}",
                    record.subject,
                    format_time(record.not_after)
                );
                ProbeReport::Trusted(record)
            }
            Ok(ObservedCertificate {
                record,
                chain_error: Some(reason),
            }) => {
                warn!(
                    "Device certificate '{}' (expires {}, SHA-256 {}) is not trusted: {}",
                    record.subject,
                    format_time(record.not_after),
                    record.format_fingerprint(),
                    reason
                );
                self.marker
                    .persist_or_warn(format!("untrusted certificate: {}", reason));
                ProbeReport::Untrusted { record, reason }
            }
            Err(e) => {
                warn!("Failed to retrieve device certificate: {}", e);
                self.marker.persist_or_warn(e.to_string());
                ProbeReport::Unknown {
                    reason: e.to_string(),
                }
            }
        }
    }
}
