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

//! Integration tests for the expiration probe against a live TLS listener

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use printer_cert_renew::probe::{ExpirationProbe, ProbeReport, TlsCertificateSource};
use printer_cert_renew::tls::crypto_provider;
use printer_cert_renew::{CertificateRecord, InvalidCertMarker};
use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::ServerConfig;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

/// A one-shot TLS listener presenting a fresh self-signed certificate.
struct SelfSignedServer {
    port: u16,
    cert_der: Vec<u8>,
    cert_pem: String,
}

async fn self_signed_server() -> SelfSignedServer {
    let certified = rcgen::generate_simple_self_signed(vec!["127.0.0.1".to_string()])
        .expect("Generate certificate");
    let cert_der = certified.cert.der().clone();
    let key_der = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(
        certified.key_pair.serialize_der(),
    ));

    let config = ServerConfig::builder_with_provider(crypto_provider())
        .with_safe_default_protocol_versions()
        .expect("Protocol versions")
        .with_no_client_auth()
        .with_single_cert(vec![cert_der.clone()], key_der)
        .expect("Server config");
    let acceptor = TlsAcceptor::from(Arc::new(config));

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("Bind");
    let port = listener.local_addr().expect("Local addr").port();

    tokio::spawn(async move {
        if let Ok((stream, _)) = listener.accept().await {
            // Hold the session open until the client goes away
            if let Ok(mut tls) = acceptor.accept(stream).await {
                let mut buf = [0u8; 1];
                let _ = tls.read(&mut buf).await;
            }
        }
    });

    SelfSignedServer {
        port,
        cert_der: cert_der.to_vec(),
        cert_pem: certified.cert.pem(),
    }
}

#[tokio::test]
async fn test_self_signed_certificate_is_read_but_untrusted() {
    let dir = tempfile::tempdir().expect("tempdir");
    let marker = InvalidCertMarker::new(dir.path().join("cert_invalid.flag"));
    let server = self_signed_server().await;

    let source = TlsCertificateSource::new(server.port, Duration::from_secs(5), None)
        .expect("Probe source");
    let report = ExpirationProbe::new(&source, &marker)
        .probe("127.0.0.1")
        .await;

    match &report {
        ProbeReport::Untrusted { record, reason } => {
            assert!(record.subject.contains("rcgen"), "subject: {}", record.subject);
            assert!(!reason.is_empty());
            let expected = CertificateRecord::from_der(&server.cert_der)
                .expect("Parse certificate");
            assert_eq!(record.fingerprint, expected.fingerprint);
        }
        other => panic!("expected untrusted report, got {:?}", other),
    }
    assert_eq!(report.remaining_days(SystemTime::now()), None);
    assert!(marker.is_present());
}

#[tokio::test]
async fn test_extra_trust_anchor_makes_certificate_trusted() {
    let dir = tempfile::tempdir().expect("tempdir");
    let marker = InvalidCertMarker::new(dir.path().join("cert_invalid.flag"));
    let server = self_signed_server().await;

    // Trust the device's own certificate as an anchor
    let bundle = dir.path().join("device-ca.pem");
    std::fs::write(&bundle, &server.cert_pem).expect("Write bundle");

    let source = TlsCertificateSource::new(server.port, Duration::from_secs(5), Some(&bundle))
        .expect("Probe source");
    let report = ExpirationProbe::new(&source, &marker)
        .probe("127.0.0.1")
        .await;

    assert!(report.is_trusted(), "report: {:?}", report);
    let days = report
        .remaining_days(SystemTime::now())
        .expect("Known validity");
    assert!(days > 365);
    assert!(!marker.is_present());
}

#[tokio::test]
async fn test_closed_port_is_unknown_and_persists_marker() {
    let dir = tempfile::tempdir().expect("tempdir");
    let marker = InvalidCertMarker::new(dir.path().join("cert_invalid.flag"));

    // Reserve a port, then release it so nothing is listening
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("Bind");
        listener.local_addr().expect("Local addr").port()
    };

    let source =
        TlsCertificateSource::new(port, Duration::from_secs(2), None).expect("Probe source");
    let report = ExpirationProbe::new(&source, &marker)
        .probe("127.0.0.1")
        .await;

    assert!(matches!(report, ProbeReport::Unknown { .. }));
    assert!(report.record().is_none());
    assert!(marker.is_present());
    let record = marker.read().expect("Read marker").expect("Marker record");
    assert!(record.trust_relaxed);
    assert_eq!(record.version, 1);
}
