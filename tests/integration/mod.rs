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

//! Integration test utilities and helpers
//!
//! This module provides a fake device for renewal integration tests: a
//! scripted certificate source, a recording console, and an issuance tool
//! that writes certbot-style outputs into the work directory.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use printer_cert_renew::console::{ConsoleDriver, ConsoleLauncher, Selector};
use printer_cert_renew::issuance::{IssuanceClient, IssuanceRequest};
use printer_cert_renew::orchestrator::Renewer;
use printer_cert_renew::probe::{CertificateRecord, CertificateSource, ObservedCertificate};
use printer_cert_renew::{RenewConfig, RenewError, Result, TrustPosture};
use url::Url;

/// Signing request content served by the fake console.
pub const CSR_PEM: &str = "-----BEGIN CERTIFICATE REQUEST-----\nMIIB\n-----END CERTIFICATE REQUEST-----\n";

/// Build a config for `work_dir` pointing at a fake device.
pub fn test_config(work_dir: &Path) -> RenewConfig {
    RenewConfig::builder()
        .device_url("https://printer.example.com")
        .expect("Valid URL")
        .pin("8642")
        .email("admin@example.com")
        .threshold_days(30)
        .work_dir(work_dir)
        .download_timeout(Duration::from_secs(2))
        .build()
        .expect("Valid config")
}

/// Names of the files currently in `dir`, sorted.
pub fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("Readable work dir")
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// ============================================================================
// Certificate source
// ============================================================================

/// What the fake device presents to the probe.
#[derive(Debug, Clone, Copy)]
pub enum DeviceCertificate {
    /// A trusted certificate expiring in this many days.
    Trusted(i64),
    /// An untrusted certificate expiring in this many days.
    SelfSigned(i64),
    /// The device is unreachable.
    Unreachable,
}

/// Scripted certificate source.
pub struct FakeSource {
    presents: DeviceCertificate,
    probes: Arc<Mutex<usize>>,
}

impl FakeSource {
    pub fn new(presents: DeviceCertificate) -> (Self, Arc<Mutex<usize>>) {
        let probes = Arc::new(Mutex::new(0));
        (
            Self {
                presents,
                probes: Arc::clone(&probes),
            },
            probes,
        )
    }

    fn record(days: i64) -> CertificateRecord {
        // Half a day of slack keeps floor division on `days`.
        let not_after = SystemTime::now() + Duration::from_secs((days * 86_400 + 43_200) as u64);
        CertificateRecord {
            subject: "CN=printer.example.com".to_string(),
            not_before: UNIX_EPOCH,
            not_after,
            fingerprint: [0x42; 32],
        }
    }
}

#[async_trait]
impl CertificateSource for FakeSource {
    async fn fetch(&self, host: &str) -> Result<ObservedCertificate> {
        *self.probes.lock().unwrap() += 1;
        match self.presents {
            DeviceCertificate::Trusted(days) => Ok(ObservedCertificate {
                record: Self::record(days),
                chain_error: None,
            }),
            DeviceCertificate::SelfSigned(days) => Ok(ObservedCertificate {
                record: Self::record(days),
                chain_error: Some("invalid peer certificate: UnknownIssuer".to_string()),
            }),
            DeviceCertificate::Unreachable => Err(RenewError::probe(format!(
                "Connection to {} failed: Connection refused",
                host
            ))),
        }
    }
}

// ============================================================================
// Console
// ============================================================================

/// Everything the fake console observed.
#[derive(Debug, Default)]
pub struct ConsoleLog {
    /// Trust posture of every launched session.
    pub launches: Vec<TrustPosture>,
    /// Pages loaded.
    pub navigations: Vec<String>,
    /// Elements clicked, rendered with `Display`.
    pub clicks: Vec<String>,
    /// Values typed.
    pub fills: Vec<String>,
    /// Files uploaded.
    pub uploads: Vec<PathBuf>,
    /// Downloads served.
    pub downloads: usize,
    /// Sessions closed.
    pub closes: usize,
}

/// Fake console behaviour.
#[derive(Debug, Clone, Default)]
pub struct ConsoleScript {
    /// Fail when this selector is clicked.
    pub fail_on: Option<Selector>,
    /// Never deliver the download.
    pub stall_download: bool,
}

/// Launcher handing out recording drivers.
#[derive(Clone)]
pub struct FakeConsole {
    log: Arc<Mutex<ConsoleLog>>,
    script: ConsoleScript,
}

impl FakeConsole {
    pub fn new(script: ConsoleScript) -> Self {
        Self {
            log: Arc::new(Mutex::new(ConsoleLog::default())),
            script,
        }
    }

    pub fn log(&self) -> MutexGuard<'_, ConsoleLog> {
        self.log.lock().unwrap()
    }
}

#[async_trait]
impl ConsoleLauncher for FakeConsole {
    async fn launch(&self, trust: TrustPosture) -> Result<Box<dyn ConsoleDriver>> {
        self.log.lock().unwrap().launches.push(trust);
        Ok(Box::new(FakeDriver {
            log: Arc::clone(&self.log),
            script: self.script.clone(),
        }))
    }
}

struct FakeDriver {
    log: Arc<Mutex<ConsoleLog>>,
    script: ConsoleScript,
}

#[async_trait]
impl ConsoleDriver for FakeDriver {
    async fn navigate(&mut self, url: &Url) -> Result<()> {
        self.log.lock().unwrap().navigations.push(url.to_string());
        Ok(())
    }

    async fn click(&mut self, target: &Selector) -> Result<()> {
        self.log.lock().unwrap().clicks.push(target.to_string());
        if self.script.fail_on.as_ref() == Some(target) {
            return Err(RenewError::automation(
                "click",
                format!("{}: no such element", target),
            ));
        }
        Ok(())
    }

    async fn fill(&mut self, _target: &Selector, value: &str) -> Result<()> {
        self.log.lock().unwrap().fills.push(value.to_string());
        Ok(())
    }

    async fn upload(&mut self, _target: &Selector, file: &Path) -> Result<()> {
        self.log.lock().unwrap().uploads.push(file.to_path_buf());
        Ok(())
    }

    async fn download(&mut self, trigger: &Selector, timeout: Duration) -> Result<Vec<u8>> {
        self.click(trigger).await?;
        if self.script.stall_download {
            return Err(RenewError::download_timeout("download", timeout));
        }
        self.log.lock().unwrap().downloads += 1;
        Ok(CSR_PEM.as_bytes().to_vec())
    }

    async fn close(&mut self) -> Result<()> {
        self.log.lock().unwrap().closes += 1;
        Ok(())
    }
}

// ============================================================================
// Issuance
// ============================================================================

/// Issuance tool double writing certbot-style outputs.
#[derive(Clone)]
pub struct FakeIssuer {
    exit_status: i32,
    requests: Arc<Mutex<Vec<IssuanceRequest>>>,
}

impl FakeIssuer {
    /// An issuer that succeeds.
    pub fn succeeding() -> Self {
        Self::exiting(0)
    }

    /// An issuer that exits with `status`.
    pub fn exiting(status: i32) -> Self {
        Self {
            exit_status: status,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn requests(&self) -> Vec<IssuanceRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl IssuanceClient for FakeIssuer {
    async fn issue(&self, request: &IssuanceRequest, work_dir: &Path) -> Result<()> {
        self.requests.lock().unwrap().push(request.clone());
        if self.exit_status != 0 {
            return Err(RenewError::external_tool(
                "certbot",
                Some(self.exit_status),
                "An unexpected error occurred",
            ));
        }

        let certified =
            rcgen::generate_simple_self_signed(vec![request.domain.clone()]).expect("rcgen");
        let pem = certified.cert.pem();
        std::fs::write(work_dir.join("0000_cert.pem"), &pem)?;
        std::fs::write(work_dir.join("0000_chain.pem"), &pem)?;
        std::fs::write(work_dir.join("0001_chain.pem"), format!("{pem}{pem}"))?;
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

/// A renewer wired to fakes, with handles to inspect them.
pub struct Harness {
    pub dir: tempfile::TempDir,
    pub renewer: Renewer,
    pub console: FakeConsole,
    pub issuer: FakeIssuer,
    pub probes: Arc<Mutex<usize>>,
}

impl Harness {
    pub fn new(presents: DeviceCertificate, script: ConsoleScript, issuer: FakeIssuer) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = test_config(dir.path());
        let (source, probes) = FakeSource::new(presents);
        let console = FakeConsole::new(script);

        let renewer = Renewer::new(
            config,
            Box::new(source),
            Box::new(console.clone()),
            Box::new(issuer.clone()),
        )
        .expect("Renewer");

        Self {
            dir,
            renewer,
            console,
            issuer,
            probes,
        }
    }

    pub fn work_dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn marker_present(&self) -> bool {
        self.renewer.marker().is_present()
    }

    pub fn probe_count(&self) -> usize {
        *self.probes.lock().unwrap()
    }
}
