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

//! Local certificate artifacts in the work directory.
//!
//! | File | Written by | Read by |
//! |------|------------|---------|
//! | `csr_<unix-seconds>.pem` | extraction | issuance |
//! | `0000_cert.pem`, `0000_chain.pem`, `0001_chain.pem` | issuance tool | [`promote_issued_outputs`] |
//! | `issued_*.pem` | [`promote_issued_outputs`] | installation |
//!
//! Every one of them is removed by [`remove_artifacts`] after installation.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{info, warn};

use crate::error::{RenewError, Result};
use crate::probe::{format_time, CertificateRecord};
use crate::tls::parse_pem_certificates;

/// Prefix of signing-request files.
pub const CSR_PREFIX: &str = "csr_";

/// Prefix given to issuance outputs once renamed.
pub const ISSUED_PREFIX: &str = "issued_";

/// Prefix of raw issuance tool outputs.
const RAW_OUTPUT_PREFIX: &str = "000";

const PEM_EXTENSION: &str = ".pem";

/// Signing request downloaded from the device console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningRequestArtifact {
    path: PathBuf,
}

impl SigningRequestArtifact {
    /// File name for a request downloaded at `at`.
    pub fn file_name(at: SystemTime) -> String {
        let timestamp = at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        format!("{CSR_PREFIX}{timestamp}{PEM_EXTENSION}")
    }

    /// Persist `content` under a timestamped name in `work_dir`.
    pub fn write(work_dir: &Path, content: &[u8], at: SystemTime) -> Result<Self> {
        std::fs::create_dir_all(work_dir)?;
        let path = work_dir.join(Self::file_name(at));
        std::fs::write(&path, content)?;
        info!("CSR saved to: {}", path.display());
        Ok(Self { path })
    }

    /// Location of the request file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Issued certificate and chain, under their stable names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedArtifactPair {
    /// Leaf certificate.
    pub cert: PathBuf,
    /// Full chain uploaded to the device.
    pub chain: PathBuf,
}

impl IssuedArtifactPair {
    /// Create a pair from explicit paths.
    pub fn new(cert: impl Into<PathBuf>, chain: impl Into<PathBuf>) -> Self {
        Self {
            cert: cert.into(),
            chain: chain.into(),
        }
    }

    /// Paths of the pair that do not exist.
    pub fn missing(&self) -> Vec<PathBuf> {
        [&self.cert, &self.chain]
            .into_iter()
            .filter(|p| !p.is_file())
            .cloned()
            .collect()
    }

    /// Fail with a precondition error unless both files exist.
    pub fn ensure_present(&self) -> Result<()> {
        let missing = self.missing();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(RenewError::precondition(missing))
        }
    }

    /// Parse the issued leaf certificate.
    pub fn certificate(&self) -> Result<CertificateRecord> {
        let pem = std::fs::read(&self.cert)?;
        let certs = parse_pem_certificates(&pem)?;
        CertificateRecord::from_der(certs[0].as_ref())
    }

    /// Log the issued certificate's subject and validity, if readable.
    pub fn log_summary(&self) {
        match self.certificate() {
            Ok(record) => info!(
                "Issued certificate '{}' valid until {}",
                record.subject,
                format_time(record.not_after)
            ),
            Err(e) => warn!("Could not inspect {}: {}", self.cert.display(), e),
        }
    }
}

/// Rename every raw `000*.pem` issuance output in `work_dir` to the
/// `issued_` prefix.
///
/// Individual rename failures are logged and skipped. Returns the new paths.
pub fn promote_issued_outputs(work_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut promoted = Vec::new();

    for entry in std::fs::read_dir(work_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !(name.starts_with(RAW_OUTPUT_PREFIX) && name.ends_with(PEM_EXTENSION)) {
            continue;
        }

        let src = entry.path();
        let dst = work_dir.join(format!("{ISSUED_PREFIX}{name}"));
        match std::fs::rename(&src, &dst) {
            Ok(()) => {
                info!("Moved {} to {}", name, dst.display());
                promoted.push(dst);
            }
            Err(e) => warn!("Failed to move {}: {}", name, e),
        }
    }

    promoted.sort();
    Ok(promoted)
}

/// Returns true if `name` is a certificate artifact this tool creates.
pub fn is_certificate_artifact(name: &str) -> bool {
    name.ends_with(PEM_EXTENSION)
        && (name.starts_with(CSR_PREFIX)
            || name.starts_with(ISSUED_PREFIX)
            || name.starts_with(|c: char| c.is_ascii_digit()))
}

/// Result of an artifact cleanup.
#[derive(Debug, Default)]
pub struct CleanupReport {
    /// Files deleted.
    pub removed: Vec<PathBuf>,
    /// Files that could not be deleted, with the reason.
    pub failed: Vec<(PathBuf, String)>,
}

impl CleanupReport {
    /// Returns true if every deletion succeeded.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Delete every certificate artifact in `work_dir`.
///
/// Deletions are independent: a failure is logged and the rest proceed.
pub fn remove_artifacts(work_dir: &Path) -> CleanupReport {
    let mut report = CleanupReport::default();

    let entries = match std::fs::read_dir(work_dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Failed to list {}: {}", work_dir.display(), e);
            report
                .failed
                .push((work_dir.to_path_buf(), e.to_string()));
            return report;
        }
    };

    for entry in entries.flatten() {
        let name = entry.file_name();
        let is_artifact = name.to_str().is_some_and(is_certificate_artifact);
        if !is_artifact {
            continue;
        }

        let path = entry.path();
        match std::fs::remove_file(&path) {
            Ok(()) => {
                info!("Deleted {}", path.display());
                report.removed.push(path);
            }
            Err(e) => {
                warn!("Failed to delete {}: {}", path.display(), e);
                report.failed.push((path, e.to_string()));
            }
        }
    }

    report
}
