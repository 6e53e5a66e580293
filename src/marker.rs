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

//! Persisted invalid-certificate marker and the trust posture it carries.
//!
//! Within one process the relaxed-trust decision travels as a
//! [`TrustPosture`] value. The marker exists for the case where the issuance
//! and installation stages run as separate invocations: its presence means
//! the most recent probe could not establish a valid certificate, so the
//! next stage must relax trust validation.
//!
//! The file holds a small versioned JSON record:
//!
//! ```json
//! {"version":1,"trust_relaxed":true,"reason":"connection refused","recorded_at":1760000000}
//! ```
//!
//! Content that does not decode (such as a bare touch-file) still counts as
//! present.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{RenewError, Result};

/// Current marker record version.
pub const MARKER_VERSION: u32 = 1;

/// Whether console sessions must tolerate an untrusted device certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrustPosture {
    /// Validate the device certificate normally.
    #[default]
    Strict,
    /// Ignore certificate trust errors.
    Relaxed,
}

impl TrustPosture {
    /// Relax the posture if `condition` holds. Never tightens.
    pub fn relax_if(self, condition: bool) -> Self {
        if condition {
            Self::Relaxed
        } else {
            self
        }
    }

    /// Returns true if trust errors must be ignored.
    pub fn is_relaxed(self) -> bool {
        matches!(self, Self::Relaxed)
    }
}

impl fmt::Display for TrustPosture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::Relaxed => write!(f, "relaxed"),
        }
    }
}

/// Decoded marker content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerRecord {
    /// Record format version.
    pub version: u32,
    /// Always true when written. Readers relax on presence alone.
    pub trust_relaxed: bool,
    /// Why the marker was written.
    pub reason: String,
    /// Unix timestamp of the write.
    pub recorded_at: u64,
}

impl MarkerRecord {
    fn new(reason: impl Into<String>) -> Self {
        let recorded_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self {
            version: MARKER_VERSION,
            trust_relaxed: true,
            reason: reason.into(),
            recorded_at,
        }
    }

    fn unrecognized() -> Self {
        Self {
            version: 0,
            trust_relaxed: true,
            reason: "unrecognized marker content".to_string(),
            recorded_at: 0,
        }
    }
}

/// Filesystem flag carrying the relaxed-trust decision across invocations.
#[derive(Debug, Clone)]
pub struct InvalidCertMarker {
    path: PathBuf,
}

impl InvalidCertMarker {
    /// Create a marker handle at `path`. Nothing is touched on disk.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the marker file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if the marker file exists.
    pub fn is_present(&self) -> bool {
        self.path.exists()
    }

    /// Read the marker record, if present.
    pub fn read(&self) -> Result<Option<MarkerRecord>> {
        let content = match std::fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(RenewError::marker(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        match serde_json::from_slice::<MarkerRecord>(&content) {
            Ok(record) => {
                if record.version > MARKER_VERSION {
                    warn!(
                        "Marker {} has newer version {}, treating as present",
                        self.path.display(),
                        record.version
                    );
                }
                Ok(Some(record))
            }
            Err(e) => {
                debug!("Marker {} did not decode ({}), treating as present", self.path.display(), e);
                Ok(Some(MarkerRecord::unrecognized()))
            }
        }
    }

    /// Trust posture implied by the marker.
    ///
    /// Any marker file relaxes trust, whatever its content.
    pub fn posture(&self) -> TrustPosture {
        match self.read() {
            Ok(Some(_)) => TrustPosture::Relaxed,
            Ok(None) => TrustPosture::Strict,
            Err(e) => {
                warn!("{}", e);
                TrustPosture::Relaxed
            }
        }
    }

    /// Write the marker, replacing any previous record.
    pub fn persist(&self, reason: impl Into<String>) -> Result<()> {
        let record = MarkerRecord::new(reason);
        let json = serde_json::to_vec(&record)
            .map_err(|e| RenewError::marker(format!("Failed to encode marker: {}", e)))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json)
            .and_then(|_| std::fs::rename(&tmp, &self.path))
            .map_err(|e| {
                RenewError::marker(format!("Failed to write {}: {}", self.path.display(), e))
            })?;

        debug!("Persisted marker {}", self.path.display());
        Ok(())
    }

    /// Remove the marker. Returns whether a file was removed.
    ///
    /// Absence is not an error.
    pub fn clear(&self) -> Result<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Removed marker {}", self.path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(RenewError::marker(format!(
                "Failed to remove {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    /// Write the marker, logging instead of failing.
    pub fn persist_or_warn(&self, reason: impl Into<String>) {
        if let Err(e) = self.persist(reason) {
            warn!("{}", e);
        }
    }

    /// Remove the marker, logging instead of failing.
    pub fn clear_or_warn(&self) {
        if let Err(e) = self.clear() {
            warn!("Failed to clean up marker file: {}", e);
        }
    }
}
