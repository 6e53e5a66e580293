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

//! Signing request extraction from the device console.
//!
//! The device generates its own key pair; only the signing request leaves
//! it. Extraction signs in, walks the signing-request wizard, and saves the
//! download as `csr_<unix-seconds>.pem` in the work directory.

use std::time::SystemTime;

use tracing::{error, info};

use crate::artifacts::SigningRequestArtifact;
use crate::config::RenewConfig;
use crate::console::{ConsoleLauncher, DeviceConsole, FirmwareProfile};
use crate::error::Result;
use crate::marker::TrustPosture;

/// Drives the console to produce a signing request.
pub struct CsrExtractionAutomaton<'a> {
    launcher: &'a dyn ConsoleLauncher,
    profile: &'a dyn FirmwareProfile,
    config: &'a RenewConfig,
}

impl<'a> CsrExtractionAutomaton<'a> {
    /// Create an automaton for the device described by `config`.
    pub fn new(
        launcher: &'a dyn ConsoleLauncher,
        profile: &'a dyn FirmwareProfile,
        config: &'a RenewConfig,
    ) -> Self {
        Self {
            launcher,
            profile,
            config,
        }
    }

    /// Extract a signing request.
    ///
    /// Any step failure aborts the run and closes the session best-effort.
    /// Nothing is written unless the download completes.
    pub async fn extract(&self, trust: TrustPosture) -> Result<SigningRequestArtifact> {
        info!("Starting CSR extraction from {}", self.config.device_url);

        let mut console = DeviceConsole::open(
            self.launcher,
            self.profile,
            self.config.device_url.clone(),
            trust,
        )
        .await?;

        let csr = match self.drive(&mut console).await {
            Ok(csr) => csr,
            Err(e) => {
                error!("CSR extraction failed: {}", e);
                console.abandon().await;
                return Err(e);
            }
        };

        console.close().await?;
        Ok(csr)
    }

    async fn drive(&self, console: &mut DeviceConsole<'_>) -> Result<SigningRequestArtifact> {
        console.authenticate(&self.config.pin).await?;
        let content = console
            .request_signing_request(self.config.download_timeout)
            .await?;
        SigningRequestArtifact::write(&self.config.work_dir, &content, SystemTime::now())
    }
}
