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

//! Identity certificate installation through the device console.

use tracing::{error, info, warn};

use crate::artifacts::{remove_artifacts, IssuedArtifactPair};
use crate::config::RenewConfig;
use crate::console::{ConsoleLauncher, DeviceConsole, FirmwareProfile};
use crate::error::Result;
use crate::marker::TrustPosture;

/// Uploads the issued chain to the device and cleans local artifacts.
pub struct InstallationAutomaton<'a> {
    launcher: &'a dyn ConsoleLauncher,
    profile: &'a dyn FirmwareProfile,
    config: &'a RenewConfig,
}

impl<'a> InstallationAutomaton<'a> {
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

    /// The configured certificate and chain.
    pub fn artifacts(&self) -> IssuedArtifactPair {
        IssuedArtifactPair::new(self.config.cert_path(), self.config.chain_path())
    }

    /// Install the issued identity certificate.
    ///
    /// Fails before launching a browser if either artifact is missing.
    /// Otherwise the work directory is cleaned whether or not the console
    /// stage succeeds, and the console error, if any, is returned afterwards.
    pub async fn install(&self, trust: TrustPosture) -> Result<()> {
        let pair = self.artifacts();
        if let Err(e) = pair.ensure_present() {
            error!("{}", e);
            return Err(e);
        }
        info!(
            "Installing certificate {} with chain {}",
            pair.cert.display(),
            pair.chain.display()
        );

        let result = self.upload(&pair, trust).await;
        match &result {
            Ok(()) => info!("Certificate installed successfully."),
            Err(e) => error!("Certificate installation failed: {}", e),
        }

        info!("Cleaning up certificate artifacts...");
        let report = remove_artifacts(&self.config.work_dir);
        if !report.is_clean() {
            warn!(
                "{} artifact(s) could not be removed from {}",
                report.failed.len(),
                self.config.work_dir.display()
            );
        }

        result
    }

    async fn upload(&self, pair: &IssuedArtifactPair, trust: TrustPosture) -> Result<()> {
        let mut console = DeviceConsole::open(
            self.launcher,
            self.profile,
            self.config.device_url.clone(),
            trust,
        )
        .await?;

        let driven = async {
            console.authenticate(&self.config.pin).await?;
            console.install_identity(&pair.chain).await
        }
        .await;

        match driven {
            Ok(()) => console.close().await,
            Err(e) => {
                console.abandon().await;
                Err(e)
            }
        }
    }
}
