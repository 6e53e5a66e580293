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

//! Renewal cycle orchestration.
//!
//! A cycle runs two stages:
//!
//! 1. **Issue**: probe the device, decide, extract a signing request, have it
//!    signed, and promote the outputs to their stable names.
//! 2. **Install**: upload the chain through the console and clean up.
//!
//! In one process the trust posture chosen during issue is handed to install
//! directly. When the stages run as separate invocations
//! ([`Renewer::begin_issue`] then [`Renewer::finish_install`]), the
//! invalid-certificate marker carries it instead. Either way the marker is
//! gone once both stages have been attempted.
//!
//! # Example
//!
//! ```no_run
//! use printer_cert_renew::orchestrator::{Renewer, RunOptions};
//! use printer_cert_renew::RenewConfig;
//!
//! # async fn example() -> printer_cert_renew::Result<()> {
//! let config = RenewConfig::from_env()?;
//! let renewer = Renewer::from_config(config)?;
//! let outcome = renewer.run_cycle(&RunOptions::default()).await?;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

use std::time::SystemTime;

use tracing::{error, info, warn};

use crate::artifacts::{promote_issued_outputs, IssuedArtifactPair};
use crate::config::RenewConfig;
use crate::console::{profile_by_name, ConsoleLauncher, FirmwareProfile};
use crate::error::{RenewError, Result};
use crate::extraction::CsrExtractionAutomaton;
use crate::gate::{RenewalDecision, RenewalGate};
use crate::installation::InstallationAutomaton;
use crate::issuance::{IssuanceClient, IssuanceRequest};
use crate::marker::{InvalidCertMarker, TrustPosture};
use crate::probe::{CertificateSource, ExpirationProbe, ProbeReport};

/// Command-line modifiers for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Ask the CA's staging environment.
    pub staging: bool,
    /// Relax trust validation regardless of the probe.
    pub force_insecure: bool,
    /// Skip the probe and renew unconditionally.
    pub force_new: bool,
}

/// Result of the issue stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueOutcome {
    /// No renewal was due.
    Skipped {
        /// Remaining whole days of the current certificate.
        remaining_days: i64,
    },
    /// A certificate was issued.
    Issued {
        /// Renamed certificate and chain.
        pair: IssuedArtifactPair,
        /// Posture the install stage must use.
        trust: TrustPosture,
    },
}

/// Result of a complete cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No renewal was due.
    Skipped {
        /// Remaining whole days of the current certificate.
        remaining_days: i64,
    },
    /// A new certificate was issued and installed.
    Renewed {
        /// Posture used for the console sessions.
        trust: TrustPosture,
    },
}

/// Result of a read-only check.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    /// Probe result.
    pub report: ProbeReport,
    /// Gate decision.
    pub decision: RenewalDecision,
}

/// Runs renewal stages for one device.
pub struct Renewer {
    config: RenewConfig,
    marker: InvalidCertMarker,
    source: Box<dyn CertificateSource>,
    launcher: Box<dyn ConsoleLauncher>,
    issuer: Box<dyn IssuanceClient>,
    profile: Box<dyn FirmwareProfile>,
}

impl Renewer {
    /// Create a renewer from explicit collaborators.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured firmware profile is unknown.
    pub fn new(
        config: RenewConfig,
        source: Box<dyn CertificateSource>,
        launcher: Box<dyn ConsoleLauncher>,
        issuer: Box<dyn IssuanceClient>,
    ) -> Result<Self> {
        let profile = profile_by_name(&config.firmware_profile).ok_or_else(|| {
            RenewError::config(format!(
                "unknown firmware profile '{}'",
                config.firmware_profile
            ))
        })?;
        let marker = InvalidCertMarker::new(config.marker_path());

        Ok(Self {
            config,
            marker,
            source,
            launcher,
            issuer,
            profile,
        })
    }

    /// Create a renewer with the production probe, WebDriver console, and
    /// certbot issuance.
    #[cfg(feature = "webdriver")]
    pub fn from_config(config: RenewConfig) -> Result<Self> {
        use crate::console::webdriver::WebDriverLauncher;
        use crate::issuance::CertbotClient;
        use crate::probe::TlsCertificateSource;

        let source = TlsCertificateSource::new(
            config.probe_port,
            config.probe_timeout,
            config.ca_bundle_path.as_deref(),
        )?;
        let launcher = WebDriverLauncher::from_config(&config);
        let issuer = CertbotClient::from_config(&config);

        Self::new(
            config,
            Box::new(source),
            Box::new(launcher),
            Box::new(issuer),
        )
    }

    /// Configuration in use.
    pub fn config(&self) -> &RenewConfig {
        &self.config
    }

    /// The invalid-certificate marker.
    pub fn marker(&self) -> &InvalidCertMarker {
        &self.marker
    }

    /// Probe the device and decide, without touching the console.
    ///
    /// Only the marker may change: written on a failed probe, cleared on a
    /// skip.
    pub async fn check(&self, options: &RunOptions) -> Result<CheckOutcome> {
        let host = self.config.device_host()?;
        let report = ExpirationProbe::new(self.source.as_ref(), &self.marker)
            .probe(host)
            .await;
        let decision = RenewalGate::new(self.config.threshold_days, &self.marker)
            .evaluate(report.remaining_days(SystemTime::now()), options.force_new);
        Ok(CheckOutcome { report, decision })
    }

    /// Run the issue stage.
    pub async fn issue(&self, options: &RunOptions) -> Result<IssueOutcome> {
        let host = self.config.device_host()?;
        let mut trust = self
            .marker
            .posture()
            .relax_if(options.force_insecure);

        let remaining_days = if options.force_new {
            info!("Forced renewal requested, skipping certificate check");
            None
        } else {
            let report = ExpirationProbe::new(self.source.as_ref(), &self.marker)
                .probe(host)
                .await;
            if !report.is_trusted() {
                warn!("Certificate check failed. Relaxing console trust validation.");
            }
            trust = trust.relax_if(!report.is_trusted());
            report.remaining_days(SystemTime::now())
        };

        let gate = RenewalGate::new(self.config.threshold_days, &self.marker);
        if let RenewalDecision::Skip { remaining_days } =
            gate.evaluate(remaining_days, options.force_new)
        {
            return Ok(IssueOutcome::Skipped { remaining_days });
        }

        let csr = CsrExtractionAutomaton::new(
            self.launcher.as_ref(),
            self.profile.as_ref(),
            &self.config,
        )
        .extract(trust)
        .await?;

        let request = IssuanceRequest::from_config(&self.config, csr.path(), options.staging)?;
        if let Err(e) = self.issuer.issue(&request, &self.config.work_dir).await {
            error!("Certificate issuance failed: {}", e);
            return Err(e);
        }

        promote_issued_outputs(&self.config.work_dir)?;
        let pair = IssuedArtifactPair::new(self.config.cert_path(), self.config.chain_path());
        pair.log_summary();

        Ok(IssueOutcome::Issued { pair, trust })
    }

    /// Posture for an install stage run on its own: relaxed if forced or if
    /// the marker is present.
    pub fn install_posture(&self, options: &RunOptions) -> TrustPosture {
        self.marker.posture().relax_if(options.force_insecure)
    }

    /// Run the install stage.
    pub async fn install(&self, trust: TrustPosture) -> Result<()> {
        InstallationAutomaton::new(
            self.launcher.as_ref(),
            self.profile.as_ref(),
            &self.config,
        )
        .install(trust)
        .await
    }

    /// Run the issue stage as the first half of a split cycle.
    ///
    /// A failure ends the cycle here since install will not follow, so the
    /// marker is cleared. On success it stays for [`Renewer::finish_install`].
    pub async fn begin_issue(&self, options: &RunOptions) -> Result<IssueOutcome> {
        let result = self.issue(options).await;
        if result.is_err() {
            self.marker.clear_or_warn();
        }
        result
    }

    /// Run the install stage as the second half of a split cycle, taking the
    /// posture from the marker and clearing it afterwards whatever happened.
    pub async fn finish_install(&self, options: &RunOptions) -> Result<TrustPosture> {
        let trust = self.install_posture(options);
        let result = self.install(trust).await;
        self.marker.clear_or_warn();
        result.map(|()| trust)
    }

    /// Run issue then install, and clear the marker whatever happened.
    pub async fn run_cycle(&self, options: &RunOptions) -> Result<CycleOutcome> {
        let result = self.cycle(options).await;
        self.marker.clear_or_warn();
        result
    }

    async fn cycle(&self, options: &RunOptions) -> Result<CycleOutcome> {
        match self.issue(options).await? {
            IssueOutcome::Skipped { remaining_days } => {
                Ok(CycleOutcome::Skipped { remaining_days })
            }
            IssueOutcome::Issued { trust, .. } => {
                self.install(trust).await?;
                Ok(CycleOutcome::Renewed { trust })
            }
        }
    }
}
