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

//! TOML configuration file format.
//!
//! ```toml
//! [device]
//! url = "https://printer.example.com"
//! pin = "${PRINTER_PIN}"
//!
//! [renewal]
//! threshold_days = 30
//! work_dir = "/var/lib/printer-cert-renew"
//!
//! [issuance]
//! email = "admin@example.com"
//! certbot_path = "/usr/bin/certbot"
//! dns_credentials_path = "/etc/printer-cert-renew/cloudflare.ini"
//!
//! [console]
//! webdriver_url = "http://localhost:9515"
//! download_timeout_secs = 30
//!
//! [probe]
//! port = 443
//! timeout_secs = 5
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::expand::expand_variables;
use super::{RenewConfig, RenewConfigBuilder};
use crate::error::{RenewError, Result};

/// Complete configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Target device.
    pub device: DeviceSection,

    /// Renewal policy and local state.
    #[serde(default)]
    pub renewal: RenewalSection,

    /// External issuance tool.
    pub issuance: IssuanceSection,

    /// Console automation.
    #[serde(default)]
    pub console: ConsoleSection,

    /// Expiration probe.
    #[serde(default)]
    pub probe: ProbeSection,
}

/// Target device section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceSection {
    /// Console URL.
    pub url: String,
    /// Console PIN, usually a `${VAR}` reference.
    pub pin: String,
}

/// Renewal section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenewalSection {
    /// Days before expiration to trigger renewal.
    #[serde(default)]
    pub threshold_days: Option<u32>,
    /// Directory for the marker and artifacts.
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
    /// Marker file location.
    #[serde(default)]
    pub marker_file: Option<PathBuf>,
}

/// Issuance section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IssuanceSection {
    /// Contact email.
    pub email: String,
    /// Issuance tool binary.
    #[serde(default)]
    pub certbot_path: Option<PathBuf>,
    /// DNS-challenge credential file.
    #[serde(default)]
    pub dns_credentials_path: Option<PathBuf>,
    /// Renamed certificate file name.
    #[serde(default)]
    pub cert_file: Option<String>,
    /// Renamed chain file name.
    #[serde(default)]
    pub chain_file: Option<String>,
}

/// Console automation section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConsoleSection {
    /// WebDriver endpoint.
    #[serde(default)]
    pub webdriver_url: Option<String>,
    /// Run the browser headless.
    #[serde(default)]
    pub headless: Option<bool>,
    /// Firmware profile name.
    #[serde(default)]
    pub firmware_profile: Option<String>,
    /// Download timeout in seconds.
    #[serde(default)]
    pub download_timeout_secs: Option<u64>,
    /// Element wait timeout in seconds.
    #[serde(default)]
    pub element_timeout_secs: Option<u64>,
}

/// Probe section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProbeSection {
    /// TLS port.
    #[serde(default)]
    pub port: Option<u16>,
    /// Connect/handshake timeout in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Extra PEM trust anchors.
    #[serde(default)]
    pub ca_bundle_path: Option<PathBuf>,
}

impl FileConfig {
    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or missing required fields.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| RenewError::config(format!("Invalid TOML: {e}")))
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| RenewError::config(format!("TOML serialize: {e}")))
    }

    /// Expand `${VAR}` references in every string and path value.
    pub fn expand_variables<F>(&mut self, lookup: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let expand_path = |path: &mut PathBuf| {
            let expanded = expand_variables(&path.to_string_lossy(), lookup);
            *path = PathBuf::from(expanded);
        };

        self.device.url = expand_variables(&self.device.url, lookup);
        self.device.pin = expand_variables(&self.device.pin, lookup);
        self.issuance.email = expand_variables(&self.issuance.email, lookup);

        if let Some(ref mut dir) = self.renewal.work_dir {
            expand_path(dir);
        }
        if let Some(ref mut path) = self.renewal.marker_file {
            expand_path(path);
        }
        if let Some(ref mut path) = self.issuance.certbot_path {
            expand_path(path);
        }
        if let Some(ref mut path) = self.issuance.dns_credentials_path {
            expand_path(path);
        }
        if let Some(ref mut url) = self.console.webdriver_url {
            *url = expand_variables(url, lookup);
        }
        if let Some(ref mut path) = self.probe.ca_bundle_path {
            expand_path(path);
        }
    }

    /// Convert to a validated [`RenewConfig`].
    pub fn into_renew_config(self) -> Result<RenewConfig> {
        let mut builder = RenewConfigBuilder::new()
            .device_url(&self.device.url)?
            .pin(self.device.pin)
            .email(self.issuance.email);

        if let Some(days) = self.renewal.threshold_days {
            builder = builder.threshold_days(days);
        }
        if let Some(dir) = self.renewal.work_dir {
            builder = builder.work_dir(dir);
        }
        if let Some(path) = self.renewal.marker_file {
            builder = builder.marker_file(path);
        }
        if let Some(path) = self.issuance.certbot_path {
            builder = builder.certbot_path(path);
        }
        if let Some(path) = self.issuance.dns_credentials_path {
            builder = builder.dns_credentials_path(path);
        }
        if self.issuance.cert_file.is_some() || self.issuance.chain_file.is_some() {
            builder = builder.artifact_names(
                self.issuance
                    .cert_file
                    .unwrap_or_else(|| super::DEFAULT_CERT_FILE.to_string()),
                self.issuance
                    .chain_file
                    .unwrap_or_else(|| super::DEFAULT_CHAIN_FILE.to_string()),
            );
        }
        if let Some(url) = self.console.webdriver_url {
            builder = builder.webdriver_url(url)?;
        }
        if let Some(headless) = self.console.headless {
            builder = builder.headless(headless);
        }
        if let Some(name) = self.console.firmware_profile {
            builder = builder.firmware_profile(name);
        }
        if let Some(secs) = self.console.download_timeout_secs {
            builder = builder.download_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.console.element_timeout_secs {
            builder = builder.element_timeout(Duration::from_secs(secs));
        }
        if let Some(port) = self.probe.port {
            builder = builder.probe_port(port);
        }
        if let Some(secs) = self.probe.timeout_secs {
            builder = builder.probe_timeout(Duration::from_secs(secs));
        }
        if let Some(path) = self.probe.ca_bundle_path {
            builder = builder.ca_bundle_path(path);
        }

        builder.build()
    }
}
