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

//! Configuration for a renewal run.
//!
//! [`RenewConfig`] is the explicit configuration struct passed into every
//! stage. It is built either programmatically through
//! [`RenewConfig::builder`], from environment variables, or from a TOML file
//! via [`ConfigLoader`].
//!
//! # Example
//!
//! ```
//! use printer_cert_renew::RenewConfig;
//!
//! let config = RenewConfig::builder()
//!     .device_url("https://printer.example.com")?
//!     .pin("12345678")
//!     .email("admin@example.com")
//!     .threshold_days(21)
//!     .build()?;
//!
//! assert_eq!(config.device_host()?, "printer.example.com");
//! # Ok::<(), printer_cert_renew::RenewError>(())
//! ```

mod expand;
mod file;
mod loader;

pub use expand::expand_variables;
pub use file::FileConfig;
pub use loader::{env_vars, ConfigLoader};

use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

use crate::error::{RenewError, Result};

/// Default renewal threshold in days.
pub const DEFAULT_THRESHOLD_DAYS: u32 = 30;

/// Default time to wait for the signing-request download.
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Default time to wait for a console element to resolve.
pub const DEFAULT_ELEMENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connect/handshake timeout for the expiration probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default TLS port probed on the device.
pub const DEFAULT_PROBE_PORT: u16 = 443;

/// Default marker file name, relative to the work directory.
pub const DEFAULT_MARKER_FILE: &str = "cert_invalid.flag";

/// Default issuance tool binary.
pub const DEFAULT_CERTBOT_PATH: &str = "/usr/bin/certbot";

/// Default DNS-challenge credential file.
pub const DEFAULT_DNS_CREDENTIALS_PATH: &str = "/etc/printer-cert-renew/cloudflare.ini";

/// Default WebDriver endpoint (chromedriver).
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";

/// Default name of the renamed certificate file.
pub const DEFAULT_CERT_FILE: &str = "issued_0000_cert.pem";

/// Default name of the renamed chain file.
pub const DEFAULT_CHAIN_FILE: &str = "issued_0001_chain.pem";

/// Default console firmware profile.
pub const DEFAULT_FIRMWARE_PROFILE: &str = "officejet-pro-9100";

/// Configuration for one device and its renewal cycle.
#[derive(Clone)]
pub struct RenewConfig {
    /// Administrative console URL (e.g., "https://printer.example.com").
    pub device_url: Url,

    /// Console PIN.
    pub pin: String,

    /// Contact email handed to the issuance tool.
    pub email: String,

    /// Renew when fewer than this many days of validity remain.
    pub threshold_days: u32,

    /// Directory holding the marker and every certificate artifact.
    pub work_dir: PathBuf,

    /// Marker file location, relative paths resolve against `work_dir`.
    pub marker_file: PathBuf,

    /// TLS port probed on the device. Defaults to the device URL's port.
    pub probe_port: u16,

    /// Connect and handshake timeout for the probe.
    pub probe_timeout: Duration,

    /// Extra PEM trust anchors accepted by the probe besides the Mozilla roots.
    pub ca_bundle_path: Option<PathBuf>,

    /// WebDriver endpoint used to launch console sessions.
    pub webdriver_url: Url,

    /// Run the browser without a window.
    pub headless: bool,

    /// Console firmware profile name, see [`crate::console::profile_by_name`].
    pub firmware_profile: String,

    /// Time to wait for the signing-request download.
    pub download_timeout: Duration,

    /// Time to wait for each console element.
    pub element_timeout: Duration,

    /// Issuance tool binary.
    pub certbot_path: PathBuf,

    /// DNS-challenge credential file passed to the issuance tool.
    pub dns_credentials_path: PathBuf,

    /// File name of the issued certificate after renaming.
    pub cert_file: String,

    /// File name of the issued chain after renaming.
    pub chain_file: String,
}

impl std::fmt::Debug for RenewConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenewConfig")
            .field("device_url", &self.device_url.as_str())
            .field("pin", &"<redacted>")
            .field("email", &self.email)
            .field("threshold_days", &self.threshold_days)
            .field("work_dir", &self.work_dir)
            .field("marker_file", &self.marker_file)
            .field("probe_port", &self.probe_port)
            .field("probe_timeout", &self.probe_timeout)
            .field("ca_bundle_path", &self.ca_bundle_path)
            .field("webdriver_url", &self.webdriver_url.as_str())
            .field("headless", &self.headless)
            .field("firmware_profile", &self.firmware_profile)
            .field("download_timeout", &self.download_timeout)
            .field("element_timeout", &self.element_timeout)
            .field("certbot_path", &self.certbot_path)
            .field("dns_credentials_path", &self.dns_credentials_path)
            .field("cert_file", &self.cert_file)
            .field("chain_file", &self.chain_file)
            .finish()
    }
}

impl RenewConfig {
    /// Create a new configuration builder.
    pub fn builder() -> RenewConfigBuilder {
        RenewConfigBuilder::new()
    }

    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    ///
    /// Tests pass a closure over a map instead of touching the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        loader::from_lookup(&lookup)
    }

    /// Hostname of the device, used for the probe and as the certificate domain.
    pub fn device_host(&self) -> Result<&str> {
        self.device_url.host_str().ok_or_else(|| {
            RenewError::config(format!(
                "Could not extract a hostname from device URL {}",
                self.device_url
            ))
        })
    }

    /// Absolute or work-dir-relative location of the marker record.
    pub fn marker_path(&self) -> PathBuf {
        self.resolve(&self.marker_file)
    }

    /// Location of the renamed certificate file.
    pub fn cert_path(&self) -> PathBuf {
        self.work_dir.join(&self.cert_file)
    }

    /// Location of the renamed chain file.
    pub fn chain_path(&self) -> PathBuf {
        self.work_dir.join(&self.chain_file)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.work_dir.join(path)
        }
    }

    /// Validate the configuration for completeness and consistency.
    ///
    /// # Errors
    ///
    /// Returns an error describing every validation failure.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        match self.device_url.scheme() {
            "https" | "http" => {}
            other => errors.push(format!("device URL must be http(s), got '{other}'")),
        }
        if self.device_url.host_str().is_none() {
            errors.push("device URL has no hostname".to_string());
        }
        if self.pin.is_empty() {
            errors.push("device PIN is required".to_string());
        }
        if !self.email.contains('@') {
            errors.push(format!("contact email '{}' is not an address", self.email));
        }
        if self.threshold_days == 0 {
            errors.push("threshold_days must be > 0".to_string());
        }
        if self.download_timeout.is_zero() {
            errors.push("download timeout must be > 0".to_string());
        }
        if crate::console::profile_by_name(&self.firmware_profile).is_none() {
            errors.push(format!(
                "unknown firmware profile '{}' (known: {})",
                self.firmware_profile,
                crate::console::PROFILE_NAMES.join(", ")
            ));
        }
        if self.cert_file.is_empty() || self.chain_file.is_empty() {
            errors.push("certificate and chain file names are required".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(RenewError::config(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Builder for [`RenewConfig`].
#[derive(Default)]
pub struct RenewConfigBuilder {
    device_url: Option<Url>,
    pin: Option<String>,
    email: Option<String>,
    threshold_days: Option<u32>,
    work_dir: Option<PathBuf>,
    marker_file: Option<PathBuf>,
    probe_port: Option<u16>,
    probe_timeout: Option<Duration>,
    ca_bundle_path: Option<PathBuf>,
    webdriver_url: Option<Url>,
    headless: Option<bool>,
    firmware_profile: Option<String>,
    download_timeout: Option<Duration>,
    element_timeout: Option<Duration>,
    certbot_path: Option<PathBuf>,
    dns_credentials_path: Option<PathBuf>,
    cert_file: Option<String>,
    chain_file: Option<String>,
}

impl RenewConfigBuilder {
    /// Create a new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the console URL.
    pub fn device_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        self.device_url = Some(Url::parse(url.as_ref())?);
        Ok(self)
    }

    /// Set the console PIN.
    pub fn pin(mut self, pin: impl Into<String>) -> Self {
        self.pin = Some(pin.into());
        self
    }

    /// Set the contact email.
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Set the renewal threshold in days.
    pub fn threshold_days(mut self, days: u32) -> Self {
        self.threshold_days = Some(days);
        self
    }

    /// Set the work directory.
    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    /// Set the marker file location.
    pub fn marker_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.marker_file = Some(path.into());
        self
    }

    /// Set the TLS port probed on the device.
    pub fn probe_port(mut self, port: u16) -> Self {
        self.probe_port = Some(port);
        self
    }

    /// Set the probe timeout.
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = Some(timeout);
        self
    }

    /// Accept the PEM certificates in this file as additional trust anchors.
    pub fn ca_bundle_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_bundle_path = Some(path.into());
        self
    }

    /// Set the WebDriver endpoint.
    pub fn webdriver_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        self.webdriver_url = Some(Url::parse(url.as_ref())?);
        Ok(self)
    }

    /// Run the browser with or without a window.
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = Some(headless);
        self
    }

    /// Select the console firmware profile.
    pub fn firmware_profile(mut self, name: impl Into<String>) -> Self {
        self.firmware_profile = Some(name.into());
        self
    }

    /// Set the download timeout.
    pub fn download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = Some(timeout);
        self
    }

    /// Set the element wait timeout.
    pub fn element_timeout(mut self, timeout: Duration) -> Self {
        self.element_timeout = Some(timeout);
        self
    }

    /// Set the issuance tool binary.
    pub fn certbot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.certbot_path = Some(path.into());
        self
    }

    /// Set the DNS-challenge credential file.
    pub fn dns_credentials_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.dns_credentials_path = Some(path.into());
        self
    }

    /// Set the renamed certificate and chain file names.
    pub fn artifact_names(mut self, cert: impl Into<String>, chain: impl Into<String>) -> Self {
        self.cert_file = Some(cert.into());
        self.chain_file = Some(chain.into());
        self
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL, PIN, or email is missing, or if
    /// validation fails.
    pub fn build(self) -> Result<RenewConfig> {
        let device_url = self
            .device_url
            .ok_or_else(|| RenewError::config("device_url is required"))?;
        let pin = self.pin.ok_or_else(|| RenewError::config("pin is required"))?;
        let email = self
            .email
            .ok_or_else(|| RenewError::config("email is required"))?;
        let webdriver_url = match self.webdriver_url {
            Some(url) => url,
            None => Url::parse(DEFAULT_WEBDRIVER_URL)?,
        };
        let probe_port = self
            .probe_port
            .or_else(|| device_url.port_or_known_default())
            .unwrap_or(DEFAULT_PROBE_PORT);

        let config = RenewConfig {
            device_url,
            pin,
            email,
            threshold_days: self.threshold_days.unwrap_or(DEFAULT_THRESHOLD_DAYS),
            work_dir: self.work_dir.unwrap_or_else(|| PathBuf::from(".")),
            marker_file: self
                .marker_file
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MARKER_FILE)),
            probe_port,
            probe_timeout: self.probe_timeout.unwrap_or(DEFAULT_PROBE_TIMEOUT),
            ca_bundle_path: self.ca_bundle_path,
            webdriver_url,
            headless: self.headless.unwrap_or(true),
            firmware_profile: self
                .firmware_profile
                .unwrap_or_else(|| DEFAULT_FIRMWARE_PROFILE.to_string()),
            download_timeout: self.download_timeout.unwrap_or(DEFAULT_DOWNLOAD_TIMEOUT),
            element_timeout: self.element_timeout.unwrap_or(DEFAULT_ELEMENT_TIMEOUT),
            certbot_path: self
                .certbot_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CERTBOT_PATH)),
            dns_credentials_path: self
                .dns_credentials_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DNS_CREDENTIALS_PATH)),
            cert_file: self
                .cert_file
                .unwrap_or_else(|| DEFAULT_CERT_FILE.to_string()),
            chain_file: self
                .chain_file
                .unwrap_or_else(|| DEFAULT_CHAIN_FILE.to_string()),
        };

        config.validate()?;
        Ok(config)
    }
}
