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

use std::path::{Path, PathBuf};

use super::file::FileConfig;
use super::{RenewConfig, RenewConfigBuilder};
use crate::error::{RenewError, Result};

/// Environment variable names read by [`RenewConfig::from_env`].
pub mod env_vars {
    /// Console URL (required).
    pub const PRINTER_URL: &str = "PRINTER_URL";
    /// Console PIN (required).
    pub const PRINTER_PIN: &str = "PRINTER_PIN";
    /// Contact email (required).
    pub const CERTBOT_EMAIL: &str = "CERTBOT_EMAIL";
    /// Renewal threshold in days.
    pub const RENEWAL_THRESHOLD_DAYS: &str = "RENEWAL_THRESHOLD_DAYS";
    /// Work directory.
    pub const WORK_DIR: &str = "PRINTER_CERT_WORK_DIR";
    /// WebDriver endpoint.
    pub const WEBDRIVER_URL: &str = "WEBDRIVER_URL";
    /// Issuance tool binary.
    pub const CERTBOT_PATH: &str = "CERTBOT_PATH";
    /// DNS-challenge credential file.
    pub const DNS_CREDENTIALS_PATH: &str = "DNS_CREDENTIALS_PATH";
    /// Configuration file path, used when no explicit path is given.
    pub const CONFIG_PATH: &str = "PRINTER_CERT_RENEW_CONFIG";
}

pub(super) fn from_lookup<F>(lookup: &F) -> Result<RenewConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let required = [
        env_vars::PRINTER_URL,
        env_vars::PRINTER_PIN,
        env_vars::CERTBOT_EMAIL,
    ];
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|name| lookup(name).map_or(true, |v| v.is_empty()))
        .collect();
    if !missing.is_empty() {
        return Err(RenewError::config(format!(
            "Missing required environment variables: {}",
            missing.join(", ")
        )));
    }

    let mut builder = RenewConfigBuilder::new()
        .device_url(lookup(env_vars::PRINTER_URL).unwrap_or_default())?
        .pin(lookup(env_vars::PRINTER_PIN).unwrap_or_default())
        .email(lookup(env_vars::CERTBOT_EMAIL).unwrap_or_default());

    if let Some(raw) = lookup(env_vars::RENEWAL_THRESHOLD_DAYS) {
        let days = raw.trim().parse::<u32>().map_err(|e| {
            RenewError::config(format!(
                "{} must be a whole number of days, got '{raw}': {e}",
                env_vars::RENEWAL_THRESHOLD_DAYS
            ))
        })?;
        builder = builder.threshold_days(days);
    }
    if let Some(dir) = lookup(env_vars::WORK_DIR) {
        builder = builder.work_dir(dir);
    }
    if let Some(url) = lookup(env_vars::WEBDRIVER_URL) {
        builder = builder.webdriver_url(url)?;
    }
    if let Some(path) = lookup(env_vars::CERTBOT_PATH) {
        builder = builder.certbot_path(path);
    }
    if let Some(path) = lookup(env_vars::DNS_CREDENTIALS_PATH) {
        builder = builder.dns_credentials_path(path);
    }

    builder.build()
}

/// Configuration loader with source precedence.
///
/// # Sources
///
/// 1. Explicit TOML file (if set via `with_path()`)
/// 2. TOML file named by `PRINTER_CERT_RENEW_CONFIG`
/// 3. Environment variables (`PRINTER_URL`, `PRINTER_PIN`, `CERTBOT_EMAIL`, ...)
///
/// # Example
///
/// ```no_run
/// use printer_cert_renew::config::ConfigLoader;
///
/// let config = ConfigLoader::new()
///     .with_path("/etc/printer-cert-renew/config.toml")
///     .load()?;
/// # Ok::<(), printer_cert_renew::RenewError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    explicit_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a loader that falls back to the environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read configuration from this TOML file instead of the environment.
    pub fn with_path(mut self, path: impl AsRef<Path>) -> Self {
        self.explicit_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Load configuration from the process environment and filesystem.
    pub fn load(&self) -> Result<RenewConfig> {
        self.load_with(|name| std::env::var(name).ok())
    }

    /// Load configuration using `lookup` for every environment access.
    pub fn load_with<F>(&self, lookup: F) -> Result<RenewConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = self
            .explicit_path
            .clone()
            .or_else(|| lookup(env_vars::CONFIG_PATH).map(PathBuf::from));

        match path {
            Some(path) => {
                tracing::debug!("Loading configuration from {}", path.display());
                let content = std::fs::read_to_string(&path).map_err(|e| {
                    RenewError::config(format!("Failed to read {}: {e}", path.display()))
                })?;
                Self::load_from_str(&content, &lookup)
            }
            None => {
                tracing::debug!("Loading configuration from environment");
                from_lookup(&lookup)
            }
        }
    }

    /// Load configuration from a TOML string, expanding `${VAR}` references.
    pub fn load_from_str<F>(toml_content: &str, lookup: &F) -> Result<RenewConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut file = FileConfig::from_toml(toml_content)?;
        file.expand_variables(lookup);
        file.into_renew_config()
    }
}
