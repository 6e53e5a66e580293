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

//! Certificate issuance through an external ACME client.
//!
//! The signing request is handed to `certbot certonly --csr`, which proves
//! control of the device's domain with a DNS challenge and writes the issued
//! certificate and chain into its working directory.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::config::RenewConfig;
use crate::error::{RenewError, Result};

/// Inputs of one issuance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuanceRequest {
    /// Signing request file.
    pub csr_path: PathBuf,
    /// DNS-challenge credential file.
    pub credentials_path: PathBuf,
    /// Contact email.
    pub email: String,
    /// Domain to certify.
    pub domain: String,
    /// Use the CA's staging environment.
    pub staging: bool,
}

impl IssuanceRequest {
    /// Build a request for `csr_path` from `config`.
    pub fn from_config(config: &RenewConfig, csr_path: &Path, staging: bool) -> Result<Self> {
        Ok(Self {
            csr_path: csr_path.to_path_buf(),
            credentials_path: config.dns_credentials_path.clone(),
            email: config.email.clone(),
            domain: config.device_host()?.to_string(),
            staging,
        })
    }
}

/// Signs a request, leaving certificate and chain files in `work_dir`.
#[async_trait]
pub trait IssuanceClient: Send + Sync {
    /// Issue a certificate for `request`.
    ///
    /// Returns [`RenewError::ExternalTool`] on failure.
    async fn issue(&self, request: &IssuanceRequest, work_dir: &Path) -> Result<()>;
}

/// Runs `certbot` with the DNS-01 Cloudflare plugin.
#[derive(Debug, Clone)]
pub struct CertbotClient {
    program: PathBuf,
}

impl CertbotClient {
    /// Create a client running `program`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Create a client running the configured certbot binary.
    pub fn from_config(config: &RenewConfig) -> Self {
        Self::new(&config.certbot_path)
    }

    fn tool_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "certbot".to_string())
    }

    /// Command-line arguments for `request`.
    pub fn arguments(request: &IssuanceRequest) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "certonly".into(),
            "--csr".into(),
            request.csr_path.clone().into(),
            "--dns-cloudflare".into(),
            "--dns-cloudflare-credentials".into(),
            request.credentials_path.clone().into(),
            "--email".into(),
            request.email.clone().into(),
            "--agree-tos".into(),
            "--non-interactive".into(),
            "-d".into(),
            request.domain.clone().into(),
        ];
        if request.staging {
            args.push("--test-cert".into());
        }
        args
    }
}

#[async_trait]
impl IssuanceClient for CertbotClient {
    async fn issue(&self, request: &IssuanceRequest, work_dir: &Path) -> Result<()> {
        let tool = self.tool_name();
        let args = Self::arguments(request);
        debug!(
            "Running: {} {}",
            self.program.display(),
            args.iter()
                .map(|a| a.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );
        info!(
            "Requesting certificate for {}{}",
            request.domain,
            if request.staging { " (staging)" } else { "" }
        );

        let output = Command::new(&self.program)
            .args(&args)
            .current_dir(work_dir)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                RenewError::external_tool(
                    &tool,
                    None,
                    format!("failed to run {}: {}", self.program.display(), e),
                )
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stdout.trim().is_empty() {
            debug!("{} stdout:\n{}", tool, stdout.trim_end());
        }

        if output.status.success() {
            info!("Certificate issued for {}", request.domain);
            return Ok(());
        }

        error!("{} exited with {}", tool, output.status);
        if !stdout.trim().is_empty() {
            error!("{} stdout:\n{}", tool, stdout.trim_end());
        }
        if !stderr.trim().is_empty() {
            error!("{} stderr:\n{}", tool, stderr.trim_end());
        }

        let diagnostics = if stderr.trim().is_empty() {
            stdout.trim().to_string()
        } else {
            stderr.trim().to_string()
        };
        Err(RenewError::external_tool(
            tool,
            output.status.code(),
            diagnostics,
        ))
    }
}
