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

//! Device console automation.
//!
//! The vendor console is reached through three layers:
//!
//! - [`ConsoleDriver`]: a browser engine able to navigate, click, fill,
//!   upload, and await a download. The production driver speaks WebDriver
//!   (feature `webdriver`); tests substitute a recording fake.
//! - [`FirmwareProfile`]: the interaction script for one firmware version,
//!   expressed as [`Step`]s over [`Selector`]s. Vendor UI changes only touch
//!   a profile.
//! - [`DeviceConsole`]: the capability interface used by the automatons
//!   (`authenticate`, `request_signing_request`, `install_identity`).
//!
//! Steps run strictly in order. The first step that fails aborts the script
//! with an error naming it; nothing is retried.

mod officejet;
mod selector;

#[cfg(feature = "webdriver")]
pub mod webdriver;

pub use officejet::OfficeJetPro9100;
pub use selector::Selector;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{RenewError, Result};
use crate::marker::TrustPosture;

/// Names accepted by [`profile_by_name`].
pub const PROFILE_NAMES: &[&str] = &[OfficeJetPro9100::NAME];

/// Look up a firmware profile by its configuration name.
pub fn profile_by_name(name: &str) -> Option<Box<dyn FirmwareProfile>> {
    match name {
        OfficeJetPro9100::NAME => Some(Box::new(OfficeJetPro9100)),
        _ => None,
    }
}

/// One console interaction.
#[derive(Clone, PartialEq, Eq)]
pub enum Action {
    /// Load a URL.
    Navigate(Url),
    /// Click an element.
    Click(Selector),
    /// Type into an element.
    Fill {
        /// Input element.
        target: Selector,
        /// Text to enter.
        value: String,
        /// Redact `value` from logs.
        secret: bool,
    },
    /// Attach a local file to a file input.
    Upload {
        /// File input element.
        target: Selector,
        /// Local file.
        file: PathBuf,
    },
    /// Click an element and wait for the download it triggers.
    Download {
        /// Element starting the download.
        trigger: Selector,
        /// Maximum wait; elapsing is a hard failure.
        timeout: Duration,
    },
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Navigate(url) => write!(f, "navigate {}", url),
            Self::Click(target) => write!(f, "click {}", target),
            Self::Fill {
                target,
                value,
                secret,
            } => {
                if *secret {
                    write!(f, "fill {} with <redacted>", target)
                } else {
                    write!(f, "fill {} with {:?}", target, value)
                }
            }
            Self::Upload { target, file } => write!(f, "upload {} to {}", file.display(), target),
            Self::Download { trigger, timeout } => {
                write!(f, "download via {} within {}s", trigger, timeout.as_secs())
            }
        }
    }
}

/// A labelled console interaction. The label names the step in logs and
/// errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Short stable name, e.g. `sign-in`.
    pub label: &'static str,
    /// What to do.
    pub action: Action,
}

impl Step {
    /// Create a navigation step.
    pub fn navigate(label: &'static str, url: Url) -> Self {
        Self {
            label,
            action: Action::Navigate(url),
        }
    }

    /// Create a click step.
    pub fn click(label: &'static str, target: Selector) -> Self {
        Self {
            label,
            action: Action::Click(target),
        }
    }

    /// Create a fill step whose value is redacted from logs.
    pub fn fill_secret(label: &'static str, target: Selector, value: impl Into<String>) -> Self {
        Self {
            label,
            action: Action::Fill {
                target,
                value: value.into(),
                secret: true,
            },
        }
    }

    /// Create an upload step.
    pub fn upload(label: &'static str, target: Selector, file: impl Into<PathBuf>) -> Self {
        Self {
            label,
            action: Action::Upload {
                target,
                file: file.into(),
            },
        }
    }

    /// Create a download step.
    pub fn download(label: &'static str, trigger: Selector, timeout: Duration) -> Self {
        Self {
            label,
            action: Action::Download { trigger, timeout },
        }
    }
}

/// Browser engine driving one console session.
///
/// Element lookups block until the element resolves or the engine's own
/// wait timeout elapses. Errors returned here are re-labelled with the step
/// that caused them.
#[async_trait]
pub trait ConsoleDriver: Send {
    /// Load `url`.
    async fn navigate(&mut self, url: &Url) -> Result<()>;

    /// Click `target`.
    async fn click(&mut self, target: &Selector) -> Result<()>;

    /// Replace the content of `target` with `value`.
    async fn fill(&mut self, target: &Selector, value: &str) -> Result<()>;

    /// Attach `file` to the file input `target`.
    async fn upload(&mut self, target: &Selector, file: &Path) -> Result<()>;

    /// Click `trigger` and return the downloaded bytes.
    ///
    /// Must fail with [`RenewError::DownloadTimeout`] once `timeout` elapses.
    async fn download(&mut self, trigger: &Selector, timeout: Duration) -> Result<Vec<u8>>;

    /// End the session.
    async fn close(&mut self) -> Result<()>;
}

/// Starts console sessions.
#[async_trait]
pub trait ConsoleLauncher: Send + Sync {
    /// Launch a browser session. `trust` decides whether certificate errors
    /// are ignored.
    async fn launch(&self, trust: TrustPosture) -> Result<Box<dyn ConsoleDriver>>;
}

/// Interaction scripts for one console firmware version.
pub trait FirmwareProfile: Send + Sync {
    /// Configuration name.
    fn name(&self) -> &'static str;

    /// Steps from the landing page to an authenticated certificate
    /// management view.
    fn login_steps(&self, pin: &str) -> Vec<Step>;

    /// Steps creating a signing request and downloading it. Exactly one step
    /// must be a [`Action::Download`].
    fn signing_request_steps(&self, download_timeout: Duration) -> Vec<Step>;

    /// Steps installing the identity certificate from `chain`.
    fn install_steps(&self, chain: &Path) -> Vec<Step>;
}

/// Run `steps` in order, returning the bytes of the last download, if any.
///
/// The first failure aborts the run. Driver errors are re-labelled with the
/// failing step.
pub async fn run_steps(driver: &mut dyn ConsoleDriver, steps: &[Step]) -> Result<Option<Vec<u8>>> {
    let mut downloaded = None;

    for step in steps {
        debug!("Console step '{}': {:?}", step.label, step.action);

        let result = match &step.action {
            Action::Navigate(url) => driver.navigate(url).await.map(|_| None),
            Action::Click(target) => driver.click(target).await.map(|_| None),
            Action::Fill { target, value, .. } => driver.fill(target, value).await.map(|_| None),
            Action::Upload { target, file } => driver.upload(target, file).await.map(|_| None),
            Action::Download { trigger, timeout } => {
                driver.download(trigger, *timeout).await.map(Some)
            }
        };

        match result {
            Ok(Some(bytes)) => downloaded = Some(bytes),
            Ok(None) => {}
            Err(e) => return Err(relabel(step, e)),
        }
    }

    Ok(downloaded)
}

fn relabel(step: &Step, error: RenewError) -> RenewError {
    match error {
        RenewError::DownloadTimeout { timeout, .. } => {
            RenewError::download_timeout(step.label, timeout)
        }
        RenewError::Automation { message, .. } => RenewError::automation(step.label, message),
        other => RenewError::automation(step.label, other.to_string()),
    }
}

/// Capability interface over a live console session.
pub struct DeviceConsole<'a> {
    driver: Box<dyn ConsoleDriver>,
    profile: &'a dyn FirmwareProfile,
    device_url: Url,
}

impl<'a> DeviceConsole<'a> {
    /// Launch a session for the console at `device_url`.
    pub async fn open(
        launcher: &dyn ConsoleLauncher,
        profile: &'a dyn FirmwareProfile,
        device_url: Url,
        trust: TrustPosture,
    ) -> Result<Self> {
        if trust.is_relaxed() {
            warn!("Launching console session with certificate validation disabled");
        }
        debug!(
            "Launching console session ({} profile, {} trust)",
            profile.name(),
            trust
        );

        let driver = launcher.launch(trust).await.map_err(|e| match e {
            RenewError::Automation { message, .. } => {
                RenewError::automation("launch-browser", message)
            }
            other => RenewError::automation("launch-browser", other.to_string()),
        })?;

        Ok(Self {
            driver,
            profile,
            device_url,
        })
    }

    /// Load the console and sign in with `pin`.
    pub async fn authenticate(&mut self, pin: &str) -> Result<()> {
        info!("Navigating to device login page...");
        let mut steps = vec![Step::navigate("open-console", self.device_url.clone())];
        steps.extend(self.profile.login_steps(pin));

        info!("Logging in...");
        run_steps(self.driver.as_mut(), &steps).await?;
        Ok(())
    }

    /// Create a signing request and return its content.
    pub async fn request_signing_request(&mut self, download_timeout: Duration) -> Result<Vec<u8>> {
        info!("Navigating to CSR creation...");
        let steps = self.profile.signing_request_steps(download_timeout);
        run_steps(self.driver.as_mut(), &steps)
            .await?
            .ok_or_else(|| {
                RenewError::automation(
                    "signing-request",
                    format!("profile '{}' produced no download", self.profile.name()),
                )
            })
    }

    /// Upload `chain` through the identity-installation wizard.
    pub async fn install_identity(&mut self, chain: &Path) -> Result<()> {
        info!("Navigating to certificate installation...");
        let steps = self.profile.install_steps(chain);
        run_steps(self.driver.as_mut(), &steps).await?;
        Ok(())
    }

    /// Close the session.
    pub async fn close(mut self) -> Result<()> {
        self.driver.close().await?;
        debug!("Browser closed.");
        Ok(())
    }

    /// Close the session after a failure, logging instead of failing.
    pub async fn abandon(mut self) {
        if let Err(e) = self.driver.close().await {
            warn!("Failed to close console session: {}", e);
        }
    }
}
