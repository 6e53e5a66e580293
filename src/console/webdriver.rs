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

//! WebDriver console driver.
//!
//! Drives a Chromium session through a W3C WebDriver endpoint such as
//! `chromedriver --port=9515`. Downloads land in a private temporary
//! directory, so the endpoint must share this host's filesystem.

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::wd::Capabilities;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::json;
use tempfile::TempDir;
use tracing::debug;
use url::Url;

use super::{ConsoleDriver, ConsoleLauncher, Selector};
use crate::config::RenewConfig;
use crate::error::{RenewError, Result};
use crate::marker::TrustPosture;

const DOWNLOAD_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Suffixes Chromium uses for in-flight downloads.
const PARTIAL_SUFFIXES: &[&str] = &[".crdownload", ".tmp"];

/// Launches Chromium sessions through a WebDriver endpoint.
#[derive(Debug, Clone)]
pub struct WebDriverLauncher {
    webdriver_url: Url,
    headless: bool,
    element_timeout: Duration,
}

impl WebDriverLauncher {
    /// Create a launcher for `webdriver_url`.
    pub fn new(webdriver_url: Url, headless: bool, element_timeout: Duration) -> Self {
        Self {
            webdriver_url,
            headless,
            element_timeout,
        }
    }

    /// Create a launcher from the console settings of `config`.
    pub fn from_config(config: &RenewConfig) -> Self {
        Self::new(
            config.webdriver_url.clone(),
            config.headless,
            config.element_timeout,
        )
    }

    fn capabilities(&self, trust: TrustPosture, download_dir: &Path) -> Capabilities {
        let mut args = vec!["--no-sandbox", "--disable-dev-shm-usage"];
        if self.headless {
            args.push("--headless=new");
        }
        if trust.is_relaxed() {
            args.push("--ignore-certificate-errors");
        }

        let caps = json!({
            "browserName": "chrome",
            "acceptInsecureCerts": trust.is_relaxed(),
            "goog:chromeOptions": {
                "args": args,
                "prefs": {
                    "download.default_directory": download_dir.to_string_lossy(),
                    "download.prompt_for_download": false,
                    "download.directory_upgrade": true,
                    "safebrowsing.enabled": false,
                },
            },
        });

        match caps {
            serde_json::Value::Object(map) => map,
            _ => Capabilities::new(),
        }
    }
}

#[async_trait]
impl ConsoleLauncher for WebDriverLauncher {
    async fn launch(&self, trust: TrustPosture) -> Result<Box<dyn ConsoleDriver>> {
        let download_dir = tempfile::Builder::new()
            .prefix("printer-cert-renew-")
            .tempdir()?;

        let mut builder = ClientBuilder::native();
        builder.capabilities(self.capabilities(trust, download_dir.path()));

        debug!(
            "Connecting to WebDriver at {} (downloads in {})",
            self.webdriver_url,
            download_dir.path().display()
        );
        let client = builder
            .connect(self.webdriver_url.as_str())
            .await
            .map_err(|e| RenewError::automation("launch-browser", e.to_string()))?;

        Ok(Box::new(WebDriverConsole {
            client,
            download_dir,
            element_timeout: self.element_timeout,
        }))
    }
}

/// A live WebDriver session.
struct WebDriverConsole {
    client: Client,
    download_dir: TempDir,
    element_timeout: Duration,
}

impl WebDriverConsole {
    async fn element(&self, target: &Selector) -> Result<Element> {
        let xpath = target.to_xpath();
        self.client
            .wait()
            .at_most(self.element_timeout)
            .for_element(Locator::XPath(&xpath))
            .await
            .map_err(|e| RenewError::automation("locate", format!("{}: {}", target, e)))
    }

    fn completed_downloads(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(self.download_dir.path())? {
            let path = entry?.path();
            let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
            let partial = name
                .as_deref()
                .is_some_and(|n| PARTIAL_SUFFIXES.iter().any(|s| n.ends_with(s)));
            if path.is_file() && !partial {
                files.push(path);
            }
        }
        Ok(files)
    }

    async fn wait_for_new_download(&self, seen: &HashSet<OsString>) -> Result<PathBuf> {
        loop {
            for path in self.completed_downloads()? {
                let is_new = path
                    .file_name()
                    .is_some_and(|name| !seen.contains(name));
                let non_empty = std::fs::metadata(&path).map(|m| m.len() > 0).unwrap_or(false);
                if is_new && non_empty {
                    return Ok(path);
                }
            }
            tokio::time::sleep(DOWNLOAD_POLL_INTERVAL).await;
        }
    }
}

fn cmd_error(target: &Selector, e: fantoccini::error::CmdError) -> RenewError {
    RenewError::automation("interact", format!("{}: {}", target, e))
}

#[async_trait]
impl ConsoleDriver for WebDriverConsole {
    async fn navigate(&mut self, url: &Url) -> Result<()> {
        self.client
            .goto(url.as_str())
            .await
            .map_err(|e| RenewError::automation("navigate", format!("{}: {}", url, e)))
    }

    async fn click(&mut self, target: &Selector) -> Result<()> {
        let element = self.element(target).await?;
        element.click().await.map_err(|e| cmd_error(target, e))
    }

    async fn fill(&mut self, target: &Selector, value: &str) -> Result<()> {
        let element = self.element(target).await?;
        element.clear().await.map_err(|e| cmd_error(target, e))?;
        element.send_keys(value).await.map_err(|e| cmd_error(target, e))
    }

    async fn upload(&mut self, target: &Selector, file: &Path) -> Result<()> {
        let absolute = tokio::fs::canonicalize(file).await?;
        let element = self.element(target).await?;
        element
            .send_keys(&absolute.to_string_lossy())
            .await
            .map_err(|e| cmd_error(target, e))
    }

    async fn download(&mut self, trigger: &Selector, timeout: Duration) -> Result<Vec<u8>> {
        let seen: HashSet<OsString> = self
            .completed_downloads()?
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_os_string()))
            .collect();

        self.click(trigger).await?;

        let path = tokio::time::timeout(timeout, self.wait_for_new_download(&seen))
            .await
            .map_err(|_| RenewError::download_timeout("download", timeout))??;

        debug!("Download completed: {}", path.display());
        let bytes = tokio::fs::read(&path).await?;
        tokio::fs::remove_file(&path).await?;
        Ok(bytes)
    }

    async fn close(&mut self) -> Result<()> {
        self.client
            .clone()
            .close()
            .await
            .map_err(|e| RenewError::automation("close-browser", e.to_string()))
    }
}
