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

//! HP OfficeJet Pro 9100 series embedded web server.

use std::path::Path;
use std::time::Duration;

use super::{FirmwareProfile, Selector, Step};

/// Console scripts for the OfficeJet Pro 9100 series firmware.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfficeJetPro9100;

impl OfficeJetPro9100 {
    /// Configuration name.
    pub const NAME: &'static str = "officejet-pro-9100";

    fn button(name: &str) -> Selector {
        Selector::role("button", name)
    }
}

impl FirmwareProfile for OfficeJetPro9100 {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn login_steps(&self, pin: &str) -> Vec<Step> {
        vec![
            Step::click("open-security-menu", Selector::role("menuitem", "Security")),
            Step::click(
                "open-certificate-management",
                Selector::role("navigation", "Certificate Management")
                    .within(Selector::id("menu-security-certificateManagement")),
            ),
            Step::fill_secret("enter-pin", Selector::role("textbox", "Enter PIN"), pin),
            Step::click("sign-in", Self::button("Sign In")),
        ]
    }

    fn signing_request_steps(&self, download_timeout: Duration) -> Vec<Step> {
        vec![
            Step::click(
                "open-identity-certificate",
                Selector::text_containing("OU=").first(),
            ),
            Step::click(
                "select-identity-certificate",
                Selector::text_containing("CN=").first(),
            ),
            Step::click("create", Selector::text("Create")),
            Step::click("open-certificate-type", Selector::id("mat-select-value-5")),
            Step::click(
                "choose-signing-request",
                Selector::text_containing("Create Certificate Signing"),
            ),
            Step::click("next", Self::button("Next")),
            Step::click("create-signing-request", Self::button("Create")),
            Step::download("save-signing-request", Self::button("Save"), download_timeout),
            Step::click("confirm", Self::button("OK")),
        ]
    }

    fn install_steps(&self, chain: &Path) -> Vec<Step> {
        vec![
            Step::click("create", Selector::text("Create")),
            Step::click(
                "open-certificate-type",
                Selector::text_containing("Create New Self-Signed"),
            ),
            Step::click(
                "choose-install-identity",
                Selector::text_containing("Install Identity Certificate"),
            ),
            Step::click("next", Self::button("Next")),
            Step::upload("attach-chain", Selector::FileInput.first(), chain),
            Step::click("install", Self::button("Install")),
            Step::click("confirm", Self::button("OK")),
        ]
    }
}
