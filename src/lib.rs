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

//! # printer-cert-renew
//!
//! Automated renewal of the X.509 identity certificate on a network device
//! (such as a multifunction printer) whose only certificate-management
//! channel is its administrative web console.
//!
//! A renewal cycle:
//!
//! 1. **Probe** the device's current certificate over TLS without enforcing
//!    trust ([`probe`]).
//! 2. **Decide** whether renewal is due ([`gate`]).
//! 3. **Extract** a signing request by driving the console wizard
//!    ([`extraction`], [`console`]).
//! 4. **Issue** a certificate with an external ACME client ([`issuance`]).
//! 5. **Install** the chain through the console and clean up
//!    ([`installation`]).
//!
//! [`orchestrator::Renewer`] sequences the stages. When the probe cannot
//! establish a trusted certificate the console sessions run with certificate
//! validation relaxed; the [`marker`] carries that decision across separate
//! invocations.
//!
//! ## Quick Start
//!
//! ```no_run
//! use printer_cert_renew::orchestrator::{CycleOutcome, Renewer, RunOptions};
//! use printer_cert_renew::RenewConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RenewConfig::builder()
//!         .device_url("https://printer.example.com")?
//!         .pin("12345678")
//!         .email("admin@example.com")
//!         .work_dir("/var/lib/printer-cert-renew")
//!         .build()?;
//!
//!     let renewer = Renewer::from_config(config)?;
//!     match renewer.run_cycle(&RunOptions::default()).await? {
//!         CycleOutcome::Skipped { remaining_days } => {
//!             println!("Still valid for {remaining_days} days");
//!         }
//!         CycleOutcome::Renewed { .. } => println!("Certificate renewed"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Cargo Features
//!
//! - `webdriver` (default): the production console driver, speaking W3C
//!   WebDriver to a chromedriver endpoint.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod artifacts;
pub mod config;
pub mod console;
pub mod error;
pub mod extraction;
pub mod gate;
pub mod installation;
pub mod issuance;
pub mod logging;
pub mod marker;
pub mod orchestrator;
pub mod probe;
pub mod tls;

// Re-export main types at crate root for convenience
pub use artifacts::{IssuedArtifactPair, SigningRequestArtifact};
pub use config::{ConfigLoader, RenewConfig, RenewConfigBuilder};
pub use error::{RenewError, Result};
pub use gate::{RenewalDecision, RenewalGate};
pub use marker::{InvalidCertMarker, TrustPosture};
pub use orchestrator::{CycleOutcome, IssueOutcome, Renewer, RunOptions};
pub use probe::{CertificateRecord, ExpirationProbe, ProbeReport};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
