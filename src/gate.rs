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

//! Renewal decision.
//!
//! # Example
//!
//! ```
//! use printer_cert_renew::gate::{decide, RenewalDecision};
//!
//! assert!(decide(Some(45), 30, false).is_skip());
//! assert!(decide(Some(29), 30, false).should_renew());
//! assert!(decide(Some(45), 30, true).should_renew());
//! assert!(decide(None, 30, false).should_renew());
//! ```

use tracing::info;

use crate::config::DEFAULT_THRESHOLD_DAYS;
use crate::marker::InvalidCertMarker;

/// Why a renewal was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalReason {
    /// Forced from the command line.
    Forced,
    /// Fewer than threshold days remain.
    ExpiringSoon {
        /// Remaining whole days.
        remaining_days: i64,
    },
    /// The remaining validity could not be established.
    ValidityUnknown,
}

/// Outcome of the renewal gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalDecision {
    /// Renewal is due.
    Renew(RenewalReason),
    /// The certificate is still valid long enough.
    Skip {
        /// Remaining whole days.
        remaining_days: i64,
    },
}

impl RenewalDecision {
    /// Returns true if renewal is due.
    pub fn should_renew(&self) -> bool {
        matches!(self, Self::Renew(_))
    }

    /// Returns true if renewal is skipped.
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skip { .. })
    }
}

/// Pure renewal decision.
///
/// `force` always renews. Otherwise renewal is due iff `remaining_days` is
/// below `threshold_days`; unknown validity renews.
pub fn decide(remaining_days: Option<i64>, threshold_days: u32, force: bool) -> RenewalDecision {
    if force {
        return RenewalDecision::Renew(RenewalReason::Forced);
    }
    match remaining_days {
        Some(days) if days < i64::from(threshold_days) => {
            RenewalDecision::Renew(RenewalReason::ExpiringSoon {
                remaining_days: days,
            })
        }
        Some(days) => RenewalDecision::Skip {
            remaining_days: days,
        },
        None => RenewalDecision::Renew(RenewalReason::ValidityUnknown),
    }
}

/// Renewal gate bound to a threshold and the marker it clears on skip.
#[derive(Debug, Clone)]
pub struct RenewalGate<'a> {
    threshold_days: u32,
    marker: &'a InvalidCertMarker,
}

impl<'a> RenewalGate<'a> {
    /// Create a gate with `threshold_days`.
    pub fn new(threshold_days: u32, marker: &'a InvalidCertMarker) -> Self {
        Self {
            threshold_days,
            marker,
        }
    }

    /// Create a gate with the default 30-day threshold.
    pub fn with_default_threshold(marker: &'a InvalidCertMarker) -> Self {
        Self::new(DEFAULT_THRESHOLD_DAYS, marker)
    }

    /// Decide, clearing the marker on a skip.
    pub fn evaluate(&self, remaining_days: Option<i64>, force: bool) -> RenewalDecision {
        let decision = decide(remaining_days, self.threshold_days, force);
        match decision {
            RenewalDecision::Skip { remaining_days } => {
                info!(
                    "Certificate is still valid for {} day(s) (threshold {}). No renewal needed.",
                    remaining_days, self.threshold_days
                );
                self.marker.clear_or_warn();
            }
            RenewalDecision::Renew(RenewalReason::Forced) => {
                info!("Renewal forced");
            }
            RenewalDecision::Renew(RenewalReason::ExpiringSoon { remaining_days }) => {
                info!(
                    "Certificate expires in {} day(s), below threshold {}. Renewing.",
                    remaining_days, self.threshold_days
                );
            }
            RenewalDecision::Renew(RenewalReason::ValidityUnknown) => {
                info!("Certificate validity unknown or untrusted. Renewing.");
            }
        }
        decision
    }
}
