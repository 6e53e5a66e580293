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

//! Integration tests for complete renewal cycles

use crate::integration::{files_in, ConsoleScript, DeviceCertificate, FakeIssuer, Harness};
use printer_cert_renew::console::Selector;
use printer_cert_renew::orchestrator::{CycleOutcome, IssueOutcome, RunOptions};
use printer_cert_renew::{RenewError, TrustPosture};

#[tokio::test]
async fn test_valid_certificate_skips_renewal() {
    let h = Harness::new(
        DeviceCertificate::Trusted(45),
        ConsoleScript::default(),
        FakeIssuer::succeeding(),
    );
    // Stale marker from an earlier failed probe
    h.renewer.marker().persist("stale").expect("persist");

    let outcome = h
        .renewer
        .run_cycle(&RunOptions::default())
        .await
        .expect("cycle");

    assert_eq!(outcome, CycleOutcome::Skipped { remaining_days: 45 });
    assert!(!h.marker_present());
    assert!(h.console.log().launches.is_empty());
    assert!(h.issuer.requests().is_empty());
}

#[tokio::test]
async fn test_unreachable_device_relaxes_trust() {
    let h = Harness::new(
        DeviceCertificate::Unreachable,
        ConsoleScript::default(),
        FakeIssuer::succeeding(),
    );

    let outcome = h
        .renewer
        .issue(&RunOptions::default())
        .await
        .expect("issue");

    // The marker carries the decision to a separate install invocation
    assert!(h.marker_present());
    assert_eq!(h.console.log().launches, vec![TrustPosture::Relaxed]);
    match outcome {
        IssueOutcome::Issued { pair, trust } => {
            assert_eq!(trust, TrustPosture::Relaxed);
            assert!(pair.ensure_present().is_ok());
        }
        other => panic!("expected issuance, got {:?}", other),
    }
    assert_eq!(
        h.renewer.install_posture(&RunOptions::default()),
        TrustPosture::Relaxed
    );
}

#[tokio::test]
async fn test_issuance_failure_blocks_installation() {
    let h = Harness::new(
        DeviceCertificate::Unreachable,
        ConsoleScript::default(),
        FakeIssuer::exiting(1),
    );

    let err = h
        .renewer
        .run_cycle(&RunOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, RenewError::ExternalTool { status: Some(1), .. }));
    let log = h.console.log();
    // Extraction only; installation never launched
    assert_eq!(log.launches.len(), 1);
    assert!(log.uploads.is_empty());
    assert_eq!(h.issuer.requests().len(), 1);
    assert!(!h.marker_present());
}

#[tokio::test]
async fn test_full_cycle_cleans_up() {
    let h = Harness::new(
        DeviceCertificate::Trusted(3),
        ConsoleScript::default(),
        FakeIssuer::succeeding(),
    );

    let outcome = h
        .renewer
        .run_cycle(&RunOptions::default())
        .await
        .expect("cycle");

    assert_eq!(
        outcome,
        CycleOutcome::Renewed {
            trust: TrustPosture::Strict
        }
    );
    assert!(files_in(h.work_dir()).is_empty(), "left: {:?}", files_in(h.work_dir()));
    assert!(!h.marker_present());

    let log = h.console.log();
    assert_eq!(log.launches, vec![TrustPosture::Strict, TrustPosture::Strict]);
    assert_eq!(log.closes, 2);
    assert_eq!(log.downloads, 1);
    assert_eq!(log.fills, vec!["8642".to_string(), "8642".to_string()]);
    assert_eq!(
        log.uploads,
        vec![h.work_dir().join("issued_0001_chain.pem")]
    );

    let requests = h.issuer.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].domain, "printer.example.com");
    assert!(!requests[0].staging);
    assert!(requests[0]
        .csr_path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("csr_")));
}

#[tokio::test]
async fn test_untrusted_certificate_renews_even_when_far_from_expiry() {
    let h = Harness::new(
        DeviceCertificate::SelfSigned(300),
        ConsoleScript::default(),
        FakeIssuer::succeeding(),
    );

    let outcome = h
        .renewer
        .run_cycle(&RunOptions::default())
        .await
        .expect("cycle");

    assert_eq!(
        outcome,
        CycleOutcome::Renewed {
            trust: TrustPosture::Relaxed
        }
    );
    assert_eq!(
        h.console.log().launches,
        vec![TrustPosture::Relaxed, TrustPosture::Relaxed]
    );
    assert!(!h.marker_present());
}

#[tokio::test]
async fn test_force_new_skips_probe() {
    let h = Harness::new(
        DeviceCertificate::Trusted(200),
        ConsoleScript::default(),
        FakeIssuer::succeeding(),
    );
    let options = RunOptions {
        force_new: true,
        staging: true,
        ..Default::default()
    };

    let outcome = h.renewer.run_cycle(&options).await.expect("cycle");

    assert!(matches!(outcome, CycleOutcome::Renewed { .. }));
    assert_eq!(h.probe_count(), 0);
    assert!(h.issuer.requests()[0].staging);
}

#[tokio::test]
async fn test_insecure_flag_relaxes_trust() {
    let h = Harness::new(
        DeviceCertificate::Trusted(1),
        ConsoleScript::default(),
        FakeIssuer::succeeding(),
    );
    let options = RunOptions {
        force_insecure: true,
        ..Default::default()
    };

    h.renewer.run_cycle(&options).await.expect("cycle");

    assert_eq!(
        h.console.log().launches,
        vec![TrustPosture::Relaxed, TrustPosture::Relaxed]
    );
}

#[tokio::test]
async fn test_marker_at_stage_start_relaxes_trust() {
    let h = Harness::new(
        DeviceCertificate::Trusted(10),
        ConsoleScript::default(),
        FakeIssuer::succeeding(),
    );
    h.renewer
        .marker()
        .persist("previous probe failed")
        .expect("persist");

    let outcome = h
        .renewer
        .issue(&RunOptions::default())
        .await
        .expect("issue");

    assert!(matches!(
        outcome,
        IssueOutcome::Issued {
            trust: TrustPosture::Relaxed,
            ..
        }
    ));
}

#[tokio::test]
async fn test_console_failure_names_step() {
    let h = Harness::new(
        DeviceCertificate::Trusted(2),
        ConsoleScript {
            fail_on: Some(Selector::role("button", "Sign In")),
            ..Default::default()
        },
        FakeIssuer::succeeding(),
    );

    let err = h
        .renewer
        .run_cycle(&RunOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, RenewError::Automation { .. }));
    assert_eq!(err.step(), Some("sign-in"));
    assert!(h.issuer.requests().is_empty());
    // Session closed best-effort after the failure
    assert_eq!(h.console.log().closes, 1);
}

#[tokio::test]
async fn test_download_timeout_is_fatal() {
    let h = Harness::new(
        DeviceCertificate::Unreachable,
        ConsoleScript {
            stall_download: true,
            ..Default::default()
        },
        FakeIssuer::succeeding(),
    );

    let err = h
        .renewer
        .run_cycle(&RunOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, RenewError::DownloadTimeout { .. }));
    assert_eq!(err.step(), Some("save-signing-request"));
    assert!(files_in(h.work_dir()).is_empty());
    assert!(h.issuer.requests().is_empty());
    assert!(!h.marker_present());
}

#[tokio::test]
async fn test_split_cycle_clears_marker_after_install() {
    let h = Harness::new(
        DeviceCertificate::Unreachable,
        ConsoleScript::default(),
        FakeIssuer::succeeding(),
    );
    let options = RunOptions::default();

    let outcome = h.renewer.begin_issue(&options).await.expect("issue");
    assert!(matches!(outcome, IssueOutcome::Issued { .. }));
    assert!(h.marker_present());

    let trust = h.renewer.finish_install(&options).await.expect("install");

    assert_eq!(trust, TrustPosture::Relaxed);
    assert_eq!(
        h.console.log().launches,
        vec![TrustPosture::Relaxed, TrustPosture::Relaxed]
    );
    assert!(!h.marker_present());
    // A later run starts from a strict posture again
    assert_eq!(h.renewer.install_posture(&options), TrustPosture::Strict);
}

#[tokio::test]
async fn test_split_cycle_clears_marker_when_install_fails() {
    let h = Harness::new(
        DeviceCertificate::Unreachable,
        ConsoleScript {
            fail_on: Some(Selector::role("button", "Install")),
            ..Default::default()
        },
        FakeIssuer::succeeding(),
    );
    let options = RunOptions::default();

    h.renewer.begin_issue(&options).await.expect("issue");
    let err = h.renewer.finish_install(&options).await.unwrap_err();

    assert_eq!(err.step(), Some("install"));
    assert!(!h.marker_present());
}

#[tokio::test]
async fn test_failed_issue_stage_clears_marker() {
    let h = Harness::new(
        DeviceCertificate::Unreachable,
        ConsoleScript::default(),
        FakeIssuer::exiting(1),
    );

    let err = h
        .renewer
        .begin_issue(&RunOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, RenewError::ExternalTool { .. }));
    assert!(!h.marker_present());
}

#[tokio::test]
async fn test_install_failure_in_cycle_still_cleans() {
    let h = Harness::new(
        DeviceCertificate::Unreachable,
        ConsoleScript {
            fail_on: Some(Selector::role("button", "Install")),
            ..Default::default()
        },
        FakeIssuer::succeeding(),
    );

    let err = h
        .renewer
        .run_cycle(&RunOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.step(), Some("install"));
    let log = h.console.log();
    assert_eq!(log.launches.len(), 2);
    assert_eq!(log.closes, 2);
    assert!(files_in(h.work_dir()).is_empty(), "left: {:?}", files_in(h.work_dir()));
    assert!(!h.marker_present());
}
