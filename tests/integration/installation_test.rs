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

//! Integration tests for the standalone install stage

use std::path::Path;

use crate::integration::{files_in, ConsoleScript, DeviceCertificate, FakeIssuer, Harness};
use printer_cert_renew::console::Selector;
use printer_cert_renew::orchestrator::RunOptions;
use printer_cert_renew::{RenewError, TrustPosture};

fn write(dir: &Path, name: &str) {
    std::fs::write(dir.join(name), "-----BEGIN CERTIFICATE-----\n").expect("write");
}

fn stage_artifacts(dir: &Path) {
    write(dir, "csr_1760000000.pem");
    write(dir, "issued_0000_cert.pem");
    write(dir, "issued_0000_chain.pem");
    write(dir, "issued_0001_chain.pem");
}

#[tokio::test]
async fn test_missing_artifacts_abort_before_launch() {
    let h = Harness::new(
        DeviceCertificate::Trusted(1),
        ConsoleScript::default(),
        FakeIssuer::succeeding(),
    );
    write(h.work_dir(), "issued_0000_cert.pem");

    let err = h.renewer.install(TrustPosture::Strict).await.unwrap_err();

    match err {
        RenewError::Precondition { missing } => {
            assert_eq!(missing, vec![h.work_dir().join("issued_0001_chain.pem")]);
        }
        other => panic!("expected precondition failure, got {:?}", other),
    }
    assert!(h.console.log().launches.is_empty());
    // Nothing is cleaned when the stage never starts
    assert_eq!(files_in(h.work_dir()), vec!["issued_0000_cert.pem"]);
}

#[tokio::test]
async fn test_install_uploads_chain_and_cleans() {
    let h = Harness::new(
        DeviceCertificate::Trusted(1),
        ConsoleScript::default(),
        FakeIssuer::succeeding(),
    );
    stage_artifacts(h.work_dir());
    std::fs::write(h.work_dir().join("notes.txt"), "keep").expect("write");

    h.renewer
        .install(TrustPosture::Strict)
        .await
        .expect("install");

    let log = h.console.log();
    assert_eq!(log.uploads, vec![h.work_dir().join("issued_0001_chain.pem")]);
    assert!(log.clicks.iter().any(|c| c.contains("Install")));
    assert_eq!(log.closes, 1);
    assert_eq!(files_in(h.work_dir()), vec!["notes.txt"]);
}

#[tokio::test]
async fn test_console_failure_still_cleans() {
    let h = Harness::new(
        DeviceCertificate::Trusted(1),
        ConsoleScript {
            fail_on: Some(Selector::role("button", "Install")),
            ..Default::default()
        },
        FakeIssuer::succeeding(),
    );
    stage_artifacts(h.work_dir());

    let err = h.renewer.install(TrustPosture::Relaxed).await.unwrap_err();

    assert_eq!(err.step(), Some("install"));
    assert!(files_in(h.work_dir()).is_empty());
    let log = h.console.log();
    assert_eq!(log.launches, vec![TrustPosture::Relaxed]);
    assert_eq!(log.closes, 1);
}

#[tokio::test]
async fn test_install_posture_follows_marker() {
    let h = Harness::new(
        DeviceCertificate::Trusted(1),
        ConsoleScript::default(),
        FakeIssuer::succeeding(),
    );
    let options = RunOptions::default();

    assert_eq!(h.renewer.install_posture(&options), TrustPosture::Strict);

    h.renewer.marker().persist("probe failed").expect("persist");
    assert_eq!(h.renewer.install_posture(&options), TrustPosture::Relaxed);

    // Legacy touch-file content still counts
    std::fs::write(h.renewer.marker().path(), "").expect("write");
    assert_eq!(h.renewer.install_posture(&options), TrustPosture::Relaxed);

    h.renewer.marker().clear().expect("clear");
    let forced = RunOptions {
        force_insecure: true,
        ..Default::default()
    };
    assert_eq!(h.renewer.install_posture(&forced), TrustPosture::Relaxed);
}
