// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use serde_json::json;

use super::*;
use crate::store::TokenSink;
use crate::test_support::{ensure_crypto_provider, fixed_clock, spawn_mock_usage_api, SeenRequests};
use crate::usage::THRESHOLD_MB;

const NOW: &str = "2024-05-01T01:00:00Z";

struct Fixture {
    _dir: tempfile::TempDir,
    store: ConfigStore,
    client: UsageClient,
    evaluator: ThresholdEvaluator,
    seen: SeenRequests,
}

async fn fixture(status: u16, body: serde_json::Value) -> anyhow::Result<Fixture> {
    ensure_crypto_provider();
    let dir = tempfile::tempdir()?;
    let clock = fixed_clock(NOW)?;
    let store = ConfigStore::new(dir.path().join("config.json"), clock.clone());
    let (addr, seen) = spawn_mock_usage_api(status, body.to_string()).await?;
    let client = UsageClient::new(&format!("http://{addr}/"), "dev-1", Duration::from_secs(5))?;
    let evaluator = ThresholdEvaluator::new(THRESHOLD_MB, clock);
    Ok(Fixture { _dir: dir, store, client, evaluator, seen })
}

fn usage_body(with_coupon: u64) -> serde_json::Value {
    json!({
        "returnCode": "OK",
        "packetLogInfo": [{
            "hddServiceCode": "hdd1",
            "plan": "Minimum Start",
            "hdoInfo": [{
                "hdoServiceCode": "hdo1",
                "packetLog": [
                    { "date": "20240430", "withCoupon": 999, "withoutCoupon": 0 },
                    { "date": "20240501", "withCoupon": with_coupon, "withoutCoupon": 12 }
                ]
            }]
        }]
    })
}

async fn check(f: &Fixture) -> anyhow::Result<String> {
    let mut out = Vec::new();
    run_check(&f.store, &f.client, &f.evaluator, &mut out).await?;
    Ok(String::from_utf8(out)?)
}

#[tokio::test]
async fn over_threshold_prints_one_line() -> anyhow::Result<()> {
    let f = fixture(200, usage_body(200)).await?;
    f.store.save("tok123", 3600)?;

    let out = check(&f).await?;
    assert_eq!(out, "iijmio-checker: you use 200 MB with the coupon\n");

    let seen = f.seen.lock().clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(
        seen[0].get(crate::usage::AUTHORIZATION_HEADER).and_then(|v| v.to_str().ok()),
        Some("tok123")
    );
    Ok(())
}

#[tokio::test]
async fn under_threshold_is_silent() -> anyhow::Result<()> {
    let f = fixture(200, usage_body(50)).await?;
    f.store.save("tok123", 3600)?;
    assert_eq!(check(&f).await?, "");
    Ok(())
}

#[tokio::test]
async fn upstream_error_is_reported_and_succeeds() -> anyhow::Result<()> {
    let f = fixture(403, json!({ "returnCode": "User Authorization Failure" })).await?;
    f.store.save("tok123", 3600)?;
    assert_eq!(
        check(&f).await?,
        "iijmio-checker: error: status=403, message=User Authorization Failure\n"
    );
    Ok(())
}

#[tokio::test]
async fn expired_token_fails_without_request() -> anyhow::Result<()> {
    let f = fixture(200, usage_body(200)).await?;
    std::fs::write(
        f.store.path(),
        r#"{"token":"tok","expires_in":"2024-05-01T09:59:59+09:00"}"#,
    )?;

    let err = check(&f).await.err().ok_or_else(|| anyhow::anyhow!("expected failure"))?;
    assert_eq!(format!("{err:#}"), "token is invalid: token expired");
    assert!(f.seen.lock().is_empty());
    Ok(())
}

#[tokio::test]
async fn missing_config_is_fatal() -> anyhow::Result<()> {
    let f = fixture(200, usage_body(200)).await?;
    crate::assert_err_contains!(check(&f).await, "config file not found");
    assert!(f.seen.lock().is_empty());
    Ok(())
}

#[tokio::test]
async fn missing_today_is_fatal() -> anyhow::Result<()> {
    let body = json!({
        "returnCode": "OK",
        "packetLogInfo": [{ "hdoInfo": [{ "packetLog": [
            { "date": "20240430", "withCoupon": 1, "withoutCoupon": 0 }
        ] }] }]
    });
    let f = fixture(200, body).await?;
    f.store.save("tok123", 3600)?;
    crate::assert_err_contains!(check(&f).await, "no packet log for today");
    Ok(())
}

#[tokio::test]
async fn repeated_runs_agree() -> anyhow::Result<()> {
    let f = fixture(200, usage_body(400)).await?;
    f.store.save("tok123", 3600)?;
    assert_eq!(check(&f).await?, check(&f).await?);
    assert_eq!(f.seen.lock().len(), 2);
    Ok(())
}
