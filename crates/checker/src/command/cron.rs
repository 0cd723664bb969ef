// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `iijmio-checker cron`: one usage check, meant to be run by a scheduler.

use std::io::Write;

use anyhow::Context;
use tracing::{debug, info};

use crate::clock::CivilClock;
use crate::config::{Config, CronArgs};
use crate::store::ConfigStore;
use crate::usage::{ThresholdEvaluator, UsageClient};

pub async fn run(config: &Config, args: &CronArgs) -> anyhow::Result<()> {
    let clock = CivilClock::system(config.timezone()?);
    let store = ConfigStore::new(config.config_path(), clock.clone());
    let client = UsageClient::new(&args.usage_url, config.developer_id()?, args.timeout())?;
    let evaluator = ThresholdEvaluator::new(args.threshold, clock);

    let mut stdout = std::io::stdout();
    run_check(&store, &client, &evaluator, &mut stdout).await
}

/// Load and validate the credential, query usage, and write any report line.
pub async fn run_check(
    store: &ConfigStore,
    client: &UsageClient,
    evaluator: &ThresholdEvaluator,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let cred = store.load()?;
    let expires_at = store.validate(&cred).context("token is invalid")?;
    debug!(expires_at = %expires_at, "stored token is valid");

    let reply = client.fetch(&cred.token).await?;
    match evaluator.evaluate(&reply)? {
        Some(report) => {
            report.write_to(out)?;
            out.flush()?;
        }
        None => info!(endpoint = %client.endpoint(), "usage is under the threshold"),
    }
    Ok(())
}

#[cfg(test)]
#[path = "cron_tests.rs"]
mod tests;
