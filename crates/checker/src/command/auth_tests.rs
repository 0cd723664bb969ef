// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;

use super::*;
use crate::config::Command;

fn parse(args: &[&str]) -> anyhow::Result<(Config, AuthArgs)> {
    let config = Config::try_parse_from(args)?;
    let Command::Auth(auth) = &config.command else {
        anyhow::bail!("expected auth subcommand");
    };
    let auth = auth.clone();
    Ok((config, auth))
}

#[test]
fn state_creates_session_keys_once() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let config_path = tmp.path().join("app").join("config.json");
    let config_path = config_path.to_str().ok_or_else(|| anyhow::anyhow!("non-utf8"))?;
    let (config, args) =
        parse(&["iijmio-checker", "--developer-id", "dev", "--config", config_path, "auth"])?;

    build_state(&config, &args)?;
    let key_path = tmp.path().join("app").join("session-config");
    let first = std::fs::read(&key_path)?;
    assert_eq!(first.len(), 96);

    let state = build_state(&config, &args)?;
    assert_eq!(std::fs::read(&key_path)?, first);
    assert_eq!(state.codec.name(), APP_NAME);
    Ok(())
}

#[test]
fn blank_developer_id_is_rejected() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let keys = tmp.path().join("keys");
    let keys = keys.to_str().ok_or_else(|| anyhow::anyhow!("non-utf8"))?;
    let (config, args) =
        parse(&["iijmio-checker", "--developer-id", " ", "auth", "--session-config", keys])?;
    let err = build_state(&config, &args).err().ok_or_else(|| anyhow::anyhow!("expected error"))?;
    assert!(err.to_string().contains("IIJMIO_DEVELOPERID"), "got {err}");
    Ok(())
}
