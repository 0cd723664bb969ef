// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::os::unix::fs::PermissionsExt;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Datelike, TimeDelta, TimeZone, Utc};

use super::*;
use crate::clock::DEFAULT_TIMEZONE;

fn instant(h: u32, m: u32, s: u32) -> anyhow::Result<DateTime<Utc>> {
    Utc.with_ymd_and_hms(2026, 10, 16, h, m, s)
        .single()
        .ok_or_else(|| anyhow::anyhow!("ambiguous instant"))
}

fn store_at(dir: &Path, now: DateTime<Utc>) -> ConfigStore {
    ConfigStore::new(dir.join("iijmio-checker/config.json"), CivilClock::fixed(DEFAULT_TIMEZONE, now))
}

fn cred(token: &str, expires_at: &str) -> Credential {
    Credential { token: token.to_owned(), expires_at: expires_at.to_owned() }
}

#[test]
fn save_formats_expiry_in_civil_time() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = store_at(dir.path(), instant(3, 0, 0)?);

    let saved = store.save("tok123", 3600)?;
    assert_eq!(saved.token, "tok123");
    assert_eq!(saved.expires_at, "2026-10-16T13:00:00+09:00");

    let raw = std::fs::read_to_string(store.path())?;
    let json: serde_json::Value = serde_json::from_str(&raw)?;
    assert_eq!(json["token"], "tok123");
    assert_eq!(json["expires_in"], "2026-10-16T13:00:00+09:00");
    Ok(())
}

#[test]
fn save_then_load_validates() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = store_at(dir.path(), instant(3, 0, 0)?);
    store.save("tok", 1)?;

    let loaded = store.load()?;
    let expires_at = store.validate(&loaded)?;
    assert_eq!(expires_at.with_timezone(&Utc), instant(3, 0, 1)?);
    Ok(())
}

#[test]
fn saved_token_expires_once_clock_passes_expiry() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let now = Arc::new(Mutex::new(instant(3, 0, 0)?));
    let handle = Arc::clone(&now);
    let clock = CivilClock::from_fn(DEFAULT_TIMEZONE, move || {
        *handle.lock().unwrap_or_else(|e| e.into_inner())
    });
    let store = ConfigStore::new(dir.path().join("config.json"), clock);
    store.save("tok", 60)?;

    // Exactly at the expiry instant the token is still valid.
    *now.lock().unwrap_or_else(|e| e.into_inner()) = instant(3, 1, 0)?;
    assert!(store.validate(&store.load()?).is_ok());

    *now.lock().unwrap_or_else(|e| e.into_inner()) = instant(3, 1, 0)? + TimeDelta::seconds(1);
    assert_eq!(store.validate(&store.load()?), Err(TokenError::Expired));
    Ok(())
}

#[yare::parameterized(
    empty_token_valid_expiry   = { "", "2099-01-01T00:00:00+09:00", Some(TokenError::NoToken) },
    empty_token_bad_expiry     = { "", "not a time", Some(TokenError::NoToken) },
    bad_expiry                 = { "tok", "not a time", Some(TokenError::InvalidExpiry) },
    empty_expiry               = { "tok", "", Some(TokenError::InvalidExpiry) },
    expired                    = { "tok", "2026-10-16T11:59:59+09:00", Some(TokenError::Expired) },
    expired_other_offset       = { "tok", "2026-10-16T02:59:59Z", Some(TokenError::Expired) },
    valid                      = { "tok", "2026-10-16T12:00:01+09:00", None },
)]
fn validate_order(token: &str, expires_at: &str, expected: Option<TokenError>) {
    let now = Utc.with_ymd_and_hms(2026, 10, 16, 3, 0, 0).single().unwrap_or_default();
    let store = ConfigStore::new("/nonexistent/config.json", CivilClock::fixed(DEFAULT_TIMEZONE, now));
    assert_eq!(store.validate(&cred(token, expires_at)).err(), expected);
}

#[test]
fn load_missing_file_is_not_found() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = store_at(dir.path(), instant(0, 0, 0)?);
    let err = store.load().err();
    assert!(matches!(err, Some(StoreError::NotFound(_))), "got {err:?}");
    Ok(())
}

#[test]
fn load_directory_is_not_found() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = ConfigStore::new(dir.path(), CivilClock::system(DEFAULT_TIMEZONE));
    assert!(matches!(store.load(), Err(StoreError::NotFound(_))));
    Ok(())
}

#[test]
fn load_garbage_is_parse_error() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{\"token\": \"half")?;
    let store = ConfigStore::new(&path, CivilClock::system(DEFAULT_TIMEZONE));
    let err = store.load().err();
    assert!(matches!(err, Some(StoreError::Parse { .. })), "got {err:?}");
    crate::assert_err_contains!(store.load(), "corrupt");
    Ok(())
}

#[test]
fn save_overwrites_previous_record() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = store_at(dir.path(), instant(0, 0, 0)?);
    store.save("first-token-that-is-long", 7200)?;
    store.save("second", 60)?;

    let loaded = store.load()?;
    assert_eq!(loaded, cred("second", "2026-10-16T09:01:00+09:00"));

    let leftovers: Vec<_> = std::fs::read_dir(store.path().parent().unwrap_or(dir.path()))?
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
    Ok(())
}

#[test]
fn save_creates_private_directory() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = store_at(dir.path(), instant(0, 0, 0)?);
    store.save("tok", 60)?;

    let parent = dir.path().join("iijmio-checker");
    let mode = std::fs::metadata(&parent)?.permissions().mode() & 0o777;
    assert_eq!(mode, 0o700);
    let file_mode = std::fs::metadata(store.path())?.permissions().mode() & 0o777;
    assert_eq!(file_mode, 0o600);
    Ok(())
}

#[test]
fn reset_removes_directory_and_tolerates_absence() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = store_at(dir.path(), instant(0, 0, 0)?);
    store.reset()?;

    store.save("tok", 60)?;
    std::fs::write(dir.path().join("iijmio-checker/session-config"), [0u8; 96])?;
    store.reset()?;
    assert!(!dir.path().join("iijmio-checker").exists());
    assert!(matches!(store.load(), Err(StoreError::NotFound(_))));
    Ok(())
}

#[yare::parameterized(
    past_year_9999     = { 400_000_000_000 },
    past_time_delta    = { 10_000_000_000_000_000 },
    past_i64           = { u64::MAX },
)]
fn unrepresentable_expiry_is_refused(expires_in: u64) -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = store_at(dir.path(), instant(3, 0, 0)?);
    store.save("previous", 3600)?;

    let err = store.save("tok", expires_in).err();
    assert!(matches!(err, Some(StoreError::ExpiryOutOfRange(n)) if n == expires_in), "got {err:?}");

    let loaded = store.load()?;
    assert_eq!(loaded, cred("previous", "2026-10-16T13:00:00+09:00"));
    Ok(())
}

#[test]
fn century_long_expiry_round_trips() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = store_at(dir.path(), instant(3, 0, 0)?);
    store.save("tok", 100 * 365 * 24 * 60 * 60)?;

    let expires_at = store.validate(&store.load()?)?;
    assert_eq!(expires_at.year(), 2126);
    Ok(())
}
