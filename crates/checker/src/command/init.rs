// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `iijmio-checker init`: remove the storage directory.

use crate::clock::CivilClock;
use crate::config::Config;
use crate::store::ConfigStore;

pub fn run(config: &Config) -> anyhow::Result<()> {
    let store = ConfigStore::new(config.config_path(), CivilClock::system(config.timezone()?));
    store.reset()?;
    Ok(())
}

#[cfg(test)]
#[path = "init_tests.rs"]
mod tests;
