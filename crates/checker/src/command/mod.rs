// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI subcommands: `init`, `auth`, `cron`.

pub mod auth;
pub mod cron;
pub mod init;
