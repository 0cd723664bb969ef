// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod auth;
pub mod callback;
pub mod clock;
pub mod command;
pub mod config;
pub mod error;
pub mod session;
pub mod store;
pub mod test_support;
pub mod transport;
pub mod usage;
