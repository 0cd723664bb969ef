// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-browser session state.
//!
//! Request handlers only see the [`SessionState`] capability. The concrete
//! [`CookieSession`] keeps the whole record client-side in a sealed cookie
//! (see [`cookie`]) keyed by material from [`keys`].

pub mod cookie;
pub mod keys;

use std::collections::BTreeMap;
use std::fmt;

use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::session::cookie::SessionCodec;

/// Session key holding the live anti-forgery token.
pub const STATE_KEY: &str = "state";

/// Capability a request handler needs from the session transport.
pub trait SessionState {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String);
    fn add_flash(&mut self, message: String);
    /// Drain queued flash messages in insertion order.
    fn take_flashes(&mut self) -> Vec<String>;
    /// Commit pending changes so they reach the client.
    fn save(&mut self) -> Result<(), SessionError>;
}

/// Failure to commit a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    Encode(String),
    /// The sealed cookie exceeds what browsers accept.
    TooLarge(usize),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encode(msg) => write!(f, "failed to encode session: {msg}"),
            Self::TooLarge(len) => write!(f, "session cookie too large: {len} bytes"),
        }
    }
}

impl std::error::Error for SessionError {}

/// Serialized session contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(default)]
    pub values: BTreeMap<String, String>,
    #[serde(default)]
    pub flashes: Vec<String>,
}

/// Session stored in an encrypted, authenticated cookie.
pub struct CookieSession<'a> {
    codec: &'a SessionCodec,
    record: SessionRecord,
    set_cookie: Option<String>,
}

impl<'a> CookieSession<'a> {
    /// Load the session carried by the request's `Cookie` headers.
    ///
    /// Missing, expired or tampered cookies yield an empty session.
    pub fn from_headers(codec: &'a SessionCodec, headers: &HeaderMap) -> Self {
        let record = headers
            .get_all(axum::http::header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .filter(|(name, _)| *name == codec.name())
            .find_map(|(_, value)| codec.decode(value))
            .unwrap_or_default();
        Self { codec, record, set_cookie: None }
    }

    /// `Set-Cookie` header value produced by the last successful [`save`].
    ///
    /// [`save`]: SessionState::save
    pub fn set_cookie(&self) -> Option<&str> {
        self.set_cookie.as_deref()
    }
}

impl SessionState for CookieSession<'_> {
    fn get(&self, key: &str) -> Option<String> {
        self.record.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.record.values.insert(key.to_owned(), value);
    }

    fn add_flash(&mut self, message: String) {
        self.record.flashes.push(message);
    }

    fn take_flashes(&mut self) -> Vec<String> {
        std::mem::take(&mut self.record.flashes)
    }

    fn save(&mut self) -> Result<(), SessionError> {
        let value = self.codec.encode(&self.record)?;
        self.set_cookie = Some(self.codec.set_cookie_header(&value));
        Ok(())
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
