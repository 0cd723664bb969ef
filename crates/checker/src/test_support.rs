// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: fakes, clocks, and assertion helpers.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Once};

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::auth::{AuthorizationRequestBuilder, DEFAULT_AUTHORIZE_URL, DEFAULT_REDIRECT_URI};
use crate::callback::PayloadShape;
use crate::clock::{CivilClock, DEFAULT_TIMEZONE};
use crate::config::APP_NAME;
use crate::session::cookie::SessionCodec;
use crate::session::keys::SessionKeys;
use crate::session::{SessionError, SessionState, STATE_KEY};
use crate::store::{ConfigStore, Credential, StoreError, TokenSink};
use crate::transport::AppState;

pub trait AnyhowExt<T> {
    fn anyhow(self) -> anyhow::Result<T>;
}

impl<T, E: std::fmt::Display> AnyhowExt<T> for Result<T, E> {
    fn anyhow(self) -> anyhow::Result<T> {
        self.map_err(|e| anyhow::anyhow!("{e}"))
    }
}

/// Assert that an expression evaluates to `Err` whose Display output
/// contains the given substring.
#[macro_export]
macro_rules! assert_err_contains {
    ($expr:expr, $substr:expr) => {{
        let result = $expr;
        let err = result.expect_err(concat!("expected Err for: ", stringify!($expr)));
        let msg = err.to_string();
        assert!(msg.contains($substr), "expected error containing {:?}, got: {msg:?}", $substr);
    }};
}

static CRYPTO_INIT: Once = Once::new();

/// Install the rustls crypto provider (needed for reqwest even on plain HTTP).
pub fn ensure_crypto_provider() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Clock in the default civil timezone frozen at an RFC 3339 instant.
pub fn fixed_clock(instant: &str) -> anyhow::Result<CivilClock> {
    let instant = DateTime::parse_from_rfc3339(instant)?.with_timezone(&Utc);
    Ok(CivilClock::fixed(DEFAULT_TIMEZONE, instant))
}

/// In-memory session that counts saves and can be told to fail them.
#[derive(Debug, Default)]
pub struct MemorySession {
    pub values: BTreeMap<String, String>,
    pub flashes: Vec<String>,
    pub saves: usize,
    pub fail_save: bool,
}

impl MemorySession {
    /// Session already holding an anti-forgery token.
    pub fn with_state(state: &str) -> Self {
        let mut session = Self::default();
        session.values.insert(STATE_KEY.to_owned(), state.to_owned());
        session
    }
}

impl SessionState for MemorySession {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.values.insert(key.to_owned(), value);
    }

    fn add_flash(&mut self, message: String) {
        self.flashes.push(message);
    }

    fn take_flashes(&mut self) -> Vec<String> {
        std::mem::take(&mut self.flashes)
    }

    fn save(&mut self) -> Result<(), SessionError> {
        if self.fail_save {
            return Err(SessionError::Encode("save disabled".to_owned()));
        }
        self.saves += 1;
        Ok(())
    }
}

/// Token sink that records every save call.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub calls: Mutex<Vec<(String, u64)>>,
}

impl RecordingSink {
    pub fn calls(&self) -> Vec<(String, u64)> {
        self.calls.lock().clone()
    }
}

impl TokenSink for RecordingSink {
    fn save(&self, token: &str, expires_in_secs: u64) -> Result<Credential, StoreError> {
        self.calls.lock().push((token.to_owned(), expires_in_secs));
        Ok(Credential { token: token.to_owned(), expires_at: format!("+{expires_in_secs}s") })
    }
}

/// Token sink whose writes always fail.
#[derive(Debug, Default)]
pub struct FailingSink;

impl TokenSink for FailingSink {
    fn save(&self, _token: &str, _expires_in_secs: u64) -> Result<Credential, StoreError> {
        Err(StoreError::Io {
            path: "/read-only/config.json".into(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        })
    }
}

/// Requests observed by a mock usage API.
pub type SeenRequests = Arc<Mutex<Vec<HeaderMap>>>;

/// Spawn a fake usage-log API on a random port answering every request
/// with `status` and `body`.
pub async fn spawn_mock_usage_api(
    status: u16,
    body: String,
) -> anyhow::Result<(SocketAddr, SeenRequests)> {
    let seen: SeenRequests = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);
    let app = axum::Router::new().fallback(move |headers: HeaderMap| {
        let recorder = Arc::clone(&recorder);
        let body = body.clone();
        async move {
            recorder.lock().push(headers);
            (
                axum::http::StatusCode::from_u16(status)
                    .unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR),
                [(axum::http::header::CONTENT_TYPE, "application/json")],
                body,
            )
        }
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    Ok((addr, seen))
}

/// Builder for a callback-server `AppState` rooted in a scratch directory.
pub struct AppStateBuilder {
    config_path: PathBuf,
    shape: PayloadShape,
    clock: CivilClock,
    keys: SessionKeys,
}

impl AppStateBuilder {
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            shape: PayloadShape::default(),
            clock: CivilClock::system(DEFAULT_TIMEZONE),
            keys: SessionKeys::generate(),
        }
    }

    pub fn shape(mut self, shape: PayloadShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn clock(mut self, clock: CivilClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> anyhow::Result<Arc<AppState>> {
        Ok(Arc::new(AppState {
            codec: SessionCodec::new(APP_NAME, &self.keys)?.with_clock(self.clock.clone()),
            store: ConfigStore::new(self.config_path, self.clock),
            authorize: AuthorizationRequestBuilder::new(
                DEFAULT_AUTHORIZE_URL,
                "test-developer",
                DEFAULT_REDIRECT_URI,
            )?,
            shape: self.shape,
        }))
    }
}

/// `name=value` part of a `Set-Cookie` header.
pub fn cookie_pair(set_cookie: &str) -> &str {
    set_cookie.split(';').next().unwrap_or_default().trim()
}

/// Serve the callback router on a random local port.
pub async fn spawn_http_server(state: Arc<AppState>) -> anyhow::Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let router = crate::transport::build_router(state);
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    Ok(addr)
}
