// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authorization redirect construction for the provider's implicit flow.

use std::fmt;

use url::Url;
use uuid::Uuid;

use crate::session::{SessionState, STATE_KEY};

/// Provider authorization endpoint.
pub const DEFAULT_AUTHORIZE_URL: &str = "https://api.iijmio.jp/mobile/d/v1/authorization/";

/// Local callback the provider redirects back to.
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8080/auth";

/// Environment variable supplying the developer (client) id.
pub const DEVELOPER_ID_ENV: &str = "IIJMIO_DEVELOPERID";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    MissingDeveloperId,
    InvalidUrl(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingDeveloperId => write!(f, "set developer ID in {DEVELOPER_ID_ENV}"),
            Self::InvalidUrl(msg) => write!(f, "invalid authorization URL: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

/// Generate a fresh anti-forgery token.
pub fn generate_state() -> String {
    Uuid::new_v4().to_string()
}

/// Builds provider authorization links bound to a browser session.
#[derive(Debug, Clone)]
pub struct AuthorizationRequestBuilder {
    authorize_url: Url,
    client_id: String,
    redirect_uri: String,
}

impl AuthorizationRequestBuilder {
    pub fn new(
        authorize_url: &str,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Result<Self, AuthError> {
        let client_id = client_id.into();
        if client_id.trim().is_empty() {
            return Err(AuthError::MissingDeveloperId);
        }
        let authorize_url =
            Url::parse(authorize_url).map_err(|e| AuthError::InvalidUrl(e.to_string()))?;
        Ok(Self { authorize_url, client_id, redirect_uri: redirect_uri.into() })
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Issue a new anti-forgery token into `session` and return the
    /// authorization URL that carries it.
    ///
    /// Any token issued earlier in the same session is replaced, so only the
    /// most recent link can complete the flow.
    pub fn issue(&self, session: &mut dyn SessionState) -> Url {
        let state = generate_state();
        session.set(STATE_KEY, state.clone());
        self.url_for_state(&state)
    }

    /// Authorization URL for an explicit `state` value.
    pub fn url_for_state(&self, state: &str) -> Url {
        let mut url = self.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "token")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("state", state);
        url
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
