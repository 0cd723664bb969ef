// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authorization callback validation.
//!
//! The provider answers with one of two payloads: an error (`error`,
//! `error_description`, `state`) or a token (`access_token`, `token_type`,
//! `expires_in`, `state`). The error shape is always tried first; a payload
//! is only treated as an error when every error field is present.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;
use crate::session::{SessionState, STATE_KEY};
use crate::store::{Credential, TokenSink};

/// Flash shown on the index page after a token was stored.
pub const SUCCESS_FLASH: &str = "Config file successfully created!";

/// The only token type the provider is expected to issue.
pub const BEARER: &str = "Bearer";

/// How the callback fields reach `POST /auth`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PayloadShape {
    /// Fields are posted individually.
    Flat,
    /// Fields are packed into a single `params` field holding a query string.
    #[default]
    Nested,
}

impl fmt::Display for PayloadShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flat => f.write_str("flat"),
            Self::Nested => f.write_str("nested"),
        }
    }
}

/// Decoded form fields of a callback request, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackFields(Vec<(String, String)>);

impl CallbackFields {
    /// Parse an urlencoded body followed by the request query string.
    pub fn parse(body: &[u8], query: Option<&str>) -> Self {
        let mut pairs: Vec<(String, String)> =
            url::form_urlencoded::parse(body).into_owned().collect();
        if let Some(query) = query {
            pairs.extend(url::form_urlencoded::parse(query.as_bytes()).into_owned());
        }
        Self(pairs)
    }

    pub fn from_query(query: &str) -> Self {
        Self::parse(query.as_bytes(), None)
    }

    /// First value for `key`. Empty values count as missing.
    pub fn required(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CallbackFields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Provider declined the authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorShape {
    pub error: String,
    pub error_description: String,
    pub state: String,
}

/// Provider issued a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuccessShape {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub state: String,
}

/// A callback payload, decided by which required field set is complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackPayload {
    Error(ErrorShape),
    Success(SuccessShape),
}

impl CallbackPayload {
    /// Decode `fields` for the given deployment shape.
    ///
    /// For [`PayloadShape::Nested`], the inner `params` query string replaces
    /// the outer fields when present.
    pub fn decode(fields: &CallbackFields, shape: PayloadShape) -> Result<Self, CallbackRejection> {
        let inner = match shape {
            PayloadShape::Nested => fields.required("params").map(CallbackFields::from_query),
            PayloadShape::Flat => None,
        };
        let effective = inner.as_ref().unwrap_or(fields);

        if let Some(err) = decode_error_shape(effective) {
            return Ok(Self::Error(err));
        }
        if shape == PayloadShape::Nested && inner.is_none() {
            return Err(CallbackRejection::MalformedCallback("missing field: params".to_owned()));
        }
        decode_success_shape(effective).map(Self::Success)
    }
}

fn decode_error_shape(fields: &CallbackFields) -> Option<ErrorShape> {
    Some(ErrorShape {
        error: fields.required("error")?.to_owned(),
        error_description: fields.required("error_description")?.to_owned(),
        state: fields.required("state")?.to_owned(),
    })
}

fn decode_success_shape(fields: &CallbackFields) -> Result<SuccessShape, CallbackRejection> {
    let field = |key: &str| {
        fields
            .required(key)
            .map(str::to_owned)
            .ok_or_else(|| CallbackRejection::MalformedCallback(format!("missing field: {key}")))
    };
    let access_token = field("access_token")?;
    let token_type = field("token_type")?;
    let expires_in = field("expires_in")?
        .parse::<u64>()
        .ok()
        .filter(|secs| *secs >= 1)
        .ok_or_else(|| {
            CallbackRejection::MalformedCallback(
                "expires_in must be a positive integer".to_owned(),
            )
        })?;
    let state = field("state")?;
    Ok(SuccessShape { access_token, token_type, expires_in, state })
}

/// Why a callback was not accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackRejection {
    StateNotFound,
    InvalidState,
    ProviderError { error: String, description: String },
    MalformedCallback(String),
    UnsupportedTokenType(String),
    PersistenceFailure(String),
    SessionFailure(String),
}

impl CallbackRejection {
    /// Client-class rejections map to 400, storage and session failures to 500.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::StateNotFound
            | Self::InvalidState
            | Self::ProviderError { .. }
            | Self::MalformedCallback(_)
            | Self::UnsupportedTokenType(_) => ErrorCode::BadRequest,
            Self::PersistenceFailure(_) | Self::SessionFailure(_) => ErrorCode::Internal,
        }
    }
}

impl fmt::Display for CallbackRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StateNotFound => f.write_str("state not found"),
            Self::InvalidState => f.write_str("invalid state"),
            Self::ProviderError { error, description } => {
                write!(f, "error: {error}, description: {description}")
            }
            Self::MalformedCallback(msg) => write!(f, "malformed callback: {msg}"),
            Self::UnsupportedTokenType(kind) => write!(f, "invalid token type: {kind}"),
            Self::PersistenceFailure(msg) => write!(f, "failed to save config: {msg}"),
            Self::SessionFailure(msg) => write!(f, "failed to save session: {msg}"),
        }
    }
}

impl std::error::Error for CallbackRejection {}

/// Constant-time string comparison.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut acc = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        acc |= x ^ y;
    }
    acc == 0
}

/// Evaluates one callback against the session's live anti-forgery token.
pub struct CallbackValidator<'a> {
    sink: &'a dyn TokenSink,
    shape: PayloadShape,
}

impl<'a> CallbackValidator<'a> {
    pub fn new(sink: &'a dyn TokenSink, shape: PayloadShape) -> Self {
        Self { sink, shape }
    }

    /// Run the callback checks in order and persist the token on success.
    ///
    /// On acceptance a success flash is queued and the session is saved;
    /// the caller redirects to the index page.
    pub fn evaluate(
        &self,
        session: &mut dyn SessionState,
        fields: &CallbackFields,
    ) -> Result<Credential, CallbackRejection> {
        let expected = session.get(STATE_KEY).ok_or(CallbackRejection::StateNotFound)?;

        let success = match CallbackPayload::decode(fields, self.shape)? {
            CallbackPayload::Error(err) => {
                if !constant_time_eq(&err.state, &expected) {
                    return Err(CallbackRejection::InvalidState);
                }
                return Err(CallbackRejection::ProviderError {
                    error: err.error,
                    description: err.error_description,
                });
            }
            CallbackPayload::Success(success) => success,
        };

        if success.token_type != BEARER {
            return Err(CallbackRejection::UnsupportedTokenType(success.token_type));
        }
        if !constant_time_eq(&success.state, &expected) {
            return Err(CallbackRejection::InvalidState);
        }

        let credential = self
            .sink
            .save(&success.access_token, success.expires_in)
            .map_err(|e| CallbackRejection::PersistenceFailure(e.to_string()))?;

        session.add_flash(SUCCESS_FLASH.to_owned());
        session.save().map_err(|e| CallbackRejection::SessionFailure(e.to_string()))?;
        Ok(credential)
    }
}

#[cfg(test)]
#[path = "callback_tests.rs"]
mod tests;
