// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers for the callback server.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{RawQuery, State};
use axum::http::header::{LOCATION, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use tracing::{error, info, warn};

use crate::callback::{CallbackFields, CallbackRejection, CallbackValidator};
use crate::error::ErrorCode;
use crate::session::{CookieSession, SessionState};
use crate::store::StoreError;
use crate::transport::state::AppState;
use crate::transport::view;

/// `GET /` — issue a fresh anti-forgery state and render the authorization link.
pub async fn index(State(s): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let mut session = CookieSession::from_headers(&s.codec, &headers);
    let authorize_url = s.authorize.issue(&mut session);

    let mut expires_at = None;
    match s.store.load() {
        Ok(cred) => match s.store.validate(&cred) {
            Ok(at) => expires_at = Some(at.to_rfc3339()),
            Err(e) => session.add_flash(format!("token is invalid: {e}")),
        },
        Err(StoreError::NotFound(_)) => {}
        Err(e) => {
            warn!(err = %e, "stored credential unreadable");
            session.add_flash(format!("token is invalid: {e}"));
        }
    }

    let flashes = session.take_flashes();
    if let Err(e) = session.save() {
        error!(err = %e, "failed to save session");
        return error_page(ErrorCode::Internal, &format!("failed to save session: {e}"));
    }

    let body = view::index_page(authorize_url.as_str(), &flashes, expires_at.as_deref());
    with_session_cookie(Html(body).into_response(), &session)
}

/// `GET /auth` — landing page that forwards the provider's fragment.
pub async fn auth_landing(State(s): State<Arc<AppState>>) -> Html<String> {
    Html(view::auth_page(s.shape))
}

/// `POST /auth` — validate the callback and persist the token.
pub async fn auth_callback(
    State(s): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    let fields = CallbackFields::parse(&body, query.as_deref());
    let mut session = CookieSession::from_headers(&s.codec, &headers);

    match CallbackValidator::new(&s.store, s.shape).evaluate(&mut session, &fields) {
        Ok(cred) => {
            info!(
                path = %s.store.path().display(),
                expires_in = %cred.expires_at,
                "config file successfully created; press Ctrl+C and run the cron subcommand"
            );
            let resp = (StatusCode::SEE_OTHER, [(LOCATION, HeaderValue::from_static("/"))])
                .into_response();
            with_session_cookie(resp, &session)
        }
        Err(rejection) => reject(&rejection),
    }
}

fn reject(rejection: &CallbackRejection) -> Response {
    let code = rejection.error_code();
    if code.is_client_error() {
        warn!(code = %code, reason = %rejection, "callback rejected");
    } else {
        error!(code = %code, reason = %rejection, "callback failed");
    }
    error_page(code, &rejection.to_string())
}

fn error_page(code: ErrorCode, message: &str) -> Response {
    let status = StatusCode::from_u16(code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Html(view::error_page(message))).into_response()
}

fn with_session_cookie(mut resp: Response, session: &CookieSession<'_>) -> Response {
    if let Some(cookie) = session.set_cookie() {
        match HeaderValue::from_str(cookie) {
            Ok(value) => {
                resp.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => error!(err = %e, "session cookie is not a valid header value"),
        }
    }
    resp
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
