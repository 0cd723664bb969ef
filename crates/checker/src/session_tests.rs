// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::http::header::COOKIE;
use axum::http::{HeaderMap, HeaderValue};

use super::*;
use crate::session::keys::SessionKeys;

fn codec() -> anyhow::Result<SessionCodec> {
    Ok(SessionCodec::new("app", &SessionKeys::generate())?)
}

/// Turn a `Set-Cookie` value into the `Cookie` request header a browser would send.
fn cookie_headers(set_cookie: Option<&str>) -> anyhow::Result<HeaderMap> {
    let set_cookie = set_cookie.ok_or_else(|| anyhow::anyhow!("no cookie issued"))?;
    let pair = set_cookie.split(';').next().unwrap_or_default();
    let mut headers = HeaderMap::new();
    headers.insert(COOKIE, HeaderValue::from_str(&format!("other=1; {pair}"))?);
    Ok(headers)
}

#[test]
fn empty_without_cookie() -> anyhow::Result<()> {
    let codec = codec()?;
    let mut session = CookieSession::from_headers(&codec, &HeaderMap::new());
    assert_eq!(session.get(STATE_KEY), None);
    assert!(session.take_flashes().is_empty());
    assert_eq!(session.set_cookie(), None);
    Ok(())
}

#[test]
fn values_and_flashes_survive_round_trip() -> anyhow::Result<()> {
    let codec = codec()?;
    let mut first = CookieSession::from_headers(&codec, &HeaderMap::new());
    first.set(STATE_KEY, "s1".to_owned());
    first.add_flash("one".to_owned());
    first.add_flash("two".to_owned());
    first.save()?;

    let headers = cookie_headers(first.set_cookie())?;
    let mut second = CookieSession::from_headers(&codec, &headers);
    assert_eq!(second.get(STATE_KEY).as_deref(), Some("s1"));
    assert_eq!(second.take_flashes(), vec!["one".to_owned(), "two".to_owned()]);
    assert!(second.take_flashes().is_empty(), "flashes are consumed");

    second.save()?;
    let mut third = CookieSession::from_headers(&codec, &cookie_headers(second.set_cookie())?);
    assert!(third.take_flashes().is_empty());
    assert_eq!(third.get(STATE_KEY).as_deref(), Some("s1"));
    Ok(())
}

#[test]
fn set_overwrites_previous_value() -> anyhow::Result<()> {
    let codec = codec()?;
    let mut session = CookieSession::from_headers(&codec, &HeaderMap::new());
    session.set(STATE_KEY, "old".to_owned());
    session.set(STATE_KEY, "new".to_owned());
    assert_eq!(session.get(STATE_KEY).as_deref(), Some("new"));
    Ok(())
}

#[test]
fn foreign_cookie_yields_empty_session() -> anyhow::Result<()> {
    let issuer_codec = codec()?;
    let mut issuer = CookieSession::from_headers(&issuer_codec, &HeaderMap::new());
    issuer.set(STATE_KEY, "s1".to_owned());
    issuer.save()?;

    let other = codec()?;
    let session = CookieSession::from_headers(&other, &cookie_headers(issuer.set_cookie())?);
    assert_eq!(session.get(STATE_KEY), None);
    Ok(())
}
