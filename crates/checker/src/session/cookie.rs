// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sealed session cookies.
//!
//! Cookie value layout: `<blob>.<issued>.<mac>` where `blob` is
//! base64url(nonce || ChaCha20-Poly1305 ciphertext) under the block key,
//! `issued` is epoch seconds and `mac` is base64url(HMAC-SHA256) under the
//! hash key over `name|issued|blob`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, CHACHA20_POLY1305, NONCE_LEN};
use ring::hmac;
use tracing::debug;

use crate::clock::{CivilClock, DEFAULT_TIMEZONE};
use crate::session::keys::SessionKeys;
use crate::session::{SessionError, SessionRecord};

/// Browsers reject cookies above this size.
pub const MAX_COOKIE_BYTES: usize = 4096;

/// Default session lifetime (30 days).
pub const DEFAULT_MAX_AGE_SECS: u64 = 30 * 24 * 60 * 60;

/// Encrypts, signs and verifies session cookies.
pub struct SessionCodec {
    name: String,
    mac_key: hmac::Key,
    seal_key: LessSafeKey,
    max_age_secs: u64,
    clock: CivilClock,
}

impl SessionCodec {
    pub fn new(name: impl Into<String>, keys: &SessionKeys) -> Result<Self, SessionError> {
        let unbound = UnboundKey::new(&CHACHA20_POLY1305, keys.block_key())
            .map_err(|_| SessionError::Encode("invalid block key".to_owned()))?;
        Ok(Self {
            name: name.into(),
            mac_key: hmac::Key::new(hmac::HMAC_SHA256, keys.hash_key()),
            seal_key: LessSafeKey::new(unbound),
            max_age_secs: DEFAULT_MAX_AGE_SECS,
            clock: CivilClock::system(DEFAULT_TIMEZONE),
        })
    }

    /// Issue and age cookies against `clock` instead of the system clock.
    pub fn with_clock(mut self, clock: CivilClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_max_age(mut self, secs: u64) -> Self {
        self.max_age_secs = secs;
        self
    }

    /// Cookie name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Seal `record` into a cookie value.
    pub fn encode(&self, record: &SessionRecord) -> Result<String, SessionError> {
        self.encode_at(record, self.epoch_secs())
    }

    /// Open a cookie value. Returns `None` for anything not produced by this
    /// codec's keys, or older than the configured max age.
    pub fn decode(&self, value: &str) -> Option<SessionRecord> {
        self.decode_at(value, self.epoch_secs())
    }

    /// Full `Set-Cookie` header value for a sealed session.
    pub fn set_cookie_header(&self, value: &str) -> String {
        format!(
            "{}={value}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
            self.name, self.max_age_secs
        )
    }

    pub(crate) fn encode_at(
        &self,
        record: &SessionRecord,
        issued: u64,
    ) -> Result<String, SessionError> {
        let mut in_out =
            serde_json::to_vec(record).map_err(|e| SessionError::Encode(e.to_string()))?;

        let mut nonce = [0u8; NONCE_LEN];
        rand::rng().fill(&mut nonce);
        self.seal_key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce),
                Aad::from(self.name.as_bytes()),
                &mut in_out,
            )
            .map_err(|_| SessionError::Encode("seal failed".to_owned()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + in_out.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&in_out);
        let blob = URL_SAFE_NO_PAD.encode(sealed);

        let issued = issued.to_string();
        let tag = hmac::sign(&self.mac_key, self.mac_input(&issued, &blob).as_bytes());
        let value = format!("{blob}.{issued}.{}", URL_SAFE_NO_PAD.encode(tag.as_ref()));

        let header_len = self.set_cookie_header(&value).len();
        if header_len > MAX_COOKIE_BYTES {
            return Err(SessionError::TooLarge(header_len));
        }
        Ok(value)
    }

    pub(crate) fn decode_at(&self, value: &str, now: u64) -> Option<SessionRecord> {
        let mut parts = value.splitn(3, '.');
        let (blob, issued_str, mac) = (parts.next()?, parts.next()?, parts.next()?);

        let tag = URL_SAFE_NO_PAD.decode(mac).ok()?;
        if hmac::verify(&self.mac_key, self.mac_input(issued_str, blob).as_bytes(), &tag)
            .is_err()
        {
            debug!("session cookie rejected: bad signature");
            return None;
        }

        let issued: u64 = issued_str.parse().ok()?;
        if now.saturating_sub(issued) > self.max_age_secs {
            debug!(issued, "session cookie rejected: expired");
            return None;
        }

        let sealed = URL_SAFE_NO_PAD.decode(blob).ok()?;
        if sealed.len() < NONCE_LEN + CHACHA20_POLY1305.tag_len() {
            return None;
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce).ok()?;
        let mut in_out = ciphertext.to_vec();
        let plain = self
            .seal_key
            .open_in_place(nonce, Aad::from(self.name.as_bytes()), &mut in_out)
            .ok()?;
        serde_json::from_slice(plain).ok()
    }

    fn epoch_secs(&self) -> u64 {
        u64::try_from(self.clock.now().timestamp()).unwrap_or_default()
    }

    fn mac_input(&self, issued: &str, blob: &str) -> String {
        format!("{}|{issued}|{blob}", self.name)
    }
}

#[cfg(test)]
#[path = "cookie_tests.rs"]
mod tests;
