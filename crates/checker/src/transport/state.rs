// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::auth::AuthorizationRequestBuilder;
use crate::callback::PayloadShape;
use crate::session::cookie::SessionCodec;
use crate::store::ConfigStore;

/// Shared state for the callback server. Read-only after startup; all
/// per-browser state travels in the session cookie.
pub struct AppState {
    pub store: ConfigStore,
    pub codec: SessionCodec,
    pub authorize: AuthorizationRequestBuilder,
    pub shape: PayloadShape,
}
