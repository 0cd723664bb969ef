// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `iijmio-checker auth`: serve the local authorization flow until interrupted.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::auth::AuthorizationRequestBuilder;
use crate::clock::CivilClock;
use crate::config::{AuthArgs, Config, APP_NAME};
use crate::session::cookie::SessionCodec;
use crate::session::keys::SessionKeys;
use crate::store::ConfigStore;
use crate::transport::{build_router, AppState};

/// Assemble the server state: credential store, session codec and the
/// authorization link builder.
pub fn build_state(config: &Config, args: &AuthArgs) -> anyhow::Result<Arc<AppState>> {
    let authorize = AuthorizationRequestBuilder::new(
        &args.authorize_url,
        config.developer_id()?,
        &args.redirect_uri,
    )?;
    let clock = CivilClock::system(config.timezone()?);
    let keys = SessionKeys::load_or_create(&args.session_config_path(&config.config_dir()))?;
    Ok(Arc::new(AppState {
        codec: SessionCodec::new(APP_NAME, &keys)?.with_clock(clock.clone()),
        store: ConfigStore::new(config.config_path(), clock),
        authorize,
        shape: args.callback_shape,
    }))
}

pub async fn run(config: &Config, args: &AuthArgs) -> anyhow::Result<()> {
    let state = build_state(config, args)?;
    let addr = format!("{}:{}", args.host, args.port);
    let listener = TcpListener::bind(&addr).await?;
    let local = listener.local_addr()?;
    info!(addr = %local, shape = %args.callback_shape, "HTTP listening on {addr}");
    println!("Server initialization finished. Access http://localhost:{} from your browser", local.port());

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    info!("server stopped");
    Ok(())
}

fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
        let mut sigint =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).ok();
        if sigterm.is_none() && sigint.is_none() {
            error!("failed to install signal handlers");
        }

        tokio::select! {
            _ = async {
                if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await }
            } => {
                info!("received SIGTERM");
            }
            _ = async {
                if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await }
            } => {
                info!("received SIGINT");
            }
        }
        shutdown.cancel();
    });
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
