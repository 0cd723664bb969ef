// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use clap::{Args, Parser, Subcommand};

use crate::auth::{AuthError, DEFAULT_AUTHORIZE_URL, DEFAULT_REDIRECT_URI};
use crate::callback::PayloadShape;
use crate::clock::parse_timezone;
use crate::usage::{DEFAULT_USAGE_URL, THRESHOLD_MB};

pub const APP_NAME: &str = "iijmio-checker";
const CONFIG_FILE: &str = "config.json";
const SESSION_CONFIG_FILE: &str = "session-config";

/// Checker for usage of IIJmio SIM.
#[derive(Debug, Parser)]
#[command(name = "iijmio-checker", version, about)]
pub struct Config {
    /// Credential file (token + expiry).
    #[arg(long, env = "IIJMIO_CHECKER_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Developer ID issued by the provider.
    #[arg(long, env = "IIJMIO_DEVELOPERID", global = true, hide_env_values = true)]
    pub developer_id: Option<String>,

    /// Civil timezone for expiry and "today" comparisons.
    #[arg(long, env = "IIJMIO_CHECKER_TIMEZONE", default_value = "Asia/Tokyo", global = true)]
    pub timezone: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "IIJMIO_CHECKER_LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    /// Log format (json or text).
    #[arg(long, env = "IIJMIO_CHECKER_LOG_FORMAT", default_value = "text", global = true)]
    pub log_format: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Remove config files.
    Init,
    /// Launch the server to auth IIJmio API.
    #[command(visible_alias = "a")]
    Auth(AuthArgs),
    /// Cron job to check usage in IIJmio SIM.
    #[command(visible_alias = "c")]
    Cron(CronArgs),
}

#[derive(Debug, Clone, Args)]
pub struct AuthArgs {
    /// Key material for session cookies [default: <config dir>/session-config].
    #[arg(long, env = "IIJMIO_CHECKER_SESSION_CONFIG")]
    pub session_config: Option<PathBuf>,

    /// Host address to bind to.
    #[arg(long, env = "IIJMIO_CHECKER_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// HTTP port to listen on.
    #[arg(long, env = "IIJMIO_CHECKER_PORT", default_value = "8080")]
    pub port: u16,

    /// Callback URL registered with the provider.
    #[arg(long, env = "IIJMIO_CHECKER_REDIRECT_URI", default_value = DEFAULT_REDIRECT_URI)]
    pub redirect_uri: String,

    /// Provider authorization endpoint.
    #[arg(long, env = "IIJMIO_CHECKER_AUTHORIZE_URL", default_value = DEFAULT_AUTHORIZE_URL)]
    pub authorize_url: String,

    /// How the landing page posts the callback (nested or flat).
    #[arg(long, env = "IIJMIO_CHECKER_CALLBACK_SHAPE", value_enum, default_value_t)]
    pub callback_shape: PayloadShape,
}

#[derive(Debug, Clone, Args)]
pub struct CronArgs {
    /// Usage-log endpoint.
    #[arg(long, env = "IIJMIO_CHECKER_USAGE_URL", default_value = DEFAULT_USAGE_URL)]
    pub usage_url: String,

    /// Coupon usage in MB above which a line is reported.
    #[arg(long, env = "IIJMIO_CHECKER_THRESHOLD", default_value_t = THRESHOLD_MB)]
    pub threshold: u64,

    /// Request timeout in seconds.
    #[arg(long, env = "IIJMIO_CHECKER_TIMEOUT_SECS", default_value = "30")]
    pub timeout_secs: u64,
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        parse_timezone(&self.timezone)?;

        match self.log_format.as_str() {
            "text" | "json" => {}
            other => anyhow::bail!("invalid log format: {other} (expected text or json)"),
        }

        match &self.command {
            Command::Init => {}
            Command::Auth(args) => {
                self.developer_id()?;
                url::Url::parse(&args.authorize_url)
                    .map_err(|e| anyhow::anyhow!("invalid --authorize-url: {e}"))?;
                url::Url::parse(&args.redirect_uri)
                    .map_err(|e| anyhow::anyhow!("invalid --redirect-uri: {e}"))?;
            }
            Command::Cron(args) => {
                self.developer_id()?;
                url::Url::parse(&args.usage_url)
                    .map_err(|e| anyhow::anyhow!("invalid --usage-url: {e}"))?;
                if args.timeout_secs == 0 {
                    anyhow::bail!("--timeout-secs must be at least 1");
                }
            }
        }
        Ok(())
    }

    /// Non-blank developer ID.
    pub fn developer_id(&self) -> Result<&str, AuthError> {
        self.developer_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(AuthError::MissingDeveloperId)
    }

    pub fn timezone(&self) -> anyhow::Result<Tz> {
        parse_timezone(&self.timezone)
    }

    /// Credential file, explicit or per-user default.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(default_config_path)
    }

    /// Directory holding the credential file; removed by `init`.
    pub fn config_dir(&self) -> PathBuf {
        parent_dir(&self.config_path())
    }
}

impl AuthArgs {
    pub fn session_config_path(&self, config_dir: &Path) -> PathBuf {
        self.session_config.clone().unwrap_or_else(|| config_dir.join(SESSION_CONFIG_FILE))
    }
}

impl CronArgs {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// `$XDG_CONFIG_HOME/iijmio-checker/config.json`, else under `$HOME/.config`.
pub fn default_config_path() -> PathBuf {
    default_config_path_from(std::env::var_os("XDG_CONFIG_HOME"), std::env::var_os("HOME"))
}

fn default_config_path_from(xdg: Option<OsString>, home: Option<OsString>) -> PathBuf {
    let non_empty = |v: Option<OsString>| v.filter(|v| !v.is_empty()).map(PathBuf::from);
    if let Some(base) = non_empty(xdg) {
        return base.join(APP_NAME).join(CONFIG_FILE);
    }
    if let Some(home) = non_empty(home) {
        return home.join(".config").join(APP_NAME).join(CONFIG_FILE);
    }
    PathBuf::from(format!(".{APP_NAME}")).join(CONFIG_FILE)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
