// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Packet-usage check against the carrier's usage-log API.
//!
//! [`UsageClient`] performs the single authenticated GET; [`ThresholdEvaluator`]
//! walks the nested log down to today's entry and decides whether the
//! operator needs to hear about it.

use std::fmt;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::clock::CivilClock;

/// Usage-log endpoint of the provider.
pub const DEFAULT_USAGE_URL: &str = "https://api.iijmio.jp/mobile/d/v2/log/packet/";

/// Coupon usage (MB) above which a report line is emitted.
pub const THRESHOLD_MB: u64 = 150;

/// Prefix of every operator report line.
pub const REPORT_PREFIX: &str = "iijmio-checker: ";

pub const DEVELOPER_HEADER: &str = "X-IIJmio-Developer";
pub const AUTHORIZATION_HEADER: &str = "X-IIJmio-Authorization";

const DATE_FORMAT: &str = "%Y%m%d";

/// Successful usage-log response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UsageResponse {
    pub return_code: String,
    pub packet_log_info: Vec<PacketLogInfo>,
}

/// One contract (service code) in the response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PacketLogInfo {
    pub hdd_service_code: String,
    pub plan: String,
    pub hdo_info: Vec<DeviceLog>,
    pub hdu_info: Vec<UnitLog>,
}

/// Voice/data SIM entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceLog {
    pub hdo_service_code: String,
    pub packet_log: Vec<PacketLog>,
}

/// Data-only SIM entry. Decoded but not evaluated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UnitLog {
    pub hdu_service_code: String,
    pub packet_log: Vec<PacketLog>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PacketLog {
    /// `YYYYMMDD` in the provider's civil timezone.
    pub date: String,
    pub with_coupon: u64,
    pub without_coupon: u64,
}

/// Error body returned with a non-success status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ErrorEnvelope {
    pub return_code: String,
}

/// One day's usage in MB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageRecord {
    pub date: NaiveDate,
    pub with_coupon: u64,
    pub without_coupon: u64,
}

impl UsageResponse {
    /// Log entries of the first device of the first contract.
    pub fn packet_logs(&self) -> Result<&[PacketLog], UsageError> {
        let info = self.packet_log_info.first().ok_or(UsageError::EmptyLogInfo)?;
        let device = info.hdo_info.first().ok_or(UsageError::EmptyDeviceInfo)?;
        if device.packet_log.is_empty() {
            return Err(UsageError::EmptyPacketLog);
        }
        Ok(&device.packet_log)
    }

    /// The entry dated `day`. Entries with unparseable dates never match.
    pub fn record_for(&self, day: NaiveDate) -> Result<UsageRecord, UsageError> {
        self.packet_logs()?
            .iter()
            .find_map(|log| {
                let date = NaiveDate::parse_from_str(&log.date, DATE_FORMAT).ok()?;
                (date == day).then_some(UsageRecord {
                    date,
                    with_coupon: log.with_coupon,
                    without_coupon: log.without_coupon,
                })
            })
            .ok_or(UsageError::NoEntryForToday(day))
    }
}

/// Hard failures of the scheduled check.
#[derive(Debug)]
pub enum UsageError {
    EmptyLogInfo,
    EmptyDeviceInfo,
    EmptyPacketLog,
    NoEntryForToday(NaiveDate),
    Request(reqwest::Error),
    Decode(String),
}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyLogInfo => f.write_str("no packetLogInfo"),
            Self::EmptyDeviceInfo => f.write_str("no packetLogInfo[0].hdoInfo"),
            Self::EmptyPacketLog => f.write_str("no packetLogInfo[0].hdoInfo[0].packetLog"),
            Self::NoEntryForToday(day) => {
                write!(f, "no packet log for today ({}) is found", day.format("%Y-%m-%d"))
            }
            Self::Request(e) => write!(f, "usage request failed: {e}"),
            Self::Decode(msg) => write!(f, "invalid usage response: {msg}"),
        }
    }
}

impl std::error::Error for UsageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Request(e) => Some(e),
            _ => None,
        }
    }
}

/// What the usage endpoint answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsageReply {
    Ok(UsageResponse),
    /// Non-success status with the decoded `returnCode`.
    Upstream { status: u16, return_code: String },
}

/// Authenticated client for the usage-log endpoint.
#[derive(Debug, Clone)]
pub struct UsageClient {
    http: reqwest::Client,
    endpoint: Url,
    developer_id: String,
}

impl UsageClient {
    pub fn new(endpoint: &str, developer_id: &str, timeout: Duration) -> anyhow::Result<Self> {
        let endpoint = Url::parse(endpoint)?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, endpoint, developer_id: developer_id.to_owned() })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// One GET, no retries.
    pub async fn fetch(&self, token: &str) -> Result<UsageReply, UsageError> {
        let resp = self
            .http
            .get(self.endpoint.clone())
            .header(DEVELOPER_HEADER, &self.developer_id)
            .header(AUTHORIZATION_HEADER, token)
            .send()
            .await
            .map_err(UsageError::Request)?;

        let status = resp.status();
        let body = resp.bytes().await.map_err(UsageError::Request)?;
        debug!(status = status.as_u16(), bytes = body.len(), "usage response received");

        if !status.is_success() {
            let envelope: ErrorEnvelope =
                serde_json::from_slice(&body).map_err(|e| UsageError::Decode(e.to_string()))?;
            return Ok(UsageReply::Upstream {
                status: status.as_u16(),
                return_code: envelope.return_code,
            });
        }
        let parsed = serde_json::from_slice(&body).map_err(|e| UsageError::Decode(e.to_string()))?;
        Ok(UsageReply::Ok(parsed))
    }
}

/// A line for the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    OverThreshold { with_coupon: u64 },
    Upstream { status: u16, return_code: String },
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OverThreshold { with_coupon } => {
                write!(f, "you use {with_coupon} MB with the coupon")
            }
            Self::Upstream { status, return_code } => {
                write!(f, "error: status={status}, message={return_code}")
            }
        }
    }
}

impl Report {
    /// Write the prefixed report line.
    pub fn write_to(&self, out: &mut impl std::io::Write) -> std::io::Result<()> {
        writeln!(out, "{REPORT_PREFIX}{self}")
    }
}

/// Compares today's coupon usage against a fixed threshold.
#[derive(Debug, Clone)]
pub struct ThresholdEvaluator {
    threshold: u64,
    clock: CivilClock,
}

impl ThresholdEvaluator {
    pub fn new(threshold: u64, clock: CivilClock) -> Self {
        Self { threshold, clock }
    }

    /// `Some` when the endpoint reported an error or usage is over threshold.
    pub fn evaluate(&self, reply: &UsageReply) -> Result<Option<Report>, UsageError> {
        let response = match reply {
            UsageReply::Upstream { status, return_code } => {
                return Ok(Some(Report::Upstream {
                    status: *status,
                    return_code: return_code.clone(),
                }));
            }
            UsageReply::Ok(response) => response,
        };

        let record = response.record_for(self.clock.today())?;
        debug!(
            date = %record.date,
            with_coupon = record.with_coupon,
            without_coupon = record.without_coupon,
            threshold = self.threshold,
            "today's usage"
        );
        Ok((record.with_coupon > self.threshold)
            .then_some(Report::OverThreshold { with_coupon: record.with_coupon }))
    }
}

#[cfg(test)]
#[path = "usage_tests.rs"]
mod tests;
