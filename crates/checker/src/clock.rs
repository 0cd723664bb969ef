// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Civil-time clock shared by credential expiry and the daily usage lookup.
//!
//! The timezone is a configuration value threaded through the store and the
//! evaluator rather than process-wide state, and the "now" source can be
//! replaced so tests can pin the wall clock.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

/// Default civil timezone used by the provider.
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Asia::Tokyo;

type NowFn = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// A fixed civil timezone paired with a source of the current instant.
#[derive(Clone)]
pub struct CivilClock {
    tz: Tz,
    now: NowFn,
}

impl CivilClock {
    /// Clock backed by the system wall clock.
    pub fn system(tz: Tz) -> Self {
        Self { tz, now: Arc::new(Utc::now) }
    }

    /// Clock frozen at `instant`.
    pub fn fixed(tz: Tz, instant: DateTime<Utc>) -> Self {
        Self { tz, now: Arc::new(move || instant) }
    }

    /// Clock driven by an arbitrary closure.
    pub fn from_fn(tz: Tz, now: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        Self { tz, now: Arc::new(now) }
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    /// Current instant expressed in the civil timezone.
    pub fn now(&self) -> DateTime<Tz> {
        (self.now)().with_timezone(&self.tz)
    }

    /// Calendar date of "today" in the civil timezone.
    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

impl fmt::Debug for CivilClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CivilClock").field("tz", &self.tz).finish_non_exhaustive()
    }
}

/// Parse an IANA timezone name such as `Asia/Tokyo`.
pub fn parse_timezone(name: &str) -> anyhow::Result<Tz> {
    name.parse::<Tz>().map_err(|e| anyhow::anyhow!("invalid timezone {name:?}: {e}"))
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
