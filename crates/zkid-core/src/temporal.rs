//! # Temporal Types
//!
//! `Timestamp` is UTC-only, truncated to seconds, and always renders as
//! `YYYY-MM-DDTHH:MM:SSZ`. Token `issuedAt`/`expiresAt` fields are carried in
//! this form, so the canonical bytes a token signature covers are independent
//! of the issuer's local timezone.
//!
//! ## Security Invariant
//!
//! Non-UTC inputs are rejected at [`Timestamp::parse`]. Deserialization goes
//! through the same strict parser: a payload carrying `+00:00` is malformed,
//! not silently normalized into something that would re-sign differently.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ZkidError;

/// A UTC-only timestamp with seconds precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Current UTC time, truncated.
    pub fn now() -> Self {
        Self(truncate_to_seconds(Utc::now()))
    }

    /// From a `DateTime<Utc>`, truncating sub-seconds.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(truncate_to_seconds(dt))
    }

    /// Parse an RFC 3339 string. Only the `Z` suffix is accepted.
    pub fn parse(s: &str) -> Result<Self, ZkidError> {
        if !s.ends_with('Z') {
            return Err(ZkidError::Validation(format!(
                "timestamp must use Z suffix (UTC only), got: {s:?}"
            )));
        }
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|e| ZkidError::Validation(format!("invalid RFC 3339 timestamp {s:?}: {e}")))?;
        Ok(Self(truncate_to_seconds(dt.with_timezone(&Utc))))
    }

    /// Midnight UTC on a calendar date given as `YYYY-MM-DD`.
    ///
    /// Birth dates enter the age circuit through this conversion.
    pub fn from_date_str(s: &str) -> Result<Self, ZkidError> {
        let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|e| ZkidError::Validation(format!("invalid date {s:?}: {e}")))?;
        let dt = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| ZkidError::Validation(format!("invalid date {s:?}")))?;
        Ok(Self(dt.and_utc()))
    }

    /// From a Unix epoch timestamp in seconds.
    pub fn from_epoch_secs(secs: i64) -> Result<Self, ZkidError> {
        let dt = DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| ZkidError::Validation(format!("invalid Unix timestamp: {secs}")))?;
        Ok(Self(dt))
    }

    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Unix epoch seconds.
    pub fn epoch_secs(&self) -> i64 {
        self.0.timestamp()
    }

    /// `self + d`, or `None` on overflow.
    pub fn checked_add(&self, d: Duration) -> Option<Self> {
        let delta = chrono::Duration::from_std(d).ok()?;
        self.0.checked_add_signed(delta).map(Self)
    }

    /// `self - d`, or `None` on overflow.
    pub fn checked_sub(&self, d: Duration) -> Option<Self> {
        let delta = chrono::Duration::from_std(d).ok()?;
        self.0.checked_sub_signed(delta).map(Self)
    }

    /// Signed number of seconds from `self` until `later`.
    pub fn seconds_until(&self, later: &Timestamp) -> i64 {
        later.epoch_secs() - self.epoch_secs()
    }

    /// Render as `YYYY-MM-DDTHH:MM:SSZ`.
    pub fn to_iso8601(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_iso8601())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

fn truncate_to_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_nanosecond(0).unwrap_or(dt)
}
