//! Scan validation
//!
//! Raw text from a QR decode or the manual entry prompt becomes a
//! [`ScanEntry`] only through [`validate`]: surrounding whitespace is trimmed
//! and the remainder must be exactly [`MEMBER_ID_LEN`] ASCII digits. A
//! [`MemberId`] can therefore never hold anything but the canonical form.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::identity::DeviceId;
use crate::MEMBER_ID_LEN;

/// A canonical 14-digit member ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MemberId(String);

impl MemberId {
    /// Trim and validate raw input
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.len() == MEMBER_ID_LEN && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(Error::invalid_format(format!(
                "expected {MEMBER_ID_LEN} digits, got {trimmed:?}"
            )))
        }
    }

    /// The digits
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for MemberId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MemberId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<MemberId> for String {
    fn from(id: MemberId) -> Self {
        id.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a scan entered the terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanSource {
    /// Decoded from the capture stream
    Camera,
    /// Typed by the operator
    Manual,
}

impl fmt::Display for ScanSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Camera => f.write_str("scan"),
            Self::Manual => f.write_str("manual"),
        }
    }
}

/// One accepted scan, ready for queuing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEntry {
    /// Canonical member ID
    pub member_id: MemberId,
    /// Capture time
    pub timestamp: DateTime<Utc>,
    /// Device that captured the scan
    pub device_id: DeviceId,
}

impl ScanEntry {
    /// Capture time as ISO-8601 UTC with millisecond precision, e.g.
    /// `2024-05-01T09:30:00.123Z`
    #[must_use]
    pub fn timestamp_iso(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// Validate raw scan text into a [`ScanEntry`] captured at `now` by `device_id`.
///
/// Pure: nothing is queued or logged here.
pub fn validate(raw: &str, device_id: &DeviceId, now: DateTime<Utc>) -> Result<ScanEntry> {
    Ok(ScanEntry {
        member_id: MemberId::parse(raw)?,
        timestamp: now,
        device_id: device_id.clone(),
    })
}
