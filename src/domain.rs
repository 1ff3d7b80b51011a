use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::HarvestError;

pub const QUERY_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

pub const COMPACT_TIME_FORMAT: &str = "%Y%m%dT%H%M%S";

static SHORT_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.\-]*$").expect("valid regex"));

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShortName(String);

impl ShortName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ShortName {
    type Err = HarvestError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(HarvestError::MissingShortName);
        }
        if !SHORT_NAME_RE.is_match(trimmed) {
            return Err(HarvestError::InvalidShortName(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl TryFrom<String> for ShortName {
    type Error = HarvestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ShortName> for String {
    fn from(value: ShortName) -> Self {
        value.0
    }
}

pub fn parse_instant(value: &str) -> Result<DateTime<Utc>, HarvestError> {
    let trimmed = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }
    let without_zulu = trimmed.strip_suffix('Z').unwrap_or(trimmed);
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(without_zulu, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(without_zulu, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    Err(HarvestError::InvalidTimestamp(value.to_string()))
}

pub fn format_query_instant(instant: &DateTime<Utc>) -> String {
    instant.format(QUERY_TIME_FORMAT).to_string()
}

pub fn format_compact_instant(instant: &DateTime<Utc>) -> String {
    instant.format(COMPACT_TIME_FORMAT).to_string()
}
