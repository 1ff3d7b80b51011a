use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ShortName, format_compact_instant};

pub const SCHEMA_VERSION: &str = "v1.0";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub fn product_id(short_name: &ShortName, start: &DateTime<Utc>, end: &DateTime<Utc>) -> ProductId {
    ProductId(format!(
        "MET-{}-{}_{}-{}",
        short_name,
        format_compact_instant(start),
        format_compact_instant(end),
        SCHEMA_VERSION
    ))
}
