use chrono::{DateTime, Utc};

use crate::domain::{ShortName, format_query_instant};
use crate::geometry::{AreaOfInterest, format_ring};

pub const PAGE_SIZE: usize = 2000;

pub const GRANULE_SEARCH_PATH: &str = "/search/granules.json";

#[derive(Debug, Clone)]
pub struct GranuleQuery {
    pub short_name: ShortName,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub area_of_interest: Option<AreaOfInterest>,
}

impl GranuleQuery {
    pub fn new(short_name: ShortName) -> Self {
        Self {
            short_name,
            start: None,
            end: None,
            area_of_interest: None,
        }
    }

    pub fn with_temporal(
        mut self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn with_area_of_interest(mut self, area_of_interest: Option<AreaOfInterest>) -> Self {
        self.area_of_interest = area_of_interest;
        self
    }

    pub fn query_string(&self) -> String {
        format!(
            "page_size={PAGE_SIZE}{}{}&short_name={}&scroll=true",
            temporal_clause(self.start.as_ref(), self.end.as_ref()),
            spatial_clause(self.area_of_interest.as_ref()),
            self.short_name
        )
    }

    pub fn url(&self, catalog_base: &str) -> String {
        format!(
            "{}{GRANULE_SEARCH_PATH}?{}",
            catalog_base.trim_end_matches('/'),
            self.query_string()
        )
    }
}

pub fn temporal_clause(start: Option<&DateTime<Utc>>, end: Option<&DateTime<Utc>>) -> String {
    if start.is_none() && end.is_none() {
        return String::new();
    }
    let start = start.map(format_query_instant).unwrap_or_default();
    let end = end.map(format_query_instant).unwrap_or_default();
    format!("&temporal={start},{end}")
}

pub fn spatial_clause(area_of_interest: Option<&AreaOfInterest>) -> String {
    match area_of_interest {
        Some(aoi) => format!("&polygon={}", format_ring(&aoi.clockwise_ring())),
        None => String::new(),
    }
}
