use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::HarvestError;
use crate::query::{GRANULE_SEARCH_PATH, GranuleQuery};

pub const HITS_HEADER: &str = "CMR-Hits";
pub const SCROLL_ID_HEADER: &str = "CMR-Scroll-Id";

#[derive(Debug, Clone, Default)]
pub struct CatalogPage {
    pub entries: Vec<Value>,
    pub hits: Option<u64>,
    pub scroll_id: Option<String>,
}

pub trait CatalogClient {
    fn search(&self, url: &str) -> Result<CatalogPage, HarvestError>;
    fn scroll(&self, scroll_id: &str) -> Result<CatalogPage, HarvestError>;
}

#[derive(Debug, Deserialize)]
struct FeedResponse {
    feed: Feed,
}

#[derive(Debug, Deserialize)]
struct Feed {
    entry: Vec<Value>,
}

#[derive(Clone)]
pub struct CmrHttpClient {
    client: Client,
    base_url: String,
}

impl CmrHttpClient {
    pub fn new(base_url: &str) -> Result<Self, HarvestError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("cmr-harvest/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| HarvestError::HttpClient(err.to_string()))?,
        );
        // no timeout on catalog requests
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Option::<std::time::Duration>::None)
            .build()
            .map_err(|err| HarvestError::HttpClient(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn search_request(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    pub fn scroll_request(&self, scroll_id: &str) -> RequestBuilder {
        self.client
            .get(format!("{}{GRANULE_SEARCH_PATH}", self.base_url))
            .header(SCROLL_ID_HEADER, scroll_id)
    }

    fn read_page(response: Response) -> Result<CatalogPage, HarvestError> {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .text()
            .map_err(|err| HarvestError::CatalogHttp(err.to_string()))?;
        page_from_parts(status, &headers, &body)
    }
}

impl CatalogClient for CmrHttpClient {
    fn search(&self, url: &str) -> Result<CatalogPage, HarvestError> {
        let response = self
            .search_request(url)
            .send()
            .map_err(|err| HarvestError::CatalogHttp(err.to_string()))?;
        Self::read_page(response)
    }

    fn scroll(&self, scroll_id: &str) -> Result<CatalogPage, HarvestError> {
        let response = self
            .scroll_request(scroll_id)
            .send()
            .map_err(|err| HarvestError::CatalogHttp(err.to_string()))?;
        Self::read_page(response)
    }
}

pub fn page_from_parts(
    status: StatusCode,
    headers: &HeaderMap,
    body: &str,
) -> Result<CatalogPage, HarvestError> {
    if !status.is_success() {
        return Err(HarvestError::CatalogStatus {
            status: status.as_u16(),
            message: body.to_string(),
        });
    }
    let hits = match header_str(headers, HITS_HEADER) {
        Some(value) => Some(value.trim().parse::<u64>().map_err(|_| {
            HarvestError::CatalogResponse(format!("invalid {HITS_HEADER} header {value:?}"))
        })?),
        None => None,
    };
    let scroll_id = header_str(headers, SCROLL_ID_HEADER).map(str::to_string);
    Ok(CatalogPage {
        entries: parse_feed(body)?,
        hits,
        scroll_id,
    })
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

pub fn parse_feed(body: &str) -> Result<Vec<Value>, HarvestError> {
    let response: FeedResponse = serde_json::from_str(body)
        .map_err(|err| HarvestError::CatalogResponse(format!("granule feed: {err}")))?;
    Ok(response.feed.entry)
}

/// Pages needed beyond the first: `ceil(total / first_page) - 1`.
pub fn remaining_pages(total: u64, first_page: u64) -> u64 {
    if first_page == 0 {
        return 0;
    }
    total.div_ceil(first_page).saturating_sub(1)
}

/// Drains a scrolling granule search, all or nothing.
pub struct ScrollFetcher<'a, C: CatalogClient> {
    client: &'a C,
    catalog_url: &'a str,
}

impl<'a, C: CatalogClient> ScrollFetcher<'a, C> {
    pub fn new(client: &'a C, catalog_url: &'a str) -> Self {
        Self {
            client,
            catalog_url,
        }
    }

    pub fn fetch_all(&self, query: &GranuleQuery) -> Result<Vec<Value>, HarvestError> {
        let url = query.url(self.catalog_url);
        info!(%url, "querying CMR");

        let first = self.client.search(&url)?;
        let total = first.hits.ok_or_else(|| {
            HarvestError::CatalogResponse(format!("missing {HITS_HEADER} header"))
        })?;
        if total == 0 {
            info!("no granules returned");
            return Ok(Vec::new());
        }

        let mut entries = first.entries;
        let first_page = entries.len() as u64;
        let pages = remaining_pages(total, first_page);
        info!(total, first_page, pages = pages + 1, "granules matching query");

        if pages > 0 {
            let scroll_id = first.scroll_id.ok_or_else(|| {
                HarvestError::CatalogResponse(format!("missing {SCROLL_ID_HEADER} header"))
            })?;
            for page in 0..pages {
                let next = self.client.scroll(&scroll_id)?;
                debug!(page = page + 2, returned = next.entries.len(), "scroll page");
                entries.extend(next.entries);
            }
        }

        let actual = entries.len() as u64;
        info!(actual, "query returned granules");
        if actual != total {
            return Err(HarvestError::CountMismatch {
                expected: total,
                actual,
            });
        }
        Ok(entries)
    }
}
