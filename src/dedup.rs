use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::HarvestError;
use crate::identity::{ProductId, SCHEMA_VERSION};

pub const WILDCARD_PARTITION: &str = "*";

// Index naming used by the deployed GRQ. The bare `{version}_{shortname}`
// partition layout is also accepted through `dedup_index_template`.
pub const DEFAULT_INDEX_TEMPLATE: &str = "grq_{version}_metadata-{shortname}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupOutcome {
    Found(u64),
    NotFound,
    QueryFailed(String),
}

pub trait ExistenceIndex {
    fn lookup(&self, id: &ProductId, partition: &str) -> DedupOutcome;
}

pub fn index_name(template: &str, partition: &str) -> String {
    template
        .replace("{version}", SCHEMA_VERSION)
        .replace("{shortname}", partition)
}

pub fn id_query(id: &ProductId) -> Value {
    json!({
        "query": {"bool": {"must": [{"term": {"id.raw": id.as_str()}}]}},
        "from": 0,
        "size": 1
    })
}

pub fn hit_count(body: &Value) -> Option<u64> {
    let total = body.get("hits")?.get("total")?;
    total
        .as_u64()
        .or_else(|| total.get("value").and_then(Value::as_u64))
}

#[derive(Clone)]
pub struct GrqIndexClient {
    client: Client,
    base_url: String,
    index_template: String,
}

impl GrqIndexClient {
    pub fn new(base_url: &str, index_template: &str) -> Result<Self, HarvestError> {
        let client = Client::builder()
            .user_agent(format!("cmr-harvest/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| HarvestError::HttpClient(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            index_template: index_template.to_string(),
        })
    }

    pub fn search_url(&self, partition: &str) -> String {
        format!(
            "{}/{}/_search",
            self.base_url,
            index_name(&self.index_template, partition)
        )
    }

    pub fn search_request(&self, id: &ProductId, partition: &str) -> RequestBuilder {
        self.client.post(self.search_url(partition)).json(&id_query(id))
    }
}

impl ExistenceIndex for GrqIndexClient {
    fn lookup(&self, id: &ProductId, partition: &str) -> DedupOutcome {
        let url = self.search_url(partition);
        debug!(%url, id = %id, "querying product index");
        let response = match self.search_request(id, partition).send() {
            Ok(response) => response,
            Err(err) => return DedupOutcome::QueryFailed(err.to_string()),
        };
        let status = response.status();
        match response.text() {
            Ok(body) => outcome_from_response(&url, status, &body),
            Err(err) => DedupOutcome::QueryFailed(err.to_string()),
        }
    }
}

pub fn outcome_from_response(url: &str, status: StatusCode, body: &str) -> DedupOutcome {
    if !status.is_success() {
        return DedupOutcome::QueryFailed(format!("{url} returned status {}", status.as_u16()));
    }
    let body: Value = match serde_json::from_str(body) {
        Ok(body) => body,
        Err(err) => return DedupOutcome::QueryFailed(format!("{url}: {err}")),
    };
    match hit_count(&body) {
        Some(0) => DedupOutcome::NotFound,
        Some(count) => DedupOutcome::Found(count),
        None => DedupOutcome::QueryFailed(format!("{url}: response has no hits.total")),
    }
}

pub struct DedupGate<'a, I: ExistenceIndex> {
    index: &'a I,
}

impl<'a, I: ExistenceIndex> DedupGate<'a, I> {
    pub fn new(index: &'a I) -> Self {
        Self { index }
    }

    /// Whether `id` is already in the index. Lookup failures count as absent.
    pub fn exists(&self, id: &ProductId, short_name: Option<&str>) -> bool {
        let partition = short_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(WILDCARD_PARTITION);
        match self.index.lookup(id, partition) {
            DedupOutcome::Found(count) => {
                debug!(id = %id, count, "product already indexed");
                true
            }
            DedupOutcome::NotFound => false,
            DedupOutcome::QueryFailed(reason) => {
                warn!(id = %id, %reason, "existence check failed, treating product as new");
                false
            }
        }
    }
}
