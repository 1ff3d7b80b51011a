use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;

use chrono::NaiveDate;
use reqwest::Method;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{info, warn};

use crate::domain::ShortName;
use crate::error::HarvestError;

pub const DEFAULT_JOB_NAME: &str = "job-scrape_aoi";
pub const DEFAULT_JOB_VERSION: &str = "dev";
pub const DEFAULT_QUEUE: &str = "factotum-job_worker-small";
pub const DEFAULT_PRIORITY: u8 = 2;
pub const AOI_INDEX: &str = "grq_v1.0_aoi-volcano";
pub const AOI_QUERY_SIZE: u64 = 1500;

const MAX_RETRIES: usize = 3;
const BASE_DELAY_MS: u64 = 200;

#[derive(Debug, Clone)]
pub struct JobSpec {
    pub job_name: String,
    pub job_version: String,
    pub queue: String,
    pub priority: u8,
    pub tag_template: String,
    pub params: Map<String, Value>,
}

impl JobSpec {
    pub fn new(tag_template: String) -> Self {
        Self {
            job_name: DEFAULT_JOB_NAME.to_string(),
            job_version: DEFAULT_JOB_VERSION.to_string(),
            queue: DEFAULT_QUEUE.to_string(),
            priority: DEFAULT_PRIORITY,
            tag_template,
            params: default_params(),
        }
    }

    pub fn job_type(&self) -> String {
        format!("{}:{}", self.job_name, self.job_version)
    }
}

pub fn default_params() -> Map<String, Value> {
    let mut params = Map::new();
    params.insert("cmr_enviorment".to_string(), json!("PROD"));
    params.insert("short_name".to_string(), json!(""));
    params.insert("location".to_string(), json!(""));
    params
}

pub fn default_tag_template(today: NaiveDate) -> String {
    format!("{}automated-cmr-metadata-scrape", today.format("%Y%m%d"))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSubmission {
    pub job_type: String,
    pub queue: String,
    pub priority: u8,
    pub tags: Vec<String>,
    pub params: Value,
}

impl JobSubmission {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("queue", self.queue.clone()),
            ("priority", self.priority.to_string()),
            ("tags", format_job_tags(&self.tags)),
            ("type", self.job_type.clone()),
            ("params", self.params.to_string()),
            ("enable_dedup", "true".to_string()),
        ]
    }
}

pub fn split_tags(tag_string: &str) -> Vec<String> {
    if tag_string.is_empty() {
        return Vec::new();
    }
    tag_string.split(',').map(str::to_string).collect()
}

pub fn format_job_tags(tags: &[String]) -> String {
    let quoted = tags
        .iter()
        .map(|tag| format!("\"{tag}\""))
        .collect::<Vec<_>>()
        .join(",");
    format!("[{quoted}]")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmittedJob {
    pub location_name: String,
    pub job_id: String,
    pub tags: Vec<String>,
}

pub trait JobDispatcher {
    fn resolve_locations(&self) -> Result<BTreeMap<String, Value>, HarvestError>;
    fn submit(&self, job: &JobSubmission) -> Result<String, HarvestError>;
}

pub fn dispatch_all<D: JobDispatcher>(
    dispatcher: &D,
    spec: &JobSpec,
    short_name: &ShortName,
) -> Result<Vec<SubmittedJob>, HarvestError> {
    let locations = dispatcher.resolve_locations()?;
    if locations.is_empty() {
        return Err(HarvestError::AoiResolution(
            "no hits from AOI index".to_string(),
        ));
    }

    let mut submitted = Vec::new();
    for (name, location) in locations {
        let mut params = spec.params.clone();
        params.insert("short_name".to_string(), json!(short_name.as_str()));
        params.insert("location".to_string(), location);
        let tags = split_tags(&format!("{}-{}-{}", spec.tag_template, name, short_name));
        let job = JobSubmission {
            job_type: spec.job_type(),
            queue: spec.queue.clone(),
            priority: spec.priority,
            tags: tags.clone(),
            params: Value::Object(params),
        };
        info!(job_type = %job.job_type, location = %name, "submitting job");
        let job_id = dispatcher.submit(&job)?;
        info!(job_type = %job.job_type, %job_id, "submitted job");
        submitted.push(SubmittedJob {
            location_name: name,
            job_id,
            tags,
        });
    }
    Ok(submitted)
}

pub fn aoi_query() -> Value {
    json!({
        "query": {"bool": {"must": [], "must_not": [], "should": [{"match_all": {}}]}},
        "from": 0,
        "size": AOI_QUERY_SIZE,
        "sort": [],
        "aggs": {}
    })
}

pub fn parse_aoi_hits(body: &Value) -> Result<BTreeMap<String, Value>, HarvestError> {
    let hits = body
        .get("hits")
        .and_then(|hits| hits.get("hits"))
        .and_then(Value::as_array)
        .ok_or_else(|| HarvestError::AoiResolution("response has no hits".to_string()))?;
    if hits.is_empty() {
        return Err(HarvestError::AoiResolution(
            "no hits from AOI index".to_string(),
        ));
    }

    let mut locations = BTreeMap::new();
    for hit in hits {
        let source = hit.get("_source");
        let name = source
            .and_then(|source| source.get("metadata"))
            .and_then(|metadata| metadata.get("clean_name"))
            .and_then(Value::as_str);
        let location = source.and_then(|source| source.get("location"));
        match (name, location) {
            (Some(name), Some(location)) => {
                locations.insert(name.to_string(), location.clone());
            }
            _ => warn!(hit = %hit, "AOI hit without clean_name or location"),
        }
    }
    if locations.is_empty() {
        return Err(HarvestError::AoiResolution(
            "no AOI hit carried a name and location".to_string(),
        ));
    }
    Ok(locations)
}

pub fn parse_submit_response(body: &Value) -> Result<String, HarvestError> {
    let success = body.get("success").and_then(Value::as_bool);
    let result = body.get("result");
    match (success, result) {
        (Some(true), Some(Value::String(job_id))) => Ok(job_id.clone()),
        (Some(true), Some(job_id)) if !job_id.is_null() => Ok(job_id.to_string()),
        _ => Err(HarvestError::Submission(body.to_string())),
    }
}

#[derive(Clone)]
pub struct MozartClient {
    client: Client,
    grq_es_url: String,
    mozart_rest_url: String,
}

impl MozartClient {
    pub fn new(grq_es_url: &str, mozart_rest_url: &str) -> Result<Self, HarvestError> {
        let client = Client::builder()
            .user_agent(format!("cmr-harvest/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| HarvestError::HttpClient(err.to_string()))?;
        Ok(Self {
            client,
            grq_es_url: grq_es_url.trim_end_matches('/').to_string(),
            mozart_rest_url: mozart_rest_url.trim_end_matches('/').to_string(),
        })
    }

    fn send_with_retries<F>(&self, method: &Method, mut make_req: F) -> Result<Response, HarvestError>
    where
        F: FnMut() -> RequestBuilder,
    {
        let retries = if is_idempotent(method) { MAX_RETRIES } else { 0 };
        let mut attempt = 0usize;
        loop {
            match make_req().send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < retries && is_retryable_status(status) {
                        thread::sleep(backoff(attempt));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < retries && is_retryable_error(&err) {
                        thread::sleep(backoff(attempt));
                        attempt += 1;
                        continue;
                    }
                    return Err(HarvestError::SubmissionHttp(err.to_string()));
                }
            }
        }
    }

    pub fn aoi_request(&self) -> RequestBuilder {
        self.client
            .get(format!("{}/{AOI_INDEX}/_search", self.grq_es_url))
            .json(&aoi_query())
    }

    pub fn submit_request(&self, job: &JobSubmission) -> RequestBuilder {
        self.client
            .post(format!("{}/job/submit", self.mozart_rest_url))
            .query(&job.query_pairs())
    }

    fn handle_status(response: Response) -> Result<Response, HarvestError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "submission request failed".to_string());
        Err(HarvestError::SubmissionStatus { status, message })
    }
}

impl JobDispatcher for MozartClient {
    fn resolve_locations(&self) -> Result<BTreeMap<String, Value>, HarvestError> {
        info!(index = AOI_INDEX, "querying AOI locations");
        let response = self.send_with_retries(&Method::GET, || self.aoi_request())?;
        let response = Self::handle_status(response)?;
        let body: Value = response
            .json()
            .map_err(|err| HarvestError::AoiResolution(err.to_string()))?;
        parse_aoi_hits(&body)
    }

    fn submit(&self, job: &JobSubmission) -> Result<String, HarvestError> {
        let response = self.send_with_retries(&Method::POST, || self.submit_request(job))?;
        let response = Self::handle_status(response)?;
        let body: Value = response
            .json()
            .map_err(|err| HarvestError::Submission(err.to_string()))?;
        parse_submit_response(&body)
    }
}

pub fn is_idempotent(method: &Method) -> bool {
    [Method::GET, Method::HEAD, Method::OPTIONS].contains(method)
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

fn backoff(attempt: usize) -> Duration {
    Duration::from_millis(BASE_DELAY_MS << attempt)
}
