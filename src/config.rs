use std::fs;
use std::path::{Path, PathBuf};

use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dedup::DEFAULT_INDEX_TEMPLATE;
use crate::domain::{ShortName, parse_instant};
use crate::error::HarvestError;
use crate::geometry::AreaOfInterest;
use crate::query::GranuleQuery;

pub const DEFAULT_CONFIG_FILE: &str = "cmr-harvest.json";
pub const DEFAULT_CONTEXT_FILE: &str = "_context.json";
pub const DEFAULT_CMR_URL: &str = "https://cmr.earthdata.nasa.gov";

pub const ENV_OVERRIDES: &[(&str, ConfigKey)] = &[
    ("CMR_URL", ConfigKey::CmrUrl),
    ("GRQ_ES_URL", ConfigKey::GrqEsUrl),
    ("GRQ_UPDATE_URL", ConfigKey::GrqUpdateUrl),
    ("MOZART_REST_URL", ConfigKey::MozartRestUrl),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    CmrUrl,
    GrqEsUrl,
    GrqUpdateUrl,
    MozartRestUrl,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub cmr_url: Option<String>,
    #[serde(default)]
    pub grq_es_url: Option<String>,
    #[serde(default)]
    pub grq_update_url: Option<String>,
    #[serde(default)]
    pub dataset_processed_queue: Option<String>,
    #[serde(default)]
    pub datasets_config: Option<String>,
    #[serde(default)]
    pub mozart_rest_url: Option<String>,
    #[serde(default)]
    pub dedup_index_template: Option<String>,
    #[serde(default)]
    pub product_root: Option<String>,
    #[serde(default)]
    pub strict_records: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub cmr_url: String,
    pub grq_es_url: String,
    pub grq_update_url: Option<String>,
    pub dataset_processed_queue: String,
    pub datasets_config: Utf8PathBuf,
    pub mozart_rest_url: Option<String>,
    pub dedup_index_template: String,
    pub product_root: Utf8PathBuf,
    pub strict_records: bool,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            cmr_url: DEFAULT_CMR_URL.to_string(),
            grq_es_url: "http://localhost:9200".to_string(),
            grq_update_url: None,
            dataset_processed_queue: "dataset_processed".to_string(),
            datasets_config: Utf8PathBuf::from("datasets.json"),
            mozart_rest_url: None,
            dedup_index_template: DEFAULT_INDEX_TEMPLATE.to_string(),
            product_root: Utf8PathBuf::from("."),
            strict_records: false,
        }
    }
}

impl HarvestConfig {
    pub fn require_mozart_rest_url(&self) -> Result<&str, HarvestError> {
        self.mozart_rest_url
            .as_deref()
            .ok_or(HarvestError::MissingSetting("mozart_rest_url"))
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<HarvestConfig, HarvestError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let config = if path.is_none() && !config_path.exists() {
            Config::default()
        } else {
            Self::load_file(&config_path)?
        };

        let mut resolved = Self::resolve_config(config);
        Self::apply_overrides(&mut resolved, |name| std::env::var(name).ok());
        Ok(resolved)
    }

    pub fn load_file(path: &Path) -> Result<Config, HarvestError> {
        let content =
            fs::read_to_string(path).map_err(|_| HarvestError::ConfigRead(path.to_path_buf()))?;
        serde_json::from_str(&content).map_err(|err| HarvestError::ConfigParse(err.to_string()))
    }

    pub fn resolve_config(config: Config) -> HarvestConfig {
        let defaults = HarvestConfig::default();
        HarvestConfig {
            cmr_url: config.cmr_url.unwrap_or(defaults.cmr_url),
            grq_es_url: config.grq_es_url.unwrap_or(defaults.grq_es_url),
            grq_update_url: config.grq_update_url,
            dataset_processed_queue: config
                .dataset_processed_queue
                .unwrap_or(defaults.dataset_processed_queue),
            datasets_config: config
                .datasets_config
                .map(Utf8PathBuf::from)
                .unwrap_or(defaults.datasets_config),
            mozart_rest_url: config.mozart_rest_url,
            dedup_index_template: config
                .dedup_index_template
                .unwrap_or(defaults.dedup_index_template),
            product_root: config
                .product_root
                .map(Utf8PathBuf::from)
                .unwrap_or(defaults.product_root),
            strict_records: config.strict_records.unwrap_or(defaults.strict_records),
        }
    }

    pub fn apply_overrides<F>(config: &mut HarvestConfig, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for (name, key) in ENV_OVERRIDES {
            let Some(value) = lookup(*name).filter(|value| !value.trim().is_empty()) else {
                continue;
            };
            let value = value.trim().to_string();
            match key {
                ConfigKey::CmrUrl => config.cmr_url = value,
                ConfigKey::GrqEsUrl => config.grq_es_url = value,
                ConfigKey::GrqUpdateUrl => config.grq_update_url = Some(value),
                ConfigKey::MozartRestUrl => config.mozart_rest_url = Some(value),
            }
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Context {
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub starttime: Option<String>,
    #[serde(default)]
    pub endtime: Option<String>,
    #[serde(default)]
    pub location: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct RunContext {
    pub short_name: ShortName,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub area_of_interest: Option<AreaOfInterest>,
}

impl RunContext {
    pub fn query(&self) -> GranuleQuery {
        GranuleQuery::new(self.short_name.clone())
            .with_temporal(self.start, self.end)
            .with_area_of_interest(self.area_of_interest.clone())
    }
}

pub struct ContextLoader;

impl ContextLoader {
    pub fn load(path: &Path) -> Result<RunContext, HarvestError> {
        let content =
            fs::read_to_string(path).map_err(|_| HarvestError::ContextRead(path.to_path_buf()))?;
        let context: Context = serde_json::from_str(&content)
            .map_err(|err| HarvestError::ContextParse(err.to_string()))?;
        Self::resolve_context(context)
    }

    pub fn resolve_context(context: Context) -> Result<RunContext, HarvestError> {
        let short_name = present(context.short_name)
            .ok_or(HarvestError::MissingShortName)?
            .parse::<ShortName>()?;
        let start = present(context.starttime)
            .map(|value| parse_instant(&value))
            .transpose()?;
        let end = present(context.endtime)
            .map(|value| parse_instant(&value))
            .transpose()?;
        let area_of_interest = match context.location {
            None | Some(Value::Null) => None,
            Some(Value::String(value)) if value.trim().is_empty() => None,
            Some(value) => Some(AreaOfInterest::from_geojson(&value)?),
        };

        Ok(RunContext {
            short_name,
            start,
            end,
            area_of_interest,
        })
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}
