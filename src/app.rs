use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::cmr::{CatalogClient, ScrollFetcher};
use crate::config::{HarvestConfig, RunContext};
use crate::dedup::{DedupGate, ExistenceIndex};
use crate::domain::ShortName;
use crate::error::HarvestError;
use crate::identity::ProductId;
use crate::product::{Product, RawGranuleRecord};
use crate::store::ProductStore;

#[derive(Debug, Clone, Default, Serialize)]
pub struct HarvestReport {
    pub short_name: String,
    pub query_url: String,
    pub fetched: usize,
    pub written: Vec<ProductId>,
    pub skipped_existing: Vec<ProductId>,
    pub skipped_invalid: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Written(ProductId),
    Existing(ProductId),
    Invalid(String),
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct Harvester<'a, C: CatalogClient, I: ExistenceIndex> {
    config: &'a HarvestConfig,
    catalog: C,
    index: I,
    store: ProductStore,
}

impl<'a, C: CatalogClient, I: ExistenceIndex> Harvester<'a, C, I> {
    pub fn new(config: &'a HarvestConfig, catalog: C, index: I, store: ProductStore) -> Self {
        Self {
            config,
            catalog,
            index,
            store,
        }
    }

    pub fn store(&self) -> &ProductStore {
        &self.store
    }

    pub fn run(
        &self,
        context: &RunContext,
        sink: &dyn ProgressSink,
    ) -> Result<HarvestReport, HarvestError> {
        let query = context.query();
        let query_url = query.url(&self.config.cmr_url);
        sink.event(ProgressEvent {
            message: format!("phase=Query; {query_url}"),
            elapsed: None,
        });

        let started = Instant::now();
        let entries = ScrollFetcher::new(&self.catalog, &self.config.cmr_url).fetch_all(&query)?;
        sink.event(ProgressEvent {
            message: format!("cmr.response granules={}", entries.len()),
            elapsed: Some(started.elapsed()),
        });

        let mut report = HarvestReport {
            short_name: context.short_name.to_string(),
            query_url,
            fetched: entries.len(),
            ..HarvestReport::default()
        };

        sink.event(ProgressEvent {
            message: "phase=Store; writing new products".to_string(),
            elapsed: None,
        });
        for entry in entries {
            match self.process_record(entry, &context.short_name)? {
                RecordOutcome::Written(id) => report.written.push(id),
                RecordOutcome::Existing(id) => report.skipped_existing.push(id),
                RecordOutcome::Invalid(_) => report.skipped_invalid += 1,
            }
        }

        info!(
            fetched = report.fetched,
            written = report.written.len(),
            existing = report.skipped_existing.len(),
            invalid = report.skipped_invalid,
            "harvest complete"
        );
        sink.event(ProgressEvent {
            message: format!(
                "phase=Done; written={} existing={} invalid={}",
                report.written.len(),
                report.skipped_existing.len(),
                report.skipped_invalid
            ),
            elapsed: Some(started.elapsed()),
        });
        Ok(report)
    }

    pub fn process_record(
        &self,
        entry: Value,
        short_name: &ShortName,
    ) -> Result<RecordOutcome, HarvestError> {
        let product = match RawGranuleRecord::from_value(entry)
            .and_then(|record| Product::from_record(record, short_name))
        {
            Ok(product) => product,
            Err(err) if is_record_error(&err) && !self.config.strict_records => {
                warn!(error = %err, "skipping granule");
                return Ok(RecordOutcome::Invalid(err.to_string()));
            }
            Err(err) => return Err(err),
        };

        // the partition comes from the record, not the run
        let partition = product.metadata.get("short_name").and_then(Value::as_str);
        if DedupGate::new(&self.index).exists(&product.id, partition) {
            info!(id = %product.id, "product already exists, skipping");
            return Ok(RecordOutcome::Existing(product.id));
        }

        self.store.write_product(&product)?;
        Ok(RecordOutcome::Written(product.id))
    }
}

fn is_record_error(err: &HarvestError) -> bool {
    matches!(
        err,
        HarvestError::GeometryParse(_)
            | HarvestError::InvalidRecord(_)
            | HarvestError::InvalidTimestamp(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_errors_are_scoped() {
        assert!(is_record_error(&HarvestError::GeometryParse("odd".to_string())));
        assert!(is_record_error(&HarvestError::InvalidTimestamp("x".to_string())));
        assert!(!is_record_error(&HarvestError::CountMismatch {
            expected: 2,
            actual: 1
        }));
        assert!(!is_record_error(&HarvestError::Filesystem("full".to_string())));
    }
}
