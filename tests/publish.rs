use std::cell::RefCell;
use std::fs;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use serde_json::json;

use cmr_harvester::config::HarvestConfig;
use cmr_harvester::dedup::{DedupOutcome, ExistenceIndex};
use cmr_harvester::domain::ShortName;
use cmr_harvester::error::HarvestError;
use cmr_harvester::identity::ProductId;
use cmr_harvester::product::{Product, RawGranuleRecord};
use cmr_harvester::publish::{ProductPublisher, PublishOutcome, PublishRequest, ingest_product};
use cmr_harvester::store::ProductStore;

#[derive(Default)]
struct RecordingPublisher {
    fail: bool,
    requests: RefCell<Vec<(String, String, String)>>,
}

impl ProductPublisher for RecordingPublisher {
    fn publish(&self, request: &PublishRequest<'_>) -> Result<(), HarvestError> {
        // the product must be on disk while the ingester runs
        assert!(request.product_dir.join(format!("{}.met.json", request.id)).exists());
        self.requests.borrow_mut().push((
            request.id.to_string(),
            request.update_endpoint.to_string(),
            request.processed_queue.to_string(),
        ));
        if self.fail {
            return Err(HarvestError::SubmissionStatus {
                status: 500,
                message: "ingest crashed".to_string(),
            });
        }
        Ok(())
    }
}

struct FixedIndex(DedupOutcome);

impl ExistenceIndex for FixedIndex {
    fn lookup(&self, _id: &ProductId, _partition: &str) -> DedupOutcome {
        self.0.clone()
    }
}

fn product() -> Product {
    let record = RawGranuleRecord::from_value(json!({
        "id": "G42-LPDAAC_ECS",
        "time_start": "2019-06-15T12:30:00.000Z",
        "time_end": "2019-06-15T12:40:00.000Z",
        "polygons": [["-10.0 120.0 -10.0 121.0 -9.0 121.0 -10.0 120.0"]]
    }))
    .unwrap();
    let name: ShortName = "AST_09T".parse().unwrap();
    Product::from_record(record, &name).unwrap()
}

fn setup() -> (tempfile::TempDir, HarvestConfig, ProductStore) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let config = HarvestConfig {
        grq_update_url: Some("http://grq.example.test:8868/api/v0.1/grq/dataset/index".to_string()),
        product_root: root.clone(),
        ..HarvestConfig::default()
    };
    (temp, config, ProductStore::new(root))
}

#[test]
fn published_product_is_removed_locally() {
    let (_temp, config, store) = setup();
    let publisher = RecordingPublisher::default();
    let product = product();

    let outcome = ingest_product(
        &publisher,
        &FixedIndex(DedupOutcome::NotFound),
        &store,
        &product,
        &config,
    )
    .unwrap();

    assert_eq!(outcome, PublishOutcome::Published);
    assert!(!store.product_exists(&product.id));
    let requests = publisher.requests.borrow();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0, "MET-AST_09T-20190615T123000_20190615T124000-v1.0");
    assert_eq!(requests[0].2, "dataset_processed");
}

#[test]
fn failed_publish_keeps_the_directory() {
    let (_temp, config, store) = setup();
    let publisher = RecordingPublisher {
        fail: true,
        ..RecordingPublisher::default()
    };
    let product = product();

    let err = ingest_product(
        &publisher,
        &FixedIndex(DedupOutcome::NotFound),
        &store,
        &product,
        &config,
    )
    .unwrap_err();

    assert_matches!(err, HarvestError::Publish(ref message) if message.starts_with("MET-AST_09T-"));
    assert!(store.product_exists(&product.id));
    assert!(fs::metadata(store.dataset_path(&product.id)).is_ok());
}

#[test]
fn indexed_product_is_not_published() {
    let (_temp, config, store) = setup();
    let publisher = RecordingPublisher::default();

    let outcome = ingest_product(
        &publisher,
        &FixedIndex(DedupOutcome::Found(1)),
        &store,
        &product(),
        &config,
    )
    .unwrap();

    assert_eq!(outcome, PublishOutcome::AlreadyExists);
    assert!(publisher.requests.borrow().is_empty());
}

#[test]
fn unreachable_index_still_publishes() {
    let (_temp, config, store) = setup();
    let publisher = RecordingPublisher::default();

    let outcome = ingest_product(
        &publisher,
        &FixedIndex(DedupOutcome::QueryFailed("connection refused".to_string())),
        &store,
        &product(),
        &config,
    )
    .unwrap();

    assert_eq!(outcome, PublishOutcome::Published);
}

#[test]
fn missing_update_url_is_rejected_before_writing() {
    let (_temp, mut config, store) = setup();
    config.grq_update_url = None;
    let product = product();

    let err = ingest_product(
        &RecordingPublisher::default(),
        &FixedIndex(DedupOutcome::NotFound),
        &store,
        &product,
        &config,
    )
    .unwrap_err();

    assert_matches!(err, HarvestError::Publish(_));
    assert!(!store.product_exists(&product.id));
}
