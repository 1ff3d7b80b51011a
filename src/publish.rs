use camino::{Utf8Path, Utf8PathBuf};
use tracing::{info, warn};

use crate::config::HarvestConfig;
use crate::dedup::{DedupGate, ExistenceIndex};
use crate::error::HarvestError;
use crate::identity::ProductId;
use crate::product::Product;
use crate::store::ProductStore;

#[derive(Debug, Clone)]
pub struct PublishRequest<'a> {
    pub id: &'a ProductId,
    pub descriptor_path: &'a Utf8Path,
    pub update_endpoint: &'a str,
    pub processed_queue: &'a str,
    pub product_dir: &'a Utf8Path,
}

pub trait ProductPublisher {
    fn publish(&self, request: &PublishRequest<'_>) -> Result<(), HarvestError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Published,
    AlreadyExists,
}

pub fn ingest_product<P, I>(
    publisher: &P,
    index: &I,
    store: &ProductStore,
    product: &Product,
    config: &HarvestConfig,
) -> Result<PublishOutcome, HarvestError>
where
    P: ProductPublisher,
    I: ExistenceIndex,
{
    let update_endpoint = config.grq_update_url.as_deref().ok_or_else(|| {
        HarvestError::Publish(format!("{}: GRQ update URL not configured", product.id))
    })?;

    let product_dir: Utf8PathBuf = store.write_product(product)?;
    let partition = product
        .metadata
        .get("short_name")
        .and_then(serde_json::Value::as_str);
    if DedupGate::new(index).exists(&product.id, partition) {
        info!(id = %product.id, "product already exists, passing on publish");
        return Ok(PublishOutcome::AlreadyExists);
    }

    info!(id = %product.id, "product does not exist, publishing");
    let request = PublishRequest {
        id: &product.id,
        descriptor_path: &config.datasets_config,
        update_endpoint,
        processed_queue: &config.dataset_processed_queue,
        product_dir: &product_dir,
    };
    if let Err(err) = publisher.publish(&request) {
        warn!(id = %product.id, path = %product_dir, "publish failed, keeping product directory");
        return Err(HarvestError::Publish(format!("{}: {err}", product.id)));
    }
    store.remove_product(&product.id)?;
    Ok(PublishOutcome::Published)
}
