use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::info;

use crate::error::HarvestError;
use crate::identity::ProductId;
use crate::product::Product;

#[derive(Debug, Clone)]
pub struct ProductStore {
    root: Utf8PathBuf,
}

impl ProductStore {
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn product_dir(&self, id: &ProductId) -> Utf8PathBuf {
        self.root.join(id.as_str())
    }

    pub fn dataset_path(&self, id: &ProductId) -> Utf8PathBuf {
        self.product_dir(id).join(format!("{id}.dataset.json"))
    }

    pub fn met_path(&self, id: &ProductId) -> Utf8PathBuf {
        self.product_dir(id).join(format!("{id}.met.json"))
    }

    pub fn product_exists(&self, id: &ProductId) -> bool {
        self.dataset_path(id).as_std_path().exists() && self.met_path(id).as_std_path().exists()
    }

    pub fn write_product(&self, product: &Product) -> Result<Utf8PathBuf, HarvestError> {
        let dir = self.product_dir(&product.id);
        let replacing = self.product_exists(&product.id);
        fs::create_dir_all(dir.as_std_path())
            .map_err(|err| HarvestError::Filesystem(format!("create {dir}: {err}")))?;
        write_json_atomic(&self.dataset_path(&product.id), &product.dataset)?;
        write_json_atomic(&self.met_path(&product.id), &product.metadata)?;
        info!(id = %product.id, path = %dir, replacing, "saved product");
        Ok(dir)
    }

    pub fn remove_product(&self, id: &ProductId) -> Result<(), HarvestError> {
        let dir = self.product_dir(id);
        if dir.as_std_path().exists() {
            fs::remove_dir_all(dir.as_std_path())
                .map_err(|err| HarvestError::Filesystem(format!("remove {dir}: {err}")))?;
        }
        Ok(())
    }
}

fn write_json_atomic<T: Serialize>(path: &Utf8Path, value: &T) -> Result<(), HarvestError> {
    let parent = path
        .parent()
        .ok_or_else(|| HarvestError::Filesystem(format!("invalid destination path {path}")))?;
    let content = serde_json::to_vec_pretty(value)
        .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
    let mut temp = tempfile::Builder::new()
        .prefix(".cmr-harvest")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
    temp.write_all(&content)
        .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
    Ok(())
}
