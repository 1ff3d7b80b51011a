pub mod app;
pub mod cmr;
pub mod config;
pub mod dedup;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod geometry;
pub mod identity;
pub mod output;
pub mod product;
pub mod publish;
pub mod query;
pub mod store;

pub use error::HarvestError;
