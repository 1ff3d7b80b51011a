use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum HarvestError {
    #[error("short_name must be specified")]
    #[diagnostic(help("set \"short_name\" in the run context"))]
    MissingShortName,

    #[error("invalid short name: {0}")]
    InvalidShortName(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("invalid area of interest: {0}")]
    InvalidLocation(String),

    #[error("{0} is not configured")]
    #[diagnostic(help("set it in cmr-harvest.json or the matching environment variable"))]
    MissingSetting(&'static str),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("unable to read run context at {0}")]
    ContextRead(PathBuf),

    #[error("unable to parse run context: {0}")]
    ContextParse(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("CMR request failed: {0}")]
    CatalogHttp(String),

    #[error("CMR returned status {status}: {message}")]
    CatalogStatus { status: u16, message: String },

    #[error("malformed CMR response: {0}")]
    CatalogResponse(String),

    #[error("total granules returned ({actual}) do not match expected granule count ({expected})")]
    CountMismatch { expected: u64, actual: u64 },

    #[error("malformed polygon: {0}")]
    GeometryParse(String),

    #[error("invalid granule record: {0}")]
    InvalidRecord(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("no AOI locations resolved: {0}")]
    AoiResolution(String),

    #[error("job submission request failed: {0}")]
    SubmissionHttp(String),

    #[error("job submission returned status {status}: {message}")]
    SubmissionStatus { status: u16, message: String },

    #[error("job not submitted successfully: {0}")]
    Submission(String),

    #[error("failed on publish of {0}")]
    Publish(String),
}

impl HarvestError {
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            HarvestError::MissingShortName
                | HarvestError::InvalidShortName(_)
                | HarvestError::InvalidTimestamp(_)
                | HarvestError::InvalidLocation(_)
                | HarvestError::MissingSetting(_)
                | HarvestError::ConfigRead(_)
                | HarvestError::ConfigParse(_)
                | HarvestError::ContextRead(_)
                | HarvestError::ContextParse(_)
                | HarvestError::HttpClient(_)
        )
    }

    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            HarvestError::CatalogHttp(_)
                | HarvestError::CatalogStatus { .. }
                | HarvestError::CatalogResponse(_)
                | HarvestError::CountMismatch { .. }
                | HarvestError::SubmissionHttp(_)
                | HarvestError::SubmissionStatus { .. }
                | HarvestError::Submission(_)
                | HarvestError::AoiResolution(_)
        )
    }
}
