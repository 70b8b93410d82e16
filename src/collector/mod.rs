use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::config::CommonInputs;
use crate::descriptor::{Descriptor, SampleError, Sink};
use crate::fetch::{FetchError, Fetcher};

pub mod alltime;
pub mod goal;
pub mod leader;
pub mod registry;
pub mod summary;

pub use registry::{CollectorRegistry, CollectorSet, UnknownCollectorError};

/// Namespace shared by every exported metric.
pub const NAMESPACE: &str = "wakatime";

#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("invalid JSON response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error(transparent)]
    Sample(#[from] SampleError),
    #[error("skipped scrape of {0} metrics because they were not up to date")]
    Stale(&'static str),
    #[error("response is missing {0}")]
    MissingField(&'static str),
    #[error("summary response contained no records")]
    EmptySummary,
}

/// Builds a collector from the shared inputs.
pub type Constructor = fn(&CommonInputs, &Fetcher) -> Box<dyn Collector>;

/// One upstream endpoint translated into metric samples.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Subsystem used for this collector's health metrics.
    fn subsystem(&self) -> &'static str;

    /// Every descriptor this collector may emit.
    fn describe(&self) -> Vec<Arc<Descriptor>>;

    /// Fetches the endpoint once and emits its samples.
    async fn update(&self, sink: &mut Sink) -> Result<(), CollectError>;
}

pub(crate) fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, CollectError> {
    Ok(serde_json::from_slice(body)?)
}

/// Renders a boolean as the label value "0" or "1".
pub(crate) fn bool_label(b: bool) -> &'static str {
    if b {
        "1"
    } else {
        "0"
    }
}
