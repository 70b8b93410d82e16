use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;
use url::Url;

use super::{decode, CollectError, Collector, NAMESPACE};
use crate::config::CommonInputs;
use crate::descriptor::{Descriptor, Sink};
use crate::fetch::Fetcher;

pub const NAME: &str = "all-time";
const SUBSYSTEM: &str = "alltime";
const ENDPOINT: &str = "all_time_since_today";

#[derive(Debug, Deserialize)]
struct AllTime {
    data: AllTimeData,
}

#[derive(Debug, Deserialize)]
struct AllTimeData {
    is_up_to_date: bool,
    #[serde(default)]
    text: Option<String>,
    total_seconds: f64,
}

pub struct AllTimeCollector {
    total: Arc<Descriptor>,
    url: Url,
    fetcher: Fetcher,
}

pub fn new(inputs: &CommonInputs, fetcher: &Fetcher) -> Box<dyn Collector> {
    Box::new(AllTimeCollector {
        total: Descriptor::counter(
            NAMESPACE,
            SUBSYSTEM,
            "cumulative_seconds_total",
            "Total seconds (all time).",
        ),
        url: inputs.user_url.clone(),
        fetcher: fetcher.clone(),
    })
}

impl AllTimeCollector {
    fn record(&self, stats: &AllTime, sink: &mut Sink) -> Result<(), CollectError> {
        info!(
            up_to_date = stats.data.is_up_to_date,
            text = stats.data.text.as_deref().unwrap_or_default(),
            "collecting all time from wakatime"
        );
        if !stats.data.is_up_to_date {
            return Err(CollectError::Stale(SUBSYSTEM));
        }

        sink.emit(&self.total, stats.data.total_seconds, &[])?;
        Ok(())
    }
}

#[async_trait]
impl Collector for AllTimeCollector {
    fn subsystem(&self) -> &'static str {
        SUBSYSTEM
    }

    fn describe(&self) -> Vec<Arc<Descriptor>> {
        vec![self.total.clone()]
    }

    async fn update(&self, sink: &mut Sink) -> Result<(), CollectError> {
        let body = self
            .fetcher
            .get(&self.url, ENDPOINT, &[("cache", "false")])
            .await?;
        let stats: AllTime = decode(&body)?;
        self.record(&stats, sink)
    }
}
