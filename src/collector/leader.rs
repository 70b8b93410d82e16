use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;
use url::Url;

use super::{decode, CollectError, Collector, NAMESPACE};
use crate::config::CommonInputs;
use crate::descriptor::{Descriptor, Sink};
use crate::fetch::Fetcher;

pub const NAME: &str = "leader";
const SUBSYSTEM: &str = "leaderboard";
const ENDPOINT: &str = "leaders";

#[derive(Debug, Deserialize)]
struct Leaders {
    current_user: Option<CurrentUser>,
    #[serde(default)]
    page: Option<u64>,
    #[serde(default)]
    modified_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CurrentUser {
    rank: Option<u64>,
}

pub struct LeaderCollector {
    rank: Arc<Descriptor>,
    url: Url,
    fetcher: Fetcher,
}

/// The leaderboard is global, so this collector queries the base URL.
pub fn new(inputs: &CommonInputs, fetcher: &Fetcher) -> Box<dyn Collector> {
    Box::new(LeaderCollector {
        rank: Descriptor::gauge(NAMESPACE, SUBSYSTEM, "rank", "Current rank of the user."),
        url: inputs.base_url.clone(),
        fetcher: fetcher.clone(),
    })
}

impl LeaderCollector {
    fn record(&self, leaders: &Leaders, sink: &mut Sink) -> Result<(), CollectError> {
        info!(
            page = leaders.page.unwrap_or_default(),
            updated = leaders.modified_at.as_deref().unwrap_or_default(),
            "collecting rank from wakatime"
        );

        let rank = leaders
            .current_user
            .as_ref()
            .and_then(|u| u.rank)
            .ok_or(CollectError::MissingField("current_user.rank"))?;

        sink.emit(&self.rank, rank as f64, &[])?;
        Ok(())
    }
}

#[async_trait]
impl Collector for LeaderCollector {
    fn subsystem(&self) -> &'static str {
        SUBSYSTEM
    }

    fn describe(&self) -> Vec<Arc<Descriptor>> {
        vec![self.rank.clone()]
    }

    async fn update(&self, sink: &mut Sink) -> Result<(), CollectError> {
        let body = self
            .fetcher
            .get(&self.url, ENDPOINT, &[("cache", "false")])
            .await?;
        let leaders: Leaders = decode(&body)?;
        self.record(&leaders, sink)
    }
}
