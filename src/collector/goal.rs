use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};
use url::Url;

use super::{bool_label, decode, CollectError, Collector, NAMESPACE};
use crate::config::CommonInputs;
use crate::descriptor::{Descriptor, Sink, ValueKind};
use crate::fetch::Fetcher;

pub const NAME: &str = "goal";
const SUBSYSTEM: &str = "goal";
const ENDPOINT: &str = "goals";

const GOAL_LABELS: &[&str] = &["name", "id", "type", "delta"];
const INFO_LABELS: &[&str] = &[
    "name",
    "id",
    "ignore_zero_days",
    "is_enabled",
    "is_inverse",
    "is_snoozed",
    "is_tweeting",
];

#[derive(Debug, Deserialize)]
struct Goals {
    data: Vec<Goal>,
    #[serde(default)]
    total: u64,
    #[serde(default)]
    total_pages: u64,
}

#[derive(Debug, Deserialize)]
struct Goal {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    delta: Option<String>,
    #[serde(default)]
    is_enabled: bool,
    #[serde(default)]
    ignore_zero_days: bool,
    #[serde(default)]
    is_inverse: bool,
    #[serde(default)]
    is_snoozed: bool,
    #[serde(default)]
    is_tweeting: bool,
    #[serde(default)]
    chart_data: Vec<ChartData>,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    goal_seconds: f64,
    actual_seconds: f64,
    #[serde(default)]
    range: Option<ChartRange>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartRange {
    #[serde(default)]
    start: Option<String>,
    #[serde(default)]
    end: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

pub struct GoalCollector {
    threshold: Arc<Descriptor>,
    progress: Arc<Descriptor>,
    info: Arc<Descriptor>,
    url: Url,
    fetcher: Fetcher,
}

pub fn new(inputs: &CommonInputs, fetcher: &Fetcher) -> Box<dyn Collector> {
    Box::new(GoalCollector::new(inputs.user_url.clone(), fetcher.clone()))
}

impl GoalCollector {
    fn new(url: Url, fetcher: Fetcher) -> Self {
        GoalCollector {
            threshold: Descriptor::new(
                NAMESPACE,
                SUBSYSTEM,
                "threshold_seconds",
                "The goal as set through the wakatime interface.",
                ValueKind::Gauge,
                GOAL_LABELS,
            ),
            progress: Descriptor::new(
                NAMESPACE,
                SUBSYSTEM,
                "progress_seconds",
                "Progress towards the goal.",
                ValueKind::Counter,
                GOAL_LABELS,
            ),
            info: Descriptor::new(
                NAMESPACE,
                SUBSYSTEM,
                "info",
                "Information about the goal.",
                ValueKind::Gauge,
                INFO_LABELS,
            ),
            url,
            fetcher,
        }
    }

    fn record(&self, goals: &Goals, sink: &mut Sink) -> Result<(), CollectError> {
        info!(
            total = goals.total,
            pages = goals.total_pages,
            "collecting goals from wakatime"
        );

        for (i, goal) in goals.data.iter().enumerate() {
            // the last entry is the most recent day
            let Some(current) = goal.chart_data.last() else {
                warn!(goal = %goal.id, "goal has no chart data, skipping");
                continue;
            };

            let range = current.range.as_ref();
            info!(
                obj = i,
                start = range.and_then(|r| r.start.as_deref()).unwrap_or_default(),
                end = range.and_then(|r| r.end.as_deref()).unwrap_or_default(),
                text = range.and_then(|r| r.text.as_deref()).unwrap_or_default(),
                "collecting goal from wakatime"
            );

            let name = goal.title.as_deref().unwrap_or_default();
            let labels = [
                name,
                goal.id.as_str(),
                goal.kind.as_deref().unwrap_or_default(),
                goal.delta.as_deref().unwrap_or_default(),
            ];
            sink.emit(&self.threshold, current.goal_seconds, &labels)?;
            sink.emit(&self.progress, current.actual_seconds, &labels)?;
            sink.emit(
                &self.info,
                1.0,
                &[
                    name,
                    goal.id.as_str(),
                    bool_label(goal.ignore_zero_days),
                    bool_label(goal.is_enabled),
                    bool_label(goal.is_inverse),
                    bool_label(goal.is_snoozed),
                    bool_label(goal.is_tweeting),
                ],
            )?;
        }

        Ok(())
    }
}

#[async_trait]
impl Collector for GoalCollector {
    fn subsystem(&self) -> &'static str {
        SUBSYSTEM
    }

    fn describe(&self) -> Vec<Arc<Descriptor>> {
        vec![self.threshold.clone(), self.progress.clone(), self.info.clone()]
    }

    async fn update(&self, sink: &mut Sink) -> Result<(), CollectError> {
        let body = self
            .fetcher
            .get(&self.url, ENDPOINT, &[("cache", "false")])
            .await?;
        let goals: Goals = decode(&body)?;
        self.record(&goals, sink)
    }
}
