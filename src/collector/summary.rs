use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{error, info};
use url::Url;

use super::{decode, CollectError, Collector, NAMESPACE};
use crate::config::CommonInputs;
use crate::descriptor::{Descriptor, Sink, ValueKind};
use crate::fetch::Fetcher;

pub const NAME: &str = "summary";
const SUBSYSTEM: &str = "summary";
const ENDPOINT: &str = "summaries";
const METRIC: &str = "seconds_total";

#[derive(Debug, Deserialize)]
struct Summaries {
    data: Vec<Summary>,
}

#[derive(Debug, Deserialize)]
struct Summary {
    grand_total: GrandTotal,
    #[serde(default)]
    languages: Vec<Item>,
    #[serde(default)]
    operating_systems: Vec<Item>,
    #[serde(default)]
    machines: Vec<Machine>,
    #[serde(default)]
    editors: Vec<Item>,
    #[serde(default)]
    projects: Vec<Item>,
    #[serde(default)]
    categories: Vec<Item>,
    #[serde(default)]
    range: Option<Range>,
}

#[derive(Debug, Deserialize)]
struct GrandTotal {
    total_seconds: f64,
}

#[derive(Debug, Deserialize)]
struct Item {
    name: String,
    total_seconds: f64,
}

#[derive(Debug, Deserialize)]
struct Machine {
    name: String,
    #[serde(default)]
    machine_name_id: Option<String>,
    total_seconds: f64,
}

#[derive(Debug, Deserialize)]
struct Range {
    #[serde(default)]
    start: Option<String>,
    #[serde(default)]
    end: Option<String>,
    #[serde(default)]
    timezone: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

pub struct SummaryCollector {
    total: Arc<Descriptor>,
    language: Arc<Descriptor>,
    operating_system: Arc<Descriptor>,
    machine: Arc<Descriptor>,
    editor: Arc<Descriptor>,
    project: Arc<Descriptor>,
    category: Arc<Descriptor>,
    url: Url,
    fetcher: Fetcher,
}

pub fn new(inputs: &CommonInputs, fetcher: &Fetcher) -> Box<dyn Collector> {
    Box::new(SummaryCollector::new(inputs.user_url.clone(), fetcher.clone()))
}

fn per_name(dimension: &str, help: &str) -> Arc<Descriptor> {
    Descriptor::new(NAMESPACE, dimension, METRIC, help, ValueKind::Counter, &["name"])
}

impl SummaryCollector {
    fn new(url: Url, fetcher: Fetcher) -> Self {
        SummaryCollector {
            total: Descriptor::counter(NAMESPACE, "", METRIC, "Total seconds."),
            language: per_name("language", "Total seconds for each language."),
            operating_system: per_name(
                "operating_system",
                "Total seconds for each operating system.",
            ),
            machine: Descriptor::new(
                NAMESPACE,
                "machine",
                METRIC,
                "Total seconds for each machine.",
                ValueKind::Counter,
                &["name", "id"],
            ),
            editor: per_name("editor", "Total seconds for each editor."),
            project: per_name("project", "Total seconds for each project."),
            category: per_name("category", "Total seconds for each category."),
            url,
            fetcher,
        }
    }

    fn record(&self, summaries: &Summaries, sink: &mut Sink) -> Result<(), CollectError> {
        for (i, data) in summaries.data.iter().enumerate() {
            let range = data.range.as_ref();
            info!(
                obj = i,
                start = range.and_then(|r| r.start.as_deref()).unwrap_or_default(),
                end = range.and_then(|r| r.end.as_deref()).unwrap_or_default(),
                tz = range.and_then(|r| r.timezone.as_deref()).unwrap_or_default(),
                text = range.and_then(|r| r.text.as_deref()).unwrap_or_default(),
                "collecting summary from wakatime"
            );
        }

        if summaries.data.len() != 1 {
            error!(size = summaries.data.len(), "length of results is incorrect");
        }
        let today = summaries.data.first().ok_or(CollectError::EmptySummary)?;

        sink.emit(&self.total, today.grand_total.total_seconds, &[])?;
        for (descriptor, items) in [
            (&self.language, &today.languages),
            (&self.operating_system, &today.operating_systems),
            (&self.editor, &today.editors),
            (&self.project, &today.projects),
            (&self.category, &today.categories),
        ] {
            for item in items {
                sink.emit(descriptor, item.total_seconds, &[item.name.as_str()])?;
            }
        }
        for machine in &today.machines {
            let id = machine.machine_name_id.as_deref().unwrap_or_default();
            sink.emit(&self.machine, machine.total_seconds, &[machine.name.as_str(), id])?;
        }

        Ok(())
    }
}

#[async_trait]
impl Collector for SummaryCollector {
    fn subsystem(&self) -> &'static str {
        SUBSYSTEM
    }

    fn describe(&self) -> Vec<Arc<Descriptor>> {
        vec![
            self.total.clone(),
            self.language.clone(),
            self.operating_system.clone(),
            self.machine.clone(),
            self.editor.clone(),
            self.project.clone(),
            self.category.clone(),
        ]
    }

    async fn update(&self, sink: &mut Sink) -> Result<(), CollectError> {
        let body = self
            .fetcher
            .get(
                &self.url,
                ENDPOINT,
                &[("start", "today"), ("end", "today"), ("cache", "false")],
            )
            .await?;
        let summaries: Summaries = decode(&body)?;
        self.record(&summaries, sink)
    }
}
