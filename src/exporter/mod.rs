use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::histogram;
use prometheus::{Counter, Encoder, Gauge, Registry, TextEncoder};
use tokio::sync::Mutex;
use tracing::{debug, error, info_span, Instrument};

use crate::collector::{CollectorRegistry, UnknownCollectorError, NAMESPACE};
use crate::config::CommonInputs;
use crate::descriptor::{Descriptor, Sample, Sink};
use crate::fetch::Fetcher;

#[derive(Debug, thiserror::Error)]
pub enum ExporterError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
    #[error("invalid metric: {0}")]
    Metric(#[from] prometheus::Error),
}

/// Health metrics of one collector. They live as long as the exporter, so
/// the counters accumulate across scrapes.
struct Health {
    subsystem: &'static str,
    up: Gauge,
    scrapes: Counter,
    failures: Counter,
}

impl Health {
    fn new(subsystem: &'static str) -> prometheus::Result<Self> {
        let [up, scrapes, failures] = health_descriptors(subsystem);
        Ok(Health {
            subsystem,
            up: Gauge::with_opts(up.opts())?,
            scrapes: Counter::with_opts(scrapes.opts())?,
            failures: Counter::with_opts(failures.opts())?,
        })
    }

    /// Must be taken while the scrape lock is held.
    fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            subsystem: self.subsystem,
            up: self.up.get(),
            scrapes: self.scrapes.get(),
            failures: self.failures.get(),
        }
    }
}

/// Health values as they were at the end of one collector's run.
#[derive(Debug, Clone, Copy)]
struct HealthSnapshot {
    subsystem: &'static str,
    up: f64,
    scrapes: f64,
    failures: f64,
}

impl HealthSnapshot {
    fn collectors(&self) -> prometheus::Result<[Box<dyn prometheus::core::Collector>; 3]> {
        let [up_desc, scrapes_desc, failures_desc] = health_descriptors(self.subsystem);

        let up = Gauge::with_opts(up_desc.opts())?;
        up.set(self.up);
        let scrapes = Counter::with_opts(scrapes_desc.opts())?;
        scrapes.inc_by(self.scrapes);
        let failures = Counter::with_opts(failures_desc.opts())?;
        failures.inc_by(self.failures);

        let collectors: [Box<dyn prometheus::core::Collector>; 3] =
            [Box::new(up), Box::new(scrapes), Box::new(failures)];
        Ok(collectors)
    }
}

fn health_descriptors(subsystem: &str) -> [Arc<Descriptor>; 3] {
    [
        Descriptor::gauge(
            NAMESPACE,
            subsystem,
            "up",
            "Was the last scrape of wakatime successful.",
        ),
        Descriptor::counter(
            NAMESPACE,
            subsystem,
            "exporter_scrapes_total",
            "Current total wakatime scrapes.",
        ),
        Descriptor::counter(
            NAMESPACE,
            subsystem,
            "exporter_query_failures_total",
            "Number of errors.",
        ),
    ]
}

/// Result of running one collector during a scrape.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectorOutcome {
    pub name: &'static str,
    pub success: bool,
    pub duration: Duration,
}

/// Drives scrapes over the registered collectors.
pub struct Exporter {
    registry: CollectorRegistry,
    inputs: CommonInputs,
    fetcher: Fetcher,
    // held for the whole scrape, so scrapes never overlap
    health: Mutex<HashMap<&'static str, Health>>,
}

impl Exporter {
    pub fn new(registry: CollectorRegistry, inputs: CommonInputs) -> Result<Self, ExporterError> {
        let fetcher = Fetcher::new(&inputs.token, inputs.ssl_verify, inputs.timeout)?;

        let mut health = HashMap::new();
        for (name, collector) in registry.build_all(&inputs, &fetcher).iter() {
            health.insert(name, Health::new(collector.subsystem())?);
        }

        Ok(Exporter {
            registry,
            inputs,
            fetcher,
            health: Mutex::new(health),
        })
    }

    pub fn registry(&self) -> &CollectorRegistry {
        &self.registry
    }

    /// Every metric any registered collector can produce, including the
    /// per-collector health metrics.
    pub fn describe(&self) -> Vec<Arc<Descriptor>> {
        let mut descriptors = Vec::new();
        for (_, collector) in self.registry.build_all(&self.inputs, &self.fetcher).iter() {
            descriptors.extend(collector.describe());
            descriptors.extend(health_descriptors(collector.subsystem()));
        }
        descriptors
    }

    /// Runs the default collectors, or exactly `filters` when non-empty.
    ///
    /// A failing collector only affects its own metrics.
    pub async fn scrape<S: AsRef<str>>(
        &self,
        filters: &[S],
    ) -> Result<ScrapeReport, UnknownCollectorError> {
        let health = self.health.lock().await;
        let set = self.registry.build(&self.inputs, &self.fetcher, filters)?;

        let mut report = ScrapeReport {
            outcomes: Vec::with_capacity(set.len()),
            samples: Sink::new(),
            health: Vec::with_capacity(set.len()),
        };

        for (name, collector) in set.iter() {
            let Some(h) = health.get(name) else {
                error!(collector = name, "collector has no health metrics");
                continue;
            };
            h.scrapes.inc();

            let mut sink = Sink::new();
            let start = Instant::now();
            let result = collector
                .update(&mut sink)
                .instrument(info_span!("collector", collector = name))
                .await;
            let duration = start.elapsed();
            histogram!(crate::COLLECTOR_DURATION, duration.as_secs_f64(), "collector" => name);

            let success = match result {
                Ok(()) => {
                    debug!(
                        collector = name,
                        duration_seconds = duration.as_secs_f64(),
                        "collector succeeded"
                    );
                    h.up.set(1.0);
                    report.samples.extend(sink);
                    true
                }
                Err(err) => {
                    error!(
                        collector = name,
                        duration_seconds = duration.as_secs_f64(),
                        error = %err,
                        "collector failed"
                    );
                    h.up.set(0.0);
                    h.failures.inc();
                    false
                }
            };

            report.health.push(h.snapshot());
            report.outcomes.push(CollectorOutcome {
                name,
                success,
                duration,
            });
        }

        Ok(report)
    }
}

/// Everything one scrape produced, ready to be encoded.
pub struct ScrapeReport {
    pub outcomes: Vec<CollectorOutcome>,
    samples: Sink,
    health: Vec<HealthSnapshot>,
}

impl ScrapeReport {
    pub fn samples(&self) -> &[Sample] {
        self.samples.samples()
    }

    pub fn outcome(&self, name: &str) -> Option<&CollectorOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }

    /// Encodes the scrape in the Prometheus text format.
    pub fn render(self) -> prometheus::Result<Vec<u8>> {
        let registry = Registry::new();
        for c in self.samples.into_collectors()? {
            registry.register(c)?;
        }
        for h in &self.health {
            for c in h.collectors()? {
                registry.register(c)?;
            }
        }

        let mut buf = Vec::new();
        TextEncoder::new().encode(&registry.gather(), &mut buf)?;
        Ok(buf)
    }
}
