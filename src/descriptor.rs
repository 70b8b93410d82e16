use std::collections::HashSet;
use std::sync::Arc;

use prometheus::{CounterVec, GaugeVec, Opts};
use tracing::warn;

/// How a metric's value behaves over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Counter,
    Gauge,
}

#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    #[error("metric {metric} expects {expected} label values, got {got}")]
    LabelCardinality {
        metric: String,
        expected: usize,
        got: usize,
    },
    #[error("counter {metric} can not take negative value {value}")]
    NegativeCounter { metric: String, value: f64 },
}

/// Static identity of one exported metric.
#[derive(Debug, Clone)]
pub struct Descriptor {
    fq_name: String,
    kind: ValueKind,
    opts: Opts,
}

impl Descriptor {
    pub fn new(
        namespace: &str,
        subsystem: &str,
        name: &str,
        help: &str,
        kind: ValueKind,
        labels: &[&str],
    ) -> Arc<Self> {
        let opts = Opts::new(name, help)
            .namespace(namespace)
            .subsystem(subsystem)
            .variable_labels(labels.iter().map(|l| l.to_string()).collect());

        Arc::new(Descriptor {
            fq_name: opts.fq_name(),
            kind,
            opts,
        })
    }

    pub fn counter(namespace: &str, subsystem: &str, name: &str, help: &str) -> Arc<Self> {
        Self::new(namespace, subsystem, name, help, ValueKind::Counter, &[])
    }

    pub fn gauge(namespace: &str, subsystem: &str, name: &str, help: &str) -> Arc<Self> {
        Self::new(namespace, subsystem, name, help, ValueKind::Gauge, &[])
    }

    pub fn name(&self) -> &str {
        &self.fq_name
    }

    pub fn help(&self) -> &str {
        &self.opts.help
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn label_names(&self) -> &[String] {
        &self.opts.variable_labels
    }

    pub fn opts(&self) -> Opts {
        self.opts.clone()
    }
}

/// One emitted value, owned by the sink until the scrape is rendered.
#[derive(Debug, Clone)]
pub struct Sample {
    pub descriptor: Arc<Descriptor>,
    pub label_values: Vec<String>,
    pub value: f64,
}

impl Sample {
    /// Label value by name, for inspection in tests and logs.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.descriptor
            .label_names()
            .iter()
            .position(|l| l == name)
            .map(|i| self.label_values[i].as_str())
    }
}

/// Collects the samples a single collector emits during one update.
#[derive(Debug, Default)]
pub struct Sink {
    samples: Vec<Sample>,
}

impl Sink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(
        &mut self,
        descriptor: &Arc<Descriptor>,
        value: f64,
        label_values: &[&str],
    ) -> Result<(), SampleError> {
        let expected = descriptor.label_names().len();
        if label_values.len() != expected {
            return Err(SampleError::LabelCardinality {
                metric: descriptor.name().to_owned(),
                expected,
                got: label_values.len(),
            });
        }
        if descriptor.kind() == ValueKind::Counter && value < 0.0 {
            return Err(SampleError::NegativeCounter {
                metric: descriptor.name().to_owned(),
                value,
            });
        }

        self.samples.push(Sample {
            descriptor: descriptor.clone(),
            label_values: label_values.iter().map(|v| v.to_string()).collect(),
            value,
        });
        Ok(())
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn extend(&mut self, other: Sink) {
        self.samples.extend(other.samples);
    }

    /// Turns the samples into prometheus collectors, one vec per metric name.
    ///
    /// A series emitted more than once keeps its first value.
    pub fn into_collectors(
        self,
    ) -> prometheus::Result<Vec<Box<dyn prometheus::core::Collector>>> {
        let mut vecs: Vec<(String, MetricVec)> = Vec::new();
        let mut seen = HashSet::new();

        for sample in self.samples {
            let name = sample.descriptor.name();
            if !seen.insert((name.to_owned(), sample.label_values.clone())) {
                warn!(
                    metric = name,
                    labels = ?sample.label_values,
                    value = sample.value,
                    "dropping duplicate series"
                );
                continue;
            }

            let idx = match vecs.iter().position(|(n, _)| n == name) {
                Some(idx) => idx,
                None => {
                    vecs.push((name.to_owned(), MetricVec::new(&sample.descriptor)?));
                    vecs.len() - 1
                }
            };

            let values: Vec<&str> = sample.label_values.iter().map(|s| s.as_str()).collect();
            match &vecs[idx].1 {
                MetricVec::Counter(c) => c.get_metric_with_label_values(&values)?.inc_by(sample.value),
                MetricVec::Gauge(g) => g.get_metric_with_label_values(&values)?.set(sample.value),
            }
        }

        Ok(vecs.into_iter().map(|(_, v)| v.boxed()).collect())
    }
}

enum MetricVec {
    Counter(CounterVec),
    Gauge(GaugeVec),
}

impl MetricVec {
    fn new(descriptor: &Descriptor) -> prometheus::Result<Self> {
        let labels: Vec<&str> = descriptor.label_names().iter().map(|s| s.as_str()).collect();
        Ok(match descriptor.kind() {
            ValueKind::Counter => MetricVec::Counter(CounterVec::new(descriptor.opts(), &labels)?),
            ValueKind::Gauge => MetricVec::Gauge(GaugeVec::new(descriptor.opts(), &labels)?),
        })
    }

    fn boxed(self) -> Box<dyn prometheus::core::Collector> {
        match self {
            MetricVec::Counter(c) => Box::new(c),
            MetricVec::Gauge(g) => Box::new(g),
        }
    }
}

/// Checks that a descriptor is acceptable to the prometheus registry.
pub fn validate(descriptor: &Descriptor) -> prometheus::Result<()> {
    MetricVec::new(descriptor).map(|_| ())
}
