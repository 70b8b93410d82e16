use std::collections::HashSet;

use crate::config::CommonInputs;
use crate::fetch::Fetcher;

use super::{alltime, goal, leader, summary, Collector, Constructor};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("missing collector: {0}")]
pub struct UnknownCollectorError(pub String);

struct Registration {
    name: &'static str,
    default_enabled: bool,
    constructor: Constructor,
}

/// Every collector the exporter knows about, in registration order.
#[derive(Default)]
pub struct CollectorRegistry {
    registrations: Vec<Registration>,
}

impl CollectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The Wakatime collectors, all enabled by default.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(alltime::NAME, true, alltime::new);
        registry.register(goal::NAME, true, goal::new);
        registry.register(leader::NAME, true, leader::new);
        registry.register(summary::NAME, true, summary::new);
        registry
    }

    /// # Panics
    ///
    /// When `name` is already registered.
    pub fn register(&mut self, name: &'static str, default_enabled: bool, constructor: Constructor) {
        if self.registrations.iter().any(|r| r.name == name) {
            panic!("collector {} registered twice", name);
        }
        self.registrations.push(Registration {
            name,
            default_enabled,
            constructor,
        });
    }

    /// Collectors then only run when requested with `collect[]`.
    pub fn disable_defaults(&mut self) {
        for r in &mut self.registrations {
            r.default_enabled = false;
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.registrations.iter().map(|r| r.name)
    }

    pub fn is_default_enabled(&self, name: &str) -> Option<bool> {
        self.registrations
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.default_enabled)
    }

    /// Builds the collectors for one scrape.
    ///
    /// Without filters every default-enabled collector is built, otherwise
    /// exactly the named ones.
    pub fn build<S: AsRef<str>>(
        &self,
        inputs: &CommonInputs,
        fetcher: &Fetcher,
        filters: &[S],
    ) -> Result<CollectorSet, UnknownCollectorError> {
        let mut wanted = HashSet::new();
        for f in filters {
            let f = f.as_ref();
            if !self.registrations.iter().any(|r| r.name == f) {
                return Err(UnknownCollectorError(f.to_owned()));
            }
            wanted.insert(f);
        }

        let collectors = self
            .registrations
            .iter()
            .filter(|r| {
                if wanted.is_empty() {
                    r.default_enabled
                } else {
                    wanted.contains(r.name)
                }
            })
            .map(|r| (r.name, (r.constructor)(inputs, fetcher)))
            .collect();

        Ok(CollectorSet { collectors })
    }

    /// Builds every registered collector, regardless of enablement.
    pub fn build_all(&self, inputs: &CommonInputs, fetcher: &Fetcher) -> CollectorSet {
        let collectors = self
            .registrations
            .iter()
            .map(|r| (r.name, (r.constructor)(inputs, fetcher)))
            .collect();
        CollectorSet { collectors }
    }
}

/// Named collector instances built for one scrape.
pub struct CollectorSet {
    collectors: Vec<(&'static str, Box<dyn Collector>)>,
}

impl CollectorSet {
    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.collectors.iter().map(|(n, _)| *n).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &dyn Collector)> {
        self.collectors.iter().map(|(n, c)| (*n, c.as_ref()))
    }
}
