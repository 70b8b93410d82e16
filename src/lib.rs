pub mod collector;
pub mod config;
pub mod descriptor;
pub mod exporter;
pub mod fetch;
pub mod log_filter;
pub mod server;

#[cfg(test)]
pub(crate) mod testing;

use metrics::{describe_counter, describe_gauge, describe_histogram, gauge};

pub use collector::{Collector, CollectorRegistry};
pub use config::{CommonInputs, Opts};
pub use exporter::Exporter;

const HTTP_REQUESTS: &str = "wakatime_exporter_http_requests_total";
const COLLECTOR_DURATION: &str = "wakatime_exporter_collector_duration_seconds";
const BUILD_INFO: &str = "wakatime_exporter_build_info";

/// Describes the exporter's own metrics. Only meaningful once a recorder is
/// installed.
pub fn init_metrics() {
    describe_counter!(HTTP_REQUESTS, "Number of metrics requests served, by status code.");
    describe_histogram!(COLLECTOR_DURATION, "Time spent in each collector update.");
    describe_gauge!(BUILD_INFO, "Version of the running wakatime exporter.");
    gauge!(BUILD_INFO, 1.0, "version" => env!("CARGO_PKG_VERSION"));
}
