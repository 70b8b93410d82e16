use tracing::{metadata::LevelFilter, Level, Metadata};
use tracing_subscriber::layer::{Context, Filter};

pub struct LogFilter {
    level: Level,
}

impl LogFilter {
    pub fn new(level: Level) -> Self {
        LogFilter { level }
    }
}

impl<S> Filter<S> for LogFilter {
    fn enabled(&self, meta: &Metadata<'_>, _cx: &Context<'_, S>) -> bool {
        let target = meta.target();

        // the exporter itself at the configured level, plus tower_http responses
        (target.starts_with("wakatime_exporter") && *meta.level() <= self.level)
            || target.starts_with("tower_http::trace::on_response")
    }

    fn max_level_hint(&self) -> Option<LevelFilter> {
        Some(LevelFilter::from(self.level.max(Level::INFO)))
    }
}

#[cfg(test)]
mod tests {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::{Layer, Registry};

    use super::*;

    #[test]
    fn test_filters_by_target_and_level() {
        let filter = LogFilter::new(Level::WARN);
        let layer = tracing_subscriber::fmt::layer()
            .with_test_writer()
            .with_filter(filter);
        let subscriber = Registry::default().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            assert!(tracing::enabled!(Level::WARN));
            assert!(!tracing::enabled!(Level::INFO));
            assert!(!tracing::enabled!(target: "hyper::proto", Level::ERROR));
            assert!(tracing::enabled!(target: "tower_http::trace::on_response", Level::INFO));
        });
    }
}
