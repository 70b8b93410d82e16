use std::net::SocketAddr;
use std::time::Duration;

use clap::{ArgAction, Parser};
use tracing::Level;
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("an API key is required")]
    MissingToken,
    #[error("invalid scrape URI {uri:?}: {reason}")]
    InvalidUri { uri: String, reason: String },
    #[error("invalid listen address {0:?}")]
    InvalidListenAddress(String),
    #[error("invalid duration {0:?}, expected e.g. 500ms, 5s or 1m")]
    InvalidDuration(String),
    #[error("invalid metrics path {0:?}")]
    InvalidMetricsPath(String),
}

#[derive(Debug, Parser)]
#[command(name = "wakatime_exporter", version, about = "Prometheus exporter for Wakatime")]
pub struct Opts {
    /// Address to listen on for web interface and metrics.
    #[arg(long = "web.listen-address", env = "WAKA_LISTEN_ADDRESS", default_value = ":9212")]
    pub listen_address: String,

    /// Path under which to expose metrics.
    #[arg(long = "web.metrics-path", env = "WAKA_METRICS_PATH", default_value = "/metrics")]
    pub metrics_path: String,

    /// Exclude metrics about the exporter itself.
    #[arg(long = "web.disable-exporter-metrics", env = "WAKA_DISABLE_EXPORTER_METRICS")]
    pub disable_exporter_metrics: bool,

    /// Base path to query for Wakatime data.
    #[arg(
        long = "wakatime.scrape-uri",
        env = "WAKA_SCRAPE_URI",
        default_value = "https://wakatime.com/api/v1"
    )]
    pub scrape_uri: String,

    /// User to query for Wakatime data.
    #[arg(long = "wakatime.user", env = "WAKA_USER", default_value = "current")]
    pub user: String,

    /// Token to use when getting stats from Wakatime.
    #[arg(long = "wakatime.api-key", env = "WAKA_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Timeout for trying to get stats from Wakatime.
    #[arg(
        long = "wakatime.timeout",
        env = "WAKA_TIMEOUT",
        default_value = "5s",
        value_parser = parse_duration
    )]
    pub timeout: Duration,

    /// Verify the TLS certificate of the scrape URI.
    #[arg(
        long = "wakatime.ssl-verify",
        env = "WAKA_SSL_VERIFY",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub ssl_verify: bool,

    /// Set all collectors to disabled by default.
    #[arg(long = "collector.disable-defaults", env = "WAKA_DISABLE_DEFAULT_COLLECTORS")]
    pub disable_default_collectors: bool,

    /// Only log messages with the given severity or above.
    #[arg(long = "log.level", env = "WAKA_LOG_LEVEL", default_value = "info")]
    pub log_level: Level,
}

impl Opts {
    pub fn common_inputs(&self) -> Result<CommonInputs, ConfigError> {
        CommonInputs::new(
            &self.scrape_uri,
            &self.user,
            &self.api_key,
            self.ssl_verify,
            self.timeout,
        )
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        parse_listen_address(&self.listen_address)
    }

    /// The metrics path must not shadow the landing page or health check.
    pub fn metrics_path(&self) -> Result<&str, ConfigError> {
        match self.metrics_path.as_str() {
            p if !p.starts_with('/') || p == "/" || p == "/healthz" => {
                Err(ConfigError::InvalidMetricsPath(p.to_owned()))
            }
            p => Ok(p),
        }
    }
}

/// Settings shared by every collector, fixed at startup.
#[derive(Debug, Clone)]
pub struct CommonInputs {
    pub base_url: Url,
    pub user_url: Url,
    pub token: String,
    pub ssl_verify: bool,
    pub timeout: Duration,
}

impl CommonInputs {
    pub fn new(
        scrape_uri: &str,
        user: &str,
        token: &str,
        ssl_verify: bool,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        if token.trim().is_empty() {
            return Err(ConfigError::MissingToken);
        }

        let invalid = |reason: String| ConfigError::InvalidUri {
            uri: scrape_uri.to_owned(),
            reason,
        };
        let base_url = Url::parse(scrape_uri).map_err(|e| invalid(e.to_string()))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme {}", base_url.scheme())));
        }
        let user_url = user_path(&base_url, user).ok_or_else(|| invalid("not a base URL".into()))?;

        Ok(CommonInputs {
            base_url,
            user_url,
            token: token.to_owned(),
            ssl_verify,
            timeout,
        })
    }
}

fn user_path(base: &Url, user: &str) -> Option<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .ok()?
        .pop_if_empty()
        .push("users")
        .push(user);
    Some(url)
}

/// Accepts `host:port` as well as `:port`, which binds every interface.
pub fn parse_listen_address(addr: &str) -> Result<SocketAddr, ConfigError> {
    let full = match addr.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{}", port),
        None => addr.to_owned(),
    };
    full.parse()
        .map_err(|_| ConfigError::InvalidListenAddress(addr.to_owned()))
}

pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidDuration(s.to_owned());
    let s = s.trim();
    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .ok_or_else(invalid)?;
    let (value, unit) = s.split_at(split);
    let value: f64 = value.parse().map_err(|_| invalid())?;

    let secs = match unit {
        "ms" => value / 1000.0,
        "s" => value,
        "m" => value * 60.0,
        "h" => value * 3600.0,
        _ => return Err(invalid()),
    };
    Duration::try_from_secs_f64(secs).map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = Opts::try_parse_from(["wakatime_exporter", "--wakatime.api-key", "k"]).unwrap();
        assert_eq!(opts.metrics_path().unwrap(), "/metrics");
        assert_eq!(opts.timeout, Duration::from_secs(5));
        assert!(opts.ssl_verify);
        assert!(!opts.disable_default_collectors);
        assert!(!opts.disable_exporter_metrics);
        assert_eq!(opts.socket_addr().unwrap(), "0.0.0.0:9212".parse().unwrap());

        let inputs = opts.common_inputs().unwrap();
        assert_eq!(inputs.base_url.as_str(), "https://wakatime.com/api/v1");
        assert_eq!(inputs.user_url.as_str(), "https://wakatime.com/api/v1/users/current");
    }

    #[test]
    fn test_metrics_path_must_not_shadow_other_routes() {
        for path in ["/", "/healthz", "metrics"] {
            let opts = Opts::try_parse_from([
                "wakatime_exporter",
                "--wakatime.api-key",
                "k",
                "--web.metrics-path",
                path,
            ])
            .unwrap();
            assert!(matches!(
                opts.metrics_path(),
                Err(ConfigError::InvalidMetricsPath(_))
            ));
        }
    }

    #[test]
    fn test_ssl_verify_can_be_disabled() {
        let opts = Opts::try_parse_from([
            "wakatime_exporter",
            "--wakatime.api-key",
            "k",
            "--wakatime.ssl-verify",
            "false",
        ])
        .unwrap();
        assert!(!opts.ssl_verify);
    }

    #[test]
    fn test_invalid_inputs() {
        let timeout = Duration::from_secs(1);
        assert!(matches!(
            CommonInputs::new("https://wakatime.com/api/v1", "current", " ", true, timeout),
            Err(ConfigError::MissingToken)
        ));
        assert!(matches!(
            CommonInputs::new("wakatime.com", "current", "k", true, timeout),
            Err(ConfigError::InvalidUri { .. })
        ));
        assert!(matches!(
            CommonInputs::new("ftp://wakatime.com", "current", "k", true, timeout),
            Err(ConfigError::InvalidUri { .. })
        ));
    }

    #[test]
    fn test_user_path_with_trailing_slash() {
        let inputs =
            CommonInputs::new("http://localhost/api/v1/", "bob", "k", true, Duration::ZERO).unwrap();
        assert_eq!(inputs.user_url.as_str(), "http://localhost/api/v1/users/bob");
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("1.5m").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
        assert!(parse_duration("5").is_err());
        assert!(parse_duration("s").is_err());
        assert!(parse_duration("5d").is_err());
    }

    #[test]
    fn test_parse_listen_address() {
        assert_eq!(
            parse_listen_address("127.0.0.1:8080").unwrap(),
            "127.0.0.1:8080".parse().unwrap()
        );
        assert!(parse_listen_address("localhost").is_err());
    }
}
