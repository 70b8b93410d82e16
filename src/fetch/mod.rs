use std::time::Duration;

use bytes::Bytes;
use reqwest::StatusCode;
use tracing::info;
use url::Url;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const NAME: &str = env!("CARGO_PKG_NAME");

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP status {0}")]
    Status(StatusCode),
    #[error("can not append a path to {0}")]
    InvalidUrl(Url),
}

/// Authenticated GET against the Wakatime API.
///
/// The underlying client is shared, so cloning a `Fetcher` is cheap.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    token: String,
}

impl Fetcher {
    pub fn new(token: &str, ssl_verify: bool, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(!ssl_verify)
            .user_agent(format!("{}/{}", NAME, VERSION))
            .build()?;

        Ok(Fetcher {
            client,
            token: token.to_owned(),
        })
    }

    pub async fn get(
        &self,
        base: &Url,
        sub_path: &str,
        params: &[(&str, &str)],
    ) -> Result<Bytes, FetchError> {
        let url = endpoint_url(base, sub_path, params)?;

        info!(path = sub_path, url = %url, "scraping wakatime");

        let resp = self
            .client
            .get(url)
            .basic_auth(&self.token, None::<&str>)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        Ok(resp.bytes().await?)
    }
}

fn endpoint_url(base: &Url, sub_path: &str, params: &[(&str, &str)]) -> Result<Url, FetchError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| FetchError::InvalidUrl(base.clone()))?
        .pop_if_empty()
        .extend(sub_path.split('/').filter(|s| !s.is_empty()));

    if params.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(params);
    }

    Ok(url)
}
