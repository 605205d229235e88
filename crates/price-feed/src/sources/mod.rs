//! HTTP price sources for the polling feeds

pub mod extended;
pub mod hermes;

pub use extended::ExtendedSource;
pub use hermes::HermesSource;

use reqwest::Client;
use serde::de::DeserializeOwned;

use feedbench_core::{FeedError, FeedResult, PollingFeedConfig, SourceId};

const USER_AGENT: &str = concat!("feedbench/", env!("CARGO_PKG_VERSION"));

/// Build a client with the configured request timeout
pub fn http_client(config: &PollingFeedConfig) -> FeedResult<Client> {
    Client::builder()
        .timeout(config.request_timeout())
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| FeedError::Runtime(format!("Failed to create HTTP client: {}", e)))
}

/// GET `url` and decode the JSON body
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &Client,
    feed: SourceId,
    url: &str,
    query: &[(&str, String)],
) -> FeedResult<T> {
    let response = client
        .get(url)
        .query(query)
        .send()
        .await
        .map_err(|e| FeedError::FetchFailed {
            feed,
            reason: e.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(FeedError::HttpStatus {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    response
        .json::<T>()
        .await
        .map_err(|e| FeedError::InvalidMessage(e.to_string()))
}
