//! HTTP client for the incidence update feed.

use std::future::Future;
use std::time::Duration;

use incfeed_coord::poller::{FeedClient, FeedError};
use incfeed_core::types::FeedPage;
use reqwest::Client;

const UPDATES_PATH: &str = "/api/incidencias/updates";

pub struct HttpFeedClient {
    client: Client,
    url: String,
    token: Option<String>,
}

impl HttpFeedClient {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: updates_url(base_url),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    async fn get(&self, since: Option<u64>) -> Result<FeedPage, FeedError> {
        let mut request = self.client.get(&self.url);
        if let Some(since) = since {
            request = request.query(&[("since_id", since)]);
        }
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status(status.as_u16()));
        }
        response
            .json::<FeedPage>()
            .await
            .map_err(|e| FeedError::Decode(e.to_string()))
    }
}

impl FeedClient for HttpFeedClient {
    fn fetch(
        &self,
        since: Option<u64>,
    ) -> impl Future<Output = Result<FeedPage, FeedError>> + Send {
        self.get(since)
    }
}

fn updates_url(base_url: &str) -> String {
    format!("{}{UPDATES_PATH}", base_url.trim_end_matches('/'))
}
