use std::time::Duration;

use anyhow::{Context, Result};
use rand::Rng;
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument, warn};

use crate::config::FetchConfig;
use crate::models::ReviewsPage;

const DEFAULT_BASE_URL: &str = "https://store.steampowered.com";

/// Query options applied to every page of a fetch session
#[derive(Debug, Clone)]
pub struct ReviewQuery {
    pub language: String,
    /// Feed ordering, "recent" or "updated"
    pub filter: String,
    /// 1 suppresses reviews from detected review-bomb periods
    pub filter_offtopic_activity: u8,
}

impl Default for ReviewQuery {
    fn default() -> Self {
        Self {
            language: "english".to_string(),
            filter: "recent".to_string(),
            filter_offtopic_activity: 1,
        }
    }
}

/// Client for the storefront appreviews endpoint
pub struct SteamClient {
    client: Client,
    base_url: String,
    config: FetchConfig,
}

impl SteamClient {
    /// Create a new client with the given fetch tuning
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            config,
        })
    }

    /// Point the client at a different host (tests use a local mock server)
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetch one page of reviews, retrying transient failures.
    ///
    /// Network errors, HTTP 429, other non-success statuses, and an envelope
    /// reporting `success != 1` are all retried with capped exponential
    /// backoff. Exhausting the attempt budget fails the whole session.
    #[instrument(skip(self, query))]
    pub async fn fetch_page(
        &self,
        appid: u32,
        cursor: &str,
        query: &ReviewQuery,
    ) -> Result<ReviewsPage> {
        let url = format!("{}/appreviews/{}", self.base_url, appid);

        for attempt in 0..self.config.max_retries {
            match self.try_fetch(&url, cursor, query).await {
                Ok(page) => {
                    debug!(reviews = page.reviews.len(), "Fetched page");
                    return Ok(page);
                }
                Err(err) => {
                    warn!(attempt, error = %err, "Page request failed, backing off");
                    tokio::time::sleep(self.backoff_delay(attempt)).await;
                }
            }
        }

        anyhow::bail!(
            "Failed to fetch page after {} attempts",
            self.config.max_retries
        )
    }

    async fn try_fetch(&self, url: &str, cursor: &str, query: &ReviewQuery) -> Result<ReviewsPage> {
        let offtopic = query.filter_offtopic_activity.to_string();
        let page_size = self.config.page_size.to_string();
        let params = [
            ("json", "1"),
            ("filter", query.filter.as_str()),
            ("language", query.language.as_str()),
            ("review_type", "all"),
            ("purchase_type", "all"),
            ("filter_offtopic_activity", offtopic.as_str()),
            ("num_per_page", page_size.as_str()),
            ("cursor", cursor),
        ];

        let response = self
            .client
            .get(url)
            .query(&params)
            .send()
            .await
            .context("Failed to send page request")?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            anyhow::bail!("Rate limited by the source (HTTP 429)");
        }

        let response = response
            .error_for_status()
            .context("Page request returned an error status")?;

        let page: ReviewsPage = response
            .json()
            .await
            .context("Failed to parse page envelope")?;

        if !page.is_success() {
            anyhow::bail!("Source envelope reported success={}", page.success);
        }

        Ok(page)
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self
            .config
            .backoff_base_ms
            .saturating_mul(1u64 << attempt.min(20));
        let jitter = rand::thread_rng().gen_range(0..=self.config.backoff_jitter_ms);
        Duration::from_millis(base.saturating_add(jitter).min(self.config.backoff_cap_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_config() -> FetchConfig {
        FetchConfig {
            max_retries: 3,
            backoff_base_ms: 1,
            backoff_cap_ms: 5,
            backoff_jitter_ms: 1,
            page_size: 100,
            page_delay_ms: 0,
            request_timeout_secs: 5,
        }
    }

    fn client_for(server: &MockServer) -> SteamClient {
        SteamClient::new(fast_config())
            .unwrap()
            .with_base_url(&server.uri())
    }

    fn page_body(count: usize, cursor: &str) -> serde_json::Value {
        let reviews: Vec<_> = (0..count)
            .map(|i| json!({"recommendationid": i.to_string(), "review": "fine", "voted_up": true}))
            .collect();
        json!({"success": 1, "reviews": reviews, "cursor": cursor})
    }

    #[tokio::test]
    async fn test_fetch_page_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/appreviews/42"))
            .and(query_param("cursor", "*"))
            .and(query_param("num_per_page", "100"))
            .and(query_param("filter_offtopic_activity", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(2, "next")))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let page = client
            .fetch_page(42, "*", &ReviewQuery::default())
            .await
            .unwrap();

        assert_eq!(page.reviews.len(), 2);
        assert_eq!(page.cursor, "next");
    }

    #[tokio::test]
    async fn test_retries_on_429_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/appreviews/42"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/appreviews/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(1, "")))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let page = client
            .fetch_page(42, "*", &ReviewQuery::default())
            .await
            .unwrap();

        assert_eq!(page.reviews.len(), 1);
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_retries_on_envelope_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/appreviews/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": 2})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/appreviews/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(1, "")))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let page = client
            .fetch_page(42, "*", &ReviewQuery::default())
            .await
            .unwrap();

        assert!(page.is_success());
    }

    #[tokio::test]
    async fn test_retry_exhaustion_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/appreviews/42"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .fetch_page(42, "*", &ReviewQuery::default())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("after 3 attempts"));
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[test]
    fn test_backoff_delay_is_capped() {
        let client = SteamClient::new(fast_config()).unwrap();
        for attempt in 0..10 {
            assert!(client.backoff_delay(attempt) <= Duration::from_millis(5));
        }
    }

    #[test]
    fn test_backoff_delay_grows() {
        let config = FetchConfig {
            backoff_base_ms: 100,
            backoff_jitter_ms: 0,
            backoff_cap_ms: 60_000,
            ..fast_config()
        };
        let client = SteamClient::new(config).unwrap();
        assert_eq!(client.backoff_delay(0), Duration::from_millis(100));
        assert_eq!(client.backoff_delay(1), Duration::from_millis(200));
        assert_eq!(client.backoff_delay(3), Duration::from_millis(800));
    }
}
