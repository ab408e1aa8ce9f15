//! Authenticated HTTP transport to the Instana REST API.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use super::ApiError;

const ENCODING_APPLICATION_JSON: &str = "application/json; charset=utf-8";

/// Retry policy for transient failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Number of retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for a single delay.
    pub max_delay: Duration,
    /// Total time allowed for all attempts of one request.
    pub total_budget: Duration,
}

impl RetryPolicy {
    /// Delay before the given retry attempt (1-indexed), doubling each time.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay
            .saturating_mul(multiplier)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            total_budget: Duration::from_secs(180),
        }
    }
}

/// Transport tuning of the REST client.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Timeout of a single HTTP request.
    pub timeout: Duration,
    /// Retry policy for transient failures.
    pub retry: RetryPolicy,
    /// Minimum spacing between two write requests.
    pub write_interval: Duration,
    /// Value of the `User-Agent` header.
    pub user_agent: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
            write_interval: Duration::from_millis(200),
            user_agent: format!("terraform-provider-instana/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientOptions {
    /// Create options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the minimum spacing between write requests.
    pub fn with_write_interval(mut self, interval: Duration) -> Self {
        self.write_interval = interval;
        self
    }

    /// Set the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Low level client executing JSON requests against the API.
#[derive(Debug)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: Url,
    options: ClientOptions,
    next_write: Mutex<Instant>,
}

impl RestClient {
    /// Create a client for the given tenant.
    ///
    /// An endpoint without scheme is reached over `https://`.
    pub fn new(
        api_token: &str,
        endpoint: &str,
        tls_skip_verify: bool,
        options: ClientOptions,
    ) -> Result<Self, ApiError> {
        let base_url = base_url(endpoint)?;

        let mut token = HeaderValue::from_str(&format!("apiToken {}", api_token))
            .map_err(|_| ApiError::Transport("API token contains invalid characters".into()))?;
        token.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, token);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(options.user_agent.clone())
            .timeout(options.timeout)
            .danger_accept_invalid_certs(tls_skip_verify)
            .build()?;

        Ok(Self {
            http,
            base_url,
            options,
            next_write: Mutex::new(Instant::now()),
        })
    }

    /// The base URL requests are sent to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `GET {path}`
    pub async fn get(&self, path: &str, cancel: &CancellationToken) -> Result<Value, ApiError> {
        let url = self.url(path, None, &[])?;
        self.execute(Method::GET, url, None, cancel).await
    }

    /// `GET {path}?{query}`
    pub async fn get_by_query(
        &self,
        path: &str,
        query: &[(&str, String)],
        cancel: &CancellationToken,
    ) -> Result<Value, ApiError> {
        let url = self.url(path, None, query)?;
        self.execute(Method::GET, url, None, cancel).await
    }

    /// `GET {path}/{id}`
    pub async fn get_one(
        &self,
        path: &str,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Value, ApiError> {
        let url = self.url(path, Some(id), &[])?;
        self.execute(Method::GET, url, None, cancel).await
    }

    /// `POST {path}` with a JSON body.
    pub async fn post(
        &self,
        path: &str,
        body: &Value,
        cancel: &CancellationToken,
    ) -> Result<Value, ApiError> {
        let url = self.url(path, None, &[])?;
        self.throttled(Method::POST, url, Some(body), cancel).await
    }

    /// `POST {path}/{id}` with a JSON body.
    pub async fn post_with_id(
        &self,
        path: &str,
        id: &str,
        body: &Value,
        cancel: &CancellationToken,
    ) -> Result<Value, ApiError> {
        let url = self.url(path, Some(id), &[])?;
        self.throttled(Method::POST, url, Some(body), cancel).await
    }

    /// `PUT {path}/{id}` with a JSON body.
    pub async fn put(
        &self,
        path: &str,
        id: &str,
        body: &Value,
        cancel: &CancellationToken,
    ) -> Result<Value, ApiError> {
        let url = self.url(path, Some(id), &[])?;
        self.throttled(Method::PUT, url, Some(body), cancel).await
    }

    /// `DELETE {path}/{id}`
    pub async fn delete(
        &self,
        path: &str,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ApiError> {
        let url = self.url(path, Some(id), &[])?;
        self.throttled(Method::DELETE, url, None, cancel).await?;
        Ok(())
    }

    /// `POST {path}?{query}` without body.
    pub async fn post_by_query(
        &self,
        path: &str,
        query: &[(&str, String)],
        cancel: &CancellationToken,
    ) -> Result<Value, ApiError> {
        let url = self.url(path, None, query)?;
        self.throttled(Method::POST, url, None, cancel).await
    }

    /// `PUT {path}/{id}?{query}` without body.
    pub async fn put_by_query(
        &self,
        path: &str,
        id: &str,
        query: &[(&str, String)],
        cancel: &CancellationToken,
    ) -> Result<Value, ApiError> {
        let url = self.url(path, Some(id), query)?;
        self.throttled(Method::PUT, url, None, cancel).await
    }

    /// Collect all items of a paginated `{items, totalHits}` endpoint.
    pub async fn get_paged(
        &self,
        path: &str,
        query: &[(&str, String)],
        page_size: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<Value>, ApiError> {
        let mut items = Vec::new();
        let mut page = 1usize;
        loop {
            let mut page_query: Vec<(&str, String)> = query.to_vec();
            page_query.push(("page", page.to_string()));
            page_query.push(("pageSize", page_size.to_string()));
            let response = self.get_by_query(path, &page_query, cancel).await?;

            let page_items = match response.get("items") {
                Some(Value::Array(values)) => values.clone(),
                Some(Value::Null) | None => Vec::new(),
                Some(_) => return Err(ApiError::Decode(format!("{}: items is not an array", path))),
            };
            let total_hits = response
                .get("totalHits")
                .and_then(Value::as_u64)
                .map(|n| n as usize);

            if page_items.is_empty() {
                break;
            }
            items.extend(page_items);
            match total_hits {
                Some(total) if items.len() >= total => break,
                None => break,
                _ => page += 1,
            }
        }
        Ok(items)
    }

    fn url(&self, path: &str, id: Option<&str>, query: &[(&str, String)]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ApiError::Transport(format!("invalid base URL {}", self.base_url)))?;
            segments.pop_if_empty();
            segments.extend(path.split('/').filter(|s| !s.is_empty()));
            if let Some(id) = id {
                segments.push(id);
            }
        }
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }

    async fn throttled(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
        cancel: &CancellationToken,
    ) -> Result<Value, ApiError> {
        let slot = {
            let mut next = self.next_write.lock().await;
            let now = Instant::now();
            let slot = if *next > now { *next } else { now };
            *next = slot + self.options.write_interval;
            slot
        };
        tokio::select! {
            _ = cancel.cancelled() => return Err(ApiError::Cancelled),
            _ = tokio::time::sleep_until(slot) => {},
        }
        self.execute(method, url, body, cancel).await
    }

    async fn execute(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
        cancel: &CancellationToken,
    ) -> Result<Value, ApiError> {
        let policy = &self.options.retry;
        let deadline = Instant::now() + policy.total_budget;
        let mut attempt = 0u32;
        loop {
            if cancel.is_cancelled() {
                return Err(ApiError::Cancelled);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            let result = tokio::select! {
                _ = cancel.cancelled() => Err(ApiError::Cancelled),
                outcome = tokio::time::timeout(remaining, self.send(method.clone(), &url, body)) => {
                    outcome.unwrap_or_else(|_| {
                        Err(ApiError::Transport(format!(
                            "{} {} exceeded the total time budget of {:?}",
                            method, url.path(), policy.total_budget
                        )))
                    })
                }
            };

            match result {
                Err(err) if err.is_retryable() && attempt < policy.max_retries => {
                    attempt += 1;
                    let delay = policy.delay_for_attempt(attempt);
                    if Instant::now() + delay >= deadline {
                        return Err(err);
                    }
                    warn!(
                        method = %method,
                        path = %url.path(),
                        attempt = attempt,
                        delay = ?delay,
                        error = %err,
                        "Retrying Instana API request"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(ApiError::Cancelled),
                        _ = tokio::time::sleep(delay) => {},
                    }
                },
                other => return other,
            }
        }
    }

    async fn send(&self, method: Method, url: &Url, body: Option<&Value>) -> Result<Value, ApiError> {
        debug!(method = %method, url = %url, "Calling Instana API");
        let mut request = self.http.request(method.clone(), url.clone());
        if let Some(body) = body {
            request = request
                .header(CONTENT_TYPE, ENCODING_APPLICATION_JSON)
                .body(serde_json::to_vec(body)?);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        debug!(method = %method, path = %url.path(), status = status.as_u16(), "Instana API responded");

        if !status.is_success() {
            return Err(ApiError::from_status(status.as_u16(), url.path(), text));
        }
        if text.trim().is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }
        serde_json::from_str(&text).map_err(|e| ApiError::Decode(format!("{}: {}", url.path(), e)))
    }
}

fn base_url(endpoint: &str) -> Result<Url, ApiError> {
    let endpoint = endpoint.trim().trim_end_matches('/');
    let raw = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("https://{}", endpoint)
    };
    Url::parse(&raw).map_err(|e| ApiError::Transport(format!("invalid endpoint '{}': {}", endpoint, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_for_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(2000));
        assert_eq!(policy.delay_for_attempt(6), Duration::from_secs(8));
        assert_eq!(policy.delay_for_attempt(40), Duration::from_secs(8));
    }

    #[test]
    fn test_base_url() {
        assert_eq!(
            base_url("tenant.instana.io").unwrap().as_str(),
            "https://tenant.instana.io/"
        );
        assert_eq!(
            base_url("http://localhost:8080/").unwrap().as_str(),
            "http://localhost:8080/"
        );
        assert!(base_url("http://").is_err());
    }

    #[test]
    fn test_url_building() {
        let client =
            RestClient::new("token", "tenant.instana.io", false, ClientOptions::default()).unwrap();
        let url = client
            .url("/api/events/settings/alertingChannels", Some("a b"), &[])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://tenant.instana.io/api/events/settings/alertingChannels/a%20b"
        );

        let url = client
            .url("/api/website-monitoring/config", None, &[("name", "my site".to_string())])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://tenant.instana.io/api/website-monitoring/config?name=my+site"
        );
    }

    #[test]
    fn test_default_options() {
        let options = ClientOptions::default();
        assert_eq!(options.timeout, Duration::from_secs(60));
        assert_eq!(options.write_interval, Duration::from_millis(200));
        assert!(options.user_agent.starts_with("terraform-provider-instana/"));
    }
}
