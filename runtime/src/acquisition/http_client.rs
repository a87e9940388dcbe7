// Copyright 2026 Shoplens Contributors
// SPDX-License-Identifier: Apache-2.0

//! Async HTTP client wrapping reqwest.
//!
//! Every call is a single attempt. Retrying is the caller's decision: the
//! catalog feeds are fast-fail, image downloads go through [`crate::retry`].

use std::time::Duration;

use crate::error::FetchError;

/// Desktop Chrome user agent shared with the browser session.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                              AppleWebKit/537.36 (KHTML, like Gecko) \
                              Chrome/131.0.0.0 Safari/537.36";

/// Response from an HTTP GET request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Original requested URL.
    pub url: String,
    /// Final URL after redirects.
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    /// HTTP/1.1-only fallback client for CDNs that reject HTTP/2.
    h1_client: reqwest::Client,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(timeout_ms: u64) -> Self {
        let timeout = Duration::from_millis(timeout_ms);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();

        let h1_client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(USER_AGENT)
            .http1_only()
            .build()
            .unwrap_or_default();

        Self {
            client,
            h1_client,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// GET a URL and return the response whatever its status.
    ///
    /// Falls back to HTTP/1.1 on protocol errors.
    pub async fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        match self.get_inner(&self.client, url).await {
            Err(FetchError::Network { reason, .. })
                if reason.contains("http2")
                    || reason.contains("protocol")
                    || reason.contains("connection closed") =>
            {
                tracing::debug!(url, "retrying over HTTP/1.1");
                self.get_inner(&self.h1_client, url).await
            }
            other => other,
        }
    }

    /// GET a URL and return its body, failing on a non-2xx status.
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let resp = self.get(url).await?;
        if !resp.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: resp.status,
            });
        }
        Ok(resp.body)
    }

    async fn get_inner(&self, client: &reqwest::Client, url: &str) -> Result<HttpResponse, FetchError> {
        let r = client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| classify(url, e))?;

        let status = r.status().as_u16();
        let final_url = r.url().to_string();
        let content_type = r
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = r.bytes().await.map_err(|e| classify(url, e))?.to_vec();

        Ok(HttpResponse {
            url: url.to_string(),
            final_url,
            status,
            content_type,
            body,
        })
    }
}

fn classify(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout(url.to_string())
    } else {
        FetchError::Network {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_get_returns_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = HttpClient::new(5_000);
        let resp = client.get(&format!("{}/missing", server.uri())).await.unwrap();
        assert_eq!(resp.status, 404);
        assert!(!resp.is_success());
    }

    #[tokio::test]
    async fn test_get_bytes_maps_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img.jpg"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = HttpClient::new(5_000);
        let err = client
            .get_bytes(&format!("{}/img.jpg", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 503, .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_slow_response_is_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = HttpClient::new(50);
        let err = client.get_bytes(&server.uri()).await.unwrap_err();
        assert!(matches!(err, FetchError::Timeout(_)));
    }
}
