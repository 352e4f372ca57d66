//! `reqwest` implementation of [`AuthTransport`].

use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::{header, Client};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::config::ApiUrls;
use crate::models::grant::{CallbackRequest, RefreshRequest};
use crate::models::{LoginGrant, RefreshGrant};

use super::{ApiError, AuthTransport};

/// HTTP request timeout in seconds.
/// 30s allows for slow auth servers while failing fast enough for good UX.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Client for the callback/refresh/logout endpoints.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    urls: ApiUrls,
}

impl ApiClient {
    /// Create a new client with the default request timeout
    pub fn new(urls: ApiUrls) -> Result<Self, ApiError> {
        Self::with_timeout(urls, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(urls: ApiUrls, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_http_client(client, urls))
    }

    /// Use a custom HTTP client, sharing its connection pool.
    pub fn with_http_client(client: Client, urls: ApiUrls) -> Self {
        Self { client, urls }
    }

    pub fn urls(&self) -> &ApiUrls {
        &self.urls
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            debug!(%status, body = %ApiError::truncate_body(&body), "Auth endpoint rejected request");
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<reqwest::Response, ApiError> {
        let response = self
            .client
            .post(url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(body)
            .send()
            .await?;
        Self::check_response(response).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self.send(url, body).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            debug!(url = url, error = %e, "Failed to parse auth response");
            ApiError::InvalidResponse(e.to_string())
        })
    }
}

impl AuthTransport for ApiClient {
    fn exchange_token<'a>(&'a self, token: &'a str) -> BoxFuture<'a, Result<LoginGrant, ApiError>> {
        async move {
            debug!(url = %self.urls.callback, "Exchanging one-time token");
            self.post(&self.urls.callback, &CallbackRequest { token }).await
        }
        .boxed()
    }

    fn refresh<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, Result<RefreshGrant, ApiError>> {
        async move {
            debug!(url = %self.urls.refresh, "Renewing access token");
            self.post(&self.urls.refresh, &RefreshRequest { refresh_token })
                .await
        }
        .boxed()
    }

    fn logout<'a>(&'a self, refresh_token: &'a str) -> BoxFuture<'a, Result<(), ApiError>> {
        async move {
            debug!(url = %self.urls.logout, "Revoking renewal token");
            self.client
                .post(&self.urls.logout)
                .header(header::CONTENT_TYPE, "application/json")
                .json(&RefreshRequest { refresh_token })
                .send()
                .await?;
            Ok(())
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls() -> ApiUrls {
        ApiUrls {
            callback: "http://127.0.0.1:1/auth/callback".to_string(),
            refresh: "http://127.0.0.1:1/auth/refresh".to_string(),
            logout: "http://127.0.0.1:1/auth/logout".to_string(),
        }
    }

    #[test]
    fn test_client_keeps_urls() {
        let client = ApiClient::new(urls()).expect("client");
        assert_eq!(client.urls().refresh, "http://127.0.0.1:1/auth/refresh");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        let client = ApiClient::with_timeout(urls(), Duration::from_secs(2)).expect("client");
        let err = client.refresh("r").await.expect_err("nothing listens on port 1");
        assert!(matches!(err, ApiError::Network(_)), "got {err:?}");
    }
}
