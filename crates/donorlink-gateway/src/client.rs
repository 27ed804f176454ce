//! Shared HTTP plumbing.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use donorlink_core::config::ApiConfig;
use donorlink_core::error::AppError;
use donorlink_entity::session::Session;

use crate::error::{Resource, http_error, status_error};

/// REST gateway to the DonorLink backend.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
    user_id_header: String,
}

impl HttpGateway {
    /// Build a gateway from configuration.
    pub fn new(config: &ApiConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .build()
            .map_err(http_error)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            user_id_header: config.user_id_header.clone(),
        })
    }

    /// Absolute URL for an API path.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Start an authenticated request.
    pub(crate) fn request(&self, method: Method, path: &str, session: &Session) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header(reqwest::header::AUTHORIZATION, session.credential.bearer())
            .header(self.user_id_header.as_str(), session.user_id.to_string())
    }

    /// Send a request and return the response if it succeeded.
    pub(crate) async fn send(
        &self,
        request: RequestBuilder,
        resource: Resource,
    ) -> Result<Response, AppError> {
        let response = request.send().await.map_err(http_error)?;
        let status = response.status();
        debug!(status = status.as_u16(), url = %response.url(), "HTTP response");
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let err = status_error(status.as_u16(), &body, resource);
        warn!(status = status.as_u16(), kind = %err.kind, code = ?err.code, "Request refused");
        Err(err)
    }

    /// Send a request and decode its JSON body.
    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        resource: Resource,
    ) -> Result<T, AppError> {
        let response = self.send(request, resource).await?;
        response.json::<T>().await.map_err(http_error)
    }

    /// Send a request whose response body is irrelevant.
    pub(crate) async fn send_unit(
        &self,
        request: RequestBuilder,
        resource: Resource,
    ) -> Result<(), AppError> {
        self.send(request, resource).await.map(drop)
    }
}
