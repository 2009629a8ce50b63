//! HTTP transport boundary.
//!
//! The protocol client only sees the [`Transport`] trait; the production
//! implementation wraps `reqwest` with the fixed request timeout. Network
//! failures and timeouts surface as `BillingError::Transport` — never as
//! an empty response.

use crate::config::ApiConfig;
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use vending_types::{BillingError, BillingResult};

/// Content type of the binary protocol bodies.
pub const CONTENT_TYPE_PROTOBUF: &str = "application/x-protobuf";
/// Content type of form-encoded operations.
pub const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded; charset=UTF-8";
/// Content type of the password-proof exchange.
pub const CONTENT_TYPE_JSON: &str = "application/json; charset=utf-8";

/// Raw response from the transport.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Blocking-per-task HTTP boundary consumed by the protocol client.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: Vec<u8>,
        content_type: &str,
    ) -> BillingResult<HttpResponse>;

    async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
        query: &[(String, String)],
    ) -> BillingResult<HttpResponse>;
}

/// Production transport backed by `reqwest`.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &ApiConfig) -> BillingResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| BillingError::transport(format!("client init failed: {}", e)))?;
        Ok(Self { client })
    }

    fn apply_headers(
        mut builder: reqwest::RequestBuilder,
        headers: &[(String, String)],
    ) -> reqwest::RequestBuilder {
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        builder
    }

    async fn execute(&self, request: reqwest::RequestBuilder) -> BillingResult<HttpResponse> {
        let response = request
            .send()
            .await
            .map_err(|e| BillingError::transport(format!("request failed: {}", e)))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| BillingError::transport(format!("body read failed: {}", e)))?;
        Ok(HttpResponse { status, body })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: Vec<u8>,
        content_type: &str,
    ) -> BillingResult<HttpResponse> {
        let builder = Self::apply_headers(self.client.post(url), headers)
            .header("Content-Type", content_type)
            .body(body);
        self.execute(builder).await
    }

    async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
        query: &[(String, String)],
    ) -> BillingResult<HttpResponse> {
        let builder = Self::apply_headers(self.client.get(url).query(query), headers);
        self.execute(builder).await
    }
}
