//! Transport abstraction.
//!
//! `HttpTransport` performs exactly one attempt and classifies its failure.
//! Timeouts, retries and cancellation live one layer up in `SafeFetch`, so
//! transports never retry on their own.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;

use crate::error::FetchError;
use crate::types::{HttpRequest, HttpResponse};

/// Sends a single request.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, FetchError>;
}

#[async_trait]
impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, FetchError> {
        self.as_ref().send(request).await
    }
}

#[async_trait]
impl<T: HttpTransport + ?Sized> HttpTransport for Box<T> {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, FetchError> {
        self.as_ref().send(request).await
    }
}

/// Production transport using reqwest.
///
/// The client carries no timeout of its own; the per-attempt budget is
/// enforced by `SafeFetch`.
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

fn classify(error: reqwest::Error) -> FetchError {
    if error.is_builder() {
        FetchError::InvalidRequest {
            message: error.to_string(),
        }
    } else if error.is_connect() || error.is_request() || error.is_body() {
        FetchError::Network(error.to_string())
    } else {
        FetchError::Other(error.to_string())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, FetchError> {
        let url = url::Url::parse(&request.url)?;

        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            headers.insert(
                HeaderName::try_from(name.as_str())?,
                HeaderValue::try_from(value.as_str())?,
            );
        }

        let mut builder = self
            .client
            .request(request.method.into(), url)
            .headers(headers);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(classify)?;

        let status = response.status().as_u16();
        let mut resp_headers = BTreeMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                resp_headers.insert(name.to_string(), v.to_string());
            }
        }

        let body_text = response.text().await.map_err(classify)?;
        let body = serde_json::from_str(&body_text).unwrap_or(serde_json::Value::Null);

        Ok(HttpResponse {
            status,
            headers: resp_headers,
            body,
            body_text: Some(body_text),
        })
    }
}
