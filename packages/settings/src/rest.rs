//! Settings table behind a PostgREST-style HTTP endpoint.
//!
//! ```text
//! find_by_user   GET   {url}/rest/v1/{table}?user_id=eq.{id}&select=*&limit=1
//! insert         POST  {url}/rest/v1/{table}                       -> [row]
//! update         PATCH {url}/rest/v1/{table}?user_id=eq.{id}       -> [row]
//! ```
//!
//! Writes ask for `Prefer: return=representation` so the stored row comes
//! back in the response. Every call goes through `SafeFetch`, which owns
//! timeouts and transport-level retries; this layer never retries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use url::Url;

use tally_fetch::{ConfigError, HttpRequest, HttpTransport, Method, SafeFetch};

use crate::config::RestStoreConfig;
use crate::document::SettingsDocument;
use crate::error::{Result, SettingsError};
use crate::store::DocumentStore;

pub struct RestDocumentStore<T> {
    fetch: SafeFetch<T>,
    config: RestStoreConfig,
    endpoint: Url,
}

impl<T: HttpTransport> RestDocumentStore<T> {
    pub fn new(fetch: SafeFetch<T>, config: RestStoreConfig) -> std::result::Result<Self, ConfigError> {
        let invalid = |message: String| ConfigError::Invalid {
            name: crate::config::ENV_URL,
            value: config.url.clone(),
            message,
        };

        let mut base = Url::parse(&config.url).map_err(|e| invalid(e.to_string()))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base
            .join(&format!("rest/v1/{}", config.table))
            .map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            fetch,
            config,
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn fetch(&self) -> &SafeFetch<T> {
        &self.fetch
    }

    fn request(&self, method: Method) -> HttpRequest {
        HttpRequest::new(method, self.endpoint.as_str())
            .with_header("apikey", self.config.api_key.as_str())
            .with_header("Authorization", format!("Bearer {}", self.config.bearer()))
            .with_header("Accept", "application/json")
    }

    fn for_user(&self, method: Method, user_id: &str) -> HttpRequest {
        self.request(method)
            .with_query("user_id", format!("eq.{}", user_id))
    }

    async fn rows(&self, request: HttpRequest) -> Result<Vec<SettingsDocument>> {
        let response = self.fetch.fetch(&request).await?;
        if !response.is_success() {
            tracing::warn!(
                table = %self.config.table,
                status = response.status,
                "settings store rejected request"
            );
            return Err(SettingsError::Store(response.error_message()));
        }
        Ok(response.parse()?)
    }
}

#[async_trait]
impl<T: HttpTransport> DocumentStore for RestDocumentStore<T> {
    async fn find_by_user(&self, user_id: &str) -> Result<Option<SettingsDocument>> {
        let request = self
            .for_user(Method::GET, user_id)
            .with_query("select", "*")
            .with_query("limit", "1");
        Ok(self.rows(request).await?.into_iter().next())
    }

    async fn insert(
        &self,
        user_id: &str,
        settings: Value,
        now: DateTime<Utc>,
    ) -> Result<SettingsDocument> {
        let request = self
            .request(Method::POST)
            .with_header("Prefer", "return=representation")
            .with_json_body(json!({
                "user_id": user_id,
                "settings": settings,
                "created_at": now,
                "updated_at": now,
            }));
        self.rows(request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SettingsError::Store("insert returned no row".to_string()))
    }

    async fn update(
        &self,
        user_id: &str,
        settings: Value,
        now: DateTime<Utc>,
    ) -> Result<SettingsDocument> {
        let request = self
            .for_user(Method::PATCH, user_id)
            .with_header("Prefer", "return=representation")
            .with_json_body(json!({
                "settings": settings,
                "updated_at": now,
            }));
        self.rows(request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SettingsError::NotFound {
                user_id: user_id.to_string(),
            })
    }
}
