//! The external data store seam.
//!
//! The settings table holds one row per user and only supports whole-column
//! reads and writes of `settings`; path addressing is layered on top by
//! `NestedSettingsStore`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::document::SettingsDocument;
use crate::error::Result;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch the user's row, `Ok(None)` if there is none.
    async fn find_by_user(&self, user_id: &str) -> Result<Option<SettingsDocument>>;

    /// Create the user's row.
    async fn insert(
        &self,
        user_id: &str,
        settings: Value,
        now: DateTime<Utc>,
    ) -> Result<SettingsDocument>;

    /// Overwrite the user's `settings` column and stamp `updated_at`.
    async fn update(
        &self,
        user_id: &str,
        settings: Value,
        now: DateTime<Utc>,
    ) -> Result<SettingsDocument>;
}

#[async_trait]
impl<T: DocumentStore + ?Sized> DocumentStore for Arc<T> {
    async fn find_by_user(&self, user_id: &str) -> Result<Option<SettingsDocument>> {
        self.as_ref().find_by_user(user_id).await
    }

    async fn insert(
        &self,
        user_id: &str,
        settings: Value,
        now: DateTime<Utc>,
    ) -> Result<SettingsDocument> {
        self.as_ref().insert(user_id, settings, now).await
    }

    async fn update(
        &self,
        user_id: &str,
        settings: Value,
        now: DateTime<Utc>,
    ) -> Result<SettingsDocument> {
        self.as_ref().update(user_id, settings, now).await
    }
}
