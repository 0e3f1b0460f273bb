//! In-memory settings table.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::document::SettingsDocument;
use crate::error::{Result, SettingsError};
use crate::store::DocumentStore;

/// A settings table kept in process memory, keyed by user.
///
/// Enforces the same one-row-per-user constraint as the hosted table.
///
/// # Example
///
/// ```rust
/// use tally_settings::{InMemoryDocumentStore, NestedSettingsStore};
/// use serde_json::json;
///
/// # let runtime = tokio::runtime::Runtime::new().unwrap();
/// # runtime.block_on(async {
/// let settings = NestedSettingsStore::new(InMemoryDocumentStore::new());
/// settings.replace_all("user-1", json!({"theme": "dark"})).await.unwrap();
/// assert_eq!(settings.get_all("user-1").await.unwrap(), json!({"theme": "dark"}));
/// # });
/// ```
#[derive(Default)]
pub struct InMemoryDocumentStore {
    rows: Mutex<BTreeMap<String, SettingsDocument>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with rows already present.
    pub fn with_documents(documents: impl IntoIterator<Item = SettingsDocument>) -> Self {
        let rows = documents
            .into_iter()
            .map(|doc| (doc.user_id.clone(), doc))
            .collect();
        Self {
            rows: Mutex::new(rows),
        }
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn find_by_user(&self, user_id: &str) -> Result<Option<SettingsDocument>> {
        Ok(self.rows.lock().await.get(user_id).cloned())
    }

    async fn insert(
        &self,
        user_id: &str,
        settings: Value,
        now: DateTime<Utc>,
    ) -> Result<SettingsDocument> {
        let mut rows = self.rows.lock().await;
        if rows.contains_key(user_id) {
            return Err(SettingsError::Store(format!(
                "duplicate key value violates unique constraint on user_id ({})",
                user_id
            )));
        }
        let mut doc = SettingsDocument::new(user_id, settings, now);
        doc.id = Some(uuid::Uuid::new_v4().to_string());
        rows.insert(user_id.to_string(), doc.clone());
        Ok(doc)
    }

    async fn update(
        &self,
        user_id: &str,
        settings: Value,
        now: DateTime<Utc>,
    ) -> Result<SettingsDocument> {
        let mut rows = self.rows.lock().await;
        let doc = rows.get_mut(user_id).ok_or_else(|| SettingsError::NotFound {
            user_id: user_id.to_string(),
        })?;
        doc.settings = settings;
        doc.updated_at = Some(now);
        Ok(doc.clone())
    }
}
