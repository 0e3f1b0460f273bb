//! Path-addressable access to a user's settings document.
//!
//! The backing table only reads and writes the `settings` column whole, so
//! every path update is a read-modify-write round trip:
//!
//! 1. read the full document,
//! 2. change a private copy at the addressed path,
//! 3. write the copy back with [`NestedSettingsStore::replace_all`].
//!
//! There is no version check between steps 1 and 3. Two concurrent
//! `update_by_path` calls for the same user can interleave so that the later
//! write is based on a snapshot taken before the earlier one committed, and
//! the earlier change is lost. Callers that need ordering must serialize their
//! own writes.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::document::SettingsDocument;
use crate::error::{Result, SettingsError};
use crate::path::{self, type_name, SettingsPath};
use crate::store::DocumentStore;

pub struct NestedSettingsStore<S> {
    store: S,
}

impl<S: DocumentStore> NestedSettingsStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The user's full settings tree.
    ///
    /// Fails with `NotFound` when the user has no row yet; whether that means
    /// "create defaults" is the caller's decision (see [`Self::get_or_init`]).
    pub async fn get_all(&self, user_id: &str) -> Result<Value> {
        self.load(user_id).await.map(|doc| doc.settings)
    }

    /// The value at `path`, or `PathNotFound` if any key along it is missing
    /// or passes through a non-object.
    pub async fn get_by_path(&self, user_id: &str, path: &SettingsPath) -> Result<Value> {
        let settings = self.get_all(user_id).await?;
        path::get_path(&settings, path)
            .cloned()
            .ok_or_else(|| SettingsError::PathNotFound { path: path.clone() })
    }

    /// Overwrite the whole document, creating the row if needed.
    pub async fn replace_all(&self, user_id: &str, settings: Value) -> Result<SettingsDocument> {
        if !settings.is_object() {
            return Err(SettingsError::InvalidDocument {
                message: format!("settings must be an object, got {}", type_name(&settings)),
            });
        }

        let now = Utc::now();
        match self.store.find_by_user(user_id).await? {
            Some(_) => {
                debug!(user_id, "updating settings document");
                self.store.update(user_id, settings, now).await
            }
            None => {
                debug!(user_id, "creating settings document");
                self.store.insert(user_id, settings, now).await
            }
        }
    }

    /// Replace the value at `path`, keeping everything else as last read.
    ///
    /// Fails with `NotFound` when the user has no row; rows are created by
    /// [`Self::replace_all`] and [`Self::get_or_init`] only. Missing
    /// intermediate keys become objects; non-object intermediates are
    /// replaced by objects. Nothing is written unless the read succeeds.
    pub async fn update_by_path(
        &self,
        user_id: &str,
        path: &SettingsPath,
        value: Value,
    ) -> Result<SettingsDocument> {
        if path.is_empty() {
            return Err(SettingsError::InvalidPath {
                message: "path must name at least one key; use replace_all for the whole document"
                    .to_string(),
            });
        }

        let mut settings = self.get_all(user_id).await?;

        path::set_path(&mut settings, path, value)?;
        debug!(user_id, %path, "writing settings path");
        self.replace_all(user_id, settings).await
    }

    /// The stored document, or `defaults` written as the user's first row.
    pub async fn get_or_init(&self, user_id: &str, defaults: Value) -> Result<Value> {
        match self.get_all(user_id).await {
            Err(SettingsError::NotFound { .. }) => {
                debug!(user_id, "initialising settings with defaults");
                self.replace_all(user_id, defaults).await.map(|doc| doc.settings)
            }
            other => other,
        }
    }

    async fn load(&self, user_id: &str) -> Result<SettingsDocument> {
        self.store
            .find_by_user(user_id)
            .await?
            .ok_or_else(|| SettingsError::NotFound {
                user_id: user_id.to_string(),
            })
    }
}


/// A result flattened for UI callers: a `success` flag plus either the data
/// or an error message, so they can branch without matching on errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome<T> {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> From<Result<T>> for Outcome<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Outcome {
                success: true,
                data: Some(data),
                error: None,
            },
            Err(error) => Outcome {
                success: false,
                data: None,
                error: Some(error.to_string()),
            },
        }
    }
}
