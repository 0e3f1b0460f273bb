use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One row of the settings table: a user's whole settings tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub user_id: String,

    /// Schema-less mapping; meaning is assigned by callers.
    #[serde(default = "empty_settings")]
    pub settings: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

pub(crate) fn empty_settings() -> Value {
    Value::Object(serde_json::Map::new())
}

impl SettingsDocument {
    pub fn new(user_id: impl Into<String>, settings: Value, now: DateTime<Utc>) -> Self {
        Self {
            id: None,
            user_id: user_id.into(),
            settings,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }
}
