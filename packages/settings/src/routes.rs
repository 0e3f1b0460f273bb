//! Translation from settings operations to HTTP-style replies.
//!
//! These are framework-agnostic handler bodies: the hosting server extracts
//! the authenticated user and the JSON body, calls one of these, and writes
//! the returned status and body.
//!
//! | Condition                         | Status |
//! |-----------------------------------|--------|
//! | no authenticated user             | 401    |
//! | missing `settings` / `path` / `value` | 400 |
//! | no row, or path lookup miss       | 404    |
//! | data store failure                | 500    |

use http::StatusCode;
use serde_json::{json, Value};

use crate::error::SettingsError;
use crate::path::SettingsPath;
use crate::service::NestedSettingsStore;
use crate::store::DocumentStore;

#[derive(Debug, Clone, PartialEq)]
pub struct ApiReply {
    pub status: StatusCode,
    pub body: Value,
}

impl ApiReply {
    fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body,
        }
    }

    fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": message.into() }),
        }
    }

    fn unauthorized() -> Self {
        Self::error(StatusCode::UNAUTHORIZED, "Unauthorized")
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::error(StatusCode::BAD_REQUEST, message)
    }
}

impl From<SettingsError> for ApiReply {
    fn from(error: SettingsError) -> Self {
        let status = error.status();
        if status.is_server_error() {
            tracing::error!(%error, "settings request failed");
        }
        ApiReply::error(status, error.to_string())
    }
}

/// `GET settings`: the whole document.
pub async fn get_settings<S: DocumentStore>(
    settings: &NestedSettingsStore<S>,
    user_id: Option<&str>,
) -> ApiReply {
    let Some(user_id) = user_id else {
        return ApiReply::unauthorized();
    };
    match settings.get_all(user_id).await {
        Ok(document) => ApiReply::ok(json!({ "settings": document })),
        Err(error) => error.into(),
    }
}

/// `GET settings/path?path=a.b`: one value.
pub async fn get_setting<S: DocumentStore>(
    settings: &NestedSettingsStore<S>,
    user_id: Option<&str>,
    path: Option<&str>,
) -> ApiReply {
    let Some(user_id) = user_id else {
        return ApiReply::unauthorized();
    };
    let Some(raw) = path.filter(|p| !p.is_empty()) else {
        return ApiReply::bad_request("Missing required parameter: path");
    };
    let path = match SettingsPath::parse(raw) {
        Ok(path) => path,
        Err(error) => return error.into(),
    };
    match settings.get_by_path(user_id, &path).await {
        Ok(value) => ApiReply::ok(json!({ "path": path.to_string(), "value": value })),
        Err(error) => error.into(),
    }
}

/// `PUT settings` with body `{"settings": {...}}`: replace the document.
pub async fn put_settings<S: DocumentStore>(
    settings: &NestedSettingsStore<S>,
    user_id: Option<&str>,
    body: &Value,
) -> ApiReply {
    let Some(user_id) = user_id else {
        return ApiReply::unauthorized();
    };
    let Some(document) = body.get("settings") else {
        return ApiReply::bad_request("Missing required field: settings");
    };
    match settings.replace_all(user_id, document.clone()).await {
        Ok(saved) => ApiReply::ok(json!({ "success": true, "settings": saved.settings })),
        Err(error) => error.into(),
    }
}

/// `PATCH settings` with body `{"path": "a.b" | ["a", "b"], "value": ...}`.
pub async fn patch_setting<S: DocumentStore>(
    settings: &NestedSettingsStore<S>,
    user_id: Option<&str>,
    body: &Value,
) -> ApiReply {
    let Some(user_id) = user_id else {
        return ApiReply::unauthorized();
    };
    let (Some(raw_path), Some(value)) = (body.get("path"), body.get("value")) else {
        return ApiReply::bad_request("Missing required fields: path and value");
    };
    let path = match SettingsPath::from_json(raw_path) {
        Ok(path) => path,
        Err(error) => return error.into(),
    };
    match settings.update_by_path(user_id, &path, value.clone()).await {
        Ok(saved) => ApiReply::ok(json!({ "success": true, "settings": saved.settings })),
        Err(error) => error.into(),
    }
}
