//! # tally-settings
//!
//! Per-user settings stored as one JSON document per user, readable and
//! writable as a whole or at a dot-separated path such as
//! `security.twoFactorEnabled`.
//!
//! The pieces stack like this:
//!
//! - [`SettingsPath`] with [`path::get_path`] / [`path::set_path`]: pure
//!   tree navigation over `serde_json::Value`.
//! - [`DocumentStore`]: one row per user. [`InMemoryDocumentStore`] for tests
//!   and local use, [`RestDocumentStore`] for a PostgREST-style hosted table
//!   reached through `tally_fetch::SafeFetch`.
//! - [`NestedSettingsStore`]: the read-modify-write operations.
//! - [`routes`]: status-code translation for an HTTP surface.
//!
//! Path writes are not atomic. Two concurrent `update_by_path` calls for the
//! same user both read the old document, and the later write wins.

pub mod config;
pub mod document;
pub mod error;
pub mod in_memory;
pub mod path;
pub mod rest;
pub mod routes;
pub mod service;
pub mod store;

pub use config::RestStoreConfig;
pub use document::SettingsDocument;
pub use error::{Result, SettingsError};
pub use in_memory::InMemoryDocumentStore;
pub use path::SettingsPath;
pub use rest::RestDocumentStore;
pub use routes::ApiReply;
pub use service::{NestedSettingsStore, Outcome};
pub use store::DocumentStore;
