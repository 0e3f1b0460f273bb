//! # tally-fetch
//!
//! Resilient request execution for the Tally client.
//!
//! ## Pieces
//!
//! ### SafeFetch
//!
//! Wraps an [`HttpTransport`] with a per-attempt timeout (15s by default), a
//! bounded retry count (1 by default) and a fixed 500ms backoff after
//! timed-out or cancelled attempts:
//!
//! ```ignore
//! use tally_fetch::{HttpRequest, ReqwestTransport, SafeFetch};
//!
//! let fetch = SafeFetch::new(ReqwestTransport::new());
//! let response = fetch.fetch(&HttpRequest::get("https://api.example.com/budgets")).await?;
//! ```
//!
//! ### PendingRequestTracker
//!
//! Counts in-flight calls and records online/offline state for UI
//! consumption. Attach one to a `SafeFetch` with `with_tracker` and every
//! call is counted exactly once until it settles:
//!
//! ```ignore
//! use tally_fetch::PendingRequestTracker;
//!
//! let tracker = PendingRequestTracker::new(true);
//! let fetch = SafeFetch::new(ReqwestTransport::new()).with_tracker(tracker.clone());
//!
//! if let Some(event) = tracker.set_online(false) {
//!     println!("now {}", event);
//! }
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod safe_fetch;
pub mod tracker;
pub mod types;

pub use config::FetchConfig;
pub use error::{ConfigError, FailureKind, FetchError};
pub use executor::{HttpTransport, ReqwestTransport};
pub use safe_fetch::{FetchOptions, SafeFetch};
pub use tracker::{ConnectivityEvent, PendingGuard, PendingRequestTracker};
pub use types::{HttpRequest, HttpResponse, Method};

// Callers construct cancellation signals without depending on tokio-util.
pub use tokio_util::sync::CancellationToken;
