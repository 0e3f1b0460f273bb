//! Timeout-bounded, retrying request execution.
//!
//! Every attempt races the transport against a timer. A timed-out attempt is
//! cancelled by dropping its future. Failed attempts are retried up to
//! `retry_count` times; only timeouts and cancellations wait out the fixed
//! backoff first, other failures retry immediately.
//!
//! ```ignore
//! use tally_fetch::{FetchOptions, HttpRequest, PendingRequestTracker, ReqwestTransport, SafeFetch};
//!
//! let tracker = PendingRequestTracker::new(true);
//! let fetch = SafeFetch::new(ReqwestTransport::new()).with_tracker(tracker.clone());
//!
//! let response = fetch
//!     .fetch_with(
//!         &HttpRequest::get("https://api.example.com/expenses"),
//!         &FetchOptions::default().with_retry_count(2),
//!     )
//!     .await?;
//! ```

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::executor::HttpTransport;
use crate::tracker::PendingRequestTracker;
use crate::types::{HttpRequest, HttpResponse};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(15_000);
pub const DEFAULT_RETRY_COUNT: u32 = 1;
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(500);

/// Per-call execution options.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Wall-clock budget for one attempt.
    pub timeout: Duration,
    /// Attempts after the first; zero means a single attempt.
    pub retry_count: u32,
    /// Pause before retrying a timed-out or cancelled attempt.
    pub backoff: Duration,
    /// Caller-owned cancellation. Cancelling aborts the call.
    pub signal: Option<CancellationToken>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            retry_count: DEFAULT_RETRY_COUNT,
            backoff: DEFAULT_BACKOFF,
            signal: None,
        }
    }
}

impl FetchOptions {
    /// Set the per-attempt budget.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set how many times a failed attempt is retried.
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// Set the pause taken before retrying after a timeout or abort.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Abort the call, including any pending retries, when `signal` fires.
    pub fn with_signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }

    fn caller_aborted(&self) -> bool {
        self.signal.as_ref().is_some_and(CancellationToken::is_cancelled)
    }
}

/// Bookkeeping for one logical call.
#[derive(Debug)]
struct RequestAttempt {
    number: u32,
    retries_remaining: u32,
    last_error: Option<FetchError>,
}

impl RequestAttempt {
    fn new(options: &FetchOptions) -> Self {
        Self {
            number: 0,
            retries_remaining: options.retry_count,
            last_error: None,
        }
    }

    fn into_error(self) -> FetchError {
        self.last_error.unwrap_or(FetchError::RequestFailed)
    }
}

/// Request executor wrapping a transport with timeouts and retries.
pub struct SafeFetch<T> {
    transport: T,
    tracker: Option<PendingRequestTracker>,
    defaults: FetchOptions,
}

impl<T: HttpTransport> SafeFetch<T> {
    /// Create an executor with default options and no tracker.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            tracker: None,
            defaults: FetchOptions::default(),
        }
    }

    /// Count each call as pending on `tracker` until it settles.
    pub fn with_tracker(mut self, tracker: PendingRequestTracker) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Options used by [`Self::fetch`].
    pub fn with_defaults(mut self, defaults: FetchOptions) -> Self {
        self.defaults = defaults;
        self
    }

    /// The options [`Self::fetch`] runs with.
    pub fn defaults(&self) -> &FetchOptions {
        &self.defaults
    }

    /// The attached pending-request tracker, if any.
    pub fn tracker(&self) -> Option<&PendingRequestTracker> {
        self.tracker.as_ref()
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Execute `request` with the default options.
    pub async fn fetch(&self, request: &HttpRequest) -> Result<HttpResponse, FetchError> {
        self.fetch_with(request, &self.defaults).await
    }

    /// Execute `request` with per-call options.
    ///
    /// Returns the first response the transport produces, whatever its
    /// status. Fails with the last attempt's error once retries run out, or
    /// with `Aborted` as soon as the caller's signal fires.
    pub async fn fetch_with(
        &self,
        request: &HttpRequest,
        options: &FetchOptions,
    ) -> Result<HttpResponse, FetchError> {
        // Held across every attempt; dropping the call future also releases it.
        let _pending = self.tracker.as_ref().map(PendingRequestTracker::track);
        let mut attempt = RequestAttempt::new(options);

        loop {
            attempt.number += 1;
            let error = match self.attempt(request, options).await {
                Ok(response) => return Ok(response),
                Err(error) => error,
            };

            if options.caller_aborted() {
                debug!(url = %request.url, attempt = attempt.number, "request aborted by caller");
                return Err(FetchError::Aborted);
            }

            let backoff = error.wants_backoff();
            let retryable = error.is_retryable();
            warn!(
                url = %request.url,
                attempt = attempt.number,
                retries_remaining = attempt.retries_remaining,
                %error,
                "request attempt failed"
            );
            attempt.last_error = Some(error);

            if !retryable || attempt.retries_remaining == 0 {
                return Err(attempt.into_error());
            }
            attempt.retries_remaining -= 1;

            if backoff && !self.pause(options).await {
                return Err(FetchError::Aborted);
            }
        }
    }

    async fn attempt(
        &self,
        request: &HttpRequest,
        options: &FetchOptions,
    ) -> Result<HttpResponse, FetchError> {
        let bounded = tokio::time::timeout(options.timeout, self.transport.send(request));
        let outcome = match &options.signal {
            Some(signal) => tokio::select! {
                biased;
                _ = signal.cancelled() => return Err(FetchError::Aborted),
                outcome = bounded => outcome,
            },
            None => bounded.await,
        };

        match outcome {
            Ok(result) => result,
            Err(_elapsed) => Err(FetchError::Timeout {
                after: options.timeout,
            }),
        }
    }

    /// Returns false if the caller cancelled during the pause.
    async fn pause(&self, options: &FetchOptions) -> bool {
        match &options.signal {
            Some(signal) => tokio::select! {
                _ = signal.cancelled() => false,
                _ = tokio::time::sleep(options.backoff) => true,
            },
            None => {
                tokio::time::sleep(options.backoff).await;
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::mock::{ScriptedTransport, Step};
    use serde_json::json;
    use std::sync::Arc;
    use tokio::time::Instant;

    fn request() -> HttpRequest {
        HttpRequest::get("https://db.example/rest/v1/expenses")
    }

    fn fetcher(transport: ScriptedTransport) -> (SafeFetch<Arc<ScriptedTransport>>, Arc<ScriptedTransport>) {
        let transport = Arc::new(transport);
        (SafeFetch::new(transport.clone()), transport)
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_call_makes_retry_count_plus_one_attempts() {
        for retries in 0..5u32 {
            let (fetch, transport) = fetcher(ScriptedTransport::always(Step::Fail(
                FetchError::Network("connection refused".into()),
            )));
            let options = FetchOptions::default().with_retry_count(retries);

            let err = fetch.fetch_with(&request(), &options).await.unwrap_err();

            assert_eq!(transport.calls(), retries as usize + 1);
            assert_eq!(err, FetchError::Network("connection refused".into()));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retries_means_one_attempt() {
        let (fetch, transport) = fetcher(ScriptedTransport::always(Step::Hang));
        let options = FetchOptions::default().with_retry_count(0);

        let err = fetch.fetch_with(&request(), &options).await.unwrap_err();

        assert!(matches!(err, FetchError::Timeout { .. }));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_request_times_out_at_budget() {
        let (fetch, _) = fetcher(ScriptedTransport::always(Step::Hang));
        let options = FetchOptions::default()
            .with_timeout(Duration::from_millis(250))
            .with_retry_count(0);

        let started = Instant::now();
        let err = fetch.fetch_with(&request(), &options).await.unwrap_err();

        assert!(started.elapsed() >= Duration::from_millis(250));
        assert_eq!(
            err,
            FetchError::Timeout {
                after: Duration::from_millis(250)
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn default_timeout_is_fifteen_seconds() {
        let (fetch, _) = fetcher(ScriptedTransport::always(Step::Hang));
        let options = FetchOptions::default().with_retry_count(0);

        let started = Instant::now();
        fetch.fetch_with(&request(), &options).await.unwrap_err();

        assert!(started.elapsed() >= Duration::from_secs(15));
        assert!(started.elapsed() < Duration::from_secs(16));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_response_within_budget_succeeds() {
        let (fetch, transport) = fetcher(ScriptedTransport::always(Step::Delay(
            Duration::from_millis(900),
            ScriptedTransport::ok(json!({"ok": true})),
        )));
        let options = FetchOptions::default().with_timeout(Duration::from_secs(1));

        let response = fetch.fetch_with(&request(), &options).await.unwrap();

        assert_eq!(response.body, json!({"ok": true}));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_then_success_returns_success() {
        let (fetch, transport) = fetcher(ScriptedTransport::new(
            [Step::Hang],
            Step::Respond(ScriptedTransport::ok(json!([{"id": 1}]))),
        ));

        let response = fetch.fetch(&request()).await.unwrap();

        assert_eq!(response.body, json!([{"id": 1}]));
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_follows_timeouts() {
        let (fetch, _) = fetcher(ScriptedTransport::new(
            [Step::Hang],
            Step::Respond(ScriptedTransport::ok(json!(null))),
        ));
        let options = FetchOptions::default().with_timeout(Duration::from_millis(100));

        let started = Instant::now();
        fetch.fetch_with(&request(), &options).await.unwrap();

        // 100ms timeout plus the 500ms pause.
        assert!(started.elapsed() >= Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn other_failures_retry_without_backoff() {
        let (fetch, transport) = fetcher(ScriptedTransport::new(
            [Step::Fail(FetchError::Other("bad gateway".into()))],
            Step::Respond(ScriptedTransport::ok(json!(null))),
        ));

        let started = Instant::now();
        fetch.fetch(&request()).await.unwrap();

        assert!(started.elapsed() < DEFAULT_BACKOFF);
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn surfaces_last_error() {
        let (fetch, _) = fetcher(ScriptedTransport::new(
            [Step::Fail(FetchError::Network("reset".into()))],
            Step::Hang,
        ));
        let options = FetchOptions::default().with_timeout(Duration::from_millis(50));

        let err = fetch.fetch_with(&request(), &options).await.unwrap_err();

        assert!(matches!(err, FetchError::Timeout { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_request_is_not_retried() {
        let (fetch, transport) = fetcher(ScriptedTransport::always(Step::Fail(
            FetchError::InvalidRequest {
                message: "bad header".into(),
            },
        )));
        let options = FetchOptions::default().with_retry_count(3);

        fetch.fetch_with(&request(), &options).await.unwrap_err();

        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn caller_abort_is_surfaced_not_swallowed() {
        let (fetch, transport) = fetcher(ScriptedTransport::always(Step::Hang));
        let signal = CancellationToken::new();
        let options = FetchOptions::default()
            .with_retry_count(3)
            .with_signal(signal.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            signal.cancel();
        });

        let started = Instant::now();
        let err = fetch.fetch_with(&request(), &options).await.unwrap_err();
        canceller.await.unwrap();

        assert_eq!(err, FetchError::Aborted);
        assert!(started.elapsed() < DEFAULT_TIMEOUT);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn already_cancelled_signal_aborts_immediately() {
        let (fetch, _) = fetcher(ScriptedTransport::always(Step::Respond(
            ScriptedTransport::ok(json!(null)),
        )));
        let signal = CancellationToken::new();
        signal.cancel();

        let err = fetch
            .fetch_with(&request(), &FetchOptions::default().with_signal(signal))
            .await
            .unwrap_err();

        assert_eq!(err, FetchError::Aborted);
    }

    #[tokio::test(start_paused = true)]
    async fn tracker_settles_once_per_call() {
        let tracker = PendingRequestTracker::new(true);
        // Pre-existing requests from elsewhere in the app.
        tracker.add_pending_request();
        tracker.add_pending_request();

        let transport = Arc::new(ScriptedTransport::new(
            [Step::Hang],
            Step::Respond(ScriptedTransport::ok(json!(null))),
        ));
        let fetch = SafeFetch::new(transport.clone()).with_tracker(tracker.clone());

        fetch.fetch(&request()).await.unwrap();

        assert_eq!(transport.calls(), 2);
        assert_eq!(tracker.pending_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn tracker_counts_call_while_in_flight() {
        let tracker = PendingRequestTracker::new(true);
        let transport = Arc::new(ScriptedTransport::always(Step::Delay(
            Duration::from_millis(300),
            ScriptedTransport::ok(json!(null)),
        )));
        let fetch = Arc::new(SafeFetch::new(transport).with_tracker(tracker.clone()));

        let in_flight = {
            let fetch = fetch.clone();
            tokio::spawn(async move { fetch.fetch(&request()).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(tracker.pending_count(), 1);

        in_flight.await.unwrap().unwrap();
        assert_eq!(tracker.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn tracker_released_after_final_failure() {
        let tracker = PendingRequestTracker::new(true);
        let fetch = SafeFetch::new(ScriptedTransport::always(Step::Fail(FetchError::Other(
            "boom".into(),
        ))))
        .with_tracker(tracker.clone());

        fetch.fetch(&request()).await.unwrap_err();

        assert_eq!(tracker.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_calls_have_independent_timers() {
        let fast = ScriptedTransport::always(Step::Delay(
            Duration::from_millis(50),
            ScriptedTransport::ok(json!("fast")),
        ));
        let (fetch, _) = fetcher(fast);
        let short = FetchOptions::default()
            .with_timeout(Duration::from_millis(10))
            .with_retry_count(0);
        let long = FetchOptions::default().with_timeout(Duration::from_millis(100));

        let first = request();
        let second = request();
        let (a, b) = tokio::join!(
            fetch.fetch_with(&first, &short),
            fetch.fetch_with(&second, &long)
        );

        assert!(matches!(a, Err(FetchError::Timeout { .. })));
        assert_eq!(b.unwrap().body, json!("fast"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_backoff_stops_retrying() {
        let (fetch, transport) = fetcher(ScriptedTransport::always(Step::Hang));
        let signal = CancellationToken::new();
        let options = FetchOptions::default()
            .with_timeout(Duration::from_millis(100))
            .with_retry_count(3)
            .with_signal(signal.clone());

        // Fires 50ms into the first 500ms pause.
        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            signal.cancel();
        });

        let started = Instant::now();
        let err = fetch.fetch_with(&request(), &options).await.unwrap_err();
        canceller.await.unwrap();

        assert_eq!(err, FetchError::Aborted);
        assert_eq!(transport.calls(), 1);
        assert!(started.elapsed() < Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn transport_abort_waits_out_backoff() {
        let (fetch, transport) = fetcher(ScriptedTransport::new(
            [Step::Fail(FetchError::Aborted)],
            Step::Respond(ScriptedTransport::ok(json!("retried"))),
        ));

        let started = Instant::now();
        let response = fetch.fetch(&request()).await.unwrap();

        assert_eq!(response.body, json!("retried"));
        assert_eq!(transport.calls(), 2);
        assert!(started.elapsed() >= DEFAULT_BACKOFF);
    }

    #[test]
    fn exhausted_attempt_without_cause_is_generic() {
        let attempt = RequestAttempt::new(&FetchOptions::default());
        assert_eq!(attempt.into_error(), FetchError::RequestFailed);
    }
}
