//! Mock implementations of the token lifecycle's side effects
//!
//! Provides a scripted token endpoint and a browser that only records URLs.

// Allow missing error/panic docs for test mocks - they are designed to be simple
// and errors are clearly indicated by their return types
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::async_utils::poll_until;
use crate::auth::{AuthError, BrowserLauncher, GrantRequest, TokenExchange, TokenRecord};
use crate::time::{Clock, SystemClock};

// Type aliases to reduce complexity
type ScriptQueue = Arc<Mutex<VecDeque<Result<TokenRecord, AuthError>>>>;
type GrantLog = Arc<Mutex<Vec<String>>>;
type UrlLog = Arc<Mutex<Vec<String>>>;

/// Scripted token endpoint
///
/// Each exchange pops the next scripted result and stamps successful records
/// with the mock's clock. An empty script fails the exchange.
///
/// # Examples
///
/// ```
/// use lakeflow_common::testing::MockTokenExchange;
///
/// let exchange = MockTokenExchange::new();
/// exchange.push_token("A", None, 3600);
/// exchange.push_failure(400, "invalid_grant");
/// assert_eq!(exchange.calls(), 0);
/// ```
#[derive(Clone)]
pub struct MockTokenExchange {
    script: ScriptQueue,
    grants: GrantLog,
    calls: Arc<AtomicUsize>,
    clock: Arc<dyn Clock>,
    delay: Option<Duration>,
}

impl MockTokenExchange {
    /// Create an empty script stamped with the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty script stamped with `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            grants: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(AtomicUsize::new(0)),
            clock,
            delay: None,
        }
    }

    /// Hold every exchange for `delay` before answering.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Script a successful response.
    pub fn push_token(&self, access_token: &str, refresh_token: Option<&str>, expires_in: i64) {
        self.script.lock().unwrap().push_back(Ok(TokenRecord {
            access_token: Some(access_token.to_string()),
            refresh_token: refresh_token.map(str::to_string),
            expires_in_secs: Some(expires_in),
            obtained_at_millis: None,
        }));
    }

    /// Script a non-2xx response.
    pub fn push_failure(&self, status: u16, body: &str) {
        self.script.lock().unwrap().push_back(Err(AuthError::TokenExchangeFailed {
            status: Some(status),
            body: body.to_string(),
        }));
    }

    /// Number of exchanges performed.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Grant types received, in order.
    #[must_use]
    pub fn grants(&self) -> Vec<String> {
        self.grants.lock().unwrap().clone()
    }
}

impl Default for MockTokenExchange {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenExchange for MockTokenExchange {
    async fn exchange(&self, grant: GrantRequest) -> Result<TokenRecord, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.grants.lock().unwrap().push(grant.grant_type().to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(mut record)) => {
                record.obtained_at_millis = Some(self.clock.millis_since_epoch());
                Ok(record)
            }
            Some(Err(err)) => Err(err),
            None => Err(AuthError::TokenExchangeFailed {
                status: None,
                body: "no scripted token response".to_string(),
            }),
        }
    }
}

/// Browser that records every URL it is asked to open
#[derive(Debug, Clone, Default)]
pub struct RecordingBrowser {
    urls: UrlLog,
    fail: bool,
}

impl RecordingBrowser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A browser that records the URL and then reports failure to start.
    #[must_use]
    pub fn failing() -> Self {
        Self { urls: UrlLog::default(), fail: true }
    }

    #[must_use]
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }

    /// Wait up to five seconds for `count` launches. Launches run on a
    /// blocking thread, so they land shortly after the flow starts.
    pub async fn wait_for_launches(&self, count: usize) -> bool {
        poll_until(Duration::from_secs(5), Duration::from_millis(5), || async {
            self.urls.lock().unwrap().len() >= count
        })
        .await
    }
}

impl BrowserLauncher for RecordingBrowser {
    fn open(&self, url: &str) -> io::Result<()> {
        self.urls.lock().unwrap().push(url.to_string());
        if self.fail {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no browser available"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for testing::mocks.
    use super::*;
    use crate::time::MockClock;

    #[tokio::test]
    async fn test_script_is_consumed_in_order() {
        let clock = MockClock::at_millis(5_000);
        let exchange = MockTokenExchange::with_clock(Arc::new(clock));
        exchange.push_token("A", Some("R"), 3600);
        exchange.push_failure(400, "invalid_grant");

        let first = exchange
            .exchange(GrantRequest::AuthorizationCode { code: "c".into() })
            .await
            .unwrap();
        assert_eq!(first.obtained_at_millis, Some(5_000));

        let second =
            exchange.exchange(GrantRequest::RefreshToken { refresh_token: "R".into() }).await;
        assert!(matches!(second, Err(AuthError::TokenExchangeFailed { status: Some(400), .. })));

        let exhausted =
            exchange.exchange(GrantRequest::RefreshToken { refresh_token: "R".into() }).await;
        assert!(matches!(exhausted, Err(AuthError::TokenExchangeFailed { status: None, .. })));

        assert_eq!(exchange.calls(), 3);
        assert_eq!(exchange.grants(), vec!["authorization_code", "refresh_token", "refresh_token"]);
    }

    #[test]
    fn test_failing_browser_still_records() {
        let browser = RecordingBrowser::failing();
        assert!(browser.open("https://idp/auth").is_err());
        assert_eq!(browser.urls(), vec!["https://idp/auth".to_string()]);
    }
}
