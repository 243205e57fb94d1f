//! One relay invocation from job to result.
//!
//! # Data Flow
//! ```text
//! payload bytes
//!     → Job (decode)
//!     → CookieJar::from_plain
//!     → BodyKind::decode / encode
//!     → first HopRequest
//!     → loop: send → store cookies → redirect? record + next hop : realise
//!     → RelayResult { response, history, cookies } or { error }
//! ```
//!
//! Everything here is built per invocation. The only shared input is the
//! [`AddressGuard`] snapshot taken when the [`Relay`] is created.

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::{Duration, Instant};

use hyper::header::{self, HeaderMap, HeaderValue};
use hyper::Method;
use rustls::ClientConfig;
use thiserror::Error;
use tokio::time::timeout_at;
use url::Url;

use crate::config::RelayConfig;
use crate::net::dialer::DialError;
use crate::observability::metrics::{self, JobOutcome};
use crate::relay::body::BodyKind;
use crate::relay::client::{to_uri, RelayClient};
use crate::relay::cookies::CookieJar;
use crate::relay::error::{RelayError, RequestBuildError};
use crate::relay::job::{Job, RealisedResponse, RelayResult};
use crate::relay::realise::{realise, tuples_to_headers, HeaderError};
use crate::relay::redirect::{is_redirect, HopRequest, RedirectError, RedirectTracker};
use crate::security::address_guard::AddressGuard;

/// Failure of the target call, reported in the result rather than as an API error.
#[derive(Debug, Error)]
enum ExecError {
    #[error(transparent)]
    Transport(#[from] hyper_util::client::legacy::Error),

    #[error(transparent)]
    Redirect(#[from] RedirectError),

    #[error(transparent)]
    Dial(#[from] DialError),

    #[error("invalid redirect target {0:?}")]
    Target(String),

    #[error("client timeout exceeded after {0:?}")]
    Timeout(Duration),
}

/// The request being made when execution stopped, and why.
struct ExecFailure {
    method: Method,
    url: Url,
    error: ExecError,
}

impl ExecFailure {
    fn message(&self) -> String {
        format!("{} {:?}: {}", self.method, self.url.as_str(), error_chain(&self.error))
    }
}

/// `err` and its sources joined by `": "`, skipping sources already spelled
/// out by the message before them.
fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !text.is_empty() && !message.ends_with(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

/// Performs relay jobs against a fixed guard snapshot.
pub struct Relay {
    config: RelayConfig,
    guard: Arc<AddressGuard>,
    tls: Arc<ClientConfig>,
}

impl Relay {
    pub fn new(config: RelayConfig, guard: Arc<AddressGuard>, tls: Arc<ClientConfig>) -> Self {
        Self { config, guard, tls }
    }

    /// Decode `payload` as a [`Job`] and run it.
    pub async fn handle(&self, payload: &[u8]) -> Result<RelayResult, RelayError> {
        let start = Instant::now();
        let job: Job = match serde_json::from_slice(payload) {
            Ok(job) => job,
            Err(e) => {
                metrics::record_job(JobOutcome::Rejected, start);
                return Err(e.into());
            }
        };
        self.run(job).await
    }

    /// Run `job` to completion.
    ///
    /// `Err` is returned only when the job is unusable; failures of the call
    /// itself are carried in [`RelayResult::error`].
    pub async fn run(&self, job: Job) -> Result<RelayResult, RelayError> {
        let start = Instant::now();
        let result = self.run_inner(job).await;

        let outcome = match &result {
            Ok(result) if result.error.is_some() => JobOutcome::Failed,
            Ok(_) => JobOutcome::Completed,
            Err(_) => JobOutcome::Rejected,
        };
        metrics::record_job(outcome, start);
        result
    }

    async fn run_inner(&self, job: Job) -> Result<RelayResult, RelayError> {
        tracing::info!(
            id = %job.id,
            method = %job.method(),
            url = %job.url,
            body_type = ?job.body_type,
            advisory_timeout = ?job.timeout,
            "Relaying job"
        );

        let mut jar = CookieJar::from_plain(&job.cookies)?;
        let encoded = BodyKind::decode(&job.body, job.body_type)?.encode();

        let method = Method::from_bytes(job.method().as_bytes())
            .map_err(|_| RequestBuildError::Method(job.method().to_string()))?;
        let url = Url::parse(&job.url).map_err(|source| RequestBuildError::Url {
            url: job.url.clone(),
            source,
        })?;
        to_uri(&url).map_err(|_| RequestBuildError::Target(job.url.clone()))?;

        let mut headers = tuples_to_headers(&job.headers).map_err(RequestBuildError::from)?;
        if let Some(content_type) = &encoded.content_type {
            let value = HeaderValue::from_str(content_type)
                .map_err(|_| RequestBuildError::Header(HeaderError::Value("Content-Type".to_string())))?;
            headers.insert(header::CONTENT_TYPE, value);
        }

        let first = HopRequest {
            method,
            url,
            headers,
            body: encoded.bytes,
        };

        let client = RelayClient::new(
            Arc::clone(&self.guard),
            &self.tls,
            self.config.dial_settings(),
        );
        let mut tracker = RedirectTracker::new(first.headers.clone(), self.config.max_redirects);

        let outcome = self.execute(&client, &mut jar, &mut tracker, first).await;
        let cookies = jar.to_plain();

        match outcome {
            Ok(response) => {
                let mut response = Some(response);
                let mut history = tracker.into_history();

                let earliest = match history.as_mut().and_then(|h| h.first_mut()) {
                    Some(first) => Some(first),
                    None => response.as_mut(),
                };
                if let Some(earliest) = earliest {
                    earliest.request.body = job.body.clone();
                }

                Ok(RelayResult {
                    id: job.id,
                    response,
                    history,
                    cookies,
                    error: None,
                })
            }
            Err(failure) => {
                let message = failure.message();
                tracing::warn!(id = %job.id, error = %message, "Relayed call failed");
                Ok(RelayResult::failed(job.id, message))
            }
        }
    }

    async fn execute(
        &self,
        client: &RelayClient,
        jar: &mut CookieJar,
        tracker: &mut RedirectTracker,
        first: HopRequest,
    ) -> Result<RealisedResponse, ExecFailure> {
        let budget = self.config.client_timeout();
        let deadline = tokio::time::Instant::now() + budget;
        let mut hop = first;

        loop {
            let fail = |hop: &HopRequest, error: ExecError| ExecFailure {
                method: hop.method.clone(),
                url: hop.url.clone(),
                error,
            };

            let uri = to_uri(&hop.url)
                .map_err(|_| fail(&hop, ExecError::Target(hop.url.to_string())))?;
            jar.record_visit(&hop.url);
            let sent = with_cookies(&hop.headers, jar.cookie_header(&hop.url));

            let response = timeout_at(deadline, client.send(&hop, uri, sent.clone()))
                .await
                .map_err(|_| fail(&hop, ExecError::Timeout(budget)))?
                .map_err(|e| fail(&hop, e.into()))?;

            jar.store_response(&hop.url, response.headers());

            let status = response.status();
            let location = if is_redirect(status) {
                response
                    .headers()
                    .get(header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            } else {
                None
            };

            let Some(location) = location.filter(|_| !tracker.is_exhausted()) else {
                if is_redirect(status) && tracker.is_exhausted() {
                    tracing::info!(url = %hop.url, redirects = tracker.len(), "Too many redirects, ending");
                }
                let realised = realise(
                    response,
                    &hop.url,
                    &hop.method,
                    &sent,
                    self.config.max_response_bytes,
                );
                return timeout_at(deadline, realised)
                    .await
                    .map_err(|_| fail(&hop, ExecError::Timeout(budget)));
            };

            let realised = realise(
                response,
                &hop.url,
                &hop.method,
                &sent,
                self.config.max_response_bytes,
            );
            let realised = timeout_at(deadline, realised)
                .await
                .map_err(|_| fail(&hop, ExecError::Timeout(budget)))?;
            tracker.record(realised);

            let next = tracker
                .next_request(&hop, status, &location)
                .map_err(|e| fail(&hop, e.into()))?;

            let host = next.url.host_str().unwrap_or_default();
            if !self.guard.is_allowed(host) {
                tracing::warn!(host = %host, "Refusing redirect to disallowed host");
                metrics::record_address_rejection("redirect");
                return Err(fail(
                    &next,
                    DialError::AddressNotAllowed(host.to_string()).into(),
                ));
            }

            metrics::record_redirect();
            hop = next;
        }
    }
}

/// `headers` plus the jar's cookies, appended to any caller `Cookie` header.
fn with_cookies(headers: &HeaderMap, jar_cookies: Option<String>) -> HeaderMap {
    let mut sent = headers.clone();
    let Some(jar_cookies) = jar_cookies else {
        return sent;
    };

    let combined = match sent.get(header::COOKIE).and_then(|v| v.to_str().ok()) {
        Some(existing) if !existing.is_empty() => format!("{}; {}", existing, jar_cookies),
        _ => jar_cookies,
    };
    match HeaderValue::from_str(&combined) {
        Ok(value) => {
            sent.insert(header::COOKIE, value);
        }
        Err(_) => tracing::debug!("Jar cookies do not form a valid header value, not sending"),
    }
    sent
}
