//! Redirect following for relayed calls.
//!
//! # Responsibilities
//! - Decide whether a response is a redirect to follow
//! - Keep the realised redirect responses, oldest first, up to a cap
//! - Build the next hop's request: method rewrite, body replay, `Referer`,
//!   and forwarding of credentials only within the original host's domain
//!
//! The transport never follows redirects itself; the orchestrator drives the
//! loop and asks this module for each step.

use bytes::Bytes;
use hyper::header::{self, HeaderMap, HeaderName, HeaderValue};
use hyper::{Method, StatusCode};
use thiserror::Error;
use url::Url;

use crate::relay::job::RealisedResponse;

/// Headers that carry credentials and must not leak to another domain.
fn is_sensitive(name: &HeaderName) -> bool {
    *name == header::AUTHORIZATION
        || *name == header::WWW_AUTHENTICATE
        || *name == header::COOKIE
        || name.as_str() == "cookie2"
}

#[derive(Debug, Error)]
pub enum RedirectError {
    #[error("failed to parse Location header {location:?}: {source}")]
    Location {
        location: String,
        #[source]
        source: url::ParseError,
    },
}

/// One request of the chain.
#[derive(Debug, Clone)]
pub struct HopRequest {
    pub method: Method,
    pub url: Url,
    /// Caller headers for this hop. Jar cookies are added at send time.
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Whether `status` is one of the redirect statuses that are followed.
pub fn is_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

/// State of the redirect chain for one relay invocation.
#[derive(Debug)]
pub struct RedirectTracker {
    history: Vec<RealisedResponse>,
    max_redirects: usize,
    caller_headers: HeaderMap,
    strip_sensitive: bool,
}

impl RedirectTracker {
    /// `caller_headers` are the headers of the first request; later hops copy
    /// from them.
    pub fn new(caller_headers: HeaderMap, max_redirects: usize) -> Self {
        Self {
            history: Vec::new(),
            max_redirects,
            caller_headers,
            strip_sensitive: false,
        }
    }

    /// No further redirects may be followed.
    pub fn is_exhausted(&self) -> bool {
        self.history.len() >= self.max_redirects
    }

    pub fn record(&mut self, response: RealisedResponse) {
        self.history.push(response);
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Recorded responses, or `None` when no redirect was followed.
    pub fn into_history(self) -> Option<Vec<RealisedResponse>> {
        if self.history.is_empty() {
            None
        } else {
            Some(self.history)
        }
    }

    /// Resolve `location` against `prev` and build the request for the next hop.
    pub fn next_request(
        &mut self,
        prev: &HopRequest,
        status: StatusCode,
        location: &str,
    ) -> Result<HopRequest, RedirectError> {
        let url = prev
            .url
            .join(location)
            .map_err(|source| RedirectError::Location {
                location: location.to_string(),
                source,
            })?;

        let (method, body) = match status {
            StatusCode::TEMPORARY_REDIRECT | StatusCode::PERMANENT_REDIRECT => {
                (prev.method.clone(), prev.body.clone())
            }
            _ => {
                let method = if prev.method == Method::GET || prev.method == Method::HEAD {
                    prev.method.clone()
                } else {
                    Method::GET
                };
                self.caller_headers.remove(header::CONTENT_TYPE);
                self.caller_headers.remove(header::CONTENT_LENGTH);
                (method, Bytes::new())
            }
        };

        if !is_domain_or_subdomain(url.host_str(), prev.url.host_str()) {
            self.strip_sensitive = true;
        }

        let mut headers = HeaderMap::with_capacity(self.caller_headers.len() + 1);
        for (name, value) in self.caller_headers.iter() {
            if self.strip_sensitive && is_sensitive(name) {
                continue;
            }
            headers.append(name.clone(), value.clone());
        }

        if let Some(referer) = referer_for(&prev.url, &url, self.caller_headers.get(header::REFERER)) {
            headers.insert(header::REFERER, referer);
        }

        tracing::debug!(from = %prev.url, to = %url, status = status.as_u16(), method = %method, "Following redirect");

        Ok(HopRequest {
            method,
            url,
            headers,
            body,
        })
    }
}

/// `Referer` for a request to `next` made after `last`.
fn referer_for(last: &Url, next: &Url, explicit: Option<&HeaderValue>) -> Option<HeaderValue> {
    if last.scheme() == "https" && next.scheme() == "http" {
        return None;
    }
    if let Some(explicit) = explicit {
        return Some(explicit.clone());
    }

    let mut referer = last.clone();
    // Both setters only fail for URLs that cannot carry credentials at all.
    let _ = referer.set_username("");
    let _ = referer.set_password(None);
    HeaderValue::from_str(referer.as_str()).ok()
}

/// `sub` equals `parent` or is a subdomain of it. Ports are not considered.
fn is_domain_or_subdomain(sub: Option<&str>, parent: Option<&str>) -> bool {
    let (Some(sub), Some(parent)) = (sub, parent) else {
        return false;
    };
    let sub = sub.to_ascii_lowercase();
    let parent = parent.to_ascii_lowercase();
    if sub == parent {
        return true;
    }
    // IP literals only ever match exactly.
    if sub.starts_with('[') || sub.parse::<std::net::Ipv4Addr>().is_ok() {
        return false;
    }
    sub.strip_suffix(parent.as_str())
        .is_some_and(|rest| rest.ends_with('.'))
}
