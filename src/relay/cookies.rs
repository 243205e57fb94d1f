//! Cookie state bridging between the wire form and a working jar.
//!
//! The caller owns cookie persistence: every job carries the full cookie
//! state, the jar is rebuilt from it, mutated by the relayed responses, and
//! exported back into the same plain shape.
//!
//! A jar only reports cookies for a concrete URL, so the adapter remembers
//! every URL it was seeded for or that was dialed, and queries each of them on
//! export.

use std::collections::BTreeMap;

use cookie_store::{CookieExpiration, CookieStore, RawCookie};
use hyper::header::{HeaderMap, SET_COOKIE};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use url::Url;

/// One stored cookie as exchanged with the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieValue {
    pub value: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expires: Option<OffsetDateTime>,
    #[serde(default)]
    pub secure: bool,
}

impl CookieValue {
    /// A session cookie that is not restricted to secure transports.
    pub fn session(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            expires: None,
            secure: false,
        }
    }
}

/// Cookie name to value.
pub type CookiesByName = BTreeMap<String, CookieValue>;

/// Domain (or host with port) to path to cookie name.
pub type CookieState = BTreeMap<String, BTreeMap<String, CookiesByName>>;

#[derive(Debug, Error)]
pub enum CookieJarError {
    #[error("cannot build a URL for cookie domain {domain:?} and path {path:?}: {source}")]
    InvalidScope {
        domain: String,
        path: String,
        #[source]
        source: url::ParseError,
    },
}

/// A cookie store that can be exported back into [`CookieState`].
#[derive(Debug, Default)]
pub struct CookieJar {
    store: CookieStore,
    urls: Vec<Url>,
}

impl CookieJar {
    /// Build a jar seeded with `state`.
    ///
    /// The source state does not record a scheme, so secure cookies are seeded
    /// over `https` and the rest over `http`.
    pub fn from_plain(state: &CookieState) -> Result<Self, CookieJarError> {
        let mut jar = Self::default();

        for (domain, by_path) in state {
            for (path, by_name) in by_path {
                let path = if path.starts_with('/') {
                    path.clone()
                } else {
                    format!("/{}", path)
                };

                for (name, value) in by_name {
                    let scheme = if value.secure { "https" } else { "http" };
                    let url = Url::parse(&format!("{}://{}{}", scheme, domain, path)).map_err(
                        |source| CookieJarError::InvalidScope {
                            domain: domain.clone(),
                            path: path.clone(),
                            source,
                        },
                    )?;

                    let mut cookie = RawCookie::new(name.clone(), value.value.clone());
                    cookie.set_path(path.clone());
                    cookie.set_secure(value.secure);
                    if let Some(expires) = value.expires {
                        cookie.set_expires(expires);
                    }

                    if let Err(e) = jar.store.insert_raw(&cookie, &url) {
                        tracing::debug!(domain = %domain, path = %path, name = %name, error = %e, "Skipping seeded cookie");
                    }
                    jar.record_visit(&url);
                }
            }
        }

        Ok(jar)
    }

    /// Remember `url` so its cookies are included on export.
    pub fn record_visit(&mut self, url: &Url) {
        let mut scope = url.clone();
        scope.set_query(None);
        scope.set_fragment(None);
        if !self.urls.contains(&scope) {
            self.urls.push(scope);
        }
    }

    /// Value for a `Cookie` request header, if any cookie applies to `url`.
    pub fn cookie_header(&self, url: &Url) -> Option<String> {
        let pairs: Vec<String> = self
            .store
            .get_request_values(url)
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();

        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }

    /// Apply every `Set-Cookie` header of a response received from `url`.
    pub fn store_response(&mut self, url: &Url, headers: &HeaderMap) {
        let cookies: Vec<RawCookie<'static>> = headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| match RawCookie::parse(value.to_string()) {
                Ok(cookie) => Some(cookie),
                Err(e) => {
                    tracing::debug!(url = %url, error = %e, "Ignoring malformed Set-Cookie");
                    None
                }
            })
            .collect();

        if !cookies.is_empty() {
            self.store.store_response_cookies(cookies.into_iter(), url);
        }
    }

    /// Export the jar, or `None` when it holds nothing for any known URL.
    pub fn to_plain(&self) -> Option<CookieState> {
        let mut plain = CookieState::new();

        for url in &self.urls {
            for cookie in self.store.matches(url) {
                let raw: &RawCookie<'_> = cookie;

                let domain = match raw.domain() {
                    Some(domain) if !domain.is_empty() => domain.to_string(),
                    _ => host_key(url),
                };
                let path = match raw.path() {
                    Some(path) if !path.is_empty() => path.to_string(),
                    _ => "/".to_string(),
                };
                let expires = match cookie.expires {
                    CookieExpiration::AtUtc(at) => Some(at),
                    CookieExpiration::SessionEnd => None,
                };

                plain
                    .entry(domain)
                    .or_default()
                    .entry(path)
                    .or_default()
                    .insert(
                        raw.name().to_string(),
                        CookieValue {
                            value: raw.value().to_string(),
                            expires,
                            secure: raw.secure().unwrap_or(false),
                        },
                    );
            }
        }

        if plain.is_empty() {
            None
        } else {
            Some(plain)
        }
    }
}

/// Host as used for host-only cookies: hostname plus explicit port.
fn host_key(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}
