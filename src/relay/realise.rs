//! Conversion of live responses into their serialisable form.

use axum::body::{Body, HttpBody};
use bytes::Bytes;
use hyper::header::{HeaderMap, HeaderName, HeaderValue};
use hyper::{Method, Response, StatusCode};
use thiserror::Error;
use url::Url;

use crate::relay::job::{HeaderTuples, RealisedRequest, RealisedResponse};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("invalid header name {0:?}")]
    Name(String),
    #[error("invalid value for header {0:?}")]
    Value(String),
}

/// `content-type` → `Content-Type`: first letter and every letter after a
/// hyphen upper-cased, the rest lower-cased. Names containing bytes outside
/// the token set are returned unchanged.
pub fn canonical_header_name(name: &str) -> String {
    if !name.bytes().all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)) {
        return name.to_string();
    }

    let mut upper = true;
    name.chars()
        .map(|c| {
            let out = if upper {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            };
            upper = c == '-';
            out
        })
        .collect()
}

/// Header map to canonical tuples, keeping every value of repeated headers.
pub fn headers_to_tuples(headers: &HeaderMap) -> HeaderTuples {
    headers
        .iter()
        .map(|(name, value)| {
            (
                canonical_header_name(name.as_str()),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

/// Tuples to a header map, appending so duplicates survive.
pub fn tuples_to_headers(tuples: &HeaderTuples) -> Result<HeaderMap, HeaderError> {
    let mut headers = HeaderMap::with_capacity(tuples.len());
    for (name, value) in tuples {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| HeaderError::Name(name.clone()))?;
        let header_value =
            HeaderValue::from_str(value).map_err(|_| HeaderError::Value(name.clone()))?;
        headers.append(header_name, header_value);
    }
    Ok(headers)
}

/// `"<code> <reason>"`, preferring the reason phrase the server actually sent.
pub fn status_text<B>(response: &Response<B>) -> String {
    let status = response.status();
    let reason = response
        .extensions()
        .get::<hyper::ext::ReasonPhrase>()
        .map(|phrase| String::from_utf8_lossy(phrase.as_bytes()).into_owned())
        .or_else(|| status.canonical_reason().map(str::to_string));

    match reason {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}

/// Buffer `response` and describe it together with the request that produced it.
///
/// A body read failure is logged and results in an empty body.
pub async fn realise<B>(
    response: Response<B>,
    url: &Url,
    method: &Method,
    request_headers: &HeaderMap,
    max_body_bytes: usize,
) -> RealisedResponse
where
    B: HttpBody<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    let status: StatusCode = response.status();
    let status_text = status_text(&response);
    let headers = headers_to_tuples(response.headers());

    let body = match axum::body::to_bytes(Body::new(response.into_body()), max_body_bytes).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "Error reading relayed response body");
            String::new()
        }
    };

    RealisedResponse {
        url: url.to_string(),
        status: status.as_u16(),
        status_text,
        headers,
        body,
        request: RealisedRequest {
            method: method.to_string(),
            headers: headers_to_tuples(request_headers),
            body: String::new(),
        },
    }
}
