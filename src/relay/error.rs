//! Failures that stop a relay before a target call is made.
//!
//! Failures of the target call itself are not errors at this level: they are
//! reported inside a successful [`RelayResult`](crate::relay::job::RelayResult).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::http::response::error_response;
use crate::relay::body::BodyError;
use crate::relay::cookies::CookieJarError;
use crate::relay::realise::HeaderError;

/// The job could not be turned into a request.
#[derive(Debug, Error)]
pub enum RequestBuildError {
    #[error("invalid method {0:?}")]
    Method(String),

    #[error("invalid URL {url:?}: {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("URL {0:?} cannot be used as a request target")]
    Target(String),

    #[error(transparent)]
    Header(#[from] HeaderError),
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("decoding job: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("building cookie jar: {0}")]
    CookieJar(#[from] CookieJarError),

    #[error("encoding body: {0}")]
    Body(#[from] BodyError),

    #[error("creating request: {0}")]
    Request(#[from] RequestBuildError),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::Decode(_) | RelayError::Body(_) => StatusCode::BAD_REQUEST,
            RelayError::CookieJar(_) | RelayError::Request(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            RelayError::Decode(_) => "error-decoding-proxy-payload",
            RelayError::CookieJar(_) => "error-creating-cookie-jar-in-proxy",
            RelayError::Body(BodyError::NotAnObject(_)) => "error-decoding-multipart-body",
            RelayError::Body(BodyError::UnsupportedFieldType { .. }) => {
                "unsupported-multipart-field-type"
            }
            RelayError::Body(BodyError::InvalidFileBody { .. }) => "error-decoding-file-body",
            RelayError::Request(_) => "error-creating-request-from-job",
        }
    }

    pub fn public_message(&self) -> &'static str {
        match self {
            RelayError::Decode(_) => "Error decoding proxy payload",
            RelayError::CookieJar(_) => "Error creating cookie jar",
            RelayError::Body(BodyError::NotAnObject(_)) => "Error decoding multipart body",
            RelayError::Body(BodyError::UnsupportedFieldType { .. }) => {
                "Unsupported multipart field type"
            }
            RelayError::Body(BodyError::InvalidFileBody { .. }) => "Error decoding file body",
            RelayError::Request(_) => "Error creating request from job",
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        if self.status().is_server_error() {
            tracing::error!(error = %self, code = self.code(), "Relay failed");
        } else {
            tracing::warn!(error = %self, code = self.code(), "Relay rejected");
        }
        error_response(self.status(), self.code(), self.public_message())
    }
}
