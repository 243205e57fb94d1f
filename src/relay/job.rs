//! Wire types exchanged with relay callers.

use serde::{Deserialize, Deserializer, Serialize};

use crate::relay::cookies::CookieState;

/// Ordered `[name, value]` header pairs. Duplicates are meaningful.
pub type HeaderTuples = Vec<(String, String)>;

/// How [`Job::body`] is to be interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum BodyType {
    #[default]
    #[serde(rename = "raw")]
    Raw,
    #[serde(rename = "multipart/form-data")]
    Multipart,
}

/// Anything but `"multipart/form-data"`, `null` included, is a raw body.
impl<'de> Deserialize<'de> for BodyType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let tag = Option::<String>::deserialize(deserializer)?;
        Ok(match tag.as_deref() {
            Some("multipart/form-data") => BodyType::Multipart,
            _ => BodyType::Raw,
        })
    }
}

/// `null` decodes like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A description of one HTTP call to perform on the caller's behalf.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Job {
    /// Opaque token echoed back in the result.
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub method: String,
    pub url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub headers: HeaderTuples,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cookies: CookieState,
    #[serde(default, deserialize_with = "null_as_default")]
    pub body: String,
    #[serde(default)]
    pub body_type: BodyType,
    /// Advisory only; the relay applies its own client timeout.
    #[serde(default)]
    pub timeout: Option<f64>,
}

impl Job {
    /// The request method, with an empty method meaning `GET`.
    pub fn method(&self) -> &str {
        if self.method.is_empty() {
            "GET"
        } else {
            &self.method
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RealisedRequest {
    pub method: String,
    pub headers: HeaderTuples,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealisedResponse {
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub headers: HeaderTuples,
    pub body: String,
    pub request: RealisedRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorMessage {
    pub message: String,
}

/// Outcome of one relay invocation.
#[derive(Debug, Clone, Serialize)]
pub struct RelayResult {
    pub id: String,
    pub response: Option<RealisedResponse>,
    /// Every redirect response followed, oldest first. `None` when there were none.
    pub history: Option<Vec<RealisedResponse>>,
    pub cookies: Option<CookieState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorMessage>,
}

impl RelayResult {
    pub fn failed(id: String, message: String) -> Self {
        Self {
            id,
            response: None,
            history: None,
            cookies: None,
            error: Some(ErrorMessage { message }),
        }
    }
}
