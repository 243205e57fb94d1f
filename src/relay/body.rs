//! Request payload construction from a job's declarative body.
//!
//! # Data Flow
//! ```text
//! job.body + job.bodyType
//!     → BodyKind::decode (raw bytes, or JSON object → Vec<FormPart>)
//!     → BodyKind::encode (bytes + optional content-type override)
//! ```
//!
//! Multipart payloads are fully materialised so the same bytes can be replayed
//! when a 307/308 redirect asks for the body again.

use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use bytes::{BufMut, Bytes, BytesMut};
use rand::Rng;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::relay::job::BodyType;

#[derive(Debug, Error)]
pub enum BodyError {
    #[error("multipart body is not a JSON object: {0}")]
    NotAnObject(#[source] serde_json::Error),

    #[error("unsupported value type for field {field}: {kind}")]
    UnsupportedFieldType { field: String, kind: &'static str },

    #[error("invalid base64 in file body for field {field}: {source}")]
    InvalidFileBody {
        field: String,
        #[source]
        source: base64::DecodeError,
    },
}

/// One part of a `multipart/form-data` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormPart {
    Field {
        name: String,
        value: String,
    },
    File {
        name: String,
        filename: String,
        content_type: String,
        bytes: Vec<u8>,
    },
}

/// The decoded shape of a job body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyKind {
    Raw(Bytes),
    Multipart(Vec<FormPart>),
}

/// Encoded request payload.
#[derive(Debug, Clone)]
pub struct EncodedBody {
    pub bytes: Bytes,
    /// Replaces any caller supplied `Content-Type` when set.
    pub content_type: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct FileField {
    name: String,
    #[serde(rename = "type")]
    content_type: String,
    body: String,
}

impl BodyKind {
    /// Decode `body` according to `body_type`.
    pub fn decode(body: &str, body_type: BodyType) -> Result<Self, BodyError> {
        match body_type {
            BodyType::Raw => Ok(BodyKind::Raw(Bytes::copy_from_slice(body.as_bytes()))),
            BodyType::Multipart => {
                let fields: serde_json::Map<String, Value> =
                    serde_json::from_str(body).map_err(BodyError::NotAnObject)?;

                let parts = fields
                    .into_iter()
                    .map(|(name, value)| form_part(name, value))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(BodyKind::Multipart(parts))
            }
        }
    }

    /// Produce the payload bytes and, for multipart, the boundary-bearing content type.
    pub fn encode(self) -> EncodedBody {
        match self {
            BodyKind::Raw(bytes) => EncodedBody {
                bytes,
                content_type: None,
            },
            BodyKind::Multipart(parts) => {
                let writer = MultipartWriter::new(random_boundary());
                let content_type = writer.content_type();
                EncodedBody {
                    bytes: writer.write(&parts),
                    content_type: Some(content_type),
                }
            }
        }
    }
}

fn form_part(name: String, value: Value) -> Result<FormPart, BodyError> {
    match value {
        Value::String(value) => Ok(FormPart::Field { name, value }),
        Value::Null => Ok(FormPart::Field {
            name,
            value: "null".to_string(),
        }),
        Value::Object(_) => {
            let file: FileField =
                serde_json::from_value(value).map_err(|_| BodyError::UnsupportedFieldType {
                    field: name.clone(),
                    kind: "object",
                })?;
            let bytes = B64
                .decode(file.body.as_bytes())
                .map_err(|source| BodyError::InvalidFileBody {
                    field: name.clone(),
                    source,
                })?;
            Ok(FormPart::File {
                name,
                filename: file.name,
                content_type: file.content_type,
                bytes,
            })
        }
        other => Err(BodyError::UnsupportedFieldType {
            field: name,
            kind: json_kind(&other),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn random_boundary() -> String {
    let mut raw = [0u8; 30];
    rand::thread_rng().fill(&mut raw);
    raw.iter().map(|b| format!("{:02x}", b)).collect()
}

fn escape_quotes(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Minimal `multipart/form-data` writer that lets file parts carry their own
/// content type.
struct MultipartWriter {
    boundary: String,
}

impl MultipartWriter {
    fn new(boundary: String) -> Self {
        Self { boundary }
    }

    fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    fn write(&self, parts: &[FormPart]) -> Bytes {
        let mut buf = BytesMut::new();

        for part in parts {
            buf.put_slice(format!("--{}\r\n", self.boundary).as_bytes());
            match part {
                FormPart::Field { name, value } => {
                    buf.put_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                            escape_quotes(name)
                        )
                        .as_bytes(),
                    );
                    buf.put_slice(value.as_bytes());
                }
                FormPart::File {
                    name,
                    filename,
                    content_type,
                    bytes,
                } => {
                    buf.put_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                            escape_quotes(name),
                            escape_quotes(filename),
                            content_type
                        )
                        .as_bytes(),
                    );
                    buf.put_slice(bytes);
                }
            }
            buf.put_slice(b"\r\n");
        }

        buf.put_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        buf.freeze()
    }
}
