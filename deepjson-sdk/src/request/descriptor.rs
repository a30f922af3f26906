//! Transport-independent request descriptors and payloads.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;

use crate::errors::Result;
use crate::util::invalid;

/// Content type applied when a request sets none and is not multipart.
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
/// Content type of JSON command bodies such as `/cmd/move`.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Header asking the server to replace an existing key.
pub const X_OVERRIDE_EXISTING: HeaderName = HeaderName::from_static("x-override-existing");
/// Header carrying the logical method when GET travels as POST.
pub const X_METHOD_OVERRIDE: HeaderName = HeaderName::from_static("x-method-override");

const SCRIPT_OPEN: &str = "javascript:\n";
const SCRIPT_CLOSE: &str = "\n\njavascript!\n\n";

/// A single file carried in a multipart form under the field `file`.
#[derive(Clone, PartialEq, Eq)]
pub struct FilePart {
    /// Form field name. Always `file` for uploads.
    pub field: String,
    /// File name announced in the part's `Content-Disposition`.
    pub file_name: String,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for FilePart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilePart")
            .field("field", &self.field)
            .field("file_name", &self.file_name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Request payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Body {
    /// No body.
    #[default]
    Empty,
    /// UTF-8 text, sent verbatim.
    Text(String),
    /// Raw bytes, sent verbatim.
    Bytes(Vec<u8>),
    /// Multipart form holding one file.
    Multipart(FilePart),
}

impl Body {
    /// Prefix the payload with `script` between the sentinel markers the
    /// server looks for: `javascript:\n<script>\n\njavascript!\n\n<data>`.
    pub fn wrap_script(self, script: &str) -> Body {
        let prefix = format!("{SCRIPT_OPEN}{script}{SCRIPT_CLOSE}");
        match self {
            Body::Empty => Body::Text(prefix),
            Body::Text(data) => Body::Text(prefix + &data),
            Body::Bytes(data) => {
                let mut out = prefix.into_bytes();
                out.extend_from_slice(&data);
                Body::Bytes(out)
            }
            // Multipart bodies carry files, never scripts.
            form @ Body::Multipart(_) => form,
        }
    }

    /// `true` for [`Body::Multipart`].
    pub fn is_multipart(&self) -> bool {
        matches!(self, Body::Multipart(_))
    }
}

impl From<String> for Body {
    fn from(value: String) -> Self {
        Body::Text(value)
    }
}

impl From<&str> for Body {
    fn from(value: &str) -> Self {
        Body::Text(value.to_string())
    }
}

impl From<&String> for Body {
    fn from(value: &String) -> Self {
        Body::Text(value.clone())
    }
}

impl From<Vec<u8>> for Body {
    fn from(value: Vec<u8>) -> Self {
        Body::Bytes(value)
    }
}

impl From<&[u8]> for Body {
    fn from(value: &[u8]) -> Self {
        Body::Bytes(value.to_vec())
    }
}

impl From<&serde_json::Value> for Body {
    fn from(value: &serde_json::Value) -> Self {
        Body::Text(value.to_string())
    }
}

impl From<serde_json::Value> for Body {
    fn from(value: serde_json::Value) -> Self {
        Body::from(&value)
    }
}

/// Fully specified HTTP request, independent of any transport.
///
/// Produced by the functions in [`crate::request`]; the client finalizes it
/// with the current token and hands it to reqwest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    /// HTTP method.
    pub method: Method,
    /// Percent-encoded absolute path, relative to the client's base URL.
    pub path: String,
    /// Query parameters, in insertion order.
    pub query: Vec<(String, String)>,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request payload.
    pub body: Body,
}

impl RequestDescriptor {
    pub(crate) fn new(method: Method, path: String) -> Self {
        Self {
            method,
            path,
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: Body::Empty,
        }
    }

    pub(crate) fn query_pair(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub(crate) fn header(mut self, name: HeaderName, value: &'static str) -> Self {
        self.headers.insert(name, HeaderValue::from_static(value));
        self
    }

    pub(crate) fn body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    /// Value of a query parameter, if present.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Value of a header as `&str`, if present and visible ASCII.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Merge the authorization header and settle the content type.
    ///
    /// - `Authorization: Bearer <token>` is added only when a token is present.
    /// - Multipart bodies never carry a content type here; the transport
    ///   sets it together with the boundary.
    /// - Every other body gets [`DEFAULT_CONTENT_TYPE`] unless one is set already.
    pub fn finalize(mut self, token: Option<&str>) -> Result<Self> {
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| invalid(format!("token is not a valid header value: {e}")))?;
            self.headers.insert(AUTHORIZATION, value);
        }

        if self.body.is_multipart() {
            self.headers.remove(CONTENT_TYPE);
        } else if !self.headers.contains_key(CONTENT_TYPE) {
            self.headers
                .insert(CONTENT_TYPE, HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
        }

        Ok(self)
    }
}
