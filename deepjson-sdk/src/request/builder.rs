//! Translation of logical DeepJSON operations into [`RequestDescriptor`]s.
//!
//! Nothing here performs I/O. The client feeds the descriptors through
//! [`RequestDescriptor::finalize`] and then onto the wire.

use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde::Serialize;
use url::Url;

use super::descriptor::{
    Body, FilePart, RequestDescriptor, JSON_CONTENT_TYPE, X_METHOD_OVERRIDE, X_OVERRIDE_EXISTING,
};
use super::filter::KeyFilter;
use super::options::{GetOptions, PostOptions, PutOptions};
use crate::errors::Result;
use crate::util::invalid;

/// Path of the move command.
pub const MOVE_PATH: &str = "/cmd/move";
/// Path of the key listing command.
pub const LIST_KEYS_PATH: &str = "/cmd/keys";
/// Query parameter carrying the listing filter.
pub const LIST_KEYS_PARAM: &str = "keys";

/// Percent-encode `key` under `/keys/`, keeping `/` as a segment separator.
///
/// Empty keys and keys with `.` or `..` segments are rejected.
pub fn key_path(key: &str) -> Result<String> {
    let key = key.trim_start_matches('/');
    if key.is_empty() {
        return Err(invalid("resource key cannot be empty"));
    }

    let mut u = Url::parse("dummy:///").map_err(|e| invalid(format!("internal URL setup failed: {e}")))?;
    {
        let mut segs = u
            .path_segments_mut()
            .map_err(|()| invalid("internal URL path handling failed"))?;
        segs.clear().push("keys");
        for seg in key.split('/') {
            // URL normalization would resolve these into another key.
            if seg == "." || seg == ".." {
                return Err(invalid(format!("resource key `{key}` has a `{seg}` segment")));
            }
            segs.push(seg);
        }
    }
    Ok(u.path().to_string())
}

fn with_script(body: Body, script: Option<&str>) -> Body {
    match script {
        Some(script) => body.wrap_script(script),
        None => body,
    }
}

/// `GET /keys/{key}`, or `POST` + `X-Method-Override: GET` when `get_body` is set.
///
/// With `binary`, the query carries `binary=true` and the current token.
pub fn build_get(
    key: &str,
    value: Body,
    opts: &GetOptions,
    token: Option<&str>,
) -> Result<RequestDescriptor> {
    let mut desc = if opts.get_body {
        RequestDescriptor::new(Method::POST, key_path(key)?).header(X_METHOD_OVERRIDE, "GET")
    } else {
        RequestDescriptor::new(Method::GET, key_path(key)?)
    };

    if opts.binary {
        desc = desc.query_pair("binary", "true");
        if let Some(token) = token {
            desc = desc.query_pair("token", token);
        }
    }

    // An empty GET value is no body at all.
    let value = match value {
        Body::Text(text) if text.is_empty() => Body::Empty,
        other => other,
    };
    Ok(desc.body(with_script(value, opts.script.as_deref())))
}

/// `POST /keys/{key}`; `X-Override-Existing: true` only when `overwrite_key` is set.
pub fn build_post(key: &str, value: Body, opts: &PostOptions) -> Result<RequestDescriptor> {
    let mut desc = RequestDescriptor::new(Method::POST, key_path(key)?);
    if opts.overwrite_key {
        desc = desc.header(X_OVERRIDE_EXISTING, "true");
    }
    Ok(desc.body(with_script(value, opts.script.as_deref())))
}

/// `PUT /keys/{key}`.
pub fn build_put(key: &str, value: Body, opts: &PutOptions) -> Result<RequestDescriptor> {
    Ok(RequestDescriptor::new(Method::PUT, key_path(key)?)
        .body(with_script(value, opts.script.as_deref())))
}

/// `DELETE /keys/{key}` without a body.
pub fn build_delete(key: &str) -> Result<RequestDescriptor> {
    Ok(RequestDescriptor::new(Method::DELETE, key_path(key)?))
}

#[derive(Serialize)]
struct MoveCommand<'a> {
    from: &'a str,
    to: &'a str,
}

/// `POST /cmd/move` with a JSON `{from, to}` body.
pub fn build_move(from: &str, to: &str) -> Result<RequestDescriptor> {
    let body = serde_json::to_string(&MoveCommand { from, to }).map_err(|e| {
        invalid(format!("failed to encode move command: {e}"))
    })?;
    Ok(RequestDescriptor::new(Method::POST, MOVE_PATH.to_string())
        .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
        .body(Body::Text(body)))
}

/// `POST /keys/{key}` with a multipart form holding `file`.
///
/// `X-Override-Existing` is always present, as `"true"` or `"false"`.
pub fn build_upload(key: &str, file: FilePart, overwrite: bool) -> Result<RequestDescriptor> {
    Ok(RequestDescriptor::new(Method::POST, key_path(key)?)
        .header(X_OVERRIDE_EXISTING, if overwrite { "true" } else { "false" })
        .body(Body::Multipart(file)))
}

/// `GET /cmd/keys`, with the filter in the `keys` query parameter when given.
pub fn build_list_keys(filter: &KeyFilter) -> RequestDescriptor {
    let desc = RequestDescriptor::new(Method::GET, LIST_KEYS_PATH.to_string());
    match filter.query_value() {
        Some(value) => desc.query_pair(LIST_KEYS_PARAM, value),
        None => desc,
    }
}
