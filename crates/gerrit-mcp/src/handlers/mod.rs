//! MCP Tool Handlers
//!
//! One async function per tool. They all follow the same shape:
//!
//! 1. resolve the base URL through [`Context::base_url`]
//! 2. build request arguments (free text and path segments percent-encoded)
//! 3. run them through the transport, possibly more than once
//! 4. parse defensively and turn the result into text
//!
//! Configuration errors always abort the call. Read-only tools turn every
//! other failure into text; mutating tools (in [`review`]) log transport
//! failures and return them as errors.
//!
//! [`Context::base_url`]: crate::context::Context::base_url

pub mod changes;
pub mod ci;
pub mod review;

use serde_json::{Map, Value};

use crate::Result;

/// Map a gateway failure to a text result, keeping configuration errors fatal.
pub(crate) fn recover(err: gerrit_core::Error) -> Result<String> {
    if err.is_config() {
        Err(err.into())
    } else {
        Ok(err.to_string())
    }
}

/// Like [`recover`], but with a caller-chosen rendering of the failure.
pub(crate) fn recover_with(
    err: gerrit_core::Error,
    render: impl FnOnce(&gerrit_core::Error) -> String,
) -> Result<String> {
    if err.is_config() {
        Err(err.into())
    } else {
        Ok(render(&err))
    }
}

pub(crate) fn parse_json(body: &str) -> gerrit_core::Result<Value> {
    serde_json::from_str(body).map_err(|_| gerrit_core::Error::response_parse(body))
}

/// Parse a body that must be a JSON array.
pub(crate) fn parse_array(body: &str) -> gerrit_core::Result<Vec<Value>> {
    match parse_json(body)? {
        Value::Array(items) => Ok(items),
        _ => Err(gerrit_core::Error::response_parse(body)),
    }
}

/// Parse a body that must be a JSON object.
pub(crate) fn parse_object(body: &str) -> gerrit_core::Result<Map<String, Value>> {
    match parse_json(body)? {
        Value::Object(map) => Ok(map),
        _ => Err(gerrit_core::Error::response_parse(body)),
    }
}

pub(crate) fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// `{base_url}/changes/{id}{tail}` with the id percent-encoded.
pub(crate) fn change_url(base_url: &str, change_id: &str, tail: &str) -> String {
    format!("{base_url}/changes/{}{tail}", encode(change_id))
}

/// `o=A&o=B` for a list of Gerrit query options.
pub(crate) fn option_params<S: AsRef<str>>(options: &[S]) -> String {
    options
        .iter()
        .map(|option| format!("o={}", option.as_ref()))
        .collect::<Vec<_>>()
        .join("&")
}

/// A string field, or `default` when missing or not a string.
pub(crate) fn str_or<'a>(value: &'a Value, key: &str, default: &'a str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or(default)
}
