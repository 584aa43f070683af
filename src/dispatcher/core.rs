//! Dispatcher core module - the per-request [`Context`] and its one-shot
//! response slot.
//!
//! Every response helper on [`Context`] ends in [`Responder::dispatch`]. The
//! first dispatch wins an atomic compare-and-set and finalizes the response;
//! every later attempt is a logged no-op.

// Hot path: keep allocation-heavy idioms out.
#![deny(clippy::inefficient_to_string)]
#![deny(clippy::format_push_string)]

use http::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::SmallVec;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error};

use super::cookies::{parse_cookies, serialize_cookie, CookieOptions};
use crate::ids::{RequestId, REQUEST_ID_HEADER};
use crate::router::ParamVec;

/// Maximum inline headers/cookies before heap allocation
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated header/cookie storage.
///
/// Names are `Arc<str>`; request header names are lowercased by the transport.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const TEXT_CONTENT_TYPE: &str = "text/plain";

/// Body sent for any contained fault.
pub const INTERNAL_ERROR_BODY: &str = "Internal Server Error";

/// A query-string value. Keys seen once stay `Single`; repeats accumulate
/// into `Multiple` in arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    Single(String),
    Multiple(Vec<String>),
}

impl QueryValue {
    fn push(&mut self, value: String) {
        match self {
            QueryValue::Single(existing) => {
                let first = std::mem::take(existing);
                *self = QueryValue::Multiple(vec![first, value]);
            }
            QueryValue::Multiple(values) => values.push(value),
        }
    }

    #[must_use]
    pub fn first(&self) -> &str {
        match self {
            QueryValue::Single(v) => v,
            QueryValue::Multiple(values) => values.first().map_or("", String::as_str),
        }
    }

    #[must_use]
    pub fn last(&self) -> &str {
        match self {
            QueryValue::Single(v) => v,
            QueryValue::Multiple(values) => values.last().map_or("", String::as_str),
        }
    }

    /// All values in arrival order.
    #[must_use]
    pub fn values(&self) -> Vec<&str> {
        match self {
            QueryValue::Single(v) => vec![v.as_str()],
            QueryValue::Multiple(values) => values.iter().map(String::as_str).collect(),
        }
    }
}

/// Parse a raw query string (without the leading `?`).
#[must_use]
pub fn parse_query(raw: &str) -> HashMap<String, QueryValue> {
    let mut query: HashMap<String, QueryValue> = HashMap::new();
    for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
        let value = value.into_owned();
        match query.entry(key.into_owned()) {
            Entry::Occupied(mut existing) => existing.get_mut().push(value),
            Entry::Vacant(slot) => {
                slot.insert(QueryValue::Single(value));
            }
        }
    }
    query
}

/// What a dispatch sends.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Sent verbatim; defaults to `text/plain`.
    Text(String),
    /// Serialized with `serde_json`; defaults to `application/json`.
    Json(Value),
    /// No body and no default content type.
    Empty,
}

impl Payload {
    #[must_use]
    pub fn default_content_type(&self) -> Option<&'static str> {
        match self {
            Payload::Text(_) => Some(TEXT_CONTENT_TYPE),
            Payload::Json(_) => Some(JSON_CONTENT_TYPE),
            Payload::Empty => None,
        }
    }

    fn into_body(self) -> Vec<u8> {
        match self {
            Payload::Text(text) => text.into_bytes(),
            // A `Value` always serializes.
            Payload::Json(value) => serde_json::to_vec(&value).unwrap_or_default(),
            Payload::Empty => Vec::new(),
        }
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&String> for Payload {
    fn from(text: &String) -> Self {
        Payload::Text(text.clone())
    }
}

/// Primitives (strings, numbers, booleans) become text, everything else JSON.
impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => Payload::Text(s),
            Value::Number(n) => Payload::Text(n.to_string()),
            Value::Bool(b) => Payload::Text(b.to_string()),
            other => Payload::Json(other),
        }
    }
}

macro_rules! payload_from_display {
    ($($t:ty),*) => {
        $(impl From<$t> for Payload {
            fn from(v: $t) -> Self {
                Payload::Text(v.to_string())
            }
        })*
    };
}

payload_from_display!(bool, i32, i64, u16, u32, u64, usize, f64);

/// Per-dispatch overrides. Both fields win over anything set earlier with
/// [`Context::status`] or the payload's default content type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchOptions {
    pub status: Option<u16>,
    pub content_type: Option<String>,
}

impl DispatchOptions {
    #[must_use]
    pub fn status(code: u16) -> Self {
        Self {
            status: Some(code),
            content_type: None,
        }
    }

    #[must_use]
    pub fn content_type(content_type: impl Into<String>) -> Self {
        Self {
            status: None,
            content_type: Some(content_type.into()),
        }
    }

    #[must_use]
    pub fn with_status(mut self, code: u16) -> Self {
        self.status = Some(code);
        self
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// The finalized response handed to the transport.
///
/// `status` is `None` when nothing chose one; the transport sends 200.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerResponse {
    pub status: Option<u16>,
    pub headers: HeaderVec,
    pub body: Vec<u8>,
}

impl HandlerResponse {
    #[must_use]
    pub fn status_or_default(&self) -> u16 {
        self.status.unwrap_or(200)
    }

    /// First header with this name (case-insensitive).
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value for this header name, in insertion order.
    #[must_use]
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    #[must_use]
    pub fn body_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

#[derive(Debug, Default)]
struct SlotState {
    status: Option<u16>,
    headers: HeaderVec,
    finalized: Option<HandlerResponse>,
}

#[derive(Debug, Default)]
struct ResponseSlot {
    responded: AtomicBool,
    state: Mutex<SlotState>,
}

impl ResponseSlot {
    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cloneable handle onto a request's response slot.
///
/// Clones can be moved into other coroutines; whichever handle dispatches
/// first wins.
#[derive(Debug, Clone)]
pub struct Responder {
    slot: Arc<ResponseSlot>,
    request_id: RequestId,
}

impl Responder {
    fn new(request_id: RequestId) -> Self {
        Self {
            slot: Arc::new(ResponseSlot::default()),
            request_id,
        }
    }

    #[must_use]
    pub fn responded(&self) -> bool {
        self.slot.responded.load(Ordering::Acquire)
    }

    /// Finalize the response. Returns `false` (and changes nothing) if a
    /// response was already dispatched.
    pub fn dispatch(&self, payload: impl Into<Payload>, options: DispatchOptions) -> bool {
        // Held until `finalized` is stored: a reader that sees the slot
        // claimed also sees the response.
        let mut state = self.slot.lock();
        if self
            .slot
            .responded
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(request_id = %self.request_id, "Duplicate dispatch ignored");
            return false;
        }

        let payload = payload.into();
        let status = options.status.or(state.status);
        let content_type = options
            .content_type
            .or_else(|| payload.default_content_type().map(str::to_string));

        let mut headers = std::mem::take(&mut state.headers);
        if let Some(content_type) = content_type {
            headers.retain(|(k, _)| !k.eq_ignore_ascii_case("content-type"));
            headers.push((Arc::from("content-type"), content_type));
        }

        debug!(request_id = %self.request_id, status = ?status, "Response dispatched");
        state.finalized = Some(HandlerResponse {
            status,
            headers,
            body: payload.into_body(),
        });
        true
    }

    fn set_status(&self, code: u16) {
        let mut state = self.slot.lock();
        if !self.responded() {
            state.status = Some(code);
        }
    }

    fn set_header(&self, name: &str, value: String) {
        let mut state = self.slot.lock();
        if !self.responded() {
            state.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
            state.headers.push((Arc::from(name), value));
        }
    }

    fn append_header(&self, name: &str, value: String) {
        let mut state = self.slot.lock();
        if !self.responded() {
            state.headers.push((Arc::from(name), value));
        }
    }

    /// Status of the finalized response (200 when none was chosen), or
    /// `None` before dispatch.
    #[must_use]
    pub fn sent_status(&self) -> Option<u16> {
        self.slot
            .lock()
            .finalized
            .as_ref()
            .map(HandlerResponse::status_or_default)
    }

    /// Take the finalized response, if any. Later calls return `None`.
    #[must_use]
    pub fn take_response(&self) -> Option<HandlerResponse> {
        self.slot.lock().finalized.take()
    }
}

/// Per-request record shared by every middleware and the handler.
#[derive(Debug)]
pub struct Context {
    /// Correlation id for logs
    pub request_id: RequestId,
    method: Method,
    url: String,
    path: String,
    query: HashMap<String, QueryValue>,
    headers: HeaderVec,
    cookies: HeaderVec,
    params: ParamVec,
    state: HashMap<String, Value>,
    /// Parsed JSON request body, populated by [`JsonBody`](crate::middleware::JsonBody)
    pub body: Option<Value>,
    raw_body: Vec<u8>,
    responder: Responder,
}

impl Context {
    /// Build a context from raw request parts.
    ///
    /// `url` is the request target (path plus optional query). Header names
    /// are expected lowercase.
    #[must_use]
    pub fn new(method: Method, url: &str, headers: HeaderVec, raw_body: Vec<u8>) -> Self {
        let target = url.split('#').next().unwrap_or_default();
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, parse_query(query)),
            None => (target, HashMap::new()),
        };
        let path = if path.is_empty() { "/" } else { path };

        let find = |name: &str| {
            headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        };
        let request_id = RequestId::from_header_or_new(find(REQUEST_ID_HEADER));
        let cookies = parse_cookies(find("cookie"));

        Self {
            request_id,
            method,
            url: url.to_string(),
            path: path.to_string(),
            query,
            cookies,
            headers,
            params: ParamVec::new(),
            state: HashMap::new(),
            body: None,
            raw_body,
            responder: Responder::new(request_id),
        }
    }

    // --- request -------------------------------------------------------

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request target as received.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The path without the query string.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn query(&self) -> &HashMap<String, QueryValue> {
        &self.query
    }

    /// Last value for a query key.
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(QueryValue::last)
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderVec {
        &self.headers
    }

    /// Get a request header by name (case-insensitive per RFC 7230)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn cookies(&self) -> &HeaderVec {
        &self.cookies
    }

    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Captured path parameters. Empty until the route is resolved, so
    /// middleware running before the handler never sees them.
    #[must_use]
    pub fn params(&self) -> &ParamVec {
        &self.params
    }

    /// Get a path parameter by name (last occurrence wins).
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    pub(crate) fn set_params(&mut self, params: ParamVec) {
        self.params = params;
    }

    #[must_use]
    pub fn raw_body(&self) -> &[u8] {
        &self.raw_body
    }

    // --- state -----------------------------------------------------------

    #[must_use]
    pub fn state(&self) -> &HashMap<String, Value> {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut HashMap<String, Value> {
        &mut self.state
    }

    #[must_use]
    pub fn get_state(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    /// Deserialize a state entry into `T`; `None` if absent or mistyped.
    #[must_use]
    pub fn state_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.state
            .get(key)
            .and_then(|v| T::deserialize(v).ok())
    }

    pub fn set_state(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.state.insert(key.into(), value.into());
    }

    /// Append to an array entry, creating it (or replacing a non-array) first.
    pub fn push_state(&mut self, key: &str, value: impl Into<Value>) {
        let entry = self
            .state
            .entry(key.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if !entry.is_array() {
            *entry = Value::Array(Vec::new());
        }
        if let Value::Array(items) = entry {
            items.push(value.into());
        }
    }

    // --- response --------------------------------------------------------

    /// The single response-sending operation. Returns `false` if a response
    /// was already dispatched; the call is then a no-op.
    pub fn dispatch(&self, payload: impl Into<Payload>, options: DispatchOptions) -> bool {
        self.responder.dispatch(payload, options)
    }

    /// Dispatch with default options; JSON or text by payload shape.
    pub fn message_back(&self, payload: impl Into<Payload>) -> bool {
        self.dispatch(payload, DispatchOptions::default())
    }

    /// Set the status applied at dispatch time unless the dispatch options
    /// name one.
    pub fn status(&self, code: u16) -> &Self {
        self.responder.set_status(code);
        self
    }

    /// Set a response header, replacing any earlier value with that name.
    pub fn set_header(&self, name: &str, value: impl Into<String>) -> &Self {
        self.responder.set_header(name, value.into());
        self
    }

    /// Dispatch `data` serialized as JSON, even when it is a bare string.
    pub fn json<T: Serialize>(&self, data: T) -> bool {
        match serde_json::to_value(data) {
            Ok(value) => self.dispatch(Payload::Json(value), DispatchOptions::default()),
            Err(err) => {
                error!(request_id = %self.request_id, error = %err, "Response serialization failed");
                self.dispatch(INTERNAL_ERROR_BODY, DispatchOptions::status(500))
            }
        }
    }

    /// Dispatch literal text.
    pub fn text(&self, data: impl Into<String>) -> bool {
        self.dispatch(Payload::Text(data.into()), DispatchOptions::default())
    }

    /// Redirect with 302.
    pub fn redirect(&self, location: &str) -> bool {
        self.redirect_with_status(location, 302)
    }

    pub fn redirect_with_status(&self, location: &str, code: u16) -> bool {
        self.set_header("location", location);
        self.dispatch(Payload::Empty, DispatchOptions::status(code))
    }

    /// Append a `Set-Cookie` header; repeated calls add more headers.
    pub fn set_cookie(&self, name: &str, value: &str, options: &CookieOptions) -> &Self {
        self.responder
            .append_header("set-cookie", serialize_cookie(name, value, options));
        self
    }

    #[must_use]
    pub fn responded(&self) -> bool {
        self.responder.responded()
    }

    /// See [`Responder::sent_status`].
    #[must_use]
    pub fn sent_status(&self) -> Option<u16> {
        self.responder.sent_status()
    }

    /// A handle that can dispatch for this request from elsewhere.
    #[must_use]
    pub fn responder(&self) -> Responder {
        self.responder.clone()
    }

    /// Take the finalized response for the transport.
    #[must_use]
    pub fn take_response(&self) -> Option<HandlerResponse> {
        self.responder.take_response()
    }
}
