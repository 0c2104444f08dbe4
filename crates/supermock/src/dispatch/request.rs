//! Request snapshot and response sink shared by every strategy.

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use hyper::{HeaderMap, Method, Response, StatusCode, Uri};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// A fully buffered inbound request.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl InboundRequest {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            method,
            uri,
            headers,
            body,
        }
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn query_string(&self) -> Option<&str> {
        self.uri.query()
    }

    /// Path plus query string, as the client sent it.
    pub fn url(&self) -> String {
        self.uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string())
    }

    pub fn query(&self) -> BTreeMap<String, String> {
        parse_query_string(self.query_string())
    }

    /// Headers with lower-case names; non-UTF-8 values are skipped.
    pub fn header_map(&self) -> BTreeMap<String, String> {
        self.headers
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|val| (k.as_str().to_lowercase(), val.to_string()))
            })
            .collect()
    }

    /// Body as JSON when it parses, otherwise as a string; empty is null.
    pub fn body_json(&self) -> Value {
        if self.body.is_empty() {
            return Value::Null;
        }
        serde_json::from_slice(&self.body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&self.body).into_owned()))
    }
}

/// Parse a query string, percent-decoding keys and values. `+` is a space.
pub fn parse_query_string(query: Option<&str>) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    let Some(q) = query else {
        return params;
    };
    let decode = |s: &str| {
        let s = s.replace('+', " ");
        urlencoding::decode(&s)
            .map(|v| v.into_owned())
            .unwrap_or(s)
    };
    for pair in q.split('&').filter(|p| !p.is_empty()) {
        match pair.split_once('=') {
            Some((key, value)) => params.insert(decode(key), decode(value)),
            None => params.insert(decode(pair), String::new()),
        };
    }
    params
}

/// Response being assembled across candidates.
///
/// Status and headers set by a strategy that then continues stay in place
/// for the next candidate. A proxied body that is not written directly is
/// stashed here; if no later candidate responds it becomes the response.
#[derive(Debug, Clone)]
pub struct ResponseSink {
    status: StatusCode,
    headers: HeaderMap,
    stashed: Option<Bytes>,
}

impl Default for ResponseSink {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            stashed: None,
        }
    }
}

impl ResponseSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Set a numeric status; codes outside 100..=999 are ignored.
    pub fn set_status_code(&mut self, code: u16) -> bool {
        match StatusCode::from_u16(code) {
            Ok(status) => {
                self.status = status;
                true
            }
            Err(_) => {
                debug!("Ignoring invalid status code {}", code);
                false
            }
        }
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Replace a header. Names or values that are not valid HTTP are dropped.
    pub fn set_header(&mut self, key: &str, value: &str) -> bool {
        match (
            HeaderName::from_bytes(key.trim().as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
                true
            }
            _ => {
                debug!("Ignoring invalid header {}: {}", key, value);
                false
            }
        }
    }

    pub fn stash(&mut self, body: Bytes) {
        self.stashed = Some(body);
    }

    pub fn has_stash(&self) -> bool {
        self.stashed.is_some()
    }

    /// Build the response with the current status and headers.
    pub fn finish(&mut self, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(body.into()));
        *response.status_mut() = self.status;
        *response.headers_mut() = std::mem::take(&mut self.headers);
        self.stashed = None;
        response
    }

    /// JSON response; `content-type` only set when nothing set it before.
    pub fn json(&mut self, value: &Value) -> Response<Full<Bytes>> {
        if !self.headers.contains_key(CONTENT_TYPE) {
            self.headers
                .insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        }
        let body = serde_json::to_vec(value).unwrap_or_default();
        self.finish(body)
    }

    /// Turn a stashed body into the final response, if there is one.
    pub fn into_stashed(mut self) -> Option<Response<Full<Bytes>>> {
        let body = self.stashed.take()?;
        Some(self.finish(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn test_parse_query_string() {
        let q = parse_query_string(Some("a=1&b=hello%20world&c&d=x+y"));
        assert_eq!(q.get("a").map(String::as_str), Some("1"));
        assert_eq!(q.get("b").map(String::as_str), Some("hello world"));
        assert_eq!(q.get("c").map(String::as_str), Some(""));
        assert_eq!(q.get("d").map(String::as_str), Some("x y"));
        assert!(parse_query_string(None).is_empty());
    }

    #[test]
    fn test_body_json_fallbacks() {
        let req = |body: &'static str| {
            InboundRequest::new(
                Method::POST,
                Uri::from_static("/x"),
                HeaderMap::new(),
                Bytes::from_static(body.as_bytes()),
            )
        };
        assert_eq!(req("").body_json(), Value::Null);
        assert_eq!(req(r#"{"a":1}"#).body_json()["a"], 1);
        assert_eq!(req("plain").body_json(), Value::String("plain".into()));
    }

    #[tokio::test]
    async fn test_sink_keeps_explicit_content_type() {
        let mut sink = ResponseSink::new();
        sink.set_status_code(201);
        sink.set_header("Content-Type", "application/vnd.test+json");
        assert!(!sink.set_header("bad header", "x"));
        assert!(!sink.set_status_code(42));

        let response = sink.json(&serde_json::json!({"a": "b"}));
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/vnd.test+json"
        );
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], br#"{"a":"b"}"#);
    }

    #[test]
    fn test_stash_becomes_response() {
        let mut sink = ResponseSink::new();
        assert!(ResponseSink::new().into_stashed().is_none());
        sink.set_status(StatusCode::ACCEPTED);
        sink.stash(Bytes::from_static(b"\x00\x01"));
        let response = sink.into_stashed().unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }
}
