use super::static_response::apply_headers;
use super::StrategyContext;
use crate::dispatch::{DispatchError, InboundRequest, Outcome, ResponseSink};
use crate::metrics;
use crate::registry::Rule;
use crate::routing::PathMatch;
use hyper::header::{HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE, HOST};
use hyper::HeaderMap;
use reqwest::Url;
use tracing::{debug, warn};

pub const PROXY_AGENT: &str = "supermock";

/// Headers that describe one connection and are never forwarded.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Upstream of a proxy rule, parsed when the rule is bound.
pub struct ProxyTarget {
    target: Option<Result<Url, String>>,
}

impl ProxyTarget {
    pub fn new(rule: &Rule) -> Self {
        let target = rule
            .redirect_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(|url| Url::parse(url).map_err(|e| e.to_string()));
        Self { target }
    }

    /// Forward the request upstream.
    ///
    /// Rule `statusCode` and enabled `headers` override the upstream's.
    /// Textual upstream bodies are written directly. Anything else is
    /// stashed and the request continues, so a later rule can still answer.
    pub async fn forward(
        &self,
        ctx: &StrategyContext,
        rule: &Rule,
        req: &InboundRequest,
        route: &PathMatch,
        sink: &mut ResponseSink,
    ) -> Result<Outcome, DispatchError> {
        let base = match &self.target {
            None => {
                warn!("Proxy rule {} has no redirectUrl", rule.id);
                return Ok(Outcome::Next);
            }
            Some(Err(reason)) => {
                return Err(DispatchError::InvalidUpstream {
                    url: rule.redirect_url.clone().unwrap_or_default(),
                    reason: reason.clone(),
                })
            }
            Some(Ok(url)) => url,
        };
        let url = upstream_url(base, route.rest.as_deref(), req.query_string());
        debug!("Proxy request to: [{}] {}", req.method, url);

        let mut request = ctx
            .http()
            .request(req.method.clone(), url.clone())
            .headers(forward_headers(rule, req, &url));
        if !req.body.is_empty() {
            request = request.body(req.body.clone());
        }

        let response = request.send().await.map_err(|source| {
            metrics::record_upstream_error();
            DispatchError::Upstream {
                url: url.to_string(),
                source,
            }
        })?;

        sink.set_status(response.status());
        for (name, value) in response.headers() {
            if !is_hop_by_hop(name.as_str()) && name != CONTENT_LENGTH {
                sink.headers_mut().insert(name.clone(), value.clone());
            }
        }
        if let Some(code) = rule.status_code {
            sink.set_status_code(code);
        }
        apply_headers(&rule.headers, sink);

        let textual = is_textual(sink.headers());
        let body = response.bytes().await.map_err(|source| {
            metrics::record_upstream_error();
            DispatchError::Upstream {
                url: url.to_string(),
                source,
            }
        })?;

        if textual {
            Ok(Outcome::Respond(sink.finish(body)))
        } else {
            sink.stash(body);
            Ok(Outcome::Next)
        }
    }
}

/// Append the wildcard sub-path and the request's query to the base URL.
fn upstream_url(base: &Url, rest: Option<&str>, query: Option<&str>) -> Url {
    let mut url = base.clone();
    if let Some(rest) = rest.filter(|r| !r.is_empty()) {
        let path = format!("{}/{}", base.path().trim_end_matches('/'), rest);
        url.set_path(&path);
    }
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        let merged = match base.query() {
            Some(existing) if !existing.is_empty() => format!("{existing}&{query}"),
            _ => query.to_string(),
        };
        url.set_query(Some(&merged));
    }
    url
}

fn forward_headers(rule: &Rule, req: &InboundRequest, url: &Url) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(req.headers.len() + 2);
    for (name, value) in &req.headers {
        if name != HOST && name != CONTENT_LENGTH && !is_hop_by_hop(name.as_str()) {
            headers.append(name.clone(), value.clone());
        }
    }

    headers.insert(
        HeaderName::from_static("proxy-agent"),
        HeaderValue::from_static(PROXY_AGENT),
    );
    let host = match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        _ => String::new(),
    };
    if let Ok(value) = HeaderValue::from_str(&host) {
        headers.insert(HOST, value);
    }

    for extra in rule.additional_request_headers.iter().filter(|h| !h.disabled) {
        match (
            HeaderName::from_bytes(extra.key.trim().as_bytes()),
            HeaderValue::from_str(&extra.value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => debug!("Skipping invalid request header {}", extra.key),
        }
    }
    headers
}

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h))
}

/// Text, JSON, XML and JavaScript bodies are written directly. A response
/// without a content type counts as text.
fn is_textual(headers: &HeaderMap) -> bool {
    let Some(content_type) = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return true;
    };
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime.starts_with("text/")
        || mime.ends_with("json")
        || mime.ends_with("xml")
        || mime.ends_with("javascript")
        || mime == "application/x-www-form-urlencoded"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::HeaderEntry;
    use bytes::Bytes;
    use hyper::{Method, Uri};

    #[test]
    fn test_upstream_url_appends_rest_and_query() {
        let base = Url::parse("http://up:8080/api/?k=1").unwrap();
        let url = upstream_url(&base, Some("users/7"), Some("q=2"));
        assert_eq!(url.as_str(), "http://up:8080/api/users/7?k=1&q=2");

        let plain = Url::parse("http://up/api").unwrap();
        assert_eq!(upstream_url(&plain, Some(""), None).as_str(), "http://up/api");
    }

    #[test]
    fn test_forward_headers() {
        let mut rule = Rule::with_path("x");
        rule.additional_request_headers = vec![
            HeaderEntry::new("ah1", "av1"),
            HeaderEntry {
                key: "ah2".into(),
                value: "av2".into(),
                disabled: true,
            },
        ];
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("mock.local"));
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("3"));
        headers.insert("connection", HeaderValue::from_static("keep-alive"));
        headers.insert("x-client", HeaderValue::from_static("yes"));
        let req = InboundRequest::new(
            Method::POST,
            Uri::from_static("/x"),
            headers,
            Bytes::from_static(b"abc"),
        );

        let out = forward_headers(&rule, &req, &Url::parse("http://up:9000/").unwrap());
        assert_eq!(out.get(HOST).unwrap(), "up:9000");
        assert_eq!(out.get("proxy-agent").unwrap(), "supermock");
        assert_eq!(out.get("x-client").unwrap(), "yes");
        assert_eq!(out.get("ah1").unwrap(), "av1");
        assert!(out.get("ah2").is_none());
        assert!(out.get(CONTENT_LENGTH).is_none());
        assert!(out.get("connection").is_none());
    }

    #[test]
    fn test_textual_content_types() {
        let with = |ct: &'static str| {
            let mut h = HeaderMap::new();
            h.insert(CONTENT_TYPE, HeaderValue::from_static(ct));
            h
        };
        assert!(is_textual(&HeaderMap::new()));
        assert!(is_textual(&with("application/json; charset=utf-8")));
        assert!(is_textual(&with("application/problem+json")));
        assert!(is_textual(&with("text/html")));
        assert!(!is_textual(&with("image/png")));
        assert!(!is_textual(&with("application/octet-stream")));
    }
}
