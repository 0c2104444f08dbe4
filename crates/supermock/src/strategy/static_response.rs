use crate::dispatch::{DispatchError, Outcome, ResponseSink};
use crate::registry::{HeaderEntry, Rule};
use serde_json::Value;

/// Status (default 200), header overrides, then `data` as JSON.
/// Without `data` the status and headers stay set and the request continues.
pub fn respond(rule: &Rule, sink: &mut ResponseSink) -> Result<Outcome, DispatchError> {
    apply_status_and_headers(rule, sink);
    match parse_data(rule)? {
        Some(value) => Ok(Outcome::Respond(sink.json(&value))),
        None => Ok(Outcome::Next),
    }
}

pub(super) fn apply_status_and_headers(rule: &Rule, sink: &mut ResponseSink) {
    sink.set_status_code(rule.status_code.unwrap_or(200));
    apply_headers(&rule.headers, sink);
}

/// Set every enabled header, in order.
pub(super) fn apply_headers(headers: &[HeaderEntry], sink: &mut ResponseSink) {
    for header in headers.iter().filter(|h| !h.disabled) {
        sink.set_header(&header.key, &header.value);
    }
}

/// `None` when the rule has no data at all.
pub(super) fn parse_data(rule: &Rule) -> Result<Option<Value>, DispatchError> {
    match rule.data.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => serde_json::from_str(raw)
            .map(Some)
            .map_err(DispatchError::InvalidData),
    }
}
