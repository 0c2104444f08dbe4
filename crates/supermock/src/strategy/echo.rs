use crate::dispatch::{DispatchError, InboundRequest, Outcome, ResponseSink};
use crate::registry::Rule;
use serde_json::json;

/// Describe the matched rule and the request as seen by the server.
pub fn respond(
    rule: &Rule,
    req: &InboundRequest,
    sink: &mut ResponseSink,
) -> Result<Outcome, DispatchError> {
    let body = json!({
        "rule": rule,
        "req": {
            "url": req.url(),
            "method": req.method.as_str(),
            "headers": req.header_map(),
            "qs": req.query(),
            "json": req.body_json(),
        }
    });
    Ok(Outcome::Respond(sink.json(&body)))
}
