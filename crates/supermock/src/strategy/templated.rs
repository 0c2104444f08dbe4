use super::static_response::{apply_status_and_headers, parse_data};
use crate::dispatch::{DispatchError, Outcome, ResponseSink};
use crate::registry::Rule;
use crate::template;

/// Like static, but `data` is a template rendered afresh on every request.
pub fn respond(rule: &Rule, sink: &mut ResponseSink) -> Result<Outcome, DispatchError> {
    apply_status_and_headers(rule, sink);
    let Some(template) = parse_data(rule)? else {
        return Ok(Outcome::Next);
    };
    let body = template::render(&template)?;
    Ok(Outcome::Respond(sink.json(&body)))
}
