use super::StrategyContext;
use crate::dispatch::{DispatchError, InboundRequest, Outcome, ResponseSink};
use crate::registry::Rule;
use crate::routing::PathMatch;
use crate::scripting::{ScriptAction, ScriptError, ScriptRequest};
use bytes::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use rhai::AST;
use std::sync::Arc;
use tracing::warn;

/// A custom rule's script, compiled when the rule is bound.
pub struct CustomScript {
    compiled: Option<Result<Arc<AST>, ScriptError>>,
}

impl CustomScript {
    pub fn compile(rule: &Rule, ctx: &StrategyContext) -> Self {
        let compiled = rule
            .script
            .as_deref()
            .filter(|src| !src.trim().is_empty())
            .map(|src| ctx.scripts().compile(src));
        if let Some(Err(e)) = &compiled {
            warn!("Custom rule {} does not compile: {}", rule.id, e);
        }
        Self { compiled }
    }

    /// Run the script on the blocking pool and apply what it decided.
    pub async fn run(
        &self,
        ctx: &StrategyContext,
        req: &InboundRequest,
        route: &PathMatch,
        sink: &mut ResponseSink,
    ) -> Result<Outcome, DispatchError> {
        let ast = match &self.compiled {
            None => return Ok(Outcome::Next),
            Some(Err(e)) => return Err(e.clone().into()),
            Some(Ok(ast)) => Arc::clone(ast),
        };

        let request = ScriptRequest {
            url: req.url(),
            path: req.path().to_string(),
            method: req.method.as_str().to_string(),
            headers: req.header_map(),
            query: req.query(),
            params: route.params.clone().into_iter().collect(),
            body: req.body_json(),
        };
        let host = ctx.scripts().clone();
        let outcome = tokio::task::spawn_blocking(move || host.run(&ast, request))
            .await
            .map_err(|e| ScriptError::Runtime(format!("script task failed: {e}")))??;

        if let Some(code) = outcome.status {
            sink.set_status_code(code);
        }
        for (key, value) in &outcome.headers {
            sink.set_header(key, value);
        }

        match outcome.action {
            ScriptAction::Respond { content_type, body } => {
                if let Some(ct) = content_type {
                    if !sink.headers().contains_key(CONTENT_TYPE) {
                        sink.headers_mut()
                            .insert(CONTENT_TYPE, HeaderValue::from_static(ct));
                    }
                }
                Ok(Outcome::Respond(sink.finish(body)))
            }
            ScriptAction::Next => Ok(Outcome::Next),
            ScriptAction::Fail(message) => Err(ScriptError::Failed(message).into()),
            ScriptAction::Unfinished => Ok(Outcome::Respond(sink.finish(Bytes::new()))),
        }
    }
}
