use super::error::DispatchError;
use super::request::{InboundRequest, ResponseSink};
use crate::metrics;
use crate::registry::Rule;
use crate::routing::PathMatch;
use crate::strategy::{BoundStrategy, StrategyContext, StrategyKind};
use bytes::Bytes;
use futures::FutureExt;
use http_body_util::Full;
use hyper::Response;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What a dispatcher did with a request.
#[derive(Debug)]
pub enum Outcome {
    Respond(Response<Full<Bytes>>),
    /// Try the next matching rule
    Next,
}

/// Executes one rule. Bound once per compile; owns its rule snapshot, so
/// in-flight requests finish with the definition they started with.
pub struct HandlerDispatcher {
    rule: Arc<Rule>,
    strategy: BoundStrategy,
    ctx: Arc<StrategyContext>,
}

impl HandlerDispatcher {
    pub fn bind(rule: Rule, ctx: &Arc<StrategyContext>) -> Self {
        let strategy = BoundStrategy::bind(&rule, ctx);
        Self {
            rule: Arc::new(rule),
            strategy,
            ctx: Arc::clone(ctx),
        }
    }

    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    pub fn kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    /// Run the rule against a request.
    ///
    /// Disabled rules continue immediately. A configured delay is awaited
    /// before the strategy runs. Strategy panics come back as
    /// [`DispatchError::Panicked`].
    pub async fn dispatch(
        &self,
        req: &InboundRequest,
        route: &PathMatch,
        sink: &mut ResponseSink,
    ) -> Result<Outcome, DispatchError> {
        if self.rule.disabled {
            return Ok(Outcome::Next);
        }
        if let Some(delay) = self.rule.delay_ms.filter(|ms| *ms > 0) {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let started = Instant::now();
        let run = self.strategy.execute(&self.ctx, &self.rule, req, route, sink);
        let result = match AssertUnwindSafe(run).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(DispatchError::Panicked(panic_message(panic.as_ref()))),
        };
        metrics::record_strategy(self.kind().as_str(), started.elapsed());
        result
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
