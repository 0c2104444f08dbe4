//! Response strategies: how a matched rule answers.
//!
//! | Tag | Strategy |
//! |-----|----------|
//! | `static` | fixed status, headers and JSON `data` |
//! | `templated` (`mockjs`) | `data` expanded through the random template engine |
//! | `proxy` (`redirect`) | forward to `redirectUrl` |
//! | `custom` | run the rule's `fn` script |
//! | `echo` | describe the rule and request; also used for unknown tags |

mod custom;
mod echo;
mod proxy;
mod static_response;
mod templated;

pub use custom::CustomScript;
pub use proxy::ProxyTarget;

use crate::config::Config;
use crate::dispatch::{DispatchError, InboundRequest, Outcome, ResponseSink};
use crate::registry::Rule;
use crate::routing::PathMatch;
use crate::scripting::ScriptHost;
use anyhow::{Context, Result};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    Static,
    Templated,
    Proxy,
    Custom,
    Echo,
}

impl StrategyKind {
    /// Accepted `type` tags. Older tag names map onto the current strategies.
    const TAGS: &'static [(&'static str, StrategyKind)] = &[
        ("static", StrategyKind::Static),
        ("templated", StrategyKind::Templated),
        ("mockjs", StrategyKind::Templated),
        ("proxy", StrategyKind::Proxy),
        ("redirect", StrategyKind::Proxy),
        ("custom", StrategyKind::Custom),
        ("echo", StrategyKind::Echo),
    ];

    /// Resolve a rule's `type`. Unknown or empty tags resolve to `Echo`.
    pub fn from_tag(tag: &str) -> StrategyKind {
        let tag = tag.trim();
        Self::TAGS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(tag))
            .map(|(_, kind)| *kind)
            .unwrap_or(StrategyKind::Echo)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Static => "static",
            StrategyKind::Templated => "templated",
            StrategyKind::Proxy => "proxy",
            StrategyKind::Custom => "custom",
            StrategyKind::Echo => "echo",
        }
    }
}

/// Server-wide resources the strategies share.
pub struct StrategyContext {
    http: reqwest::Client,
    scripts: ScriptHost,
}

impl StrategyContext {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.proxy.timeout_ms))
            .danger_accept_invalid_certs(config.proxy.accept_invalid_certs)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to create proxy HTTP client")?;
        Ok(Self {
            http,
            scripts: ScriptHost::new(&config.scripting),
        })
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn scripts(&self) -> &ScriptHost {
        &self.scripts
    }
}

/// A rule's strategy with its per-rule preparation done at bind time.
pub enum BoundStrategy {
    Static,
    Templated,
    Proxy(ProxyTarget),
    Custom(CustomScript),
    Echo,
}

impl BoundStrategy {
    pub fn bind(rule: &Rule, ctx: &StrategyContext) -> Self {
        match StrategyKind::from_tag(&rule.rule_type) {
            StrategyKind::Static => BoundStrategy::Static,
            StrategyKind::Templated => BoundStrategy::Templated,
            StrategyKind::Proxy => BoundStrategy::Proxy(ProxyTarget::new(rule)),
            StrategyKind::Custom => BoundStrategy::Custom(CustomScript::compile(rule, ctx)),
            StrategyKind::Echo => BoundStrategy::Echo,
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            BoundStrategy::Static => StrategyKind::Static,
            BoundStrategy::Templated => StrategyKind::Templated,
            BoundStrategy::Proxy(_) => StrategyKind::Proxy,
            BoundStrategy::Custom(_) => StrategyKind::Custom,
            BoundStrategy::Echo => StrategyKind::Echo,
        }
    }

    pub async fn execute(
        &self,
        ctx: &StrategyContext,
        rule: &Rule,
        req: &InboundRequest,
        route: &PathMatch,
        sink: &mut ResponseSink,
    ) -> Result<Outcome, DispatchError> {
        match self {
            BoundStrategy::Static => static_response::respond(rule, sink),
            BoundStrategy::Templated => templated::respond(rule, sink),
            BoundStrategy::Proxy(target) => target.forward(ctx, rule, req, route, sink).await,
            BoundStrategy::Custom(script) => script.run(ctx, req, route, sink).await,
            BoundStrategy::Echo => echo::respond(rule, req, sink),
        }
    }
}
