//! Compiled dispatch tree: an immutable snapshot of every live route.

use super::pattern::{split_path, PathMatch, PathPattern};
use crate::dispatch::HandlerDispatcher;
use crate::registry::{Space, METHOD_ALL};
use crate::store::Database;
use crate::strategy::StrategyContext;
use hyper::Method;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// One bound rule: method + relative path pattern + dispatcher.
pub struct Leaf {
    method: String,
    pattern: PathPattern,
    dispatcher: Arc<HandlerDispatcher>,
}

impl Leaf {
    fn accepts(&self, method: &Method) -> bool {
        method_matches(&self.method, method)
    }
}

/// All leaves of one space, in registration order.
pub struct SpaceRoutes {
    space_id: String,
    space_path: String,
    prefix: Vec<String>,
    leaves: Vec<Leaf>,
}

impl SpaceRoutes {
    /// Bind every rule of `space`, walking groups and rules in stored order.
    /// Rules whose path does not compile are skipped.
    pub fn build(space: &Space, db: &Database, ctx: &Arc<StrategyContext>) -> Self {
        let mut leaves = Vec::new();

        let rules = space
            .group_ids
            .iter()
            .filter_map(|gid| db.groups.get(gid))
            .flat_map(|g| g.rule_ids.iter())
            .filter_map(|rid| db.rules.get(rid));

        for rule in rules {
            match PathPattern::parse(&rule.path) {
                Ok(pattern) => leaves.push(Leaf {
                    method: rule.method.clone(),
                    pattern,
                    dispatcher: Arc::new(HandlerDispatcher::bind(rule.clone(), ctx)),
                }),
                Err(e) => debug!("Skipping rule {} in space /{}: {}", rule.id, space.path, e),
            }
        }

        Self {
            space_id: space.id.clone(),
            space_path: space.path.clone(),
            prefix: split_path(&space.path).map(str::to_lowercase).collect(),
            leaves,
        }
    }

    pub fn space_id(&self) -> &str {
        &self.space_id
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Strip this space's prefix from request segments.
    fn strip<'a, 'b>(&self, path: &'a [&'b str]) -> Option<&'a [&'b str]> {
        if path.len() < self.prefix.len() {
            return None;
        }
        let (head, rest) = path.split_at(self.prefix.len());
        head.iter()
            .zip(&self.prefix)
            .all(|(seg, prefix)| seg.to_lowercase() == *prefix)
            .then_some(rest)
    }
}

/// A leaf matching a request, with what its pattern captured.
pub struct Candidate {
    pub dispatcher: Arc<HandlerDispatcher>,
    pub matched: PathMatch,
}

/// Flat description of a compiled route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteEntry {
    pub space_id: String,
    pub space_path: String,
    pub rule_id: String,
    pub method: String,
    pub path: String,
}

/// Immutable routing snapshot. Published by pointer swap, never mutated.
#[derive(Default)]
pub struct DispatchTree {
    spaces: Vec<Arc<SpaceRoutes>>,
    generation: u64,
}

impl DispatchTree {
    pub fn new(spaces: Vec<Arc<SpaceRoutes>>, generation: u64) -> Self {
        Self { spaces, generation }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn spaces(&self) -> &[Arc<SpaceRoutes>] {
        &self.spaces
    }

    pub fn space(&self, id: &str) -> Option<&Arc<SpaceRoutes>> {
        self.spaces.iter().find(|s| s.space_id == id)
    }

    /// Number of bound leaves across all spaces.
    pub fn len(&self) -> usize {
        self.spaces.iter().map(|s| s.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every leaf matching the request, latest registration first.
    pub fn candidates(&self, method: &Method, path: &str) -> Vec<Candidate> {
        let segments: Vec<&str> = split_path(path).collect();
        let mut found = Vec::new();

        for space in self.spaces.iter().rev() {
            let Some(rest) = space.strip(&segments) else {
                continue;
            };
            for leaf in space.leaves.iter().rev() {
                if !leaf.accepts(method) {
                    continue;
                }
                if let Some(matched) = leaf.pattern.matches(rest) {
                    found.push(Candidate {
                        dispatcher: Arc::clone(&leaf.dispatcher),
                        matched,
                    });
                }
            }
        }
        found
    }

    /// All routes in registration order.
    pub fn routes(&self) -> Vec<RouteEntry> {
        self.spaces
            .iter()
            .flat_map(|space| {
                space.leaves.iter().map(move |leaf| RouteEntry {
                    space_id: space.space_id.clone(),
                    space_path: space.space_path.clone(),
                    rule_id: leaf.dispatcher.rule().id.clone(),
                    method: leaf.method.clone(),
                    path: leaf.pattern.as_str().to_string(),
                })
            })
            .collect()
    }
}

/// `all` accepts every method; `get` also serves `HEAD`.
pub fn method_matches(rule_method: &str, method: &Method) -> bool {
    if rule_method == METHOD_ALL || rule_method.eq_ignore_ascii_case(method.as_str()) {
        return true;
    }
    *method == Method::HEAD && rule_method == "get"
}
