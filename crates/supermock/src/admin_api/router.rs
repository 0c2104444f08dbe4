//! Route dispatch logic for the Admin API.

use crate::admin_api::handlers::{groups, rules, spaces, system};
use crate::admin_api::types::not_found;
use crate::registry::RuleRegistry;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Method, Request, Response};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::debug;

/// Parsed admin endpoint
#[derive(Debug, PartialEq, Eq)]
enum AdminRoute<'a> {
    Root,
    Health,
    Metrics,
    Routes,
    /// /space
    Spaces,
    /// /space/:id
    Space(&'a str),
    /// /group
    Groups,
    /// /group/:id
    Group(&'a str),
    /// /rule
    Rules,
    /// /rule/:id
    Rule(&'a str),
    /// /rule/:id/move
    MoveRule(&'a str),
    /// /sort/group
    SortGroups,
    /// /sort/rule
    SortRules,
}

impl<'a> AdminRoute<'a> {
    fn parse(path: &'a str) -> Option<Self> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let route = match segments.as_slice() {
            [] => AdminRoute::Root,
            ["health"] => AdminRoute::Health,
            ["metrics"] => AdminRoute::Metrics,
            ["routes"] => AdminRoute::Routes,
            ["space"] => AdminRoute::Spaces,
            ["space", id] => AdminRoute::Space(*id),
            ["group"] => AdminRoute::Groups,
            ["group", id] => AdminRoute::Group(*id),
            ["rule"] => AdminRoute::Rules,
            ["rule", id] => AdminRoute::Rule(*id),
            ["rule", id, "move"] => AdminRoute::MoveRule(*id),
            ["sort", "group"] => AdminRoute::SortGroups,
            ["sort", "rule"] => AdminRoute::SortRules,
            _ => return None,
        };
        Some(route)
    }
}

/// Main request router
pub async fn route_request(
    req: Request<Incoming>,
    registry: Arc<RuleRegistry>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(|s| s.to_string());
    let base_url = get_base_url(&req);

    debug!("Admin API: {} {}", method, path);

    let Some(route) = AdminRoute::parse(&path) else {
        return Ok(not_found());
    };
    let query = query.as_deref();
    let registry = registry.as_ref();

    let response = match (&method, route) {
        (&Method::GET, AdminRoute::Root) => system::handle_root(&base_url),
        (&Method::GET, AdminRoute::Health) => system::handle_health(),
        (&Method::GET, AdminRoute::Metrics) => system::handle_metrics(),
        (&Method::GET, AdminRoute::Routes) => system::handle_routes(registry),

        (&Method::GET, AdminRoute::Spaces) => spaces::handle_list(registry),
        (&Method::POST, AdminRoute::Spaces) => spaces::handle_add(req, registry).await,
        (&Method::GET, AdminRoute::Space(id)) => spaces::handle_get(id, registry),
        (&Method::POST, AdminRoute::Space(id)) => spaces::handle_update(id, req, registry).await,
        (&Method::DELETE, AdminRoute::Space(id)) => spaces::handle_delete(id, registry),

        (&Method::POST, AdminRoute::Groups) => groups::handle_add(req, registry).await,
        (&Method::GET, AdminRoute::Group(id)) => groups::handle_get(id, registry),
        (&Method::POST, AdminRoute::Group(id)) => groups::handle_update(id, req, registry).await,
        (&Method::DELETE, AdminRoute::Group(id)) => groups::handle_delete(id, query, registry),

        (&Method::POST, AdminRoute::Rules) => rules::handle_add(req, registry).await,
        (&Method::GET, AdminRoute::Rule(id)) => rules::handle_get(id, registry),
        (&Method::POST, AdminRoute::Rule(id)) => rules::handle_update(id, req, registry).await,
        (&Method::DELETE, AdminRoute::Rule(id)) => rules::handle_delete(id, query, registry),
        (&Method::POST, AdminRoute::MoveRule(id)) => rules::handle_move(id, req, registry).await,

        (&Method::POST, AdminRoute::SortGroups) => groups::handle_sort(req, registry).await,
        (&Method::POST, AdminRoute::SortRules) => rules::handle_sort(req, registry).await,

        _ => not_found(),
    };
    Ok(response)
}

/// Extract base URL from request headers for links
fn get_base_url(req: &Request<Incoming>) -> String {
    req.headers()
        .get("host")
        .and_then(|h| h.to_str().ok())
        .map(|host| format!("http://{}", host))
        .unwrap_or_else(|| "http://localhost:2525".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_route_parse() {
        assert_eq!(AdminRoute::parse("/"), Some(AdminRoute::Root));
        assert_eq!(AdminRoute::parse("/health"), Some(AdminRoute::Health));
        assert_eq!(AdminRoute::parse("/space"), Some(AdminRoute::Spaces));
        assert_eq!(AdminRoute::parse("/space/"), Some(AdminRoute::Spaces));
        assert_eq!(AdminRoute::parse("/space/4"), Some(AdminRoute::Space("4")));
        assert_eq!(AdminRoute::parse("/group/2"), Some(AdminRoute::Group("2")));
        assert_eq!(
            AdminRoute::parse("/rule/7/move"),
            Some(AdminRoute::MoveRule("7"))
        );
        assert_eq!(AdminRoute::parse("/sort/rule"), Some(AdminRoute::SortRules));

        // Invalid routes
        assert_eq!(AdminRoute::parse("/spaces"), None);
        assert_eq!(AdminRoute::parse("/rule/7/copy"), None);
        assert_eq!(AdminRoute::parse("/sort"), None);
    }
}
