//! Rule handlers, including move/copy and rule ordering.

use crate::admin_api::types::{
    error_response, json_response, query_param, read_json, registry_error, AddRuleRequest,
    MoveRuleRequest, SortRuleRequest, UpdateRuleRequest,
};
use crate::registry::{Rule, RuleRegistry};
use crate::strategy::StrategyKind;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use tracing::warn;

/// GET /rule/:id
pub fn handle_get(id: &str, registry: &RuleRegistry) -> Response<Full<Bytes>> {
    match registry.get_rule(id) {
        Some(rule) => json_response(StatusCode::OK, &rule),
        None => error_response(StatusCode::NOT_FOUND, &format!("rule {id} not found")),
    }
}

/// POST /rule
pub async fn handle_add(req: Request<Incoming>, registry: &RuleRegistry) -> Response<Full<Bytes>> {
    let body: AddRuleRequest = match read_json(req).await {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    check_script(&body.rule, registry);
    match registry.add_rule(&body.group_id, body.rule, body.index) {
        Ok(rule) => json_response(StatusCode::CREATED, &rule),
        Err(e) => registry_error(&e),
    }
}

/// POST /rule/:id
pub async fn handle_update(
    id: &str,
    req: Request<Incoming>,
    registry: &RuleRegistry,
) -> Response<Full<Bytes>> {
    let body: UpdateRuleRequest = match read_json(req).await {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let mut rule = body.rule;
    rule.id = id.to_string();
    check_script(&rule, registry);
    match registry.update_rule(rule) {
        Ok(rule) => json_response(StatusCode::OK, &rule),
        Err(e) => registry_error(&e),
    }
}

/// DELETE /rule/:id?groupId=
pub fn handle_delete(
    id: &str,
    query: Option<&str>,
    registry: &RuleRegistry,
) -> Response<Full<Bytes>> {
    let Some(group_id) = query_param(query, "groupId") else {
        return error_response(StatusCode::BAD_REQUEST, "groupId query parameter is required");
    };
    match registry.remove_rule(id, &group_id) {
        Ok(rule) => json_response(StatusCode::OK, &rule),
        Err(e) => registry_error(&e),
    }
}

/// POST /rule/:id/move
pub async fn handle_move(
    id: &str,
    req: Request<Incoming>,
    registry: &RuleRegistry,
) -> Response<Full<Bytes>> {
    let body: MoveRuleRequest = match read_json(req).await {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    match registry.move_rule(
        id,
        &body.from_group_id,
        &body.to_group_id,
        body.index,
        body.copy,
    ) {
        Ok(rule) => json_response(StatusCode::OK, &rule),
        Err(e) => registry_error(&e),
    }
}

/// POST /sort/rule
pub async fn handle_sort(req: Request<Incoming>, registry: &RuleRegistry) -> Response<Full<Bytes>> {
    let body: SortRuleRequest = match read_json(req).await {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    match registry.sort_rule(&body.group_id, &body.rule_ids) {
        Ok(group) => json_response(StatusCode::OK, &group),
        Err(e) => registry_error(&e),
    }
}

/// Compile a custom rule's script up front so a typo shows in the log
/// when the rule is saved, not on its first request.
fn check_script(rule: &Rule, registry: &RuleRegistry) {
    if StrategyKind::from_tag(&rule.rule_type) != StrategyKind::Custom {
        return;
    }
    let Some(source) = rule.script.as_deref() else {
        warn!(rule_path = %rule.path, "Custom rule has no script");
        return;
    };
    if let Err(e) = registry.compiler().context().scripts().compile(source) {
        warn!(rule_path = %rule.path, "Custom rule script does not compile: {}", e);
    }
}
