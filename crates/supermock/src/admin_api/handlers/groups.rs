//! Group handlers, including group ordering.

use crate::admin_api::types::{
    error_response, json_response, query_param, read_json, registry_error, AddGroupRequest,
    SortGroupRequest,
};
use crate::registry::{GroupUpdate, RuleRegistry};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};

/// GET /group/:id
pub fn handle_get(id: &str, registry: &RuleRegistry) -> Response<Full<Bytes>> {
    match registry.get_group(id) {
        Some(group) => json_response(StatusCode::OK, &group),
        None => error_response(StatusCode::NOT_FOUND, &format!("group {id} not found")),
    }
}

/// POST /group
pub async fn handle_add(req: Request<Incoming>, registry: &RuleRegistry) -> Response<Full<Bytes>> {
    let body: AddGroupRequest = match read_json(req).await {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    match registry.add_group(&body.space_id, &body.name, body.index) {
        Ok(group) => json_response(StatusCode::CREATED, &group),
        Err(e) => registry_error(&e),
    }
}

/// POST /group/:id
pub async fn handle_update(
    id: &str,
    req: Request<Incoming>,
    registry: &RuleRegistry,
) -> Response<Full<Bytes>> {
    let mut attrs: GroupUpdate = match read_json(req).await {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    attrs.id = Some(id.to_string());
    match registry.update_group(attrs) {
        Ok(group) => json_response(StatusCode::OK, &group),
        Err(e) => registry_error(&e),
    }
}

/// DELETE /group/:id?spaceId=
pub fn handle_delete(
    id: &str,
    query: Option<&str>,
    registry: &RuleRegistry,
) -> Response<Full<Bytes>> {
    let Some(space_id) = query_param(query, "spaceId") else {
        return error_response(StatusCode::BAD_REQUEST, "spaceId query parameter is required");
    };
    match registry.remove_group(id, &space_id) {
        Ok(group) => json_response(StatusCode::OK, &group),
        Err(e) => registry_error(&e),
    }
}

/// POST /sort/group
pub async fn handle_sort(req: Request<Incoming>, registry: &RuleRegistry) -> Response<Full<Bytes>> {
    let body: SortGroupRequest = match read_json(req).await {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    match registry.sort_group(&body.space_id, &body.group_ids) {
        Ok(space) => json_response(StatusCode::OK, &space),
        Err(e) => registry_error(&e),
    }
}
