//! Space handlers.

use crate::admin_api::types::{
    error_response, json_response, read_json, registry_error, AddSpaceRequest,
};
use crate::registry::{RuleRegistry, SpaceUpdate};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use tracing::info;

/// GET /space
pub fn handle_list(registry: &RuleRegistry) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &registry.list_spaces())
}

/// GET /space/:id - the space with its groups and rules
pub fn handle_get(id: &str, registry: &RuleRegistry) -> Response<Full<Bytes>> {
    match registry.space_detail(id) {
        Some(detail) => json_response(StatusCode::OK, &detail),
        None => error_response(StatusCode::NOT_FOUND, &format!("space {id} not found")),
    }
}

/// POST /space
pub async fn handle_add(req: Request<Incoming>, registry: &RuleRegistry) -> Response<Full<Bytes>> {
    let body: AddSpaceRequest = match read_json(req).await {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    match registry.add_space(&body.path, body.description) {
        Ok(space) => {
            info!("Created space {} at /{}", space.id, space.path);
            json_response(StatusCode::CREATED, &space)
        }
        Err(e) => registry_error(&e),
    }
}

/// POST /space/:id
pub async fn handle_update(
    id: &str,
    req: Request<Incoming>,
    registry: &RuleRegistry,
) -> Response<Full<Bytes>> {
    let mut attrs: SpaceUpdate = match read_json(req).await {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    attrs.id = Some(id.to_string());
    match registry.update_space(attrs) {
        Ok(space) => json_response(StatusCode::OK, &space),
        Err(e) => registry_error(&e),
    }
}

/// DELETE /space/:id
pub fn handle_delete(id: &str, registry: &RuleRegistry) -> Response<Full<Bytes>> {
    match registry.remove_space(id) {
        Ok(space) => {
            info!("Deleted space {} (/{})", space.id, space.path);
            json_response(StatusCode::OK, &space)
        }
        Err(e) => registry_error(&e),
    }
}
