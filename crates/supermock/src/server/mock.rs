//! Mock listener: serves the published dispatch tree.

use crate::admin_api::types::{error_response, json_response};
use crate::dispatch::{InboundRequest, Outcome, ResponseSink};
use crate::metrics;
use crate::routing::RouteCompiler;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Accept loop for mock traffic. Stops when `shutdown` fires.
pub struct MockServer {
    listener: TcpListener,
    compiler: RouteCompiler,
}

impl MockServer {
    pub fn new(listener: TcpListener, compiler: RouteCompiler) -> Self {
        Self { listener, compiler }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if let Ok(addr) = self.listener.local_addr() {
            info!("Mock server listening on http://{}", addr);
        }

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, _)) => {
                            let compiler = self.compiler.clone();
                            tokio::spawn(async move {
                                let io = TokioIo::new(stream);
                                let service = service_fn(move |req| {
                                    let compiler = compiler.clone();
                                    async move { handle_mock_request(req, compiler).await }
                                });
                                if let Err(e) = http1::Builder::new()
                                    .serve_connection(io, service)
                                    .await
                                {
                                    debug!("Mock connection error: {}", e);
                                }
                            });
                        }
                        Err(e) => error!("Mock accept error: {}", e),
                    }
                }
                _ = shutdown.recv() => {
                    info!("Mock server shutting down");
                    break;
                }
            }
        }
    }
}

/// hyper entry point: buffer the body, then serve from the current tree.
pub async fn handle_mock_request(
    req: Request<Incoming>,
    compiler: RouteCompiler,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            return Ok(error_response(
                StatusCode::BAD_REQUEST,
                &format!("Failed to read request body: {e}"),
            ))
        }
    };
    let inbound = InboundRequest::new(parts.method, parts.uri, parts.headers, body);
    Ok(serve(&compiler, &inbound).await)
}

/// Try every matching rule, latest registration first.
///
/// A rule that continues hands the next one the status and headers it set.
/// When nothing is left, a stashed proxy body wins over the 404.
pub async fn serve(compiler: &RouteCompiler, req: &InboundRequest) -> Response<Full<Bytes>> {
    let tree = compiler.current();
    let method = req.method.as_str().to_string();
    let mut sink = ResponseSink::new();

    for candidate in tree.candidates(&req.method, req.path()) {
        match candidate
            .dispatcher
            .dispatch(req, &candidate.matched, &mut sink)
            .await
        {
            Ok(Outcome::Respond(response)) => {
                metrics::record_request(&method, "matched");
                return response;
            }
            Ok(Outcome::Next) => continue,
            Err(e) => {
                warn!(
                    rule_id = %candidate.dispatcher.rule().id,
                    "Rule failed for {} {}: {}",
                    method,
                    req.url(),
                    e
                );
                metrics::record_request(&method, "error");
                metrics::record_dispatch_error(e.kind());
                return json_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &serde_json::json!({
                        "url": req.url(),
                        "message": e.to_string(),
                    }),
                );
            }
        }
    }

    if let Some(response) = sink.into_stashed() {
        metrics::record_request(&method, "matched");
        return response;
    }
    metrics::record_request(&method, "not_found");
    error_response(
        StatusCode::NOT_FOUND,
        &format!("No rule matches {} {}", method, req.path()),
    )
}
