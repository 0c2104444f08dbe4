//! Admin API server.

use crate::admin_api::router::route_request;
use crate::registry::RuleRegistry;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

/// Admin API server for supermock
pub struct AdminApiServer {
    listener: TcpListener,
    registry: Arc<RuleRegistry>,
}

impl AdminApiServer {
    /// Create a new admin API server on an already bound listener
    pub fn new(listener: TcpListener, registry: Arc<RuleRegistry>) -> Self {
        Self { listener, registry }
    }

    /// Run the admin API server until `shutdown` fires
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if let Ok(addr) = self.listener.local_addr() {
            info!("supermock Admin API listening on http://{}", addr);
        }

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    let stream = match result {
                        Ok((stream, _)) => stream,
                        Err(e) => {
                            error!("Admin API accept error: {}", e);
                            continue;
                        }
                    };
                    let io = TokioIo::new(stream);
                    let registry = Arc::clone(&self.registry);

                    tokio::spawn(async move {
                        let service = service_fn(move |req| {
                            let registry = Arc::clone(&registry);
                            async move { route_request(req, registry).await }
                        });

                        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                            debug!("Admin API connection error: {}", e);
                        }
                    });
                }
                _ = shutdown.recv() => {
                    info!("Admin API shutting down");
                    break;
                }
            }
        }
    }
}
