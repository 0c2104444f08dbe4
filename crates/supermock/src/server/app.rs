//! Process bootstrap: storage, compiler, registry and both listeners.

use super::mock::MockServer;
use crate::admin_api::AdminApiServer;
use crate::config::Config;
use crate::registry::RuleRegistry;
use crate::routing::{RefreshScope, RouteCompiler};
use crate::strategy::StrategyContext;
use anyhow::Context;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::info;

/// A running supermock instance.
pub struct App {
    registry: Arc<RuleRegistry>,
    mock_addr: SocketAddr,
    admin_addr: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
}

impl App {
    /// Load the stored rules, publish their routes and start serving.
    ///
    /// Port 0 binds an ephemeral port; the actual addresses are available
    /// from [`App::mock_addr`] and [`App::admin_addr`].
    pub async fn start(config: Config) -> Result<Self, anyhow::Error> {
        config.validate()?;

        let persistence = config.storage.open();
        let db = persistence
            .load()
            .with_context(|| format!("Failed to load rules from {}", persistence.describe()))?
            .unwrap_or_default();
        info!(
            "Loaded {} spaces, {} groups, {} rules from {}",
            db.spaces.len(),
            db.groups.len(),
            db.rules.len(),
            persistence.describe()
        );
        let db = Arc::new(Mutex::new(db));

        let ctx = Arc::new(StrategyContext::new(&config)?);
        let compiler = RouteCompiler::new(Arc::clone(&db), ctx, config.routing.debounce());
        compiler.refresh_now(RefreshScope::Full);
        let registry = Arc::new(RuleRegistry::new(db, compiler.clone(), persistence));

        let host = config.listen.host.as_str();
        let mock_listener = TcpListener::bind((host, config.listen.port))
            .await
            .with_context(|| format!("Failed to bind mock port {}", config.listen.port))?;
        let admin_listener = TcpListener::bind((host, config.listen.admin_port))
            .await
            .with_context(|| format!("Failed to bind admin port {}", config.listen.admin_port))?;
        let mock_addr = mock_listener.local_addr()?;
        let admin_addr = admin_listener.local_addr()?;

        let (shutdown_tx, _) = broadcast::channel(1);
        let mock = MockServer::new(mock_listener, compiler);
        let admin = AdminApiServer::new(admin_listener, Arc::clone(&registry));
        let tasks = vec![
            tokio::spawn(mock.run(shutdown_tx.subscribe())),
            tokio::spawn(admin.run(shutdown_tx.subscribe())),
        ];

        Ok(Self {
            registry,
            mock_addr,
            admin_addr,
            shutdown_tx,
            tasks,
        })
    }

    pub fn registry(&self) -> &Arc<RuleRegistry> {
        &self.registry
    }

    pub fn mock_addr(&self) -> SocketAddr {
        self.mock_addr
    }

    pub fn admin_addr(&self) -> SocketAddr {
        self.admin_addr
    }

    /// Stop both listeners and publish any pending route rebuild.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        for task in self.tasks {
            let _ = task.await;
        }
        self.registry.compiler().flush();
        info!("supermock stopped");
    }
}
