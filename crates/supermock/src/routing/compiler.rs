//! RouteCompiler: turns the registry into a published [`DispatchTree`].
//!
//! Refresh requests are debounced. Every trigger inside the window merges
//! its scope into the pending one and restarts the timer; when the timer
//! fires a single rebuild covers all of them. Until then requests keep
//! seeing the previous tree.

use super::tree::{DispatchTree, SpaceRoutes};
use crate::metrics;
use crate::store::Database;
use crate::strategy::StrategyContext;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// What a refresh has to rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshScope {
    Full,
    Spaces(BTreeSet<String>),
}

impl RefreshScope {
    pub fn space(id: impl Into<String>) -> Self {
        RefreshScope::Spaces(BTreeSet::from([id.into()]))
    }

    /// Union of two scopes. Anything merged with `Full` is `Full`.
    pub fn merge(self, other: RefreshScope) -> RefreshScope {
        match (self, other) {
            (RefreshScope::Spaces(mut a), RefreshScope::Spaces(b)) => {
                a.extend(b);
                RefreshScope::Spaces(a)
            }
            _ => RefreshScope::Full,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            RefreshScope::Full => "full",
            RefreshScope::Spaces(_) => "space",
        }
    }
}

#[derive(Default)]
struct Pending {
    scope: Option<RefreshScope>,
    timer: Option<JoinHandle<()>>,
}

struct CompilerInner {
    db: Arc<Mutex<Database>>,
    ctx: Arc<StrategyContext>,
    debounce: Duration,
    published: RwLock<Arc<DispatchTree>>,
    pending: Mutex<Pending>,
    /// Held across snapshot, build and publish so rebuilds never interleave
    rebuild: Mutex<()>,
    generation: AtomicU64,
}

/// Cheap to clone; all clones share one published tree.
#[derive(Clone)]
pub struct RouteCompiler {
    inner: Arc<CompilerInner>,
}

impl RouteCompiler {
    pub fn new(db: Arc<Mutex<Database>>, ctx: Arc<StrategyContext>, debounce: Duration) -> Self {
        Self {
            inner: Arc::new(CompilerInner {
                db,
                ctx,
                debounce,
                published: RwLock::new(Arc::new(DispatchTree::default())),
                pending: Mutex::new(Pending::default()),
                rebuild: Mutex::new(()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// The currently published tree.
    pub fn current(&self) -> Arc<DispatchTree> {
        Arc::clone(&self.inner.published.read())
    }

    pub fn debounce(&self) -> Duration {
        self.inner.debounce
    }

    /// Shared resources handed to every bound rule.
    pub fn context(&self) -> &Arc<StrategyContext> {
        &self.inner.ctx
    }

    /// Schedule a rebuild. Without a tokio runtime (or with a zero window)
    /// the rebuild runs before this returns.
    pub fn refresh(&self, scope: RefreshScope) {
        let handle = match Handle::try_current() {
            Ok(handle) if !self.inner.debounce.is_zero() => handle,
            _ => {
                self.refresh_now(scope);
                return;
            }
        };

        let mut pending = self.inner.pending.lock();
        pending.scope = Some(match pending.scope.take() {
            Some(prev) => prev.merge(scope),
            None => scope,
        });
        if let Some(timer) = pending.timer.take() {
            timer.abort();
        }

        let compiler = self.clone();
        let window = self.inner.debounce;
        pending.timer = Some(handle.spawn(async move {
            tokio::time::sleep(window).await;
            compiler.flush();
        }));
    }

    /// Run any pending rebuild now instead of waiting for the timer.
    pub fn flush(&self) {
        let scope = {
            let mut pending = self.inner.pending.lock();
            if let Some(timer) = pending.timer.take() {
                timer.abort();
            }
            pending.scope.take()
        };
        if let Some(scope) = scope {
            self.refresh_now(scope);
        }
    }

    /// Rebuild and publish immediately.
    pub fn refresh_now(&self, scope: RefreshScope) {
        let _rebuild = self.inner.rebuild.lock();
        let started = Instant::now();

        let snapshot = self.inner.db.lock().clone();
        let previous = self.current();
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let tree = build_tree(&snapshot, &self.inner.ctx, Some(&previous), &scope, generation);

        debug!(
            "Published route tree #{} ({} scope, {} spaces, {} routes) in {:?}",
            generation,
            scope.label(),
            tree.spaces().len(),
            tree.len(),
            started.elapsed()
        );
        metrics::record_rebuild(scope.label(), started.elapsed());
        *self.inner.published.write() = Arc::new(tree);
    }
}

/// Build a tree from a database snapshot.
///
/// Spaces outside `scope` are taken from `previous` when it has them. A
/// scope naming a space that no longer exists forces a full build.
pub fn build_tree(
    db: &Database,
    ctx: &Arc<StrategyContext>,
    previous: Option<&DispatchTree>,
    scope: &RefreshScope,
    generation: u64,
) -> DispatchTree {
    let rebuild_all = match scope {
        RefreshScope::Full => true,
        RefreshScope::Spaces(ids) => ids.iter().any(|id| !db.spaces.contains(id)),
    };

    let reusable: HashMap<&str, &Arc<SpaceRoutes>> = match (previous, rebuild_all) {
        (Some(prev), false) => prev.spaces().iter().map(|s| (s.space_id(), s)).collect(),
        _ => HashMap::new(),
    };

    let spaces = db
        .spaces
        .iter()
        .map(|space| {
            let in_scope = match scope {
                RefreshScope::Spaces(ids) => ids.contains(&space.id),
                RefreshScope::Full => true,
            };
            match reusable.get(space.id.as_str()) {
                Some(routes) if !in_scope => Arc::clone(routes),
                _ => Arc::new(SpaceRoutes::build(space, db, ctx)),
            }
        })
        .collect();

    DispatchTree::new(spaces, generation)
}
