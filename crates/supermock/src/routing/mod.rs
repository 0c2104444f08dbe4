//! Live routing: rule path patterns, the compiled dispatch tree and the
//! debounced compiler that publishes it.

mod compiler;
mod pattern;
mod tree;


pub use compiler::{build_tree, RefreshScope, RouteCompiler, DEFAULT_DEBOUNCE};
pub use pattern::{split_path, PathMatch, PathPattern, PatternError};
pub use tree::{method_matches, Candidate, DispatchTree, RouteEntry, SpaceRoutes};
