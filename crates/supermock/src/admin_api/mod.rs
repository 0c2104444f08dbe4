//! Admin REST API for editing the rule registry at runtime.
//!
//! This module provides:
//! - Space, group and rule CRUD
//! - Rule move/copy and group/rule reordering
//! - The compiled route table, health and metrics endpoints
//!
//! The API listens on a configurable port (default: 2525). Every
//! successful mutation reaches the mock listener after the next route
//! rebuild.

mod handlers;
mod router;
mod server;
pub(crate) mod types;

pub use server::AdminApiServer;
