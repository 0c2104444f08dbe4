// Library exports for the binary, integration tests and benchmarks

// ===== Control side: rule hierarchy and its storage =====
pub mod config;
pub mod registry;
pub mod store;

// ===== Serving side: compiled routes and rule execution =====
pub mod dispatch;
pub mod routing;
pub mod strategy;

// ===== Surfaces =====
pub mod admin_api;
pub mod server;

// ===== Shared engines =====
pub mod metrics;
pub mod scripting;
pub mod template;

pub use config::Config;
pub use registry::{Group, HeaderEntry, RegistryError, Rule, RuleRegistry, Space};
pub use server::App;
