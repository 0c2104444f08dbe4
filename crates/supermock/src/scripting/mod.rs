//! Sandboxed scripts for `custom` rules.
//!
//! A rule's `fn` is a Rhai statement body. It runs with two variables in
//! scope:
//!
//! - `req`: map with `url`, `path`, `method`, `headers`, `query`, `params`, `body`
//! - `res`: response capability (`status`, `header`, `json`, `send`, `end`,
//!   `next`, `fail`)
//!
//! and may `import "url"` or `import "json"`; nothing else can be loaded.
//!
//! ```rhai
//! import "json" as json;
//! if req.query.id == "1" {
//!     res.status(201).header("x-source", "script").json(#{ id: 1 });
//! } else {
//!     res.next();
//! }
//! ```

mod response;
mod rhai_engine;

pub use response::{ScriptAction, ScriptOutcome, ScriptResponse};
pub use rhai_engine::{dynamic_to_json, json_to_dynamic, ScriptHost};

use serde_json::Value;
use std::collections::BTreeMap;

/// Request snapshot handed to a script.
#[derive(Debug, Clone, Default)]
pub struct ScriptRequest {
    pub url: String,
    pub path: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
    /// Route parameters captured by `:name` segments
    pub params: BTreeMap<String, String>,
    pub body: Value,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ScriptError {
    #[error("script compile error: {0}")]
    Compile(String),
    #[error("script runtime error: {0}")]
    Runtime(String),
    /// The script called `res.fail(message)`
    #[error("script failed: {0}")]
    Failed(String),
}
