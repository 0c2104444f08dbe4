//! Entity and error types for the rule registry.
//!
//! The JSON shapes here are the ones persisted by the store and exchanged
//! with the admin API, so field names are camelCase.

use crate::store::Document;
use serde::{Deserialize, Serialize};

// ============================================================================
// Entities
// ============================================================================

/// Top-level URL namespace. Every rule inside is served under `/{path}/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Space {
    #[serde(default)]
    pub id: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Groups of this space, in routing order
    #[serde(default)]
    pub group_ids: Vec<String>,
}

/// Ordered bucket of rules. Not part of the URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    #[serde(default)]
    pub id: String,
    pub name: String,
    /// Rules of this group, in routing order
    #[serde(default)]
    pub rule_ids: Vec<String>,
}

/// Header override entry: `{key, value, disabled}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct HeaderEntry {
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
}

impl HeaderEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            disabled: false,
        }
    }
}

/// One mock endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    #[serde(default)]
    pub id: String,
    /// Path relative to the owning space, stored without leading slashes
    pub path: String,
    /// Lower-case HTTP method, or `all`
    #[serde(default)]
    pub method: String,
    /// Strategy tag: static, templated, proxy, custom or echo
    #[serde(default, rename = "type")]
    pub rule_type: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
    #[serde(default, alias = "delay", skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    // Static / templated
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<HeaderEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,

    // Proxy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_request_headers: Vec<HeaderEntry>,

    // Custom
    /// Script statement body
    #[serde(default, rename = "fn", skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
}

impl Rule {
    /// Rule with only a path set; everything else takes defaults on insert.
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Apply the normalisation every stored rule goes through.
    pub(crate) fn normalize(&mut self) {
        self.path = strip_leading_slashes(&self.path).to_string();
        self.method = normalize_method(&self.method);
        let rule_type = self.rule_type.trim().to_lowercase();
        self.rule_type = if rule_type.is_empty() {
            DEFAULT_RULE_TYPE.to_string()
        } else {
            rule_type
        };
    }
}

pub const DEFAULT_RULE_TYPE: &str = "static";
pub const METHOD_ALL: &str = "all";

/// Lower-case a method, defaulting to `all`.
pub fn normalize_method(method: &str) -> String {
    let method = method.trim();
    if method.is_empty() {
        METHOD_ALL.to_string()
    } else {
        method.to_lowercase()
    }
}

/// Paths are stored relative: `"/a/b"` and `"a/b"` are the same path.
pub fn strip_leading_slashes(path: &str) -> &str {
    path.trim_start_matches('/')
}

impl Document for Space {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

impl Document for Group {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

impl Document for Rule {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

// ============================================================================
// Mutation inputs
// ============================================================================

/// Input for `update_space`. There is deliberately no `groupIds` field:
/// group order only changes through `add_group`, `remove_group` and `sort_group`.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SpaceUpdate {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Input for `update_group`. Rule order is never taken from here.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GroupUpdate {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// A space with its groups and rules resolved, both in routing order.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SpaceDetail {
    pub space: Space,
    pub groups: Vec<Group>,
    pub rules: Vec<Rule>,
}

// ============================================================================
// Errors
// ============================================================================

/// Failures of registry mutations. Every error leaves the registry unchanged.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Missing required field or unknown parent id
    #[error("Validation failed: {0}")]
    Validation(String),
    /// Duplicate space path or a reorder that is not a permutation
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },
}

impl RegistryError {
    pub(crate) fn not_found(kind: &'static str, id: &str) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}
