use crate::scripting::ScriptError;
use crate::template::TemplateError;

/// Per-request failures. Each one turns into a 500 for that request only.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("rule data is not valid JSON: {0}")]
    InvalidData(#[source] serde_json::Error),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("invalid redirect url '{url}': {reason}")]
    InvalidUpstream { url: String, reason: String },

    #[error("upstream request to {url} failed: {source}")]
    Upstream {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error("handler panicked: {0}")]
    Panicked(String),
}

impl DispatchError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::InvalidData(_) => "invalid_data",
            DispatchError::Template(_) => "template",
            DispatchError::InvalidUpstream { .. } => "invalid_upstream",
            DispatchError::Upstream { .. } => "upstream",
            DispatchError::Script(_) => "script",
            DispatchError::Panicked(_) => "panic",
        }
    }
}
