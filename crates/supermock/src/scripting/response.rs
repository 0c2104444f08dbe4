use super::rhai_engine::dynamic_to_json;
use bytes::Bytes;
use parking_lot::Mutex;
use rhai::Dynamic;
use std::sync::Arc;

/// What the script decided to do with the request.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptAction {
    /// Write a response. `content_type` is applied when the script set none.
    Respond {
        content_type: Option<&'static str>,
        body: Bytes,
    },
    /// Hand the request to the next matching rule
    Next,
    Fail(String),
    /// The script returned without responding or continuing
    Unfinished,
}

/// Everything a script run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptOutcome {
    pub status: Option<u16>,
    pub headers: Vec<(String, String)>,
    pub action: ScriptAction,
}

#[derive(Debug)]
struct State {
    status: Option<u16>,
    headers: Vec<(String, String)>,
    action: Option<ScriptAction>,
}

/// The `res` object scripts see.
///
/// Clones share state, so method chaining (`res.status(201).json(..)`) and
/// copies stored in script variables all act on one response. The first
/// terminal call (`json`, `send`, `end`, `next`, `fail`) wins; later ones
/// are ignored.
#[derive(Debug, Clone)]
pub struct ScriptResponse {
    state: Arc<Mutex<State>>,
}

impl Default for ScriptResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptResponse {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                status: None,
                headers: Vec::new(),
                action: None,
            })),
        }
    }

    pub fn status(&mut self, code: i64) -> ScriptResponse {
        if let Ok(code) = u16::try_from(code) {
            self.state.lock().status = Some(code);
        }
        self.clone()
    }

    pub fn header(&mut self, key: &str, value: Dynamic) -> ScriptResponse {
        let value = match value.clone().try_cast::<String>() {
            Some(s) => s,
            None => value.to_string(),
        };
        self.state.lock().headers.push((key.to_string(), value));
        self.clone()
    }

    pub fn json(&mut self, value: Dynamic) {
        let body = serde_json::to_vec(&dynamic_to_json(value)).unwrap_or_default();
        self.finish(ScriptAction::Respond {
            content_type: Some("application/json; charset=utf-8"),
            body: Bytes::from(body),
        });
    }

    /// Strings go out as text, anything else as JSON.
    pub fn send(&mut self, value: Dynamic) {
        match value.clone().try_cast::<String>() {
            Some(text) => self.finish(ScriptAction::Respond {
                content_type: Some("text/plain; charset=utf-8"),
                body: Bytes::from(text),
            }),
            None => self.json(value),
        }
    }

    pub fn end(&mut self) {
        self.finish(ScriptAction::Respond {
            content_type: None,
            body: Bytes::new(),
        });
    }

    pub fn next(&mut self) {
        self.finish(ScriptAction::Next);
    }

    pub fn fail(&mut self, message: &str) {
        self.finish(ScriptAction::Fail(message.to_string()));
    }

    fn finish(&self, action: ScriptAction) {
        let mut state = self.state.lock();
        if state.action.is_none() {
            state.action = Some(action);
        }
    }

    /// Snapshot the response once the script has returned.
    pub fn outcome(&self) -> ScriptOutcome {
        let state = self.state.lock();
        ScriptOutcome {
            status: state.status,
            headers: state.headers.clone(),
            action: state.action.clone().unwrap_or(ScriptAction::Unfinished),
        }
    }
}
