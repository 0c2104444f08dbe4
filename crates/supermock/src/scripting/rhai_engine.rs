use super::{ScriptError, ScriptOutcome, ScriptRequest, ScriptResponse};
use crate::config::ScriptingConfig;
use rhai::module_resolvers::StaticModuleResolver;
use rhai::{Dynamic, Engine, EvalAltResult, ImmutableString, Map, Module, Scope, AST};
use serde_json::Value;
use std::sync::Arc;

/// Shared, sandboxed Rhai engine for custom rules.
///
/// The engine is built once per server. Scripts are compiled once per rule
/// version and the resulting `AST` is shared by every request.
#[derive(Clone)]
pub struct ScriptHost {
    engine: Arc<Engine>,
}

impl ScriptHost {
    pub fn new(limits: &ScriptingConfig) -> Self {
        Self {
            engine: Arc::new(create_engine(limits)),
        }
    }

    pub fn compile(&self, source: &str) -> Result<Arc<AST>, ScriptError> {
        self.engine
            .compile(source)
            .map(Arc::new)
            .map_err(|e| ScriptError::Compile(e.to_string()))
    }

    /// Run a compiled script to completion. CPU-bound: call from a blocking
    /// context.
    pub fn run(&self, ast: &AST, request: ScriptRequest) -> Result<ScriptOutcome, ScriptError> {
        let response = ScriptResponse::new();
        let mut scope = Scope::new();
        scope.push_constant("req", request_to_map(request));
        scope.push("res", response.clone());

        self.engine
            .run_ast_with_scope(&mut scope, ast)
            .map_err(|e| ScriptError::Runtime(e.to_string()))?;

        Ok(response.outcome())
    }
}

fn create_engine(limits: &ScriptingConfig) -> Engine {
    let mut engine = Engine::new();

    engine.set_max_operations(limits.max_operations);
    engine.set_max_call_levels(limits.max_call_levels);
    engine.set_max_expr_depths(limits.max_expr_depth, limits.max_expr_depth);
    engine.set_max_string_size(limits.max_string_size);
    engine.set_max_array_size(limits.max_array_size);
    engine.set_max_map_size(limits.max_map_size);

    engine
        .register_type_with_name::<ScriptResponse>("Response")
        .register_fn("status", ScriptResponse::status)
        .register_fn("header", ScriptResponse::header)
        .register_fn("json", ScriptResponse::json)
        .register_fn("send", ScriptResponse::send)
        .register_fn("end", ScriptResponse::end)
        .register_fn("next", ScriptResponse::next)
        .register_fn("fail", ScriptResponse::fail);

    let mut resolver = StaticModuleResolver::new();
    resolver.insert("url", url_module());
    resolver.insert("json", json_module());
    engine.set_module_resolver(resolver);

    engine
}

fn runtime_error(message: impl std::fmt::Display) -> Box<EvalAltResult> {
    message.to_string().into()
}

/// `import "url" as url;`
fn url_module() -> Module {
    let mut module = Module::new();
    module.set_native_fn("encode", |s: &str| {
        Ok(ImmutableString::from(urlencoding::encode(s).into_owned()))
    });
    module.set_native_fn("decode", |s: &str| {
        urlencoding::decode(s)
            .map(|v| ImmutableString::from(v.into_owned()))
            .map_err(runtime_error)
    });
    module.set_native_fn("resolve", |base: &str, relative: &str| {
        let base = reqwest::Url::parse(base).map_err(runtime_error)?;
        let joined = base.join(relative).map_err(runtime_error)?;
        Ok(ImmutableString::from(joined.to_string()))
    });
    module.build_index();
    module
}

/// `import "json" as json;`
fn json_module() -> Module {
    let mut module = Module::new();
    module.set_native_fn("parse", |s: &str| {
        serde_json::from_str::<Value>(s)
            .map(json_to_dynamic)
            .map_err(runtime_error)
    });
    module.set_native_fn("stringify", |value: Dynamic| {
        serde_json::to_string(&dynamic_to_json(value))
            .map(ImmutableString::from)
            .map_err(runtime_error)
    });
    module.build_index();
    module
}

fn string_map(entries: impl IntoIterator<Item = (String, String)>) -> Map {
    entries
        .into_iter()
        .map(|(k, v)| (k.into(), Dynamic::from(v)))
        .collect()
}

fn request_to_map(request: ScriptRequest) -> Map {
    let mut map = Map::new();
    map.insert("url".into(), Dynamic::from(request.url));
    map.insert("path".into(), Dynamic::from(request.path));
    map.insert("method".into(), Dynamic::from(request.method));
    map.insert("headers".into(), Dynamic::from(string_map(request.headers)));
    map.insert("query".into(), Dynamic::from(string_map(request.query)));
    map.insert("params".into(), Dynamic::from(string_map(request.params)));
    map.insert("body".into(), json_to_dynamic(request.body));
    map
}

pub fn json_to_dynamic(value: Value) -> Dynamic {
    match value {
        Value::Null => Dynamic::UNIT,
        Value::Bool(b) => Dynamic::from(b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Dynamic::from(i)
            } else if let Some(f) = n.as_f64() {
                Dynamic::from(f)
            } else {
                Dynamic::UNIT
            }
        }
        Value::String(s) => Dynamic::from(s),
        Value::Array(arr) => Dynamic::from(arr.into_iter().map(json_to_dynamic).collect::<Vec<_>>()),
        Value::Object(obj) => Dynamic::from(
            obj.into_iter()
                .map(|(k, v)| (k.into(), json_to_dynamic(v)))
                .collect::<Map>(),
        ),
    }
}

pub fn dynamic_to_json(value: Dynamic) -> Value {
    if value.is_unit() {
        Value::Null
    } else if let Ok(b) = value.as_bool() {
        Value::Bool(b)
    } else if let Ok(i) = value.as_int() {
        Value::Number(i.into())
    } else if let Ok(f) = value.as_float() {
        serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    } else if value.is_string() {
        Value::String(value.to_string())
    } else if let Some(arr) = value.clone().try_cast::<rhai::Array>() {
        Value::Array(arr.into_iter().map(dynamic_to_json).collect())
    } else if let Some(map) = value.clone().try_cast::<Map>() {
        Value::Object(
            map.into_iter()
                .map(|(k, v)| (k.to_string(), dynamic_to_json(v)))
                .collect(),
        )
    } else {
        Value::String(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripting::ScriptAction;
    use serde_json::json;

    fn host() -> ScriptHost {
        ScriptHost::new(&ScriptingConfig::default())
    }

    fn request() -> ScriptRequest {
        ScriptRequest {
            url: "/api/users/7?verbose=1".into(),
            path: "/api/users/7".into(),
            method: "GET".into(),
            query: [("verbose".to_string(), "1".to_string())].into(),
            params: [("id".to_string(), "7".to_string())].into(),
            body: json!({"name": "ann"}),
            ..Default::default()
        }
    }

    fn run(source: &str) -> Result<ScriptOutcome, ScriptError> {
        let host = host();
        let ast = host.compile(source)?;
        host.run(&ast, request())
    }

    #[test]
    fn test_json_response_with_status_and_header() {
        let outcome = run(r#"
            res.status(201).header("x-id", req.params.id);
            res.json(#{ id: req.params.id, name: req.body.name, verbose: req.query.verbose == "1" });
        "#)
        .unwrap();

        assert_eq!(outcome.status, Some(201));
        assert_eq!(outcome.headers, vec![("x-id".to_string(), "7".to_string())]);
        match outcome.action {
            ScriptAction::Respond { body, .. } => {
                let value: Value = serde_json::from_slice(&body).unwrap();
                assert_eq!(value, json!({"id": "7", "name": "ann", "verbose": true}));
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn test_next_and_fail() {
        assert_eq!(run("res.next();").unwrap().action, ScriptAction::Next);
        assert_eq!(
            run(r#"res.fail("nope");"#).unwrap().action,
            ScriptAction::Fail("nope".into())
        );
        assert_eq!(run("let x = 1;").unwrap().action, ScriptAction::Unfinished);
    }

    #[test]
    fn test_modules() {
        let outcome = run(r#"
            import "url" as url;
            import "json" as json;
            let parsed = json::parse("{\"a\": [1, 2]}");
            res.send(url::resolve("http://h/a/b", "../c") + " " + url::encode("a b") + " " + json::stringify(parsed));
        "#)
        .unwrap();

        match outcome.action {
            ScriptAction::Respond { body, .. } => {
                assert_eq!(&body[..], br#"http://h/c a%20b {"a":[1,2]}"#);
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn test_filesystem_modules_are_unavailable() {
        let err = run(r#"import "some_file" as f; res.end();"#).unwrap_err();
        assert!(matches!(err, ScriptError::Runtime(_)));
    }

    #[test]
    fn test_compile_error() {
        assert!(matches!(host().compile("res.json(("), Err(ScriptError::Compile(_))));
    }

    #[test]
    fn test_runaway_script_is_stopped() {
        let err = run("loop { }").unwrap_err();
        assert!(matches!(err, ScriptError::Runtime(_)));
    }
}
