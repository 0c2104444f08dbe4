//! Random data templates for `templated` rules.
//!
//! A template is a JSON value. Object keys may carry a generation rule after
//! a `|`, and strings may contain `@placeholder` calls:
//!
//! ```json
//! {
//!   "list|2-4": [{ "id|+1": 1, "name": "@name", "score|1-100.1-2": 0 }],
//!   "active|1": true,
//!   "tag|1": ["a", "b", "c"],
//!   "created": "@datetime"
//! }
//! ```
//!
//! # Key rules
//!
//! | Rule | String | Number | Boolean | Object | Array |
//! |------|--------|--------|---------|--------|-------|
//! | `n` | repeat n times | `n` | random | pick n keys | `n == 1`: pick one, else repeat n times |
//! | `min-max` | repeat | random integer | `value` with probability `min/(min+max)` | pick keys | repeat |
//! | `min-max.dmin-dmax` | | random float | | | |
//! | `+step` | | `value + step * index` | | | element at `index` |
//!
//! `index` is the position of the enclosing object among the items of the
//! nearest repeated array.
//!
//! Every call draws fresh random values.

mod placeholder;

pub use placeholder::expand_string;

use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use serde_json::{Map, Number, Value};
use std::sync::OnceLock;

/// Upper bound on any single repeat count.
pub const MAX_REPEAT: u64 = 10_000;

/// Largest boolean weight; keeps `min + max` inside `u32`.
const RATIO_LIMIT: i64 = (u32::MAX / 2) as i64;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("repeat count {count} for '{key}' exceeds {MAX_REPEAT}")]
    TooLarge { key: String, count: u64 },
    #[error("step {step} for '{key}' overflows at item {index}")]
    Overflow { key: String, step: i64, index: u64 },
}

static RULE_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_rule_regex() -> &'static Regex {
    RULE_REGEX.get_or_init(|| {
        Regex::new(r"^(\+)?(-?\d+)(?:-(-?\d+))?(?:\.(\d+)(?:-(\d+))?)?$")
            .unwrap_or_else(|e| unreachable!("static regex: {e}"))
    })
}

/// Parsed `|rule` suffix of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyRule {
    Step(i64),
    Count {
        n: i64,
        decimals: Option<(u32, u32)>,
    },
    Range {
        min: i64,
        max: i64,
        decimals: Option<(u32, u32)>,
    },
}

impl KeyRule {
    fn parse(rule: &str) -> Option<Self> {
        let caps = get_rule_regex().captures(rule.trim())?;
        let first: i64 = caps.get(2)?.as_str().parse().ok()?;
        if caps.get(1).is_some() {
            return Some(KeyRule::Step(first));
        }

        let decimals = caps.get(4).and_then(|dmin| {
            let dmin: u32 = dmin.as_str().parse().ok()?;
            let dmax = caps
                .get(5)
                .and_then(|d| d.as_str().parse().ok())
                .unwrap_or(dmin);
            Some((dmin.min(dmax), dmin.max(dmax)))
        });

        match caps.get(3).and_then(|m| m.as_str().parse::<i64>().ok()) {
            Some(second) => Some(KeyRule::Range {
                min: first,
                max: second,
                decimals,
            }),
            None => Some(KeyRule::Count { n: first, decimals }),
        }
    }

    /// Repeat count drawn from the rule. `Range` keeps the written order
    /// (`true|1-0` is not `true|0-1`), so bounds are sorted here.
    fn amount<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        match *self {
            KeyRule::Step(_) => 1,
            KeyRule::Count { n, .. } => n.max(0) as u64,
            KeyRule::Range { min, max, .. } => {
                rng.gen_range(min.min(max)..=min.max(max)).max(0) as u64
            }
        }
    }
}

/// Split `name|rule` into the output key and its parsed rule.
fn split_key(key: &str) -> (&str, Option<KeyRule>) {
    match key.split_once('|') {
        Some((name, rule)) => match KeyRule::parse(rule) {
            Some(rule) => (name, Some(rule)),
            None => (name, None),
        },
        None => (key, None),
    }
}

/// Expand a template with the thread-local RNG.
pub fn render(template: &Value) -> Result<Value, TemplateError> {
    render_with(template, &mut rand::thread_rng())
}

/// Expand a template with a caller-supplied RNG.
pub fn render_with<R: Rng + ?Sized>(template: &Value, rng: &mut R) -> Result<Value, TemplateError> {
    let mut renderer = Renderer { rng };
    renderer.value("", template, None, 0)
}

struct Renderer<'r, R: ?Sized> {
    rng: &'r mut R,
}

impl<R: Rng + ?Sized> Renderer<'_, R> {
    fn value(
        &mut self,
        key: &str,
        template: &Value,
        rule: Option<KeyRule>,
        index: u64,
    ) -> Result<Value, TemplateError> {
        match template {
            Value::String(s) => self.string(key, s, rule),
            Value::Number(n) => self.number(key, n, rule, index),
            Value::Bool(b) => Ok(Value::Bool(self.boolean(*b, rule))),
            Value::Object(map) => self.object(key, map, rule, index),
            Value::Array(items) => self.array(key, items, rule, index),
            Value::Null => Ok(Value::Null),
        }
    }

    fn string(&mut self, key: &str, s: &str, rule: Option<KeyRule>) -> Result<Value, TemplateError> {
        let Some(rule @ (KeyRule::Count { .. } | KeyRule::Range { .. })) = rule else {
            return Ok(expand_string(s, self.rng));
        };
        let times = self.checked_amount(key, rule)?;
        let mut out = String::with_capacity(s.len() * times as usize);
        for _ in 0..times {
            match expand_string(s, self.rng) {
                Value::String(part) => out.push_str(&part),
                other => out.push_str(&other.to_string()),
            }
        }
        Ok(Value::String(out))
    }

    fn number(
        &mut self,
        key: &str,
        n: &Number,
        rule: Option<KeyRule>,
        index: u64,
    ) -> Result<Value, TemplateError> {
        let value = match rule {
            None => Value::Number(n.clone()),
            Some(KeyRule::Step(step)) => {
                let overflow = || TemplateError::Overflow {
                    key: key.to_string(),
                    step,
                    index,
                };
                let offset = i64::try_from(index)
                    .ok()
                    .and_then(|i| step.checked_mul(i))
                    .ok_or_else(overflow)?;
                match n.as_i64() {
                    Some(base) => Value::from(base.checked_add(offset).ok_or_else(overflow)?),
                    None => float_value(n.as_f64().unwrap_or(0.0) + offset as f64),
                }
            }
            Some(KeyRule::Count { n: whole, decimals }) => {
                self.random_number(whole, whole, decimals.or_else(|| own_decimals(n)))
            }
            Some(KeyRule::Range { min, max, decimals }) => {
                self.random_number(min, max, decimals.or_else(|| own_decimals(n)))
            }
        };
        Ok(value)
    }

    fn random_number(&mut self, min: i64, max: i64, decimals: Option<(u32, u32)>) -> Value {
        let whole = self.rng.gen_range(min.min(max)..=min.max(max));
        let Some((dmin, dmax)) = decimals else {
            return Value::from(whole);
        };
        let digits = self.rng.gen_range(dmin..=dmax).min(10);
        if digits == 0 {
            return Value::from(whole);
        }
        let scale = 10_u64.pow(digits);
        // Last digit non-zero so the decimal count survives formatting
        let frac = self.rng.gen_range(0..scale / 10) * 10 + self.rng.gen_range(1..10);
        let text = format!("{whole}.{frac:0width$}", width = digits as usize);
        text.parse::<f64>().map(float_value).unwrap_or(Value::Null)
    }

    fn boolean(&mut self, value: bool, rule: Option<KeyRule>) -> bool {
        match rule {
            Some(KeyRule::Range { min, max, .. })
                if min != max && (0..=RATIO_LIMIT).contains(&min) && (0..=RATIO_LIMIT).contains(&max) =>
            {
                let keep = self.rng.gen_ratio(min as u32, (min + max) as u32);
                if keep {
                    value
                } else {
                    !value
                }
            }
            Some(KeyRule::Count { .. } | KeyRule::Range { .. }) => self.rng.gen(),
            _ => value,
        }
    }

    fn object(
        &mut self,
        key: &str,
        map: &Map<String, Value>,
        rule: Option<KeyRule>,
        index: u64,
    ) -> Result<Value, TemplateError> {
        let keys: Vec<&String> = match rule {
            Some(rule @ (KeyRule::Count { .. } | KeyRule::Range { .. })) => {
                let take = (self.checked_amount(key, rule)? as usize).min(map.len());
                let all: Vec<&String> = map.keys().collect();
                let mut picked: Vec<&String> =
                    all.choose_multiple(self.rng, take).copied().collect();
                // Keep template order among the picked keys
                picked.sort_by_key(|k| map.keys().position(|other| other == *k));
                picked
            }
            _ => map.keys().collect(),
        };

        let mut out = Map::new();
        for raw in keys {
            let (name, child_rule) = split_key(raw);
            let value = self.value(name, &map[raw.as_str()], child_rule, index)?;
            out.insert(name.to_string(), value);
        }
        Ok(Value::Object(out))
    }

    fn array(
        &mut self,
        key: &str,
        items: &[Value],
        rule: Option<KeyRule>,
        index: u64,
    ) -> Result<Value, TemplateError> {
        match rule {
            None => {
                let rendered = items
                    .iter()
                    .map(|item| self.value(key, item, None, index))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Array(rendered))
            }
            Some(_) if items.is_empty() => Ok(Value::Array(Vec::new())),
            Some(KeyRule::Step(_)) => {
                let item = &items[index as usize % items.len()];
                self.value(key, item, None, index)
            }
            Some(KeyRule::Count { n: 1, .. }) => {
                let pick = self.rng.gen_range(0..items.len());
                self.value(key, &items[pick], None, index)
            }
            Some(rule) => {
                let times = self.checked_amount(key, rule)?;
                let mut out = Vec::with_capacity(times as usize * items.len());
                for i in 0..times {
                    for item in items {
                        out.push(self.value(key, item, None, i)?);
                    }
                }
                Ok(Value::Array(out))
            }
        }
    }

    fn checked_amount(&mut self, key: &str, rule: KeyRule) -> Result<u64, TemplateError> {
        let count = rule.amount(self.rng);
        if count > MAX_REPEAT {
            return Err(TemplateError::TooLarge {
                key: key.to_string(),
                count,
            });
        }
        Ok(count)
    }
}

/// Decimal count of a non-integer template number, as a fixed range.
fn own_decimals(n: &Number) -> Option<(u32, u32)> {
    if n.is_f64() {
        let text = n.to_string();
        let digits = text.split_once('.').map(|(_, frac)| frac.len() as u32)?;
        Some((digits, digits))
    } else {
        None
    }
}

fn float_value(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_plain_values_pass_through() {
        let template = json!({"a": 1, "b": [true, null], "c": {"d": "text"}});
        assert_eq!(render_with(&template, &mut rng()).unwrap(), template);
    }

    #[test]
    fn test_key_rule_parsing() {
        assert_eq!(KeyRule::parse("+2"), Some(KeyRule::Step(2)));
        assert_eq!(
            KeyRule::parse("3"),
            Some(KeyRule::Count {
                n: 3,
                decimals: None
            })
        );
        assert_eq!(
            KeyRule::parse("1-10.2-4"),
            Some(KeyRule::Range {
                min: 1,
                max: 10,
                decimals: Some((2, 4))
            })
        );
        assert_eq!(KeyRule::parse("abc"), None);
    }

    #[test]
    fn test_array_repeat_with_step() {
        let template = json!({"list|3": [{"id|+1": 1}]});
        let out = render_with(&template, &mut rng()).unwrap();
        assert_eq!(out, json!({"list": [{"id": 1}, {"id": 2}, {"id": 3}]}));
    }

    #[test]
    fn test_array_range_and_pick() {
        let mut rng = rng();
        for _ in 0..20 {
            let out = render_with(&json!({"l|2-4": ["x"], "one|1": ["a", "b"]}), &mut rng).unwrap();
            let len = out["l"].as_array().unwrap().len();
            assert!((2..=4).contains(&len));
            assert!(out["one"] == "a" || out["one"] == "b");
        }
    }

    #[test]
    fn test_string_repeat() {
        let out = render_with(&json!({"s|3": "ab"}), &mut rng()).unwrap();
        assert_eq!(out["s"], "ababab");
    }

    #[test]
    fn test_number_rules() {
        let mut rng = rng();
        for _ in 0..50 {
            let out = render_with(&json!({"n|1-10": 0, "f|1-10.2": 0}), &mut rng).unwrap();
            let n = out["n"].as_i64().unwrap();
            assert!((1..=10).contains(&n));
            let f = out["f"].as_f64().unwrap();
            assert!((1.0..11.0).contains(&f));
            let text = out["f"].to_string();
            assert_eq!(text.split_once('.').unwrap().1.len(), 2);
        }
    }

    #[test]
    fn test_boolean_probability_edges() {
        let mut rng = rng();
        for _ in 0..20 {
            let out = render_with(&json!({"always|1-0": true}), &mut rng).unwrap();
            assert_eq!(out["always"], true);
        }
    }

    #[test]
    fn test_object_pick_keeps_order() {
        let mut rng = rng();
        for _ in 0..20 {
            let out = render_with(&json!({"o|2": {"c": 1, "a": 2, "b": 3}}), &mut rng).unwrap();
            let keys: Vec<&str> = out["o"].as_object().unwrap().keys().map(String::as_str).collect();
            assert_eq!(keys.len(), 2);
            let order = ["c", "a", "b"];
            let pos = |k: &str| order.iter().position(|o| *o == k).unwrap();
            assert!(pos(keys[0]) < pos(keys[1]));
        }
    }

    #[test]
    fn test_output_keeps_template_key_order() {
        let template = json!({"zeta": 1, "alpha|+1": 2, "mid": "@word"});
        let out = render_with(&template, &mut rng()).unwrap();
        let keys: Vec<&String> = out.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_step_overflow_is_an_error() {
        let template = json!({"list|3": [{"id|+9223372036854775807": 1}]});
        let err = render_with(&template, &mut rng()).unwrap_err();
        assert_eq!(
            err,
            TemplateError::Overflow {
                key: "id".into(),
                step: i64::MAX,
                index: 1
            }
        );

        let floats = json!({"list|3": [{"v|+9223372036854775807": 0.5}]});
        assert!(matches!(
            render_with(&floats, &mut rng()),
            Err(TemplateError::Overflow { index: 2, .. })
        ));
    }

    #[test]
    fn test_repeat_limit() {
        let err = render_with(&json!({"big|100000": ["x"]}), &mut rng()).unwrap_err();
        assert_eq!(
            err,
            TemplateError::TooLarge {
                key: "big".into(),
                count: 100_000
            }
        );
    }
}
