//! `@name(args)` placeholders inside template strings.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, Utc};
use fake::faker::address::en::CityName;
use fake::faker::internet::en::{DomainSuffix, SafeEmail, IPv4};
use fake::faker::lorem::en::{Paragraph, Sentence, Word};
use fake::faker::name::en::{FirstName, LastName, Name};
use fake::Fake;
use rand::distributions::Alphanumeric;
use rand::Rng;
use regex::{Captures, Regex};
use serde_json::{Number, Value};
use std::sync::OnceLock;

const MAX_SAFE_INTEGER: i64 = 9_007_199_254_740_991;
const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static PLACEHOLDER_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_placeholder_regex() -> &'static Regex {
    PLACEHOLDER_REGEX.get_or_init(|| {
        Regex::new(r"@([a-zA-Z]+)(?:\(([^)]*)\))?")
            .unwrap_or_else(|e| unreachable!("static regex: {e}"))
    })
}

/// Expand every placeholder in `s`.
///
/// A string that is exactly one known placeholder becomes that
/// placeholder's native value (`"@integer(1, 5)"` gives a number). Unknown
/// placeholders are left as written.
pub fn expand_string<R: Rng + ?Sized>(s: &str, rng: &mut R) -> Value {
    let regex = get_placeholder_regex();

    if let Some(caps) = regex.captures(s) {
        if caps.get(0).map(|m| m.as_str().len()) == Some(s.len()) {
            if let Some(value) = generate(&caps, rng) {
                return value;
            }
        }
    } else {
        return Value::String(s.to_string());
    }

    let expanded = regex.replace_all(s, |caps: &Captures| match generate(caps, rng) {
        Some(Value::String(text)) => text,
        Some(other) => other.to_string(),
        None => caps[0].to_string(),
    });
    Value::String(expanded.into_owned())
}

fn generate<R: Rng + ?Sized>(caps: &Captures, rng: &mut R) -> Option<Value> {
    let name = caps.get(1)?.as_str().to_lowercase();
    let args = Args::parse(caps.get(2).map_or("", |m| m.as_str()));

    let value = match name.as_str() {
        "integer" | "int" => {
            let (min, max) = args.int_range(-MAX_SAFE_INTEGER, MAX_SAFE_INTEGER);
            Value::from(rng.gen_range(min..=max))
        }
        "natural" => {
            let (min, max) = args.int_range(0, MAX_SAFE_INTEGER);
            Value::from(rng.gen_range(min.max(0)..=max.max(0)))
        }
        "float" => {
            let (min, max) = args.int_range(-10_000, 10_000);
            let dmin = args.int(2).unwrap_or(0).clamp(0, 10) as u32;
            let dmax = args.int(3).unwrap_or(dmin as i64).clamp(dmin as i64, 10) as u32;
            let whole = rng.gen_range(min..=max);
            let digits = rng.gen_range(dmin..=dmax);
            if digits == 0 {
                Value::from(whole)
            } else {
                let frac = rng.gen_range(0..10_u64.pow(digits));
                let text = format!("{whole}.{frac:0width$}", width = digits as usize);
                text.parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map(Value::Number)?
            }
        }
        "boolean" | "bool" => Value::Bool(rng.gen()),
        "string" => {
            let (min, max) = match (args.int(0), args.int(1)) {
                (Some(min), Some(max)) => (min, max),
                (Some(len), None) => (len, len),
                _ => (3, 7),
            };
            let len = rng.gen_range(min.clamp(0, 10_000)..=max.clamp(min.clamp(0, 10_000), 10_000));
            let text: String = (0..len)
                .map(|_| rng.sample(Alphanumeric) as char)
                .collect();
            Value::String(text)
        }
        "word" => Value::String(Word().fake_with_rng(rng)),
        "sentence" => Value::String(Sentence(3..10).fake_with_rng(rng)),
        "paragraph" => Value::String(Paragraph(3..7).fake_with_rng(rng)),
        "name" => Value::String(Name().fake_with_rng(rng)),
        "first" => Value::String(FirstName().fake_with_rng(rng)),
        "last" => Value::String(LastName().fake_with_rng(rng)),
        "email" => Value::String(SafeEmail().fake_with_rng(rng)),
        "url" => {
            let host: String = Word().fake_with_rng(rng);
            let suffix: String = DomainSuffix().fake_with_rng(rng);
            let path: String = Word().fake_with_rng(rng);
            Value::String(format!("http://{host}.{suffix}/{path}"))
        }
        "ip" => Value::String(IPv4().fake_with_rng(rng)),
        "city" => Value::String(CityName().fake_with_rng(rng)),
        "guid" | "uuid" => {
            let bytes: [u8; 16] = rng.gen();
            Value::String(uuid::Builder::from_random_bytes(bytes).into_uuid().to_string())
        }
        "date" => Value::String(random_datetime(rng).format(args.text(0, DATE_FORMAT)).to_string()),
        "time" => Value::String(random_datetime(rng).format(args.text(0, TIME_FORMAT)).to_string()),
        "datetime" => {
            Value::String(random_datetime(rng).format(args.text(0, DATETIME_FORMAT)).to_string())
        }
        "now" => Value::String(Local::now().format(args.text(0, DATETIME_FORMAT)).to_string()),
        _ => return None,
    };
    Some(value)
}

/// A moment between the epoch and now.
fn random_datetime<R: Rng + ?Sized>(rng: &mut R) -> DateTime<Utc> {
    let now = Utc::now().timestamp();
    let secs = rng.gen_range(0..=now.max(0));
    DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or_default()
}

/// Comma-separated placeholder arguments, quotes stripped.
struct Args(Vec<String>);

impl Args {
    fn parse(raw: &str) -> Self {
        let items = raw
            .split(',')
            .map(|a| a.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
            .filter(|a| !a.is_empty())
            .collect();
        Args(items)
    }

    fn int(&self, i: usize) -> Option<i64> {
        self.0.get(i)?.parse().ok()
    }

    fn int_range(&self, default_min: i64, default_max: i64) -> (i64, i64) {
        let min = self.int(0).unwrap_or(default_min);
        let max = self.int(1).unwrap_or(default_max.max(min));
        (min.min(max), min.max(max))
    }

    /// strftime format argument, or `default` when absent or invalid.
    fn text<'a>(&'a self, i: usize, default: &'a str) -> &'a str {
        match self.0.get(i) {
            Some(fmt)
                if fmt.contains('%')
                    && !StrftimeItems::new(fmt).any(|item| matches!(item, Item::Error)) =>
            {
                fmt
            }
            _ => default,
        }
    }
}
