use serde::de::IgnoredAny;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::arg::Arg;

/// Structured view of one log call's arguments.
///
/// Built by [`classify`] and consumed by both renderers within the same call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClassifiedRecord {
    pub message: Arg,
    /// Named values, keyed by normalized key.
    pub fields: BTreeMap<String, Arg>,
    /// Trimmed JSON text arguments, in call order.
    pub raw_data: Vec<String>,
    pub trailing_error: Option<String>,
    /// Arguments that could not be attributed to anything else.
    pub leftovers: Vec<Arg>,
}

/// Classify call-site arguments. Never fails.
///
/// The first argument is the message. The rest go through, in order:
/// 1. a single remaining map (or JSON object value) is copied into `fields` and nothing else happens;
/// 2. string arguments holding valid JSON text are moved to `raw_data`;
/// 3. if what is left has odd length and ends with an error, it becomes `trailing_error`;
/// 4. the remainder is read as key/value pairs. Pairs with a non-string key and
///    a dangling final element go to `leftovers`.
pub fn classify(args: Vec<Arg>) -> ClassifiedRecord {
    let mut record = ClassifiedRecord::default();

    let mut args = args.into_iter();
    let Some(message) = args.next() else {
        return record;
    };
    record.message = message;
    let mut rest: Vec<Arg> = args.collect();

    if rest.len() == 1 && is_mapping(&rest[0]) {
        match rest.pop() {
            Some(Arg::Map(entries)) => {
                for (k, v) in entries {
                    record.fields.insert(normalize_key(&k).to_string(), v);
                }
            }
            Some(Arg::Json(Value::Object(entries))) => {
                for (k, v) in entries {
                    record.fields.insert(normalize_key(&k).to_string(), Arg::Json(v));
                }
            }
            _ => {}
        }
        return record;
    }

    let mut kv = Vec::with_capacity(rest.len());
    for arg in rest {
        match arg {
            Arg::Str(s) if is_json(s.trim()) => record.raw_data.push(s.trim().to_string()),
            other => kv.push(other),
        }
    }

    // Parity is checked after JSON text was pulled out, so an error followed
    // only by JSON arguments is still trailing.
    if kv.len() % 2 == 1 {
        if let Some(Arg::Error(_)) = kv.last() {
            if let Some(Arg::Error(msg)) = kv.pop() {
                record.trailing_error = Some(msg);
            }
        }
    }

    let mut pairs = kv.into_iter();
    while let Some(key) = pairs.next() {
        let Some(value) = pairs.next() else {
            record.leftovers.push(key);
            break;
        };
        match key {
            Arg::Str(k) => {
                record.fields.insert(normalize_key(&k).to_string(), value);
            }
            other => {
                record.leftovers.push(other);
                record.leftovers.push(value);
            }
        }
    }

    record
}

fn is_mapping(arg: &Arg) -> bool {
    matches!(arg, Arg::Map(_) | Arg::Json(Value::Object(_)))
}

/// Trim whitespace and drop a trailing ASCII colon, then a trailing full-width colon.
pub fn normalize_key(key: &str) -> &str {
    let key = key.trim();
    let key = key.strip_suffix(':').unwrap_or(key);
    key.strip_suffix('：').unwrap_or(key)
}

/// Whether `s` is one syntactically complete JSON value.
pub fn is_json(s: &str) -> bool {
    serde_json::from_str::<IgnoredAny>(s).is_ok()
}
