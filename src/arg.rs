use serde::ser::{Error as _, SerializeMap};
use serde::{Serialize, Serializer};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// One call-site argument.
///
/// Log entry points take an ordered list of these; the first is the message
/// and the rest are classified into fields, raw JSON data, a trailing error
/// and leftovers (see [`crate::record::classify`]). Only [`Arg::Str`] counts
/// as string-typed and only [`Arg::Error`] counts as error-typed.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(String),
    /// Error value, stored as its message.
    Error(String),
    List(Vec<Arg>),
    /// Key/value mapping in insertion order.
    Map(Vec<(String, Arg)>),
    /// Already structured value.
    Json(serde_json::Value),
    /// Value captured through `Display`/`Debug`; rendered as text, never treated as a key.
    Opaque(String),
    /// Value whose serialization failed; rendering it as JSON fails with this message.
    Unencodable(String),
}

impl Default for Arg {
    fn default() -> Self {
        Arg::Str(String::new())
    }
}

impl Arg {
    /// Error-typed argument carrying `e`'s message.
    pub fn error(e: impl fmt::Display) -> Self {
        Arg::Error(e.to_string())
    }

    pub fn display(v: impl fmt::Display) -> Self {
        Arg::Opaque(v.to_string())
    }

    pub fn debug(v: impl fmt::Debug) -> Self {
        Arg::Opaque(format!("{:?}", v))
    }

    /// Structured argument from any serializable value.
    ///
    /// A value that cannot be represented as JSON is kept as
    /// [`Arg::Unencodable`] and makes the JSON rendering of its line fail.
    pub fn serialize<T: Serialize + ?Sized>(v: &T) -> Self {
        match serde_json::to_value(v) {
            Ok(value) => Arg::Json(value),
            Err(e) => Arg::Unencodable(e.to_string()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Arg::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Arg::Error(_))
    }
}

/// Shorthand for [`Arg::error`], meant for use inside the logging macros.
///
/// ```
/// let e = std::io::Error::new(std::io::ErrorKind::Other, "boom");
/// kvlog::error!("write failed", "path", "/tmp/x", kvlog::err(&e));
/// ```
pub fn err(e: impl fmt::Display) -> Arg {
    Arg::error(e)
}

impl Serialize for Arg {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Arg::Null => serializer.serialize_unit(),
            Arg::Bool(b) => serializer.serialize_bool(*b),
            Arg::Int(i) => serializer.serialize_i64(*i),
            Arg::Uint(u) => serializer.serialize_u64(*u),
            Arg::Float(f) if is_whole(*f) => serializer.serialize_i64(*f as i64),
            Arg::Float(f) if f.is_finite() => serializer.serialize_f64(*f),
            Arg::Float(f) => Err(S::Error::custom(format!("unsupported value: {}", f))),
            Arg::Str(s) | Arg::Error(s) | Arg::Opaque(s) => serializer.serialize_str(s),
            Arg::List(items) => serializer.collect_seq(items),
            Arg::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Arg::Json(value) => value.serialize(serializer),
            Arg::Unencodable(msg) => Err(S::Error::custom(msg)),
        }
    }
}

/// Whole floats within the exactly representable integer range are written
/// without a fraction, matching their `Display` form.
fn is_whole(f: f64) -> bool {
    const EXACT: f64 = 9_007_199_254_740_992.0;
    f.is_finite() && f.fract() == 0.0 && f.abs() <= EXACT
}

/// Default textual form, used by the text renderer for non-string values.
impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Null => f.write_str("null"),
            Arg::Bool(b) => write!(f, "{}", b),
            Arg::Int(i) => write!(f, "{}", i),
            Arg::Uint(u) => write!(f, "{}", u),
            Arg::Float(x) => write!(f, "{}", x),
            Arg::Str(s) | Arg::Error(s) | Arg::Opaque(s) => f.write_str(s),
            Arg::List(items) => write_list(f, items),
            Arg::Map(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}:{}", k, v)?;
                }
                f.write_str("}")
            }
            Arg::Json(value) => write!(f, "{}", value),
            Arg::Unencodable(msg) => write!(f, "!(unencodable: {})", msg),
        }
    }
}

/// `[a b c]`, space separated.
pub(crate) fn write_list(f: &mut dyn fmt::Write, items: &[Arg]) -> fmt::Result {
    f.write_str("[")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{}", item)?;
    }
    f.write_str("]")
}

macro_rules! from_signed {
    ($($t:ty),*) => {
        $(impl From<$t> for Arg {
            fn from(v: $t) -> Self {
                Arg::Int(v as i64)
            }
        })*
    };
}

macro_rules! from_unsigned {
    ($($t:ty),*) => {
        $(impl From<$t> for Arg {
            fn from(v: $t) -> Self {
                Arg::Uint(v as u64)
            }
        })*
    };
}

from_signed!(i8, i16, i32, i64, isize);
from_unsigned!(u8, u16, u32, u64, usize);

impl From<f32> for Arg {
    fn from(v: f32) -> Self {
        Arg::Float(v as f64)
    }
}

impl From<f64> for Arg {
    fn from(v: f64) -> Self {
        Arg::Float(v)
    }
}

impl From<bool> for Arg {
    fn from(v: bool) -> Self {
        Arg::Bool(v)
    }
}

impl From<char> for Arg {
    fn from(v: char) -> Self {
        Arg::Str(v.to_string())
    }
}

impl From<&str> for Arg {
    fn from(v: &str) -> Self {
        Arg::Str(v.to_string())
    }
}

impl From<String> for Arg {
    fn from(v: String) -> Self {
        Arg::Str(v)
    }
}

impl From<&String> for Arg {
    fn from(v: &String) -> Self {
        Arg::Str(v.clone())
    }
}

impl From<Cow<'_, str>> for Arg {
    fn from(v: Cow<'_, str>) -> Self {
        Arg::Str(v.into_owned())
    }
}

impl From<serde_json::Value> for Arg {
    fn from(v: serde_json::Value) -> Self {
        Arg::Json(v)
    }
}

impl From<std::io::Error> for Arg {
    fn from(e: std::io::Error) -> Self {
        Arg::error(e)
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for Arg {
    fn from(e: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Arg::error(e)
    }
}

impl<T: Into<Arg>> From<Option<T>> for Arg {
    fn from(v: Option<T>) -> Self {
        v.map_or(Arg::Null, Into::into)
    }
}

impl<T: Into<Arg>> From<Vec<T>> for Arg {
    fn from(v: Vec<T>) -> Self {
        Arg::List(v.into_iter().map(Into::into).collect())
    }
}

impl<K: Into<String>, V: Into<Arg>> From<BTreeMap<K, V>> for Arg {
    fn from(m: BTreeMap<K, V>) -> Self {
        Arg::Map(m.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K: Into<String>, V: Into<Arg>, S> From<HashMap<K, V, S>> for Arg {
    fn from(m: HashMap<K, V, S>) -> Self {
        let mut entries: Vec<(String, Arg)> =
            m.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Arg::Map(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalar_conversions() {
        assert_eq!(Arg::from(18), Arg::Int(18));
        assert_eq!(Arg::from(18u8), Arg::Uint(18));
        assert_eq!(Arg::from("x"), Arg::Str("x".into()));
        assert_eq!(Arg::from(None::<i32>), Arg::Null);
        assert_eq!(Arg::from(Some(true)), Arg::Bool(true));
    }

    #[test]
    fn io_error_is_error_typed() {
        let e = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let arg = Arg::from(e);
        assert!(arg.is_error());
        assert_eq!(arg.to_string(), "disk full");
    }

    #[test]
    fn hash_map_entries_are_sorted() {
        let mut m = HashMap::new();
        m.insert("b", 2);
        m.insert("a", 1);
        assert_eq!(
            Arg::from(m),
            Arg::Map(vec![("a".into(), Arg::Int(1)), ("b".into(), Arg::Int(2))])
        );
    }

    #[test]
    fn serializes_nested_values() {
        let arg = Arg::Map(vec![
            ("list".into(), Arg::from(vec![1, 2])),
            ("err".into(), err("boom")),
        ]);
        assert_eq!(
            serde_json::to_value(&arg).unwrap(),
            json!({"list": [1, 2], "err": "boom"})
        );
    }

    #[test]
    fn whole_floats_serialize_without_fraction() {
        assert_eq!(serde_json::to_string(&Arg::Float(18.0)).unwrap(), "18");
        assert_eq!(serde_json::to_string(&Arg::Float(-3.0)).unwrap(), "-3");
        assert_eq!(serde_json::to_string(&Arg::Float(1.5)).unwrap(), "1.5");
        assert_eq!(serde_json::to_string(&Arg::Float(1e300)).unwrap(), "1e300");
        assert_eq!(Arg::Float(18.0).to_string(), "18");
    }

    #[test]
    fn non_finite_float_fails_to_serialize() {
        let e = serde_json::to_string(&Arg::Float(f64::NAN)).unwrap_err();
        assert!(e.to_string().contains("unsupported value: NaN"));
        assert!(serde_json::to_string(&Arg::Unencodable("bad".into())).is_err());
    }

    #[test]
    fn serialize_captures_failures() {
        let mut bad = BTreeMap::new();
        bad.insert(vec![1u8], "non-string key");
        assert!(matches!(Arg::serialize(&bad), Arg::Unencodable(_)));
        assert_eq!(Arg::serialize(&[1, 2]), Arg::Json(json!([1, 2])));
    }

    #[test]
    fn display_forms() {
        assert_eq!(Arg::from(vec!["a", "b"]).to_string(), "[a b]");
        assert_eq!(Arg::Null.to_string(), "null");
        assert_eq!(Arg::Float(1.5).to_string(), "1.5");
        assert_eq!(Arg::debug("q").to_string(), "\"q\"");
    }
}
