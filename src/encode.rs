use chrono::Local;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::borrow::Cow;
use std::fmt::Write as _;

use crate::arg::{write_list, Arg};
use crate::error::EncodeError;
use crate::level::{Format, Level};
use crate::record::{is_json, ClassifiedRecord};

/// `strftime` pattern of the `ts` key and of the text line prefix.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Keys owned by the line header; fields with these names are not emitted in JSON.
const RESERVED_KEYS: [&str; 5] = ["ts", "lv", "caller", "msg", "err"];

/// Local wall-clock time in [`TIMESTAMP_FORMAT`].
pub fn timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Per-line values that do not come from the call arguments.
#[derive(Debug, Clone, Copy)]
pub struct Header<'a> {
    pub ts: &'a str,
    pub level: Level,
    pub caller: &'a str,
}

/// Render `record` in `format`.
///
/// JSON encoding failures are replaced by a fixed-shape `marshal log failed`
/// line so the caller always gets something to write.
pub fn render(format: Format, header: &Header<'_>, record: &ClassifiedRecord) -> String {
    match format {
        Format::Json => encode_json(header, record)
            .unwrap_or_else(|e| failure_line(header, &e.to_string())),
        Format::Text => encode_text(header, record),
    }
}

/// One JSON object with keys `ts, lv, caller, msg`, the sorted fields, then
/// `data`, `args` and `err` when present. `err` is always last.
pub fn encode_json(header: &Header<'_>, record: &ClassifiedRecord) -> Result<String, EncodeError> {
    let mut obj = JsonObject::new();
    obj.entry("ts", header.ts)?;
    obj.entry("lv", header.level.as_str())?;
    obj.entry("caller", header.caller)?;
    obj.entry("msg", &Promoted(&record.message))?;

    let has_data = !record.raw_data.is_empty();
    let has_args = !record.leftovers.is_empty();

    for (key, value) in &record.fields {
        let key = key.as_str();
        if RESERVED_KEYS.contains(&key) || (has_data && key == "data") || (has_args && key == "args") {
            continue;
        }
        obj.entry(key, &Promoted(value))?;
    }

    match record.raw_data.as_slice() {
        [] => {}
        [blob] => obj.entry("data", &parse_or_text(blob))?,
        blobs => {
            let parsed: Vec<Value> = blobs.iter().map(|b| parse_or_text(b)).collect();
            obj.entry("data", &parsed)?;
        }
    }

    if has_args {
        obj.entry("args", &record.leftovers)?;
    }

    if let Some(err) = &record.trailing_error {
        obj.entry("err", err)?;
    }

    Ok(obj.finish())
}

/// `<ts> <LEVEL> <caller> <msg> [k=v ...] [err=...] [data=... ...] [args=[...]]`
pub fn encode_text(header: &Header<'_>, record: &ClassifiedRecord) -> String {
    let mut line = String::with_capacity(128);
    let _ = write!(
        line,
        "{} {} {} {}",
        header.ts, header.level, header.caller, record.message
    );

    for (key, value) in &record.fields {
        let _ = write!(line, " {}={}", key, text_value(value));
    }

    if let Some(err) = &record.trailing_error {
        let _ = write!(line, " err={}", text_value(&Arg::Str(err.clone())));
    }

    for blob in &record.raw_data {
        line.push_str(" data=");
        line.push_str(blob);
    }

    if !record.leftovers.is_empty() {
        line.push_str(" args=");
        let _ = write_list(&mut line, &record.leftovers);
    }

    line
}

/// Line emitted in place of a record that could not be encoded.
pub fn failure_line(header: &Header<'_>, failure: &str) -> String {
    format!(
        r#"{{"ts":{},"lv":"ERROR","caller":{},"msg":"marshal log failed","err":{}}}"#,
        quote(header.ts),
        quote(header.caller),
        quote(failure)
    )
}

/// Text form of a field value: JSON text is written as is, other strings and
/// errors are quoted, everything else uses its `Display` form.
fn text_value(value: &Arg) -> Cow<'_, str> {
    match value {
        Arg::Str(s) if is_json(s.trim()) => Cow::Borrowed(s),
        Arg::Str(s) | Arg::Error(s) => Cow::Owned(quote(s)),
        other => Cow::Owned(other.to_string()),
    }
}

fn quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
}

fn parse_or_text(blob: &str) -> Value {
    serde_json::from_str(blob).unwrap_or_else(|_| Value::String(blob.to_string()))
}

/// Serializes string arguments holding JSON text as the parsed value.
struct Promoted<'a>(&'a Arg);

impl Serialize for Promoted<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Arg::Str(s) => {
                let s = s.trim();
                match serde_json::from_str::<Value>(s) {
                    Ok(value) => value.serialize(serializer),
                    Err(_) => serializer.serialize_str(s),
                }
            }
            other => other.serialize(serializer),
        }
    }
}

/// Object writer that keeps keys in insertion order.
struct JsonObject {
    buf: String,
    empty: bool,
}

impl JsonObject {
    fn new() -> Self {
        let mut buf = String::with_capacity(256);
        buf.push('{');
        Self { buf, empty: true }
    }

    fn entry<V: Serialize + ?Sized>(&mut self, key: &str, value: &V) -> Result<(), EncodeError> {
        let value = serde_json::to_string(value)?;
        if !self.empty {
            self.buf.push(',');
        }
        self.empty = false;
        self.buf.push_str(&serde_json::to_string(key)?);
        self.buf.push(':');
        self.buf.push_str(&value);
        Ok(())
    }

    fn finish(mut self) -> String {
        self.buf.push('}');
        self.buf
    }
}
