//! Canonical byte encoding for signed payloads.
//!
//! Every validator re-derives the signed message for a claim independently,
//! so the encoding must be byte-identical across implementations: keys are
//! sorted lexicographically, the output is compact JSON with no whitespace,
//! integers are rendered without a decimal point and floats always carry one.

use std::collections::BTreeMap;

/// A primitive field value admitted into a canonical payload.
#[derive(Debug, Clone, PartialEq)]
pub enum CanonicalValue {
    Str(String),
    Int(i64),
    Float(f64),
}

impl From<&str> for CanonicalValue {
    fn from(s: &str) -> Self {
        CanonicalValue::Str(s.to_string())
    }
}

impl From<String> for CanonicalValue {
    fn from(s: String) -> Self {
        CanonicalValue::Str(s)
    }
}

impl From<i64> for CanonicalValue {
    fn from(n: i64) -> Self {
        CanonicalValue::Int(n)
    }
}

impl From<f64> for CanonicalValue {
    fn from(n: f64) -> Self {
        CanonicalValue::Float(n)
    }
}

/// Encode a set of named primitives into canonical bytes.
///
/// The iteration order of the input does not matter; keys are emitted in
/// lexicographic order. Duplicate keys keep the last value.
pub fn encode<'a, I, V>(fields: I) -> Vec<u8>
where
    I: IntoIterator<Item = (&'a str, V)>,
    V: Into<CanonicalValue>,
{
    let sorted: BTreeMap<&str, CanonicalValue> = fields
        .into_iter()
        .map(|(name, value)| (name, value.into()))
        .collect();

    let mut out = String::from("{");
    for (i, (name, value)) in sorted.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&json_string(name));
        out.push(':');
        match value {
            CanonicalValue::Str(s) => out.push_str(&json_string(s)),
            CanonicalValue::Int(n) => out.push_str(&n.to_string()),
            CanonicalValue::Float(f) => out.push_str(&format_float(*f)),
        }
    }
    out.push('}');
    out.into_bytes()
}

fn json_string(s: &str) -> String {
    // serde_json's string serializer is the escaping authority here; a
    // hand-rolled escaper would be a second source of truth to keep in sync.
    serde_json::to_string(s).expect("string serialization is infallible")
}

/// Shortest round-trip decimal form, always with a decimal point so a float
/// field can never collide with the integer rendering of the same value.
fn format_float(f: f64) -> String {
    let s = format!("{}", f);
    if s.contains('.') || s.contains('e') || s.contains("inf") || s.contains("NaN") {
        s
    } else {
        format!("{}.0", s)
    }
}
