use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

/// Ordered field map used for documents, working copies and nested objects.
pub type ParamMap = IndexMap<String, ParamValue>;

/// Represents a number that can preserve distinction between I64, U64, and F64.
/// The report service distinguishes `Verbosity: 1` from `Verbosity: 1.0` in some readers.
/// Integers compare by value whatever their variant; floats only equal floats.
#[derive(Debug, Clone)]
pub enum ParamNumber {
    I64(i64),
    U64(u64),
    F64(f64),
}

impl PartialEq for ParamNumber {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ParamNumber::F64(a), ParamNumber::F64(b)) => a == b,
            (ParamNumber::F64(_), _) | (_, ParamNumber::F64(_)) => false,
            (a, b) => a.integer() == b.integer(),
        }
    }
}

impl ParamNumber {
    fn integer(&self) -> Option<i128> {
        match self {
            ParamNumber::I64(v) => Some(i128::from(*v)),
            ParamNumber::U64(v) => Some(i128::from(*v)),
            ParamNumber::F64(_) => None,
        }
    }

    /// Text shown in a form field for this number.
    /// Whole floats print without a fractional part (`3.0` -> `"3"`).
    pub fn to_field_text(&self) -> String {
        match self {
            ParamNumber::I64(v) => v.to_string(),
            ParamNumber::U64(v) => v.to_string(),
            ParamNumber::F64(v) => format_f64(*v),
        }
    }
}

pub(crate) fn format_f64(v: f64) -> String {
    if v.is_nan() {
        return "NaN".to_string();
    }
    if v.is_infinite() {
        return if v.is_sign_negative() {
            "-Infinity".to_string()
        } else {
            "Infinity".to_string()
        };
    }
    if v.fract() == 0.0 && v.abs() < 1e15 {
        return format!("{}", v as i64);
    }
    let mut buf = ryu::Buffer::new();
    buf.format_finite(v).to_string()
}

impl Serialize for ParamNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ParamNumber::I64(v) => serializer.serialize_i64(*v),
            ParamNumber::U64(v) => serializer.serialize_u64(*v),
            ParamNumber::F64(v) => serializer.serialize_f64(*v),
        }
    }
}

/// A value in the parameter document: strings, numbers, booleans, lists and nested mappings.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Number(ParamNumber),
    String(String),
    Array(Vec<ParamValue>),
    Object(ParamMap),
}

impl Default for ParamValue {
    fn default() -> Self {
        ParamValue::Object(ParamMap::new())
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::String(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::String(s)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Number(ParamNumber::I64(v))
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Number(ParamNumber::F64(v))
    }
}

impl From<ParamMap> for ParamValue {
    fn from(map: ParamMap) -> Self {
        ParamValue::Object(map)
    }
}

impl From<Vec<ParamValue>> for ParamValue {
    fn from(values: Vec<ParamValue>) -> Self {
        ParamValue::Array(values)
    }
}

impl ParamValue {
    pub fn empty_object() -> Self {
        ParamValue::Object(ParamMap::new())
    }

    pub fn string_list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ParamValue::Array(
            items
                .into_iter()
                .map(|s| ParamValue::String(s.into()))
                .collect(),
        )
    }

    pub fn as_object(&self) -> Option<&ParamMap> {
        match self {
            ParamValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut ParamMap> {
        match self {
            ParamValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn into_object(self) -> Option<ParamMap> {
        match self {
            ParamValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[ParamValue]> {
        match self {
            ParamValue::Array(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ParamValue::Null)
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.as_object().and_then(|m| m.get(key))
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut ParamValue> {
        self.as_object_mut().and_then(|m| m.get_mut(key))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Null => "null",
            ParamValue::Bool(_) => "bool",
            ParamValue::Number(_) => "number",
            ParamValue::String(_) => "string",
            ParamValue::Array(_) => "array",
            ParamValue::Object(_) => "object",
        }
    }

    /// Scalar rendered as form text; `None` for null, lists and objects.
    pub fn scalar_text(&self) -> Option<String> {
        match self {
            ParamValue::String(s) => Some(s.clone()),
            ParamValue::Number(n) => Some(n.to_field_text()),
            ParamValue::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn parse_json5(text: &str) -> anyhow::Result<ParamValue> {
        Ok(json5::from_str::<ParamValue>(text)?)
    }

    /// Canonical single-line serialization. Two values serialize identically iff they are
    /// structurally equal with the same key order.
    pub fn to_json_compact(&self) -> String {
        let mut out = String::new();
        self.write_json(&mut out, 0, false);
        out
    }

    pub fn to_json_pretty(&self) -> String {
        let mut out = String::new();
        self.write_json(&mut out, 0, true);
        out.push('\n');
        out
    }

    fn write_json(&self, out: &mut String, indent: usize, pretty: bool) {
        match self {
            ParamValue::Null => out.push_str("null"),
            ParamValue::Bool(v) => out.push_str(if *v { "true" } else { "false" }),
            ParamValue::Number(n) => n.write_json(out),
            ParamValue::String(s) => write_escaped_string(out, s),
            ParamValue::Array(values) => {
                out.push('[');
                if pretty && !values.is_empty() {
                    out.push('\n');
                }
                for (i, v) in values.iter().enumerate() {
                    if pretty {
                        out.push_str(&" ".repeat(indent + 2));
                    }
                    v.write_json(out, indent + 2, pretty);
                    if i + 1 != values.len() {
                        out.push(',');
                    }
                    if pretty {
                        out.push('\n');
                    }
                }
                if pretty && !values.is_empty() {
                    out.push_str(&" ".repeat(indent));
                }
                out.push(']');
            }
            ParamValue::Object(map) => {
                out.push('{');
                if pretty && !map.is_empty() {
                    out.push('\n');
                }
                for (i, (k, v)) in map.iter().enumerate() {
                    if pretty {
                        out.push_str(&" ".repeat(indent + 2));
                    }
                    write_escaped_string(out, k);
                    out.push(':');
                    if pretty {
                        out.push(' ');
                    }
                    v.write_json(out, indent + 2, pretty);
                    if i + 1 != map.len() {
                        out.push(',');
                    }
                    if pretty {
                        out.push('\n');
                    }
                }
                if pretty && !map.is_empty() {
                    out.push_str(&" ".repeat(indent));
                }
                out.push('}');
            }
        }
    }
}

impl ParamNumber {
    fn write_json(&self, out: &mut String) {
        match self {
            ParamNumber::I64(v) => out.push_str(&v.to_string()),
            ParamNumber::U64(v) => out.push_str(&v.to_string()),
            ParamNumber::F64(v) => {
                if !v.is_finite() {
                    // JSON5 literals; the session store parses them back with json5.
                    out.push_str(&format_f64(*v));
                } else {
                    let mut buf = ryu::Buffer::new();
                    out.push_str(buf.format_finite(*v));
                }
            }
        }
    }
}

fn write_escaped_string(out: &mut String, s: &str) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                use std::fmt::Write as _;
                write!(out, "\\u{:04x}", c as u32).ok();
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

impl Serialize for ParamValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ParamValue::Null => serializer.serialize_unit(),
            ParamValue::Bool(v) => serializer.serialize_bool(*v),
            ParamValue::Number(n) => n.serialize(serializer),
            ParamValue::String(s) => serializer.serialize_str(s),
            ParamValue::Array(values) => values.serialize(serializer),
            ParamValue::Object(map) => map.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ParamValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ValueVisitor;

        impl<'de> de::Visitor<'de> for ValueVisitor {
            type Value = ParamValue;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a parameter value")
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(ParamValue::Null)
            }

            fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(ParamValue::Null)
            }

            fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
                ParamValue::deserialize(d)
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
                Ok(ParamValue::Bool(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(ParamValue::Number(ParamNumber::I64(v)))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                // Only integers past i64::MAX keep the unsigned variant.
                let number = i64::try_from(v).map_or(ParamNumber::U64(v), ParamNumber::I64);
                Ok(ParamValue::Number(number))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                Ok(ParamValue::Number(ParamNumber::F64(v)))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(ParamValue::String(v.to_owned()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
                Ok(ParamValue::String(v))
            }

            fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut values = Vec::new();
                while let Some(value) = seq.next_element::<ParamValue>()? {
                    values.push(value);
                }
                Ok(ParamValue::Array(values))
            }

            fn visit_map<A: de::MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut values = ParamMap::new();
                while let Some((key, value)) = map.next_entry::<String, ParamValue>()? {
                    values.insert(key, value);
                }
                Ok(ParamValue::Object(values))
            }
        }

        deserializer.deserialize_any(ValueVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::{ParamMap, ParamNumber, ParamValue};

    #[test]
    fn parse_json5_accepts_unquoted_keys_and_trailing_commas() {
        let v = ParamValue::parse_json5("{ DataDirectory: '/tmp', IgnoredBlockKeys: 3, }").unwrap();
        assert_eq!(v.get("DataDirectory").and_then(|v| v.as_str()), Some("/tmp"));
        assert_eq!(
            v.get("IgnoredBlockKeys"),
            Some(&ParamValue::Number(ParamNumber::I64(3)))
        );
    }

    #[test]
    fn integers_compare_by_value_across_variants() {
        assert_eq!(ParamNumber::U64(3), ParamNumber::I64(3));
        assert_ne!(ParamNumber::U64(u64::MAX), ParamNumber::I64(-1));
        assert_ne!(ParamNumber::F64(3.0), ParamNumber::I64(3));

        let parsed = ParamValue::parse_json5("{ n: 3 }").unwrap();
        assert_eq!(parsed.get("n"), Some(&ParamValue::from(3i64)));
    }

    #[test]
    fn compact_serialization_keeps_insertion_order() {
        let mut map = ParamMap::new();
        map.insert("b".to_string(), ParamValue::from(1));
        map.insert("a".to_string(), ParamValue::string_list(["x", "y"]));
        let v = ParamValue::Object(map);
        assert_eq!(v.to_json_compact(), r#"{"b":1,"a":["x","y"]}"#);
    }

    #[test]
    fn compact_serialization_round_trips_through_json5() {
        let v = ParamValue::parse_json5(
            r#"{ "Final": false, "Mappings": { "CAD_to_FEM": { "elements": { "elt0": ["a"] }, "factors": { "elt0": "1.5" } } }, "Ratio": 0.25 }"#,
        )
        .unwrap();
        let again = ParamValue::parse_json5(&v.to_json_compact()).unwrap();
        assert_eq!(again, v);
    }

    #[test]
    fn field_text_drops_fraction_of_whole_floats() {
        assert_eq!(ParamNumber::F64(3.0).to_field_text(), "3");
        assert_eq!(ParamNumber::F64(0.5).to_field_text(), "0.5");
        assert_eq!(ParamNumber::I64(-7).to_field_text(), "-7");
        assert_eq!(ParamNumber::U64(u64::MAX).to_field_text(), u64::MAX.to_string());
    }

    #[test]
    fn strings_are_escaped() {
        let v = ParamValue::from("a\"b\\c\n");
        assert_eq!(v.to_json_compact(), r#""a\"b\\c\n""#);
    }

    #[test]
    fn scalar_text_ignores_containers() {
        assert_eq!(ParamValue::from(true).scalar_text().as_deref(), Some("true"));
        assert_eq!(ParamValue::empty_object().scalar_text(), None);
        assert_eq!(ParamValue::Array(vec![]).scalar_text(), None);
    }
}
