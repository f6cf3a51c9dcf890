use std::fmt;

use serde::Serialize;

/// Value held by a reduction property.
///
/// Instrument defaults arrive as JSON and are converted through
/// `From<serde_json::Value>`; `Dataset` is only produced at runtime when a
/// property is bound to a dataset living in the store.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<PropertyValue>),
    Dataset { dataset: String },
}

/// Result of applying the string sentinels accepted by `set`.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Value(PropertyValue),
    Default,
}

impl PropertyValue {
    pub fn dataset(name: impl Into<String>) -> Self {
        PropertyValue::Dataset {
            dataset: name.into(),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, PropertyValue::None)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(value) => Some(*value),
            PropertyValue::Float(value) if value.fract() == 0.0 => Some(*value as i64),
            PropertyValue::Str(value) => value.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[PropertyValue]> {
        match self {
            PropertyValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn dataset_name(&self) -> Option<&str> {
        match self {
            PropertyValue::Dataset { dataset } => Some(dataset),
            _ => None,
        }
    }

    /// Absent for the purposes of "update only what's given" bulk sets.
    pub fn is_absent(&self) -> bool {
        match self {
            PropertyValue::None => true,
            PropertyValue::Str(value) => value.is_empty(),
            PropertyValue::List(items) => items.is_empty(),
            _ => false,
        }
    }

    /// Applies the sentinel spellings: `none`/empty string and empty list are
    /// absent, `default` asks for the instrument default, `true`/`yes` and
    /// `false`/`no` are booleans. Case-insensitive.
    pub fn normalized(self) -> Normalized {
        match self {
            PropertyValue::Str(value) => {
                let lowered = value.trim().to_lowercase();
                match lowered.as_str() {
                    "" | "none" => Normalized::Value(PropertyValue::None),
                    "default" => Normalized::Default,
                    "true" | "yes" => Normalized::Value(PropertyValue::Bool(true)),
                    "false" | "no" => Normalized::Value(PropertyValue::Bool(false)),
                    _ => Normalized::Value(PropertyValue::Str(value)),
                }
            }
            PropertyValue::List(items) if items.is_empty() => Normalized::Value(PropertyValue::None),
            other => Normalized::Value(other),
        }
    }

    /// Parses a command-line `name=value` right-hand side. JSON literals are
    /// honoured (`12.5`, `[1,2]`, `true`); anything else is a plain string.
    pub fn parse_cli(text: &str) -> Self {
        match serde_json::from_str::<serde_json::Value>(text) {
            Ok(value) => PropertyValue::from(value),
            Err(_) => PropertyValue::Str(text.to_string()),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::None => write!(f, "None"),
            PropertyValue::Bool(value) => write!(f, "{value}"),
            PropertyValue::Int(value) => write!(f, "{value}"),
            PropertyValue::Float(value) => write!(f, "{value}"),
            PropertyValue::Str(value) => write!(f, "{value}"),
            PropertyValue::List(items) => {
                write!(f, "[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            PropertyValue::Dataset { dataset } => write!(f, "<dataset {dataset}>"),
        }
    }
}

impl From<serde_json::Value> for PropertyValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => PropertyValue::None,
            serde_json::Value::Bool(value) => PropertyValue::Bool(value),
            serde_json::Value::Number(number) => match number.as_i64() {
                Some(value) => PropertyValue::Int(value),
                None => PropertyValue::Float(number.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(value) => PropertyValue::Str(value),
            serde_json::Value::Array(items) => {
                PropertyValue::List(items.into_iter().map(PropertyValue::from).collect())
            }
            serde_json::Value::Object(map) => match map.get("dataset") {
                Some(serde_json::Value::String(name)) => PropertyValue::dataset(name.clone()),
                _ => PropertyValue::Str(serde_json::Value::Object(map).to_string()),
            },
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Int(value.into())
    }
}

impl From<u32> for PropertyValue {
    fn from(value: u32) -> Self {
        PropertyValue::Int(value.into())
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Float(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Str(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Str(value)
    }
}

impl<T: Into<PropertyValue>> From<Vec<T>> for PropertyValue {
    fn from(items: Vec<T>) -> Self {
        PropertyValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<PropertyValue>> From<Option<T>> for PropertyValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels() {
        assert_eq!(
            PropertyValue::from("None").normalized(),
            Normalized::Value(PropertyValue::None)
        );
        assert_eq!(
            PropertyValue::from("YES").normalized(),
            Normalized::Value(PropertyValue::Bool(true))
        );
        assert_eq!(PropertyValue::from("Default").normalized(), Normalized::Default);
        assert_eq!(
            PropertyValue::List(Vec::new()).normalized(),
            Normalized::Value(PropertyValue::None)
        );
        assert_eq!(
            PropertyValue::from("monitor-1").normalized(),
            Normalized::Value(PropertyValue::from("monitor-1"))
        );
    }

    #[test]
    fn cli_values() {
        assert_eq!(PropertyValue::parse_cli("12"), PropertyValue::Int(12));
        assert_eq!(PropertyValue::parse_cli("12.5"), PropertyValue::Float(12.5));
        assert_eq!(
            PropertyValue::parse_cli("[1,2]"),
            PropertyValue::from(vec![1, 2])
        );
        assert_eq!(
            PropertyValue::parse_cli("MAR11001.raw"),
            PropertyValue::from("MAR11001.raw")
        );
    }
}
