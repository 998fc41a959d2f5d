//! Parameter types and their text rendering.
//!
//! Values arrive as loosely typed YAML (from definition files, YAML directives,
//! or strings lifted out of template directives). [`TypedValue::coerce`] turns
//! such a value into one variant per [`ParameterType`], and
//! [`TypedValue::render`] produces the single token handed to the child
//! process.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Separator used when a list is rendered into one token.
pub const LIST_SEPARATOR: &str = ",";

/// Semantic kind of a parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParameterType {
    /// Free text.
    #[default]
    String,
    /// List of free text.
    StringList,
    /// Boolean.
    Bool,
    /// Signed integer.
    Int,
    /// List of signed integers.
    IntList,
    /// Floating point number.
    Float,
    /// List of floating point numbers.
    FloatList,
    /// One value out of a set.
    Choice,
    /// Several values out of a set.
    ChoiceList,
    /// File path.
    File,
    /// List of file paths.
    FileList,
    /// Calendar date or timestamp.
    Date,
    /// String mapping.
    KeyValue,
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::StringList => "stringList",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::IntList => "intList",
            Self::Float => "float",
            Self::FloatList => "floatList",
            Self::Choice => "choice",
            Self::ChoiceList => "choiceList",
            Self::File => "file",
            Self::FileList => "fileList",
            Self::Date => "date",
            Self::KeyValue => "keyValue",
        };
        f.write_str(name)
    }
}

/// A date value, either a plain calendar day or a full timestamp.
#[derive(Debug, Clone, PartialEq)]
pub enum DateValue {
    /// `YYYY-MM-DD`.
    Day(NaiveDate),
    /// RFC 3339 timestamp.
    Timestamp(DateTime<FixedOffset>),
}

/// A value coerced to its declared [`ParameterType`].
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    /// No value at all (YAML `null`).
    Empty,
    String(String),
    StringList(Vec<String>),
    Bool(bool),
    Int(i64),
    IntList(Vec<i64>),
    Float(f64),
    FloatList(Vec<f64>),
    Choice(String),
    ChoiceList(Vec<String>),
    File(PathBuf),
    FileList(Vec<PathBuf>),
    Date(DateValue),
    KeyValue(BTreeMap<String, String>),
}

impl TypedValue {
    /// Coerce a raw value into the variant for `ty`.
    ///
    /// The error is a human readable description; callers attach the
    /// parameter name.
    pub fn coerce(ty: ParameterType, value: &Value) -> Result<Self, String> {
        if value.is_null() {
            return Ok(Self::Empty);
        }

        let typed = match ty {
            ParameterType::String => Self::String(scalar_text(value)?),
            ParameterType::Choice => Self::Choice(scalar_text(value)?),
            ParameterType::File => Self::File(PathBuf::from(scalar_text(value)?)),
            ParameterType::Bool => Self::Bool(to_bool(value)?),
            ParameterType::Int => Self::Int(to_int(value)?),
            ParameterType::Float => Self::Float(to_float(value)?),
            ParameterType::Date => Self::Date(to_date(value)?),
            ParameterType::StringList => Self::StringList(to_list(value, scalar_text)?),
            ParameterType::ChoiceList => Self::ChoiceList(to_list(value, scalar_text)?),
            ParameterType::FileList => {
                Self::FileList(to_list(value, |v| scalar_text(v).map(PathBuf::from))?)
            }
            ParameterType::IntList => Self::IntList(to_list(value, to_int)?),
            ParameterType::FloatList => Self::FloatList(to_list(value, to_float)?),
            ParameterType::KeyValue => Self::KeyValue(to_key_value(value)?),
        };

        Ok(typed)
    }

    /// Render the canonical command-line text for this value.
    pub fn render(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::String(s) | Self::Choice(s) => s.clone(),
            Self::StringList(items) | Self::ChoiceList(items) => items.join(LIST_SEPARATOR),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::IntList(items) => join(items.iter().map(|i| i.to_string())),
            Self::Float(f) => f.to_string(),
            Self::FloatList(items) => join(items.iter().map(|f| f.to_string())),
            Self::File(path) => path.to_string_lossy().into_owned(),
            Self::FileList(paths) => join(paths.iter().map(|p| p.to_string_lossy().into_owned())),
            Self::Date(DateValue::Day(day)) => day.format("%Y-%m-%d").to_string(),
            Self::Date(DateValue::Timestamp(ts)) => ts.to_rfc3339(),
            Self::KeyValue(map) => join(map.iter().map(|(k, v)| format!("{k}:{v}"))),
        }
    }
}

/// Coerce and render in one step.
pub fn render_value(ty: ParameterType, value: &Value) -> Result<String, String> {
    TypedValue::coerce(ty, value).map(|v| v.render())
}

fn join(items: impl Iterator<Item = String>) -> String {
    items.collect::<Vec<_>>().join(LIST_SEPARATOR)
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

fn scalar_text(value: &Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(match n.as_f64() {
            Some(f) if n.is_f64() => f.to_string(),
            _ => n.to_string(),
        }),
        other => Err(format!("expected a scalar, got {}", describe(other))),
    }
}

fn to_bool(value: &Value) -> Result<bool, String> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(format!("{n} is not a boolean")),
        },
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            _ => Err(format!("{s:?} is not a boolean")),
        },
        other => Err(format!("expected a boolean, got {}", describe(other))),
    }
}

fn to_int(value: &Value) -> Result<i64, String> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(i);
            }
            match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(f as i64),
                _ => Err(format!("{n} is not an integer")),
            }
        }
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("{s:?} is not an integer")),
        other => Err(format!("expected an integer, got {}", describe(other))),
    }
}

fn to_float(value: &Value) -> Result<f64, String> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| format!("{n} is not a float")),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("{s:?} is not a float")),
        other => Err(format!("expected a float, got {}", describe(other))),
    }
}

fn to_date(value: &Value) -> Result<DateValue, String> {
    let text = match value {
        Value::String(s) => s.trim(),
        other => return Err(format!("expected a date string, got {}", describe(other))),
    };

    if let Ok(day) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Ok(DateValue::Day(day));
    }
    DateTime::parse_from_rfc3339(text)
        .map(DateValue::Timestamp)
        .map_err(|_| format!("{text:?} is neither YYYY-MM-DD nor RFC 3339"))
}

fn to_list<T>(value: &Value, item: impl Fn(&Value) -> Result<T, String>) -> Result<Vec<T>, String> {
    match value {
        Value::Sequence(items) => items.iter().map(&item).collect(),
        Value::String(s) if s.is_empty() => Ok(Vec::new()),
        Value::String(s) => s
            .split(LIST_SEPARATOR)
            .map(|part| item(&Value::String(part.trim().to_string())))
            .collect(),
        Value::Mapping(_) | Value::Tagged(_) => {
            Err(format!("expected a list, got {}", describe(value)))
        }
        scalar => Ok(vec![item(scalar)?]),
    }
}

fn to_key_value(value: &Value) -> Result<BTreeMap<String, String>, String> {
    match value {
        Value::Mapping(map) => map
            .iter()
            .map(|(k, v)| Ok((scalar_text(k)?, scalar_text(v)?)))
            .collect(),
        Value::String(s) if s.is_empty() => Ok(BTreeMap::new()),
        Value::String(s) => s
            .split(LIST_SEPARATOR)
            .map(|pair| {
                pair.split_once(':')
                    .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                    .ok_or_else(|| format!("{pair:?} is not a key:value pair"))
            })
            .collect(),
        other => Err(format!("expected a mapping, got {}", describe(other))),
    }
}
