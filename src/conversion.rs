//! Best-effort type conversion between variable value kinds.
//!
//! Conversion dispatches over the closed [`TargetKind`] enumeration. Custom
//! pre-conversion strategies are checked first and post-conversion fallbacks
//! last; the built-in table sits in between. Converters are selected by name
//! from a registry, falling back to the built-in default.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::error::{EngineError, Result};
use crate::value::Value;

/// Closed enumeration of supported conversion targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    String,
    Int,
    Float,
    Bool,
    Bytes,
    List,
    Map,
}

impl TargetKind {
    /// Target kind name used in conversion error diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            TargetKind::String => "string",
            TargetKind::Int => "int",
            TargetKind::Float => "float",
            TargetKind::Bool => "bool",
            TargetKind::Bytes => "bytes",
            TargetKind::List => "list",
            TargetKind::Map => "map",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (TargetKind::String, Value::String(_))
                | (TargetKind::Int, Value::Int(_))
                | (TargetKind::Float, Value::Float(_))
                | (TargetKind::Bool, Value::Bool(_))
                | (TargetKind::Bytes, Value::Bytes(_))
                | (TargetKind::List, Value::List(_))
                | (TargetKind::Map, Value::Map(_))
        )
    }
}

/// Pluggable conversion step consulted before or after the built-in table
pub trait ConversionStrategy: Send + Sync {
    /// Attempt the conversion; `None` means the strategy does not apply
    fn try_convert(&self, value: &Value, target: TargetKind) -> Option<Value>;
}

/// Type converter with pre/post strategy chains around the built-in table
#[derive(Default, Clone)]
pub struct TypeConverter {
    pre: Vec<Arc<dyn ConversionStrategy>>,
    post: Vec<Arc<dyn ConversionStrategy>>,
}

impl TypeConverter {
    /// Create a converter with only the built-in conversions
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend a custom strategy checked before the built-in conversions
    pub fn with_pre_strategy(mut self, strategy: Arc<dyn ConversionStrategy>) -> Self {
        self.pre.push(strategy);
        self
    }

    /// Append a fallback strategy checked after the built-in conversions
    pub fn with_post_strategy(mut self, strategy: Arc<dyn ConversionStrategy>) -> Self {
        self.post.push(strategy);
        self
    }

    /// Convert a value to the requested target kind.
    ///
    /// Identity conversions short-circuit. When the target is a string the
    /// conversion never hard-fails; the value degrades to its literal textual
    /// rendering instead.
    pub fn convert(&self, value: &Value, target: TargetKind) -> Result<Value> {
        if target.matches(value) {
            return Ok(value.clone());
        }

        for strategy in &self.pre {
            if let Some(converted) = strategy.try_convert(value, target) {
                return Ok(converted);
            }
        }

        if let Some(converted) = builtin_convert(value, target) {
            return Ok(converted);
        }

        for strategy in &self.post {
            if let Some(converted) = strategy.try_convert(value, target) {
                return Ok(converted);
            }
        }

        if target == TargetKind::String {
            return Ok(Value::String(value.render()));
        }

        Err(EngineError::conversion_failed(
            value.kind_name(),
            target.name(),
        ))
    }

    /// Convert a value to a concrete Rust type
    pub fn convert_to<T: FromValue>(&self, value: &Value) -> Result<T> {
        let converted = self.convert(value, T::target_kind())?;
        T::from_value(&converted)
    }
}

impl std::fmt::Debug for TypeConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeConverter")
            .field("pre_strategies", &self.pre.len())
            .field("post_strategies", &self.post.len())
            .finish()
    }
}

fn builtin_convert(value: &Value, target: TargetKind) -> Option<Value> {
    match target {
        TargetKind::Int => match value {
            Value::Float(f) => Some(Value::Int(*f as i64)),
            Value::String(s) => parse_int(s),
            _ => None,
        },
        TargetKind::Float => match value {
            Value::Int(i) => Some(Value::Float(*i as f64)),
            Value::String(s) => match s.trim().parse::<f64>() {
                Ok(f) => Some(Value::Float(f)),
                Err(err) => {
                    warn!(value = s.as_str(), %err, "direct string to float conversion failed");
                    None
                }
            },
            _ => None,
        },
        TargetKind::Bool => match value {
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            Value::Int(0) => Some(Value::Bool(false)),
            Value::Int(1) => Some(Value::Bool(true)),
            _ => None,
        },
        TargetKind::Bytes => match value {
            Value::String(s) => Some(Value::Bytes(s.clone().into_bytes())),
            _ => None,
        },
        TargetKind::List => match value {
            Value::String(s) => Some(parse_list(s)),
            Value::Bytes(b) => Some(Value::List(
                b.iter().map(|byte| Value::Int(*byte as i64)).collect(),
            )),
            _ => None,
        },
        TargetKind::Map => match value {
            Value::String(s) => parse_map(s),
            _ => None,
        },
        TargetKind::String => match value {
            Value::Bytes(b) => Some(Value::String(String::from_utf8_lossy(b).into_owned())),
            _ => None,
        },
    }
}

fn parse_int(s: &str) -> Option<Value> {
    let trimmed = s.trim();
    match trimmed.parse::<i64>() {
        Ok(i) => Some(Value::Int(i)),
        Err(err) => {
            warn!(value = trimmed, %err, "direct string to int conversion failed, trying numeric fallback");
            trimmed.parse::<f64>().ok().map(|f| Value::Int(f as i64))
        }
    }
}

/// Parse a delimited-list string, with optional surrounding brackets
fn parse_list(s: &str) -> Value {
    let trimmed = s.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(trimmed);

    if inner.trim().is_empty() {
        return Value::List(Vec::new());
    }

    Value::List(
        inner
            .split(',')
            .map(|item| Value::String(item.trim().to_string()))
            .collect(),
    )
}

/// Parse a brace-delimited key=value string using a line-oriented property
/// parser on comma-normalized input, e.g. `{a=1, b=2}`.
fn parse_map(s: &str) -> Option<Value> {
    let trimmed = s.trim();
    let inner = trimmed.strip_prefix('{')?.strip_suffix('}')?;

    let mut entries = HashMap::new();
    for line in inner.replace(',', "\n").lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (key, value) = line.split_once('=')?;
        entries.insert(
            key.trim().to_string(),
            Value::String(value.trim().to_string()),
        );
    }

    Some(Value::Map(entries))
}

/// Conversion from an engine value to a concrete Rust type
pub trait FromValue: Sized {
    /// The target kind the converter must produce first
    fn target_kind() -> TargetKind;

    /// Extract the concrete type from a converted value
    fn from_value(value: &Value) -> Result<Self>;
}

macro_rules! impl_from_value_int {
    ($($ty:ty),*) => {
        $(
            impl FromValue for $ty {
                fn target_kind() -> TargetKind {
                    TargetKind::Int
                }

                fn from_value(value: &Value) -> Result<Self> {
                    match value {
                        Value::Int(i) => <$ty>::try_from(*i).map_err(|_| {
                            EngineError::conversion_failed("int", stringify!($ty))
                        }),
                        other => Err(EngineError::conversion_failed(
                            other.kind_name(),
                            stringify!($ty),
                        )),
                    }
                }
            }
        )*
    };
}

impl_from_value_int!(i64, i32, i16, u64, u32, u8);

impl FromValue for f64 {
    fn target_kind() -> TargetKind {
        TargetKind::Float
    }

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Float(f) => Ok(*f),
            other => Err(EngineError::conversion_failed(other.kind_name(), "f64")),
        }
    }
}

impl FromValue for f32 {
    fn target_kind() -> TargetKind {
        TargetKind::Float
    }

    fn from_value(value: &Value) -> Result<Self> {
        f64::from_value(value).map(|f| f as f32)
    }
}

impl FromValue for bool {
    fn target_kind() -> TargetKind {
        TargetKind::Bool
    }

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(*b),
            other => Err(EngineError::conversion_failed(other.kind_name(), "bool")),
        }
    }
}

impl FromValue for String {
    fn target_kind() -> TargetKind {
        TargetKind::String
    }

    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.render())
    }
}

impl FromValue for Vec<String> {
    fn target_kind() -> TargetKind {
        TargetKind::List
    }

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::List(values) => Ok(values.iter().map(Value::render).collect()),
            other => Err(EngineError::conversion_failed(other.kind_name(), "list")),
        }
    }
}

impl FromValue for HashMap<String, String> {
    fn target_kind() -> TargetKind {
        TargetKind::Map
    }

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Map(entries) => Ok(entries
                .iter()
                .map(|(k, v)| (k.clone(), v.render()))
                .collect()),
            other => Err(EngineError::conversion_failed(other.kind_name(), "map")),
        }
    }
}

impl FromValue for Vec<u8> {
    fn target_kind() -> TargetKind {
        TargetKind::Bytes
    }

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bytes(bytes) => Ok(bytes.clone()),
            other => Err(EngineError::conversion_failed(other.kind_name(), "bytes")),
        }
    }
}

/// Registry of named type converters.
///
/// Populated once at process start; test context factories select a converter
/// by its configured name and fall back to the built-in default when the name
/// is absent or unknown.
pub struct ConverterRegistry {
    converters: HashMap<String, Arc<TypeConverter>>,
}

/// Name of the built-in default converter
pub const DEFAULT_CONVERTER: &str = "default";

impl Default for ConverterRegistry {
    fn default() -> Self {
        let mut converters = HashMap::new();
        converters.insert(
            DEFAULT_CONVERTER.to_string(),
            Arc::new(TypeConverter::new()),
        );
        Self { converters }
    }
}

impl ConverterRegistry {
    /// Register a custom converter under the given name
    pub fn register<S: Into<String>>(&mut self, name: S, converter: TypeConverter) {
        self.converters.insert(name.into(), Arc::new(converter));
    }

    /// Select a converter by configured name, falling back to the default
    pub fn lookup(&self, name: Option<&str>) -> Arc<TypeConverter> {
        match name {
            Some(name) => match self.converters.get(name) {
                Some(converter) => Arc::clone(converter),
                None => {
                    warn!(converter = name, "unknown type converter, falling back to default");
                    Arc::clone(&self.converters[DEFAULT_CONVERTER])
                }
            },
            None => Arc::clone(&self.converters[DEFAULT_CONVERTER]),
        }
    }
}
