//! Named functions invoked from dynamic-content expressions.
//!
//! A function expression has the shape `name(arg1, arg2, ...)`. The registry
//! is populated at factory setup and read-only during test execution.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::context::TestContext;
use crate::error::{EngineError, Result};

/// Executable implementation behind a symbolic function name
pub trait Function: Send + Sync {
    /// Execute the function with already-resolved parameters
    fn execute(&self, parameters: &[String], context: &TestContext) -> Result<String>;
}

/// Mapping of symbolic function name to executable implementation
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<dyn Function>>,
}

impl Default for FunctionRegistry {
    /// Registry pre-populated with the built-in function library
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("concat", Arc::new(ConcatFunction));
        registry.register("upper_case", Arc::new(UpperCaseFunction));
        registry.register("lower_case", Arc::new(LowerCaseFunction));
        registry.register("trim", Arc::new(TrimFunction));
        registry.register("substring", Arc::new(SubstringFunction));
        registry.register("current_date", Arc::new(CurrentDateFunction));
        registry.register("random_uuid", Arc::new(RandomUuidFunction));
        registry.register("env", Arc::new(EnvFunction));
        registry
    }
}

impl FunctionRegistry {
    /// Create a registry without the built-in functions
    pub fn empty() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// Register a function under the given symbolic name
    pub fn register<S: Into<String>>(&mut self, name: S, function: Arc<dyn Function>) {
        self.functions.insert(name.into(), function);
    }

    /// Check if a function with the given name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Look up a function implementation by name
    pub fn get(&self, name: &str) -> Result<Arc<dyn Function>> {
        self.functions
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::FunctionNotFound {
                name: name.to_string(),
            })
    }

    /// Check whether the expression is a call of a registered function,
    /// e.g. `concat('a', 'b')`
    pub fn is_function(&self, expression: &str) -> bool {
        let trimmed = expression.trim();

        let Some(open) = trimmed.find('(') else {
            return false;
        };
        if !trimmed.ends_with(')') {
            return false;
        }

        let name = &trimmed[..open];
        is_function_name(name) && self.contains(name)
    }
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("FunctionRegistry")
            .field("functions", &names)
            .finish()
    }
}

/// Check if a name is a valid function identifier (letters, numbers, underscore)
pub(crate) fn is_function_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .next()
            .map(|c| c.is_alphabetic() || c == '_')
            .unwrap_or(false)
        && name.chars().all(|c| c.is_alphanumeric() || c == '_')
}

fn require_params(name: &str, parameters: &[String], expected: usize) -> Result<()> {
    if parameters.len() != expected {
        return Err(EngineError::function_failed(
            name.to_string(),
            format!("expected {} parameter(s), got {}", expected, parameters.len()),
        ));
    }
    Ok(())
}

/// Joins all parameters into one string
pub struct ConcatFunction;

impl Function for ConcatFunction {
    fn execute(&self, parameters: &[String], _context: &TestContext) -> Result<String> {
        Ok(parameters.concat())
    }
}

/// Uppercases its single parameter
pub struct UpperCaseFunction;

impl Function for UpperCaseFunction {
    fn execute(&self, parameters: &[String], _context: &TestContext) -> Result<String> {
        require_params("upper_case", parameters, 1)?;
        Ok(parameters[0].to_uppercase())
    }
}

/// Lowercases its single parameter
pub struct LowerCaseFunction;

impl Function for LowerCaseFunction {
    fn execute(&self, parameters: &[String], _context: &TestContext) -> Result<String> {
        require_params("lower_case", parameters, 1)?;
        Ok(parameters[0].to_lowercase())
    }
}

/// Trims surrounding whitespace from its single parameter
pub struct TrimFunction;

impl Function for TrimFunction {
    fn execute(&self, parameters: &[String], _context: &TestContext) -> Result<String> {
        require_params("trim", parameters, 1)?;
        Ok(parameters[0].trim().to_string())
    }
}

/// Extracts a character range: `substring(value, begin)` or
/// `substring(value, begin, end)`
pub struct SubstringFunction;

impl Function for SubstringFunction {
    fn execute(&self, parameters: &[String], _context: &TestContext) -> Result<String> {
        if parameters.len() < 2 || parameters.len() > 3 {
            return Err(EngineError::function_failed(
                "substring",
                "expected 2 or 3 parameters: value, begin[, end]",
            ));
        }

        let value = &parameters[0];
        let begin: usize = parameters[1].trim().parse().map_err(|_| {
            EngineError::function_failed("substring", "begin index is not a number")
        })?;

        let chars: Vec<char> = value.chars().collect();
        let end = match parameters.get(2) {
            Some(raw) => raw.trim().parse().map_err(|_| {
                EngineError::function_failed("substring", "end index is not a number")
            })?,
            None => chars.len(),
        };

        if begin > end || end > chars.len() {
            return Err(EngineError::function_failed(
                "substring".to_string(),
                format!("index range {}..{} out of bounds for length {}", begin, end, chars.len()),
            ));
        }

        Ok(chars[begin..end].iter().collect())
    }
}

/// Renders the current UTC date, with an optional strftime format parameter
pub struct CurrentDateFunction;

impl CurrentDateFunction {
    const DEFAULT_FORMAT: &'static str = "%Y-%m-%dT%H:%M:%S";
}

impl Function for CurrentDateFunction {
    fn execute(&self, parameters: &[String], _context: &TestContext) -> Result<String> {
        let format = parameters
            .first()
            .map(String::as_str)
            .filter(|f| !f.is_empty())
            .unwrap_or(Self::DEFAULT_FORMAT);

        let has_invalid_item = chrono::format::StrftimeItems::new(format)
            .any(|item| matches!(item, chrono::format::Item::Error));
        if has_invalid_item {
            return Err(EngineError::function_failed(
                "current_date".to_string(),
                format!("invalid date format '{}'", format),
            ));
        }

        Ok(Utc::now().format(format).to_string())
    }
}

/// Generates a random v4 UUID
pub struct RandomUuidFunction;

impl Function for RandomUuidFunction {
    fn execute(&self, parameters: &[String], _context: &TestContext) -> Result<String> {
        require_params("random_uuid", parameters, 0)?;
        Ok(Uuid::new_v4().to_string())
    }
}

/// Looks up an environment variable: `env(NAME)` or `env(NAME, default)`
pub struct EnvFunction;

impl Function for EnvFunction {
    fn execute(&self, parameters: &[String], _context: &TestContext) -> Result<String> {
        if parameters.is_empty() || parameters.len() > 2 {
            return Err(EngineError::function_failed(
                "env",
                "expected 1 or 2 parameters: name[, default]",
            ));
        }

        match std::env::var(&parameters[0]) {
            Ok(value) => Ok(value),
            Err(_) => parameters.get(1).cloned().ok_or_else(|| {
                EngineError::function_failed(
                    "env".to_string(),
                    format!("environment variable '{}' is not set", parameters[0]),
                )
            }),
        }
    }
}
