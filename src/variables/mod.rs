//! Variable storage and structured variable resolution.

pub mod global;
pub mod segments;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::config::ExpressionSyntax;
use crate::error::{EngineError, Result};
use crate::value::Value;

pub use global::{GlobalVariables, GlobalVariablesBuilder};
pub use segments::{
    JsonPathSegmentExtractor, MapSegmentExtractor, SegmentExtractorRegistry,
    SegmentVariableExtractor, VariableSegment,
};

/// Mapping of variable name to typed value, scoped to one test execution.
///
/// The store is concurrency-safe so that forked actions sharing the same test
/// context can read and write variables without corruption. No ordering
/// guarantee is made between concurrent writers; the last write wins.
pub struct VariableStore {
    variables: RwLock<HashMap<String, Value>>,
    seed: RwLock<HashMap<String, Value>>,
    syntax: ExpressionSyntax,
    segment_extractors: Arc<SegmentExtractorRegistry>,
}

impl VariableStore {
    /// Create an empty store with the given syntax markers and extractor chain
    pub fn new(syntax: ExpressionSyntax, segment_extractors: Arc<SegmentExtractorRegistry>) -> Self {
        Self {
            variables: RwLock::new(HashMap::new()),
            seed: RwLock::new(HashMap::new()),
            syntax,
            segment_extractors,
        }
    }

    /// Expression syntax used by this store
    pub fn syntax(&self) -> &ExpressionSyntax {
        &self.syntax
    }

    /// Get the value for the given variable expression.
    ///
    /// The expression may carry prefix/suffix decoration (`${name}`). An
    /// escaped name (`${//name//}`) yields the literal `${name}` text instead
    /// of a lookup. Names absent from the store are offered to the segment
    /// extractor chain as structured paths; if nothing resolves, the lookup
    /// fails with an unresolvable-reference error.
    pub fn get(&self, expression: &str) -> Result<Value> {
        let name = self.syntax.strip_decoration(expression);

        if self.syntax.is_escaped(name) {
            return Ok(Value::String(
                self.syntax.decorate(self.syntax.strip_escaping(name)),
            ));
        }

        {
            let variables = self.read_lock()?;
            if let Some(value) = variables.get(name) {
                return Ok(value.clone());
            }
        }

        let segments =
            segments::parse_segments(name).ok_or_else(|| EngineError::unresolvable(name))?;

        let start = {
            let variables = self.read_lock()?;
            let first = &segments[0];
            let value = variables
                .get(&first.name)
                .cloned()
                .ok_or_else(|| EngineError::unresolvable(name))?;
            segments::apply_index(value, first)?
        };

        self.segment_extractors
            .resolve_path(name, start, &segments[1..])
    }

    /// Create or overwrite a variable.
    ///
    /// The name may carry decoration which is stripped before storage. Blank
    /// names are a configuration error; a null value is rejected with the
    /// distinct null-value error so callers can detect missing values.
    pub fn set(&self, name: &str, value: Value) -> Result<()> {
        let stripped = self.syntax.strip_decoration(name);

        if name.trim().is_empty() || stripped.trim().is_empty() {
            return Err(EngineError::InvalidVariableName {
                name: name.to_string(),
            });
        }

        if value.is_null() {
            return Err(EngineError::NullVariableValue {
                name: stripped.to_string(),
            });
        }

        debug!(variable = stripped, value = %value, "setting variable");

        let mut variables = self.write_lock()?;
        variables.insert(stripped.to_string(), value);
        Ok(())
    }

    /// Set each non-null name/value pair; array lengths must match
    pub fn add_all(&self, names: &[&str], values: &[Value]) -> Result<()> {
        if names.len() != values.len() {
            return Err(EngineError::VariableCountMismatch {
                names: names.len(),
                values: values.len(),
            });
        }

        for (name, value) in names.iter().zip(values) {
            if !value.is_null() {
                self.set(name, value.clone())?;
            }
        }

        Ok(())
    }

    /// Install the resolved global variable seed and copy it into the store
    pub fn seed_from(&self, globals: HashMap<String, Value>) -> Result<()> {
        {
            let mut seed = self
                .seed
                .write()
                .map_err(|_| EngineError::general("Failed to acquire write lock on variable seed"))?;
            *seed = globals.clone();
        }

        let mut variables = self.write_lock()?;
        variables.extend(globals);
        Ok(())
    }

    /// Empty the store and re-seed it from the global variables
    pub fn clear(&self) -> Result<()> {
        let seed = self
            .seed
            .read()
            .map_err(|_| EngineError::general("Failed to acquire read lock on variable seed"))?
            .clone();

        let mut variables = self.write_lock()?;
        variables.clear();
        variables.extend(seed);
        Ok(())
    }

    /// Check if any variables are present
    pub fn has_variables(&self) -> bool {
        self.read_lock().map(|v| !v.is_empty()).unwrap_or(false)
    }

    /// Snapshot of all current variables
    pub fn snapshot(&self) -> Result<HashMap<String, Value>> {
        Ok(self.read_lock()?.clone())
    }

    /// Snapshot of the installed global variable seed
    pub fn seed_snapshot(&self) -> Result<HashMap<String, Value>> {
        Ok(self
            .seed
            .read()
            .map_err(|_| EngineError::general("Failed to acquire read lock on variable seed"))?
            .clone())
    }

    fn read_lock(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, Value>>> {
        self.variables
            .read()
            .map_err(|_| EngineError::general("Failed to acquire read lock on variable store"))
    }

    fn write_lock(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, Value>>> {
        self.variables
            .write()
            .map_err(|_| EngineError::general("Failed to acquire write lock on variable store"))
    }
}

impl std::fmt::Debug for VariableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariableStore")
            .field("variables", &self.variables)
            .field("syntax", &self.syntax)
            .finish()
    }
}
