//! Validation matchers invoked by name from validation expressions.

use std::collections::HashMap;
use std::sync::Arc;

use crate::context::TestContext;
use crate::error::{EngineError, Result};

/// Executable validation rule applied to a received field value
pub trait ValidationMatcher: Send + Sync {
    /// Validate the field value against the control parameters
    fn validate(
        &self,
        field_name: &str,
        value: &str,
        parameters: &[String],
        context: &TestContext,
    ) -> Result<()>;
}

/// Mapping of symbolic matcher name to executable implementation.
///
/// Populated at factory setup; read-only during test execution.
pub struct MatcherRegistry {
    matchers: HashMap<String, Arc<dyn ValidationMatcher>>,
}

impl Default for MatcherRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("equals_ignore_case", Arc::new(EqualsIgnoreCaseMatcher));
        registry.register("contains", Arc::new(ContainsMatcher));
        registry.register("starts_with", Arc::new(StartsWithMatcher));
        registry
    }
}

impl MatcherRegistry {
    /// Create a registry without the built-in matchers
    pub fn empty() -> Self {
        Self {
            matchers: HashMap::new(),
        }
    }

    /// Register a matcher under the given symbolic name
    pub fn register<S: Into<String>>(&mut self, name: S, matcher: Arc<dyn ValidationMatcher>) {
        self.matchers.insert(name.into(), matcher);
    }

    /// Check if a matcher with the given name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.matchers.contains_key(name)
    }

    /// Look up a matcher implementation by name
    pub fn get(&self, name: &str) -> Result<Arc<dyn ValidationMatcher>> {
        self.matchers
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::MatcherNotFound {
                name: name.to_string(),
            })
    }

    /// Resolve the named matcher and run it against the field value
    pub fn validate(
        &self,
        name: &str,
        field_name: &str,
        value: &str,
        parameters: &[String],
        context: &TestContext,
    ) -> Result<()> {
        self.get(name)?
            .validate(field_name, value, parameters, context)
    }
}

impl std::fmt::Debug for MatcherRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.matchers.keys().collect();
        names.sort();
        f.debug_struct("MatcherRegistry")
            .field("matchers", &names)
            .finish()
    }
}

fn single_parameter<'a>(name: &str, field_name: &str, parameters: &'a [String]) -> Result<&'a str> {
    match parameters {
        [control] => Ok(control.as_str()),
        _ => Err(EngineError::validation_failed(
            name.to_string(),
            field_name.to_string(),
            format!("expected exactly 1 control parameter, got {}", parameters.len()),
        )),
    }
}

/// Passes when field value and control value match ignoring ASCII case
pub struct EqualsIgnoreCaseMatcher;

impl ValidationMatcher for EqualsIgnoreCaseMatcher {
    fn validate(
        &self,
        field_name: &str,
        value: &str,
        parameters: &[String],
        _context: &TestContext,
    ) -> Result<()> {
        let control = single_parameter("equals_ignore_case", field_name, parameters)?;

        if value.eq_ignore_ascii_case(control) {
            Ok(())
        } else {
            Err(EngineError::validation_failed(
                "equals_ignore_case".to_string(),
                field_name.to_string(),
                format!("expected '{}' but was '{}'", control, value),
            ))
        }
    }
}

/// Passes when the field value contains the control value
pub struct ContainsMatcher;

impl ValidationMatcher for ContainsMatcher {
    fn validate(
        &self,
        field_name: &str,
        value: &str,
        parameters: &[String],
        _context: &TestContext,
    ) -> Result<()> {
        let control = single_parameter("contains", field_name, parameters)?;

        if value.contains(control) {
            Ok(())
        } else {
            Err(EngineError::validation_failed(
                "contains".to_string(),
                field_name.to_string(),
                format!("value '{}' does not contain '{}'", value, control),
            ))
        }
    }
}

/// Passes when the field value starts with the control value
pub struct StartsWithMatcher;

impl ValidationMatcher for StartsWithMatcher {
    fn validate(
        &self,
        field_name: &str,
        value: &str,
        parameters: &[String],
        _context: &TestContext,
    ) -> Result<()> {
        let control = single_parameter("starts_with", field_name, parameters)?;

        if value.starts_with(control) {
            Ok(())
        } else {
            Err(EngineError::validation_failed(
                "starts_with".to_string(),
                field_name.to_string(),
                format!("value '{}' does not start with '{}'", value, control),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TestContextFactory;

    #[test]
    fn test_builtin_matchers() {
        let ctx = TestContextFactory::new().create().unwrap();
        let registry = MatcherRegistry::default();

        assert!(registry
            .validate("equals_ignore_case", "status", "OK", &["ok".to_string()], &ctx)
            .is_ok());
        assert!(registry
            .validate("contains", "body", "hello world", &["world".to_string()], &ctx)
            .is_ok());
        assert!(registry
            .validate("starts_with", "id", "user_1", &["user_".to_string()], &ctx)
            .is_ok());

        let err = registry
            .validate("contains", "body", "hello", &["nope".to_string()], &ctx)
            .unwrap_err();
        assert!(matches!(err, EngineError::ValidationFailed { .. }));
    }

    #[test]
    fn test_unknown_matcher() {
        let ctx = TestContextFactory::new().create().unwrap();
        let registry = MatcherRegistry::default();

        let err = registry
            .validate("unknown", "field", "value", &[], &ctx)
            .unwrap_err();
        assert!(matches!(err, EngineError::MatcherNotFound { .. }));
    }
}
