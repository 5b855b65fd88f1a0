use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Expression syntax markers recognized by the resolver.
///
/// A variable reference is a name wrapped with the configured prefix/suffix
/// pair. Doubling the escape marker around the name emits the prefix/suffix
/// characters verbatim instead of resolving a lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpressionSyntax {
    #[serde(default = "default_variable_prefix")]
    pub variable_prefix: String,
    #[serde(default = "default_variable_suffix")]
    pub variable_suffix: String,
    #[serde(default = "default_escape_marker")]
    pub escape_marker: String,
}

fn default_variable_prefix() -> String {
    "${".to_string()
}

fn default_variable_suffix() -> String {
    "}".to_string()
}

fn default_escape_marker() -> String {
    "//".to_string()
}

impl Default for ExpressionSyntax {
    fn default() -> Self {
        Self {
            variable_prefix: default_variable_prefix(),
            variable_suffix: default_variable_suffix(),
            escape_marker: default_escape_marker(),
        }
    }
}

impl ExpressionSyntax {
    /// Check if the expression is a decorated variable reference, e.g. `${name}`
    pub fn is_variable_expression(&self, expression: &str) -> bool {
        expression.starts_with(&self.variable_prefix)
            && expression.ends_with(&self.variable_suffix)
            && expression.len() > self.variable_prefix.len() + self.variable_suffix.len()
    }

    /// Strip prefix/suffix decoration from a variable expression if present
    pub fn strip_decoration<'a>(&self, expression: &'a str) -> &'a str {
        if self.is_variable_expression(expression) {
            &expression
                [self.variable_prefix.len()..expression.len() - self.variable_suffix.len()]
        } else {
            expression
        }
    }

    /// Check if the undecorated name denotes an escaped literal, e.g. `//name//`
    pub fn is_escaped(&self, name: &str) -> bool {
        name.starts_with(&self.escape_marker)
            && name.ends_with(&self.escape_marker)
            && name.len() >= 2 * self.escape_marker.len()
    }

    /// Strip the escape markers from an escaped literal name
    pub fn strip_escaping<'a>(&self, name: &'a str) -> &'a str {
        &name[self.escape_marker.len()..name.len() - self.escape_marker.len()]
    }

    /// Render a name back into its decorated form
    pub fn decorate(&self, name: &str) -> String {
        format!("{}{}{}", self.variable_prefix, name, self.variable_suffix)
    }
}

/// Engine configuration constructed once at process start and passed by
/// reference into each test context factory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Expression syntax markers
    #[serde(default)]
    pub syntax: ExpressionSyntax,

    /// Name of the type converter to select from the converter registry.
    /// Falls back to the built-in default when absent or unknown.
    #[serde(default)]
    pub converter: Option<String>,

    /// Global variable seed copied into every fresh test context
    #[serde(default)]
    pub globals: HashMap<String, String>,
}

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content =
            std::fs::read_to_string(&path).map_err(|_| EngineError::ConfigNotFound {
                path: path.as_ref().to_path_buf(),
            })?;

        let config: EngineConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with enhanced error context
    pub fn load_with_validation<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        if !path_ref.exists() {
            return Err(EngineError::ConfigNotFound {
                path: path_ref.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path_ref).map_err(EngineError::io)?;

        let config: EngineConfig = toml::from_str(&content).map_err(|e| {
            EngineError::invalid_config(format!(
                "Failed to parse TOML in {}: {}",
                path_ref.display(),
                e
            ))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate syntax markers and global variable names
    pub fn validate(&self) -> Result<()> {
        if self.syntax.variable_prefix.is_empty() {
            return Err(EngineError::invalid_config("Variable prefix must not be empty"));
        }

        if self.syntax.variable_suffix.is_empty() {
            return Err(EngineError::invalid_config("Variable suffix must not be empty"));
        }

        if self.syntax.variable_prefix == self.syntax.variable_suffix {
            return Err(EngineError::invalid_config(
                "Variable prefix and suffix must differ",
            ));
        }

        if self.syntax.escape_marker.is_empty() {
            return Err(EngineError::invalid_config("Escape marker must not be empty"));
        }

        if self.globals.keys().any(|name| name.trim().is_empty()) {
            return Err(EngineError::invalid_config(
                "Global variable names must not be blank",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_syntax() {
        let syntax = ExpressionSyntax::default();
        assert_eq!(syntax.variable_prefix, "${");
        assert_eq!(syntax.variable_suffix, "}");
        assert_eq!(syntax.escape_marker, "//");
    }

    #[test]
    fn test_strip_decoration() {
        let syntax = ExpressionSyntax::default();
        assert!(syntax.is_variable_expression("${test}"));
        assert_eq!(syntax.strip_decoration("${test}"), "test");
        assert_eq!(syntax.strip_decoration("test"), "test");
        assert!(!syntax.is_variable_expression("${}"));
    }

    #[test]
    fn test_escaping() {
        let syntax = ExpressionSyntax::default();
        assert!(syntax.is_escaped("//escaped//"));
        assert_eq!(syntax.strip_escaping("//escaped//"), "escaped");
        assert!(!syntax.is_escaped("/value/"));
        assert_eq!(syntax.decorate("escaped"), "${escaped}");
    }

    #[test]
    fn test_parse_config() {
        let config: EngineConfig = toml::from_str(
            r#"
            converter = "default"

            [syntax]
            variable_prefix = "%["
            variable_suffix = "]"

            [globals]
            project = "demo"
            "#,
        )
        .unwrap();

        assert_eq!(config.syntax.variable_prefix, "%[");
        assert_eq!(config.syntax.variable_suffix, "]");
        assert_eq!(config.syntax.escape_marker, "//");
        assert_eq!(config.converter.as_deref(), Some("default"));
        assert_eq!(config.globals.get("project"), Some(&"demo".to_string()));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_equal_markers() {
        let config = EngineConfig {
            syntax: ExpressionSyntax {
                variable_prefix: "%".to_string(),
                variable_suffix: "%".to_string(),
                escape_marker: "//".to_string(),
            },
            ..Default::default()
        };

        assert!(config.validate().is_err());
    }
}
