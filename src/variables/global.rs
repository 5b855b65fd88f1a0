use crate::config::EngineConfig;
use crate::value::Value;

/// Immutable seed mapping copied into every fresh test context.
///
/// Entries keep their definition order so that a global may reference an
/// earlier one in its dynamic content. Dynamic content in global variable
/// values is resolved once, when the factory copies the seed into a new
/// context.
#[derive(Debug, Clone, Default)]
pub struct GlobalVariables {
    variables: Vec<(String, Value)>,
}

impl GlobalVariables {
    /// Create a new builder for global variables
    pub fn builder() -> GlobalVariablesBuilder {
        GlobalVariablesBuilder::default()
    }

    /// Build global variables from the engine configuration seed.
    ///
    /// The configuration map carries no definition order, so entries are
    /// taken in sorted key order to keep resolution deterministic.
    pub fn from_config(config: &EngineConfig) -> Self {
        let mut names: Vec<&String> = config.globals.keys().collect();
        names.sort();

        let variables = names
            .into_iter()
            .map(|name| (name.clone(), Value::from(config.globals[name].as_str())))
            .collect();

        Self { variables }
    }

    /// Iterate the seed entries in definition order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.variables
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Look up a seed entry by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.variables
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, value)| value)
    }

    /// Number of seed entries
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// Check if any global variables are defined
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

/// Builder for assembling global variables at factory setup
#[derive(Debug, Clone, Default)]
pub struct GlobalVariablesBuilder {
    variables: Vec<(String, Value)>,
}

impl GlobalVariablesBuilder {
    /// Add a single global variable.
    ///
    /// Re-adding an existing name overwrites the value in place, keeping the
    /// original position in the definition order.
    pub fn variable<S: Into<String>, V: Into<Value>>(mut self, name: S, value: V) -> Self {
        let name = name.into();
        let value = value.into();

        match self.variables.iter_mut().find(|(entry, _)| *entry == name) {
            Some(existing) => existing.1 = value,
            None => self.variables.push((name, value)),
        }
        self
    }

    /// Add all entries of an existing seed in its definition order
    pub fn variables(mut self, variables: GlobalVariables) -> Self {
        for (name, value) in variables.variables {
            self = self.variable(name, value);
        }
        self
    }

    /// Finalize the seed mapping
    pub fn build(self) -> GlobalVariables {
        GlobalVariables {
            variables: self.variables,
        }
    }
}
