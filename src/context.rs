//! Test context holding the variable store, registries and execution state
//! for one test case, plus the factory that assembles fresh contexts.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::{EngineConfig, ExpressionSyntax};
use crate::conversion::{ConverterRegistry, FromValue, TypeConverter};
use crate::error::{EngineError, Result};
use crate::expression;
use crate::functions::FunctionRegistry;
use crate::matchers::MatcherRegistry;
use crate::message::{
    Message, MessageDirection, MessageListeners, MessageStore, TestCaseInfo, TestListeners,
    TestResult,
};
use crate::value::Value;
use crate::variables::{GlobalVariables, SegmentExtractorRegistry, VariableStore};

/// Reserved variable carrying the current test name
pub const TEST_NAME_VARIABLE: &str = "test_name";
/// Reserved variable carrying the current test package
pub const TEST_PACKAGE_VARIABLE: &str = "test_package";

/// Handle to a scheduled timer that the context can stop when the test
/// finishes
pub trait StopTimer: Send {
    fn stop(&mut self);
}

/// Lookup of shared components by bind name.
///
/// Custom functions and matchers use this to reach endpoints or clients
/// registered at setup time.
pub trait ReferenceResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Option<Arc<dyn Any + Send + Sync>>;

    fn is_resolvable(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }
}

/// In-memory reference resolver backed by a name-to-instance map
#[derive(Default)]
pub struct SimpleReferenceResolver {
    references: RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl SimpleReferenceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an instance under the given bind name
    pub fn bind<S: Into<String>>(&self, name: S, instance: Arc<dyn Any + Send + Sync>) {
        if let Ok(mut references) = self.references.write() {
            references.insert(name.into(), instance);
        }
    }
}

impl ReferenceResolver for SimpleReferenceResolver {
    fn resolve(&self, name: &str) -> Option<Arc<dyn Any + Send + Sync>> {
        self.references.read().ok()?.get(name).cloned()
    }
}

/// Execution state for a single test case.
///
/// The context owns the variable store and message store, shares the
/// function/matcher registries and type converter with its factory, and
/// records timers and deferred failures raised by forked actions. All
/// methods take `&self` so the context can be shared across threads behind
/// an `Arc`.
pub struct TestContext {
    id: Uuid,
    created_at: DateTime<Utc>,
    variables: VariableStore,
    functions: Arc<FunctionRegistry>,
    matchers: Arc<MatcherRegistry>,
    converter: Arc<TypeConverter>,
    message_listeners: Arc<MessageListeners>,
    test_listeners: Arc<TestListeners>,
    message_store: MessageStore,
    reference_resolver: Option<Arc<dyn ReferenceResolver>>,
    timers: Mutex<HashMap<String, Box<dyn StopTimer>>>,
    exceptions: Mutex<Vec<EngineError>>,
}

impl TestContext {
    /// Unique identity of this context
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Creation timestamp of this context
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Expression syntax used by this context
    pub fn syntax(&self) -> &ExpressionSyntax {
        self.variables.syntax()
    }

    /// Variable store backing this context
    pub fn variable_store(&self) -> &VariableStore {
        &self.variables
    }

    /// Function registry shared with the factory
    pub fn function_registry(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// Matcher registry shared with the factory
    pub fn matcher_registry(&self) -> &MatcherRegistry {
        &self.matchers
    }

    /// Type converter selected for this context
    pub fn type_converter(&self) -> &TypeConverter {
        &self.converter
    }

    /// Message store recording named messages exchanged during the test
    pub fn message_store(&self) -> &MessageStore {
        &self.message_store
    }

    /// Reference resolver for shared components, if one is installed
    pub fn reference_resolver(&self) -> Option<&Arc<dyn ReferenceResolver>> {
        self.reference_resolver.as_ref()
    }

    // -- variables ---------------------------------------------------------

    /// Get a variable value rendered as a string.
    ///
    /// The expression may carry `${...}` decoration and may address a
    /// structured path such as `order.items[0].sku`. Unknown variables are
    /// an error; direct lookups are strict.
    pub fn get_variable(&self, expression: &str) -> Result<String> {
        Ok(self.variables.get(expression)?.render())
    }

    /// Get a variable as its stored typed value
    pub fn get_variable_value(&self, expression: &str) -> Result<Value> {
        self.variables.get(expression)
    }

    /// Get a variable converted to the requested Rust type
    pub fn get_variable_as<T: FromValue>(&self, expression: &str) -> Result<T> {
        let value = self.variables.get(expression)?;
        self.converter.convert_to(&value)
    }

    /// Create or overwrite a variable
    pub fn set_variable<S: AsRef<str>, V: Into<Value>>(&self, name: S, value: V) -> Result<()> {
        self.variables.set(name.as_ref(), value.into())
    }

    /// Set each non-null name/value pair; array lengths must match
    pub fn add_variables(&self, names: &[&str], values: &[Value]) -> Result<()> {
        self.variables.add_all(names, values)
    }

    /// Set all entries of a map as variables, storing null values as empty
    /// strings
    pub fn add_variables_map(&self, variables: HashMap<String, Value>) -> Result<()> {
        for (name, value) in variables {
            let value = if value.is_null() {
                Value::from("")
            } else {
                value
            };
            self.variables.set(&name, value)?;
        }
        Ok(())
    }

    /// Snapshot of all current variables
    pub fn variables(&self) -> Result<HashMap<String, Value>> {
        self.variables.snapshot()
    }

    /// Check if any variables are present
    pub fn has_variables(&self) -> bool {
        self.variables.has_variables()
    }

    /// Drop all variables and re-seed from the global variables
    pub fn clear_variables(&self) -> Result<()> {
        self.variables.clear()
    }

    /// Resolve global variable values and install them as the store seed.
    ///
    /// Dynamic content inside the seed values is resolved once, here. Each
    /// resolved entry enters the store before the next one resolves, so a
    /// global may reference any global defined before it.
    pub fn set_global_variables(&self, globals: &GlobalVariables) -> Result<()> {
        let mut resolved = HashMap::with_capacity(globals.len());

        for (name, value) in globals.iter() {
            let value = match value {
                Value::String(text) => Value::String(self.resolve_dynamic_content(text)?),
                other => other.clone(),
            };
            self.variables.set(name, value.clone())?;
            resolved.insert(name.to_string(), value);
        }

        self.variables.seed_from(resolved)
    }

    // -- dynamic content ---------------------------------------------------

    /// Replace all variable and function expressions in the input.
    ///
    /// Variable tokens resolve first, then function calls over the
    /// substituted text. Unknown variable tokens stay verbatim so templates
    /// survive partial resolution.
    pub fn resolve_dynamic_content(&self, input: &str) -> Result<String> {
        let substituted = expression::replace_variables(input, &self.variables, false);
        expression::replace_functions(&substituted, self, false)
    }

    /// Like [`resolve_dynamic_content`](Self::resolve_dynamic_content) but
    /// wraps every substituted value in single quotes
    pub fn resolve_dynamic_content_quoted(&self, input: &str) -> Result<String> {
        let substituted = expression::replace_variables(input, &self.variables, true);
        expression::replace_functions(&substituted, self, true)
    }

    /// Resolve a single expression to its final value.
    ///
    /// A decorated variable reference resolves strictly, a registered
    /// function call executes, anything else passes through unchanged.
    pub fn resolve_dynamic_value(&self, expression: &str) -> Result<String> {
        if self.syntax().is_variable_expression(expression) {
            return self.get_variable(expression);
        }

        if self.functions.is_function(expression) {
            return expression::resolve_function(expression, self);
        }

        Ok(expression.to_string())
    }

    /// Resolve dynamic content in every key and value of the map
    pub fn resolve_dynamic_values_in_map(
        &self,
        map: &HashMap<String, String>,
    ) -> Result<HashMap<String, String>> {
        let mut resolved = HashMap::with_capacity(map.len());
        for (key, value) in map {
            resolved.insert(
                self.resolve_dynamic_content(key)?,
                self.resolve_dynamic_content(value)?,
            );
        }
        Ok(resolved)
    }

    /// Resolve dynamic content in every element of the list
    pub fn resolve_dynamic_values_in_list(&self, values: &[String]) -> Result<Vec<String>> {
        values
            .iter()
            .map(|value| self.resolve_dynamic_content(value))
            .collect()
    }

    // -- timers -------------------------------------------------------------

    /// Register a timer under the given id; ids must be unique per context
    pub fn register_timer<S: Into<String>>(&self, id: S, timer: Box<dyn StopTimer>) -> Result<()> {
        let id = id.into();
        let mut timers = self
            .timers
            .lock()
            .map_err(|_| EngineError::general("Failed to acquire lock on timer registry"))?;

        if timers.contains_key(&id) {
            return Err(EngineError::TimerAlreadyRegistered { id });
        }

        timers.insert(id, timer);
        Ok(())
    }

    /// Stop the timer registered under the given id.
    ///
    /// Returns false when no timer with that id exists.
    pub fn stop_timer(&self, id: &str) -> bool {
        let Ok(mut timers) = self.timers.lock() else {
            return false;
        };

        match timers.remove(id) {
            Some(mut timer) => {
                timer.stop();
                true
            }
            None => false,
        }
    }

    /// Stop all timers registered with this context
    pub fn stop_timers(&self) {
        if let Ok(mut timers) = self.timers.lock() {
            for (id, mut timer) in timers.drain() {
                debug!(timer = id.as_str(), "stopping timer");
                timer.stop();
            }
        }
    }

    // -- deferred exceptions -------------------------------------------------

    /// Record a failure raised by a forked action for later evaluation
    pub fn add_exception(&self, error: EngineError) {
        warn!(error = %error, "recording deferred failure");
        if let Ok(mut exceptions) = self.exceptions.lock() {
            exceptions.push(error);
        }
    }

    /// Check if any deferred failures were recorded
    pub fn has_exceptions(&self) -> bool {
        self.exceptions
            .lock()
            .map(|e| !e.is_empty())
            .unwrap_or(true)
    }

    /// Snapshot of all recorded deferred failures
    pub fn exceptions(&self) -> Vec<EngineError> {
        self.exceptions
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    /// Decide overall test success: no deferred failures and a successful
    /// reported result
    pub fn is_success(&self, result: Option<&TestResult>) -> bool {
        !self.has_exceptions() && result.map(TestResult::is_success).unwrap_or(false)
    }

    // -- messages and errors --------------------------------------------------

    /// Notify listeners about a received message and record it if named
    pub fn on_inbound_message(&self, message: &Message) {
        if self.message_listeners.is_empty() {
            debug!(
                direction = %MessageDirection::Inbound,
                payload = message.payload.as_str(),
                "message exchanged"
            );
        } else {
            self.message_listeners.on_inbound_message(message);
        }

        if let Some(name) = &message.name {
            self.message_store.store_message(name.clone(), message.clone());
        }
    }

    /// Notify listeners about a sent message and record it if named
    pub fn on_outbound_message(&self, message: &Message) {
        if self.message_listeners.is_empty() {
            debug!(
                direction = %MessageDirection::Outbound,
                payload = message.payload.as_str(),
                "message exchanged"
            );
        } else {
            self.message_listeners.on_outbound_message(message);
        }

        if let Some(name) = &message.name {
            self.message_store.store_message(name.clone(), message.clone());
        }
    }

    /// Report a setup failure through the test listeners.
    ///
    /// Builds a placeholder test identity so listeners see start, failure
    /// and finish events even when the real test case never came to life.
    /// Returns a generic engine error wrapping the message and cause.
    pub fn handle_error<S: Into<String>>(
        &self,
        test_name: &str,
        package_name: &str,
        message: S,
        cause: &EngineError,
    ) -> EngineError {
        let error = EngineError::general(format!("{}: {}", message.into(), cause));
        let placeholder = TestCaseInfo::new(test_name, package_name);

        self.test_listeners.on_test_start(&placeholder);
        self.test_listeners.on_test_failure(&placeholder, &error);
        self.test_listeners.on_test_finish(&placeholder);

        error
    }
}

impl std::fmt::Debug for TestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestContext")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .field("variables", &self.variables)
            .finish()
    }
}

/// Factory assembling fresh test contexts from shared configuration and
/// registries.
///
/// One factory serves a whole test run; each test case gets its own context
/// with an isolated variable store seeded from the global variables.
pub struct TestContextFactory {
    config: EngineConfig,
    global_variables: GlobalVariables,
    functions: Arc<FunctionRegistry>,
    matchers: Arc<MatcherRegistry>,
    converters: ConverterRegistry,
    segment_extractors: Arc<SegmentExtractorRegistry>,
    message_listeners: Arc<MessageListeners>,
    test_listeners: Arc<TestListeners>,
    reference_resolver: Option<Arc<dyn ReferenceResolver>>,
}

impl Default for TestContextFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContextFactory {
    /// Create a factory with default configuration and built-in registries
    pub fn new() -> Self {
        Self::from_config(EngineConfig::default())
    }

    /// Create a factory from a loaded engine configuration
    pub fn from_config(config: EngineConfig) -> Self {
        let global_variables = GlobalVariables::from_config(&config);

        Self {
            config,
            global_variables,
            functions: Arc::new(FunctionRegistry::default()),
            matchers: Arc::new(MatcherRegistry::default()),
            converters: ConverterRegistry::default(),
            segment_extractors: Arc::new(SegmentExtractorRegistry::default()),
            message_listeners: Arc::new(MessageListeners::new()),
            test_listeners: Arc::new(TestListeners::new()),
            reference_resolver: None,
        }
    }

    /// Replace the global variable seed
    pub fn with_global_variables(mut self, globals: GlobalVariables) -> Self {
        self.global_variables = globals;
        self
    }

    /// Replace the function registry
    pub fn with_function_registry(mut self, registry: FunctionRegistry) -> Self {
        self.functions = Arc::new(registry);
        self
    }

    /// Replace the matcher registry
    pub fn with_matcher_registry(mut self, registry: MatcherRegistry) -> Self {
        self.matchers = Arc::new(registry);
        self
    }

    /// Replace the converter registry
    pub fn with_converter_registry(mut self, registry: ConverterRegistry) -> Self {
        self.converters = registry;
        self
    }

    /// Replace the segment extractor chain
    pub fn with_segment_extractors(mut self, registry: SegmentExtractorRegistry) -> Self {
        self.segment_extractors = Arc::new(registry);
        self
    }

    /// Replace the message listeners
    pub fn with_message_listeners(mut self, listeners: MessageListeners) -> Self {
        self.message_listeners = Arc::new(listeners);
        self
    }

    /// Replace the test listeners
    pub fn with_test_listeners(mut self, listeners: TestListeners) -> Self {
        self.test_listeners = Arc::new(listeners);
        self
    }

    /// Install a reference resolver for shared components
    pub fn with_reference_resolver(mut self, resolver: Arc<dyn ReferenceResolver>) -> Self {
        self.reference_resolver = Some(resolver);
        self
    }

    /// Create a fresh context seeded with the resolved global variables
    pub fn create(&self) -> Result<TestContext> {
        let variables = VariableStore::new(
            self.config.syntax.clone(),
            Arc::clone(&self.segment_extractors),
        );

        let context = TestContext {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            variables,
            functions: Arc::clone(&self.functions),
            matchers: Arc::clone(&self.matchers),
            converter: self.converters.lookup(self.config.converter.as_deref()),
            message_listeners: Arc::clone(&self.message_listeners),
            test_listeners: Arc::clone(&self.test_listeners),
            message_store: MessageStore::new(),
            reference_resolver: self.reference_resolver.clone(),
            timers: Mutex::new(HashMap::new()),
            exceptions: Mutex::new(Vec::new()),
        };

        context.set_global_variables(&self.global_variables)?;

        debug!(context_id = %context.id(), "created test context");
        Ok(context)
    }

    /// Create a context for a named test, seeding the reserved test name and
    /// package variables
    pub fn create_for_test(&self, test_name: &str, package_name: &str) -> Result<TestContext> {
        let context = self.create()?;
        context.set_variable(TEST_NAME_VARIABLE, test_name)?;
        context.set_variable(TEST_PACKAGE_VARIABLE, package_name)?;
        Ok(context)
    }
}

impl std::fmt::Debug for TestContextFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestContextFactory")
            .field("config", &self.config)
            .field("global_variables", &self.global_variables)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> TestContext {
        TestContextFactory::new().create().unwrap()
    }

    #[test]
    fn test_get_variable() {
        let ctx = context();
        ctx.set_variable("test", "123").unwrap();

        assert_eq!(ctx.get_variable("test").unwrap(), "123");
        assert_eq!(ctx.get_variable("${test}").unwrap(), "123");
        assert!(matches!(
            ctx.get_variable("${unknown}"),
            Err(EngineError::UnresolvableVariable { .. })
        ));
    }

    #[test]
    fn test_get_variable_converted() {
        let ctx = context();
        ctx.set_variable("retries", "3").unwrap();

        let retries: i64 = ctx.get_variable_as("${retries}").unwrap();
        assert_eq!(retries, 3);
    }

    #[test]
    fn test_add_variables_map_stores_null_as_empty() {
        let ctx = context();
        let mut vars = HashMap::new();
        vars.insert("a".to_string(), Value::from("1"));
        vars.insert("b".to_string(), Value::Null);

        ctx.add_variables_map(vars).unwrap();

        assert_eq!(ctx.get_variable("a").unwrap(), "1");
        assert_eq!(ctx.get_variable("b").unwrap(), "");
    }

    #[test]
    fn test_resolve_dynamic_content() {
        let ctx = context();
        ctx.set_variable("name", "World").unwrap();

        assert_eq!(
            ctx.resolve_dynamic_content("Hello ${name}!").unwrap(),
            "Hello World!"
        );
        assert_eq!(
            ctx.resolve_dynamic_content("upper_case('${name}')").unwrap(),
            "WORLD"
        );
        assert_eq!(
            ctx.resolve_dynamic_content_quoted("Hello ${name}!").unwrap(),
            "Hello 'World'!"
        );
    }

    #[test]
    fn test_resolve_dynamic_value() {
        let ctx = context();
        ctx.set_variable("test", "123").unwrap();

        assert_eq!(ctx.resolve_dynamic_value("${test}").unwrap(), "123");
        assert_eq!(
            ctx.resolve_dynamic_value("concat('a', 'b')").unwrap(),
            "ab"
        );
        assert_eq!(ctx.resolve_dynamic_value("plain").unwrap(), "plain");
        assert!(ctx.resolve_dynamic_value("${missing}").is_err());
    }

    #[test]
    fn test_resolve_dynamic_values_in_map_resolves_keys() {
        let ctx = context();
        ctx.set_variable("header", "X-Trace").unwrap();
        ctx.set_variable("id", "42").unwrap();

        let mut map = HashMap::new();
        map.insert("${header}".to_string(), "${id}".to_string());

        let resolved = ctx.resolve_dynamic_values_in_map(&map).unwrap();
        assert_eq!(resolved.get("X-Trace"), Some(&"42".to_string()));
    }

    #[test]
    fn test_global_variables_seed_and_clear() {
        let globals = GlobalVariables::builder()
            .variable("project", "demo")
            .build();
        let factory = TestContextFactory::new().with_global_variables(globals);
        let ctx = factory.create().unwrap();

        assert_eq!(ctx.get_variable("project").unwrap(), "demo");

        ctx.set_variable("project", "changed").unwrap();
        ctx.set_variable("scratch", "x").unwrap();
        ctx.clear_variables().unwrap();

        assert_eq!(ctx.get_variable("project").unwrap(), "demo");
        assert!(ctx.get_variable("scratch").is_err());
    }

    #[test]
    fn test_global_variables_resolve_dynamic_content_once() {
        let globals = GlobalVariables::builder()
            .variable("greeting", "concat('Hello', ' World')")
            .build();
        let ctx = TestContextFactory::new()
            .with_global_variables(globals)
            .create()
            .unwrap();

        assert_eq!(ctx.get_variable("greeting").unwrap(), "Hello World");
    }

    #[test]
    fn test_global_variables_reference_earlier_globals() {
        let globals = GlobalVariables::builder()
            .variable("project", "orders")
            .variable("banner", "concat('project: ', '${project}')")
            .variable("loud_banner", "upper_case('${banner}')")
            .build();
        let ctx = TestContextFactory::new()
            .with_global_variables(globals)
            .create()
            .unwrap();

        assert_eq!(ctx.get_variable("banner").unwrap(), "project: orders");
        assert_eq!(ctx.get_variable("loud_banner").unwrap(), "PROJECT: ORDERS");
    }

    #[test]
    fn test_resolve_dynamic_values_in_list() {
        let ctx = context();
        ctx.set_variable("id", "42").unwrap();

        let values = vec![
            "order ${id}".to_string(),
            "upper_case('ack')".to_string(),
            "plain".to_string(),
        ];

        let resolved = ctx.resolve_dynamic_values_in_list(&values).unwrap();
        assert_eq!(resolved, vec!["order 42", "ACK", "plain"]);
    }

    #[test]
    fn test_create_for_test_seeds_reserved_variables() {
        let ctx = TestContextFactory::new()
            .create_for_test("sample_test", "checkout")
            .unwrap();

        assert_eq!(ctx.get_variable(TEST_NAME_VARIABLE).unwrap(), "sample_test");
        assert_eq!(ctx.get_variable(TEST_PACKAGE_VARIABLE).unwrap(), "checkout");
    }

    #[test]
    fn test_contexts_are_isolated() {
        let factory = TestContextFactory::new();
        let first = factory.create().unwrap();
        let second = factory.create().unwrap();

        first.set_variable("only_first", "1").unwrap();

        assert_ne!(first.id(), second.id());
        assert!(second.get_variable("only_first").is_err());
    }

    struct RecordingTimer {
        stopped: Arc<std::sync::atomic::AtomicBool>,
    }

    impl StopTimer for RecordingTimer {
        fn stop(&mut self) {
            self.stopped.store(true, std::sync::atomic::Ordering::SeqCst);
        }
    }

    #[test]
    fn test_timer_registration_and_stop() {
        let ctx = context();
        let stopped = Arc::new(std::sync::atomic::AtomicBool::new(false));

        ctx.register_timer(
            "timer-1",
            Box::new(RecordingTimer {
                stopped: Arc::clone(&stopped),
            }),
        )
        .unwrap();

        let duplicate = ctx.register_timer(
            "timer-1",
            Box::new(RecordingTimer {
                stopped: Arc::new(std::sync::atomic::AtomicBool::new(false)),
            }),
        );
        assert!(matches!(
            duplicate,
            Err(EngineError::TimerAlreadyRegistered { .. })
        ));

        assert!(ctx.stop_timer("timer-1"));
        assert!(stopped.load(std::sync::atomic::Ordering::SeqCst));
        assert!(!ctx.stop_timer("timer-1"));
        assert!(!ctx.stop_timer("never-registered"));
    }

    #[test]
    fn test_stop_timers_drains_all() {
        let ctx = context();
        let first = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let second = Arc::new(std::sync::atomic::AtomicBool::new(false));

        ctx.register_timer("a", Box::new(RecordingTimer { stopped: Arc::clone(&first) }))
            .unwrap();
        ctx.register_timer("b", Box::new(RecordingTimer { stopped: Arc::clone(&second) }))
            .unwrap();

        ctx.stop_timers();

        assert!(first.load(std::sync::atomic::Ordering::SeqCst));
        assert!(second.load(std::sync::atomic::Ordering::SeqCst));
        assert!(!ctx.stop_timer("a"));
    }

    #[test]
    fn test_deferred_exceptions_and_success() {
        let ctx = context();
        let passed = TestResult::success("t");

        assert!(!ctx.has_exceptions());
        assert!(ctx.is_success(Some(&passed)));
        assert!(!ctx.is_success(None));

        ctx.add_exception(EngineError::general("forked action failed"));

        assert!(ctx.has_exceptions());
        assert_eq!(ctx.exceptions().len(), 1);
        assert!(!ctx.is_success(Some(&passed)));
    }

    #[test]
    fn test_named_messages_are_stored() {
        let ctx = context();

        ctx.on_outbound_message(&Message::new("ping").with_name("request"));
        ctx.on_inbound_message(&Message::new("pong").with_name("response"));
        ctx.on_inbound_message(&Message::new("ignored"));

        assert_eq!(ctx.message_store().len(), 2);
        assert_eq!(
            ctx.message_store().get_message("response").unwrap().payload,
            "pong"
        );
    }

    #[test]
    fn test_handle_error_notifies_listeners() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        #[derive(Default)]
        struct Recorder {
            starts: AtomicUsize,
            failures: AtomicUsize,
            finishes: AtomicUsize,
        }

        impl crate::message::TestListener for Recorder {
            fn on_test_start(&self, _test: &TestCaseInfo) {
                self.starts.fetch_add(1, Ordering::SeqCst);
            }
            fn on_test_failure(&self, _test: &TestCaseInfo, _error: &EngineError) {
                self.failures.fetch_add(1, Ordering::SeqCst);
            }
            fn on_test_finish(&self, _test: &TestCaseInfo) {
                self.finishes.fetch_add(1, Ordering::SeqCst);
            }
        }

        let recorder = Arc::new(Recorder::default());
        let mut listeners = TestListeners::new();
        listeners.add(recorder.clone());

        let ctx = TestContextFactory::new()
            .with_test_listeners(listeners)
            .create()
            .unwrap();

        let returned = ctx.handle_error(
            "broken_test",
            "checkout",
            "could not build test case",
            &EngineError::unresolvable("missing"),
        );

        assert!(matches!(returned, EngineError::General { .. }));
        assert!(returned.to_string().contains("could not build test case"));
        assert!(returned.to_string().contains("missing"));
        assert_eq!(recorder.starts.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.failures.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.finishes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reference_resolver_lookup() {
        let resolver = Arc::new(SimpleReferenceResolver::new());
        resolver.bind("client", Arc::new("endpoint".to_string()));

        let ctx = TestContextFactory::new()
            .with_reference_resolver(resolver)
            .create()
            .unwrap();

        let reference = ctx.reference_resolver().unwrap().resolve("client").unwrap();
        assert_eq!(
            reference.downcast_ref::<String>().map(String::as_str),
            Some("endpoint")
        );
        assert!(ctx.reference_resolver().unwrap().resolve("missing").is_none());
    }
}
