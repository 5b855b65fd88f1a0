//! Test Context - Variable and function resolution engine for integration tests
//!
//! This crate provides the execution state behind a test case: a typed
//! variable store, dynamic-content resolution for `${variable}` and
//! `function(args)` expressions, type conversion, and registries for
//! custom functions and validation matchers.

// Core modules
pub mod config;
pub mod error;
pub mod value;

// Shared utility modules
pub mod conversion;
pub mod variables;

// Main functionality modules
pub mod context;
pub mod functions;
pub mod matchers;
pub mod message;

pub(crate) mod expression;

// Re-export main types for convenience
pub use config::{EngineConfig, ExpressionSyntax};
pub use context::{
    ReferenceResolver, SimpleReferenceResolver, StopTimer, TestContext, TestContextFactory,
    TEST_NAME_VARIABLE, TEST_PACKAGE_VARIABLE,
};
pub use conversion::{ConverterRegistry, FromValue, TargetKind, TypeConverter, DEFAULT_CONVERTER};
pub use error::{EngineError, Result};
pub use functions::{Function, FunctionRegistry};
pub use matchers::{MatcherRegistry, ValidationMatcher};
pub use message::{
    Message, MessageDirection, MessageListener, MessageListeners, MessageStore, TestCaseInfo,
    TestListener, TestListeners, TestResult,
};
pub use value::Value;
pub use variables::{
    GlobalVariables, GlobalVariablesBuilder, SegmentExtractorRegistry, SegmentVariableExtractor,
    VariableStore,
};
