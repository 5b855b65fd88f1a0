//! Integration tests for the test context engine
//!
//! Covers the full path from configuration loading through context creation,
//! dynamic-content resolution, structured variable extraction, timers and
//! deferred failures raised by forked actions.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use test_context::{
    EngineConfig, EngineError, GlobalVariables, Message, TestContextFactory, TestResult, Value,
};

mod configuration {
    use super::*;

    #[test]
    fn loads_config_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            converter = "default"

            [syntax]
            variable_prefix = "${{"
            variable_suffix = "}}"

            [globals]
            environment = "staging"
            base_url = "https://staging.example.com"
            "#
        )
        .unwrap();

        let config = EngineConfig::load_with_validation(file.path()).unwrap();
        let context = TestContextFactory::from_config(config).create().unwrap();

        assert_eq!(context.get_variable("environment").unwrap(), "staging");
        assert_eq!(
            context
                .resolve_dynamic_content("${base_url}/orders")
                .unwrap(),
            "https://staging.example.com/orders"
        );
    }

    #[test]
    fn missing_config_file_is_reported() {
        let result = EngineConfig::load_with_validation("/nonexistent/engine.toml");
        assert!(matches!(result, Err(EngineError::ConfigNotFound { .. })));
    }

    #[test]
    fn custom_syntax_markers_drive_resolution() {
        let config: EngineConfig = toml::from_str(
            r#"
            [syntax]
            variable_prefix = "%["
            variable_suffix = "]"
            "#,
        )
        .unwrap();

        let context = TestContextFactory::from_config(config).create().unwrap();
        context.set_variable("user", "alice").unwrap();

        assert_eq!(
            context.resolve_dynamic_content("login: %[user]").unwrap(),
            "login: alice"
        );
        // Default markers are inert under the custom syntax.
        assert_eq!(
            context.resolve_dynamic_content("login: ${user}").unwrap(),
            "login: ${user}"
        );
    }
}

mod dynamic_content {
    use super::*;

    #[test]
    fn resolves_templated_request_map() {
        let context = TestContextFactory::new().create().unwrap();
        context.set_variable("order_id", "A-1001").unwrap();
        context.set_variable("token", "secret").unwrap();

        let mut headers = HashMap::new();
        headers.insert(
            "Authorization".to_string(),
            "Bearer ${token}".to_string(),
        );
        headers.insert(
            "X-Order".to_string(),
            "upper_case('${order_id}')".to_string(),
        );

        let resolved = context.resolve_dynamic_values_in_map(&headers).unwrap();

        assert_eq!(
            resolved.get("Authorization"),
            Some(&"Bearer secret".to_string())
        );
        assert_eq!(resolved.get("X-Order"), Some(&"A-1001".to_string()));
    }

    #[test]
    fn resolves_structured_variable_paths() {
        let context = TestContextFactory::new().create().unwrap();

        let mut item = HashMap::new();
        item.insert("sku".to_string(), Value::from("XJ-9"));
        item.insert("qty".to_string(), Value::from(2i64));

        let mut order = HashMap::new();
        order.insert("items".to_string(), Value::List(vec![Value::Map(item)]));
        context.set_variable("order", Value::Map(order)).unwrap();

        assert_eq!(context.get_variable("${order.items[0].sku}").unwrap(), "XJ-9");
        let qty: i64 = context.get_variable_as("${order.items[0].qty}").unwrap();
        assert_eq!(qty, 2);
    }

    #[test]
    fn resolves_json_payload_via_jsonpath_segment() {
        let context = TestContextFactory::new().create().unwrap();
        context
            .set_variable("response", r#"{"user": {"name": "alice", "roles": ["admin"]}}"#)
            .unwrap();

        assert_eq!(
            context
                .get_variable("${response.jsonPath($.user.name)}")
                .unwrap(),
            "alice"
        );
    }

    #[test]
    fn escaped_tokens_survive_as_literals() {
        let context = TestContextFactory::new().create().unwrap();
        context.set_variable("value", "456").unwrap();

        assert_eq!(
            context
                .resolve_dynamic_content("keep ${//value//} but swap ${value}")
                .unwrap(),
            "keep ${value} but swap 456"
        );
    }

    #[test]
    fn unknown_tokens_stay_verbatim_in_bulk_replacement() {
        let context = TestContextFactory::new().create().unwrap();
        context.set_variable("known", "yes").unwrap();

        assert_eq!(
            context
                .resolve_dynamic_content("${known} ${unknown}")
                .unwrap(),
            "yes ${unknown}"
        );
        // Direct lookup of the same token is strict.
        assert!(context.get_variable("${unknown}").is_err());
    }

    #[test]
    fn function_results_feed_variables() {
        let context = TestContextFactory::new().create().unwrap();

        let uuid = context.resolve_dynamic_value("random_uuid()").unwrap();
        context.set_variable("correlation_id", uuid.as_str()).unwrap();

        assert_eq!(context.get_variable("correlation_id").unwrap(), uuid);
    }
}

mod global_variables {
    use super::*;

    #[test]
    fn globals_are_resolved_once_per_context() {
        let globals = GlobalVariables::builder()
            .variable("project", "orders")
            .variable("banner", "concat('project: ', '${project}')")
            .build();

        let factory = TestContextFactory::new().with_global_variables(globals);
        let context = factory.create().unwrap();

        assert_eq!(context.get_variable("banner").unwrap(), "project: orders");

        // Clearing re-seeds the already-resolved values.
        context.set_variable("banner", "overwritten").unwrap();
        context.clear_variables().unwrap();
        assert_eq!(context.get_variable("banner").unwrap(), "project: orders");
    }
}

mod concurrency {
    use super::*;

    #[test]
    fn forked_actions_share_variables_and_report_failures() {
        let context = Arc::new(TestContextFactory::new().create().unwrap());
        let mut handles = Vec::new();

        for worker in 0..4 {
            let context = Arc::clone(&context);
            handles.push(std::thread::spawn(move || {
                context
                    .set_variable(format!("worker_{worker}"), Value::from(worker as i64))
                    .unwrap();

                if worker == 2 {
                    context.add_exception(EngineError::general("worker 2 failed"));
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        for worker in 0..4 {
            let value: i64 = context
                .get_variable_as(&format!("worker_{worker}"))
                .unwrap();
            assert_eq!(value, worker as i64);
        }

        assert!(context.has_exceptions());
        assert_eq!(context.exceptions().len(), 1);
        assert!(!context.is_success(Some(&TestResult::success("forked"))));
    }
}

mod lifecycle {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use test_context::StopTimer;

    struct FlagTimer(Arc<AtomicBool>);

    impl StopTimer for FlagTimer {
        fn stop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn timers_stop_when_the_test_finishes() {
        let context = TestContextFactory::new().create().unwrap();
        let polling = Arc::new(AtomicBool::new(false));
        let heartbeat = Arc::new(AtomicBool::new(false));

        context
            .register_timer("polling", Box::new(FlagTimer(Arc::clone(&polling))))
            .unwrap();
        context
            .register_timer("heartbeat", Box::new(FlagTimer(Arc::clone(&heartbeat))))
            .unwrap();

        assert!(context.stop_timer("polling"));
        assert!(polling.load(Ordering::SeqCst));

        context.stop_timers();
        assert!(heartbeat.load(Ordering::SeqCst));
    }

    #[test]
    fn named_messages_are_recorded_for_inspection() {
        let context = TestContextFactory::new().create().unwrap();

        context.on_outbound_message(
            &Message::new(r#"{"action": "create"}"#)
                .with_name("create_request")
                .with_header("content-type", "application/json"),
        );
        context.on_inbound_message(&Message::new(r#"{"id": 7}"#).with_name("create_response"));

        let response = context.message_store().get_message("create_response").unwrap();
        assert_eq!(response.payload, r#"{"id": 7}"#);
        assert_eq!(context.message_store().len(), 2);
    }

    #[test]
    fn test_identity_variables_are_available() {
        let context = TestContextFactory::new()
            .create_for_test("checkout_happy_path", "orders")
            .unwrap();

        assert_eq!(
            context
                .resolve_dynamic_content("running ${test_name} in ${test_package}")
                .unwrap(),
            "running checkout_happy_path in orders"
        );
    }
}
