use std::env;
use std::sync::{Mutex, OnceLock};

use serde_json::Value;
use storefront_cli::commands::{ask, config, doctor};
use storefront_core::config::ENV_KEYS;

const UNREACHABLE_CATALOGUE: &str = "http://127.0.0.1:1/mcp/catalogue";

#[test]
fn config_attributes_sources_and_redacts_api_key() {
    with_env(
        &[
            ("GATEWAY_ENDPOINT", "http://kong.internal:8000"),
            ("STOREFRONT_LLM_API_KEY", "sk-live-very-secret"),
        ],
        || {
            let output = config::run();

            assert!(output.starts_with("effective config"));
            assert!(output.contains(
                "- gateway.endpoint = http://kong.internal:8000 (source: env (GATEWAY_ENDPOINT))"
            ));
            assert!(output.contains("- llm.api_key = sk-*** (source: env (STOREFRONT_LLM_API_KEY))"));
            assert!(
                output.contains("- llm.base_url = http://kong.internal:8000/v1 (source: default)")
            );
            assert!(output.contains("- server.port = 3004 (source: default)"));
            assert!(!output.contains("very-secret"));
        },
    );
}

#[test]
fn config_reports_validation_failure() {
    with_env(&[("GATEWAY_ENDPOINT", "kong:8000")], || {
        let output = config::run();

        assert!(output.starts_with("config validation failed"));
        assert!(output.contains("gateway.endpoint"));
    });
}

#[test]
fn doctor_skips_backend_checks_when_config_invalid() {
    with_env(&[("GATEWAY_ENDPOINT", "kong:8000")], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 1);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "fail");
        assert_eq!(payload["checks"][0]["name"], "config_validation");
        assert_eq!(payload["checks"][0]["status"], "fail");
        assert_eq!(payload["checks"][1]["name"], "llm_config");
        assert_eq!(payload["checks"][1]["status"], "skipped");
        assert_eq!(payload["checks"][2]["status"], "skipped");
    });
}

#[test]
fn doctor_fails_when_catalogue_is_unreachable() {
    with_env(&[("STOREFRONT_CATALOGUE_URL", UNREACHABLE_CATALOGUE)], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 1);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "fail");
        assert_eq!(payload["checks"][1]["name"], "llm_config");
        assert_eq!(payload["checks"][1]["status"], "pass");
        assert_eq!(payload["checks"][2]["name"], "tool_connectivity");
        assert_eq!(payload["checks"][2]["status"], "fail");
    });
}

#[test]
fn doctor_human_output_lists_every_check() {
    with_env(&[("STOREFRONT_CATALOGUE_URL", UNREACHABLE_CATALOGUE)], || {
        let result = doctor::run(false);

        assert!(result.output.starts_with("doctor: one or more readiness checks failed"));
        assert!(result.output.contains("- [ok] config_validation"));
        assert!(result.output.contains("- [ok] llm_config: model `"));
        assert!(result.output.contains("(not contacted)"));
        assert!(result.output.contains("- [fail] tool_connectivity"));
    });
}

#[test]
fn ask_rejects_empty_prompt() {
    with_env(&[], || {
        let result = ask::run("");
        assert_eq!(result.exit_code, 4);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "ask");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "invalid_input");
    });
}

#[test]
fn ask_returns_config_failure_for_invalid_gateway() {
    with_env(&[("GATEWAY_ENDPOINT", "kong:8000")], || {
        let result = ask::run("What snacks do you sell?");
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn ask_reports_unreachable_catalogue_with_fixed_message() {
    with_env(&[("STOREFRONT_CATALOGUE_URL", UNREACHABLE_CATALOGUE)], || {
        let result = ask::run("What snacks do you sell?");
        assert_eq!(result.exit_code, 5);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "tool_connectivity");
        assert_eq!(
            payload["message"],
            "MCP server is unavailable. Please check Kong Gateway is running."
        );
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let previous_values: Vec<(&str, Option<String>)> =
        ENV_KEYS.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in ENV_KEYS {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
