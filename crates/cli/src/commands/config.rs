use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use storefront_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let file_path = detect_config_path();
    let file_doc = load_config_file_doc(file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, file_doc.as_ref(), file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "gateway.endpoint",
        &config.gateway.endpoint,
        source("gateway.endpoint", &["STOREFRONT_GATEWAY_ENDPOINT", "GATEWAY_ENDPOINT"]),
    ));

    lines.push(render_line(
        "llm.api_key",
        &redact_token(config.llm.api_key.expose_secret()),
        source("llm.api_key", &["STOREFRONT_LLM_API_KEY"]),
    ));
    lines.push(render_line(
        "llm.base_url",
        &config.llm_base_url(),
        source("llm.base_url", &["STOREFRONT_LLM_BASE_URL"]),
    ));
    lines.push(render_line(
        "llm.model",
        &config.llm.model,
        source("llm.model", &["STOREFRONT_LLM_MODEL"]),
    ));
    lines.push(render_line(
        "llm.timeout_secs",
        &config.llm.timeout_secs.to_string(),
        source("llm.timeout_secs", &["STOREFRONT_LLM_TIMEOUT_SECS"]),
    ));

    lines.push(render_line(
        "catalogue.url",
        &config.catalogue_url(),
        source("catalogue.url", &["STOREFRONT_CATALOGUE_URL"]),
    ));
    lines.push(render_line(
        "catalogue.timeout_secs",
        &config.catalogue.timeout_secs.to_string(),
        source("catalogue.timeout_secs", &["STOREFRONT_CATALOGUE_TIMEOUT_SECS"]),
    ));

    lines.push(render_line("agent.name", &config.agent.name, source("agent.name", &[])));
    lines.push(render_line(
        "agent.max_tool_rounds",
        &config.agent.max_tool_rounds.to_string(),
        source("agent.max_tool_rounds", &["STOREFRONT_AGENT_MAX_TOOL_ROUNDS"]),
    ));

    lines.push(render_line(
        "server.bind_address",
        &config.server.bind_address,
        source("server.bind_address", &["STOREFRONT_SERVER_BIND_ADDRESS"]),
    ));
    lines.push(render_line(
        "server.port",
        &config.server.port.to_string(),
        source("server.port", &["STOREFRONT_SERVER_PORT", "PORT"]),
    ));

    lines.push(render_line(
        "telemetry.service_name",
        &config.telemetry.service_name,
        source(
            "telemetry.service_name",
            &["STOREFRONT_TELEMETRY_SERVICE_NAME", "OTEL_SERVICE_NAME"],
        ),
    ));
    lines.push(render_line(
        "telemetry.otlp_endpoint",
        &config.telemetry.otlp_endpoint,
        source(
            "telemetry.otlp_endpoint",
            &["STOREFRONT_TELEMETRY_OTLP_ENDPOINT", "OTEL_EXPORTER_OTLP_ENDPOINT"],
        ),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", &["STOREFRONT_LOGGING_LEVEL", "STOREFRONT_LOG_LEVEL"]),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", &["STOREFRONT_LOGGING_FORMAT", "STOREFRONT_LOG_FORMAT"]),
    ));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("storefront.toml"), PathBuf::from("config/storefront.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
