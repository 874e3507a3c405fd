use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_INSTRUCTIONS: &str = "あなたは、ゴリラストアの顧客の手伝いをするアシスタントです。取り扱っている商品についてユーザーの質問に答えてください。扱っていない商品について問い合わせがあった場合は、類似な商品を例に出して回答を作成してください。";

pub const DEFAULT_FALLBACK_MESSAGE: &str =
    "適切な回答が「ゴリラエージェント」から得られませんでした。";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub gateway: GatewayConfig,
    pub llm: LlmConfig,
    pub catalogue: ToolConnectorConfig,
    pub agent: AgentConfig,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub logging: LoggingConfig,
}

/// Upstream gateway that fronts both the model backend and the tool services.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub endpoint: String,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    /// Passed through to the backend as-is; the gateway injects the real credential.
    pub api_key: SecretString,
    /// Falls back to `{gateway.endpoint}/v1` when unset.
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ToolConnectorConfig {
    pub name: String,
    /// Falls back to `{gateway.endpoint}/mcp/catalogue` when unset.
    pub url: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub name: String,
    pub instructions: String,
    pub fallback_message: String,
    pub max_tool_rounds: u32,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub otlp_endpoint: String,
    pub traces: bool,
    pub metrics: bool,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub gateway_endpoint: Option<String>,
    pub llm_model: Option<String>,
    pub llm_base_url: Option<String>,
    pub catalogue_url: Option<String>,
    pub server_port: Option<u16>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig { endpoint: "http://localhost:8000".to_string() },
            llm: LlmConfig {
                api_key: secret_value("set-api-key-via-kong-gateway".to_string()),
                base_url: None,
                model: "gpt-4o-mini".to_string(),
                timeout_secs: 120,
            },
            catalogue: ToolConnectorConfig {
                name: "catalogue".to_string(),
                url: None,
                timeout_secs: 30,
            },
            agent: AgentConfig {
                name: "gorilla-store-agent".to_string(),
                instructions: DEFAULT_INSTRUCTIONS.to_string(),
                fallback_message: DEFAULT_FALLBACK_MESSAGE.to_string(),
                max_tool_rounds: 8,
            },
            server: ServerConfig {
                bind_address: "0.0.0.0".to_string(),
                port: 3004,
                graceful_shutdown_secs: 15,
            },
            telemetry: TelemetryConfig {
                service_name: "volcano-sandbox".to_string(),
                otlp_endpoint: "http://localhost:4318".to_string(),
                traces: true,
                metrics: true,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("storefront.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Chat-completions base URL, derived from the gateway unless set explicitly.
    pub fn llm_base_url(&self) -> String {
        match &self.llm.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("{}/v1", self.gateway_base()),
        }
    }

    /// Catalogue MCP endpoint, derived from the gateway unless set explicitly.
    pub fn catalogue_url(&self) -> String {
        match &self.catalogue.url {
            Some(url) => url.clone(),
            None => format!("{}/mcp/catalogue", self.gateway_base()),
        }
    }

    fn gateway_base(&self) -> &str {
        self.gateway.endpoint.trim_end_matches('/')
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(gateway) = patch.gateway {
            if let Some(endpoint) = gateway.endpoint {
                self.gateway.endpoint = endpoint;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = secret_value(llm_api_key_value);
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(catalogue) = patch.catalogue {
            if let Some(name) = catalogue.name {
                self.catalogue.name = name;
            }
            if let Some(url) = catalogue.url {
                self.catalogue.url = Some(url);
            }
            if let Some(timeout_secs) = catalogue.timeout_secs {
                self.catalogue.timeout_secs = timeout_secs;
            }
        }

        if let Some(agent) = patch.agent {
            if let Some(name) = agent.name {
                self.agent.name = name;
            }
            if let Some(instructions) = agent.instructions {
                self.agent.instructions = instructions;
            }
            if let Some(fallback_message) = agent.fallback_message {
                self.agent.fallback_message = fallback_message;
            }
            if let Some(max_tool_rounds) = agent.max_tool_rounds {
                self.agent.max_tool_rounds = max_tool_rounds;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(telemetry) = patch.telemetry {
            if let Some(service_name) = telemetry.service_name {
                self.telemetry.service_name = service_name;
            }
            if let Some(otlp_endpoint) = telemetry.otlp_endpoint {
                self.telemetry.otlp_endpoint = otlp_endpoint;
            }
            if let Some(traces) = telemetry.traces {
                self.telemetry.traces = traces;
            }
            if let Some(metrics) = telemetry.metrics {
                self.telemetry.metrics = metrics;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        let gateway =
            read_env("STOREFRONT_GATEWAY_ENDPOINT").or_else(|| read_env("GATEWAY_ENDPOINT"));
        if let Some(value) = gateway {
            self.gateway.endpoint = value;
        }

        if let Some(value) = read_env("STOREFRONT_LLM_API_KEY") {
            self.llm.api_key = secret_value(value);
        }
        if let Some(value) = read_env("STOREFRONT_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("STOREFRONT_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("STOREFRONT_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("STOREFRONT_LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("STOREFRONT_CATALOGUE_URL") {
            self.catalogue.url = Some(value);
        }
        if let Some(value) = read_env("STOREFRONT_CATALOGUE_TIMEOUT_SECS") {
            self.catalogue.timeout_secs = parse_u64("STOREFRONT_CATALOGUE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("STOREFRONT_AGENT_MAX_TOOL_ROUNDS") {
            self.agent.max_tool_rounds = parse_u32("STOREFRONT_AGENT_MAX_TOOL_ROUNDS", &value)?;
        }

        if let Some(value) = read_env("STOREFRONT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("STOREFRONT_SERVER_PORT") {
            self.server.port = parse_u16("STOREFRONT_SERVER_PORT", &value)?;
        } else if let Some(value) = read_env("PORT") {
            self.server.port = parse_u16("PORT", &value)?;
        }
        if let Some(value) = read_env("STOREFRONT_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("STOREFRONT_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let service_name = read_env("STOREFRONT_TELEMETRY_SERVICE_NAME")
            .or_else(|| read_env("OTEL_SERVICE_NAME"));
        if let Some(value) = service_name {
            self.telemetry.service_name = value;
        }
        let otlp_endpoint = read_env("STOREFRONT_TELEMETRY_OTLP_ENDPOINT")
            .or_else(|| read_env("OTEL_EXPORTER_OTLP_ENDPOINT"));
        if let Some(value) = otlp_endpoint {
            self.telemetry.otlp_endpoint = value;
        }

        let log_level =
            read_env("STOREFRONT_LOGGING_LEVEL").or_else(|| read_env("STOREFRONT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("STOREFRONT_LOGGING_FORMAT").or_else(|| read_env("STOREFRONT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(gateway_endpoint) = overrides.gateway_endpoint {
            self.gateway.endpoint = gateway_endpoint;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_base_url) = overrides.llm_base_url {
            self.llm.base_url = Some(llm_base_url);
        }
        if let Some(catalogue_url) = overrides.catalogue_url {
            self.catalogue.url = Some(catalogue_url);
        }
        if let Some(server_port) = overrides.server_port {
            self.server.port = server_port;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_gateway(&self.gateway)?;
        validate_llm(&self.llm)?;
        validate_catalogue(&self.catalogue)?;
        validate_agent(&self.agent)?;
        validate_server(&self.server)?;
        validate_telemetry(&self.telemetry)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("storefront.toml"), PathBuf::from("config/storefront.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn is_http_url(value: &str) -> bool {
    let value = value.trim();
    value.starts_with("http://") || value.starts_with("https://")
}

fn validate_gateway(gateway: &GatewayConfig) -> Result<(), ConfigError> {
    if !is_http_url(&gateway.endpoint) {
        return Err(ConfigError::Validation(
            "gateway.endpoint must start with http:// or https://".to_string(),
        ));
    }
    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    if let Some(base_url) = &llm.base_url {
        if !is_http_url(base_url) {
            return Err(ConfigError::Validation(
                "llm.base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    if llm.timeout_secs == 0 || llm.timeout_secs > 600 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=600".to_string(),
        ));
    }

    Ok(())
}

fn validate_catalogue(catalogue: &ToolConnectorConfig) -> Result<(), ConfigError> {
    if catalogue.name.trim().is_empty() {
        return Err(ConfigError::Validation("catalogue.name must not be empty".to_string()));
    }

    if let Some(url) = &catalogue.url {
        if !is_http_url(url) {
            return Err(ConfigError::Validation(
                "catalogue.url must start with http:// or https://".to_string(),
            ));
        }
    }

    if catalogue.timeout_secs == 0 || catalogue.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "catalogue.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_agent(agent: &AgentConfig) -> Result<(), ConfigError> {
    if agent.name.trim().is_empty() {
        return Err(ConfigError::Validation("agent.name must not be empty".to_string()));
    }
    if agent.instructions.trim().is_empty() {
        return Err(ConfigError::Validation("agent.instructions must not be empty".to_string()));
    }
    if agent.fallback_message.trim().is_empty() {
        return Err(ConfigError::Validation(
            "agent.fallback_message must not be empty".to_string(),
        ));
    }
    if agent.max_tool_rounds == 0 || agent.max_tool_rounds > 64 {
        return Err(ConfigError::Validation(
            "agent.max_tool_rounds must be in range 1..=64".to_string(),
        ));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_telemetry(telemetry: &TelemetryConfig) -> Result<(), ConfigError> {
    if telemetry.service_name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "telemetry.service_name must not be empty".to_string(),
        ));
    }
    if !is_http_url(&telemetry.otlp_endpoint) {
        return Err(ConfigError::Validation(
            "telemetry.otlp_endpoint must start with http:// or https://".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    gateway: Option<GatewayPatch>,
    llm: Option<LlmPatch>,
    catalogue: Option<CataloguePatch>,
    agent: Option<AgentPatch>,
    server: Option<ServerPatch>,
    telemetry: Option<TelemetryPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct GatewayPatch {
    endpoint: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CataloguePatch {
    name: Option<String>,
    url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentPatch {
    name: Option<String>,
    instructions: Option<String>,
    fallback_message: Option<String>,
    max_tool_rounds: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct TelemetryPatch {
    service_name: Option<String>,
    otlp_endpoint: Option<String>,
    traces: Option<bool>,
    metrics: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

/// Every environment variable `AppConfig::load` consults.
pub const ENV_KEYS: &[&str] = &[
    "STOREFRONT_GATEWAY_ENDPOINT",
    "GATEWAY_ENDPOINT",
    "STOREFRONT_LLM_API_KEY",
    "STOREFRONT_LLM_BASE_URL",
    "STOREFRONT_LLM_MODEL",
    "STOREFRONT_LLM_TIMEOUT_SECS",
    "STOREFRONT_CATALOGUE_URL",
    "STOREFRONT_CATALOGUE_TIMEOUT_SECS",
    "STOREFRONT_AGENT_MAX_TOOL_ROUNDS",
    "STOREFRONT_SERVER_BIND_ADDRESS",
    "STOREFRONT_SERVER_PORT",
    "PORT",
    "STOREFRONT_SERVER_GRACEFUL_SHUTDOWN_SECS",
    "STOREFRONT_TELEMETRY_SERVICE_NAME",
    "OTEL_SERVICE_NAME",
    "STOREFRONT_TELEMETRY_OTLP_ENDPOINT",
    "OTEL_EXPORTER_OTLP_ENDPOINT",
    "STOREFRONT_LOGGING_LEVEL",
    "STOREFRONT_LOG_LEVEL",
    "STOREFRONT_LOGGING_FORMAT",
    "STOREFRONT_LOG_FORMAT",
];
