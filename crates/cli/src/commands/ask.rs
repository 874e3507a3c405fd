use crate::commands::{CommandResult, ErrorClass};
use storefront_agent::Orchestrator;
use storefront_core::config::{AppConfig, LoadOptions};
use storefront_core::{normalize, ConversationInput};

const COMMAND: &str = "ask";

pub fn run(prompt: &str) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                ErrorClass::ConfigValidation,
                &format!("configuration issue: {error}"),
            );
        }
    };

    let input = match ConversationInput::prompt(prompt) {
        Ok(input) => input,
        Err(error) => {
            return CommandResult::failure(COMMAND, ErrorClass::InvalidInput, &error.to_string())
        }
    };

    let orchestrator = match Orchestrator::from_config(&config) {
        Ok(orchestrator) => orchestrator,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                ErrorClass::AgentInit,
                &format!("failed to initialize agent: {error}"),
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                ErrorClass::RuntimeInit,
                &format!("failed to initialize async runtime: {error}"),
            );
        }
    };

    let transcript = normalize(&input);
    match runtime.block_on(orchestrator.run(&transcript)) {
        Ok(answer) => CommandResult::success(COMMAND, &answer),
        Err(kind) => {
            let interface = kind.into_interface("cli");
            CommandResult::failure(COMMAND, ErrorClass::from(kind), interface.user_message())
        }
    }
}
