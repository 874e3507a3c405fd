pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "storefront",
    about = "Storefront agent gateway operator CLI",
    long_about = "Inspect configuration, check backend readiness, and ask the catalogue agent from the terminal.",
    after_help = "Examples:\n  storefront doctor --json\n  storefront config\n  storefront ask \"What snacks do you sell?\""
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config and check that the catalogue tool connector answers")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Run one agent invocation for a prompt and print the answer")]
    Ask {
        #[arg(help = "Question for the catalogue agent")]
        prompt: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Ask { prompt } => commands::ask::run(&prompt),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
