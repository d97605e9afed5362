pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "flowgate",
    about = "Flowgate operator CLI",
    long_about = "Operate the flow endpoint: migrations, readiness checks, config inspection, flow definitions and slot previews.",
    after_help = "Examples:\n  flowgate doctor --json\n  flowgate definition import --tenant acme --flow onboarding --screens screens.json --navigation navigate.json\n  flowgate slots --tenant acme --flow onboarding --at 2026-03-02T06:00:00Z"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, the flow private key, and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(subcommand, about = "Import or inspect stored flow definitions")]
    Definition(DefinitionCommand),
    #[command(about = "Preview the appointment slots a flow would offer at a given instant")]
    Slots {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        flow: String,
        #[arg(long, help = "Screen id; defaults to the flow's appointment screen")]
        screen: Option<String>,
        #[arg(long, help = "RFC 3339 instant to evaluate at; defaults to now")]
        at: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum DefinitionCommand {
    #[command(about = "Validate and store a flow's screen graph and navigation documents")]
    Import {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        flow: String,
        #[arg(long, help = "Path to the screen graph JSON document")]
        screens: PathBuf,
        #[arg(long, help = "Path to the navigation JSON document")]
        navigation: PathBuf,
        #[arg(long, default_value = "")]
        description: String,
    },
    #[command(about = "Print the stored flow graph outline")]
    Show {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        flow: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Definition(DefinitionCommand::Import {
            tenant,
            flow,
            screens,
            navigation,
            description,
        }) => commands::definition::import(commands::definition::ImportRequest {
            tenant_id: tenant,
            flow_id: flow,
            screens_path: screens,
            navigation_path: navigation,
            description,
        }),
        Command::Definition(DefinitionCommand::Show { tenant, flow }) => {
            commands::definition::show(&tenant, &flow)
        }
        Command::Slots { tenant, flow, screen, at } => {
            commands::slots::run(&tenant, &flow, screen.as_deref(), at.as_deref())
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
