pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "roombook",
    about = "Roombook operator CLI",
    long_about = "Prepare the meeting room database, inspect configuration, and check runtime readiness.",
    after_help = "Examples:\n  roombook migrate\n  roombook seed\n  roombook doctor --json\n  roombook sweep-sessions"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a roombook.toml config file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Insert the sample room catalog into an empty database")]
    Seed,
    #[command(about = "List every room with its effective status")]
    Rooms,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, DB connectivity, schema, and room catalog readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Remove booking dialogs older than the configured expiry")]
    SweepSessions,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(config_path),
        Command::Seed => commands::seed::run(config_path),
        Command::Rooms => commands::rooms::run(config_path),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run(config_path) }
        }
        Command::Doctor { json } => commands::doctor::run(config_path, json),
        Command::SweepSessions => commands::sweep::run(config_path),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
