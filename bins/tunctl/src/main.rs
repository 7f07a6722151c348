//! tunctl command - bring a TUN device up from an INI file.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tunctl", version, about = "TUN device lifecycle tool")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a config file and print the effective configuration.
    Check(commands::check::CheckCmd),

    /// Bring the device up and count packets until Ctrl-C.
    Up(commands::up::UpCmd),

    /// Drive the device lifecycle interactively.
    #[command(visible_alias = "sh")]
    Shell(commands::shell::ShellCmd),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    let result = match cli.command {
        Command::Check(cmd) => cmd.run(),
        Command::Up(cmd) => cmd.run().await,
        Command::Shell(cmd) => cmd.run().await,
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
