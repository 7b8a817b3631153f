mod backend;
mod cli;
mod config;
mod envs;
mod error;
mod paths;
mod prompt;
mod store;

use crate::backend::PythonBackend;
use crate::cli::args::{Cli, Commands, SetupCommand};
use crate::config::{Config, ForbiddenNames};
use crate::envs::EnvVars;
use crate::error::SnapeError;
use crate::prompt::TerminalPrompt;
use anstream::eprintln;
use anyhow::Result;
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn init_tracing(quiet: bool, verbose: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "warn",
        (false, true) => "debug",
        (false, false) => "info",
    };
    let filter =
        EnvFilter::try_from_env(EnvVars::SNAPE_LOG).unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .with_level(verbose)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let mut forbidden = ForbiddenNames::seeded();
    forbidden.extend_from_command(Cli::command());
    let config = Config::from_env(cli.shell, forbidden)?;
    debug!("Enabled shell: {}", config.shell);

    // The root is created by `setup init`, everything else needs it
    if !cli.command.allows_missing_root() {
        config.ensure_root()?;
    }
    debug!("{:?}", cli.command);

    let backend = PythonBackend::new(config.python.clone());
    let prompt = TerminalPrompt;

    match cli.command {
        Commands::New(args) => cli::env::new(args, &config, &backend, &prompt).await,
        Commands::Delete(args) => cli::env::delete(args, &config, &backend, &prompt),
        Commands::Attach(args) => cli::copy::attach(args, &config, &backend, &prompt).await,
        Commands::Detach(args) => cli::copy::detach(args, &config, &backend, &prompt).await,
        Commands::Status(args) => cli::env::status(args, &config),
        Commands::Env(args) => cli::env::env_info(args, &config, &backend).await,
        Commands::Clean(args) => cli::env::clean(args, &config, &prompt),
        Commands::Setup(args) => match args.command {
            Some(SetupCommand::Init) => cli::setup::init(&config),
            Some(SetupCommand::Remove(args)) => cli::setup::remove(args, &config, &prompt),
            None => {
                let mut command = Cli::command();
                if let Some(setup) = command.find_subcommand_mut("setup") {
                    setup.print_help()?;
                }
                Ok(())
            }
        },
        Commands::Exec(args) => cli::exec::exec(args, &config).await,
        Commands::Help => {
            Cli::command().print_long_help()?;
            Ok(())
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // declining a confirmation is a valid outcome, not a failure
            if err
                .downcast_ref::<SnapeError>()
                .is_some_and(SnapeError::is_cancelled)
            {
                return ExitCode::SUCCESS;
            }
            debug!("{err:?}");
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}
