mod config;
mod observability;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(version, about = "Relays bearer-authenticated lookups to upstream services")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Start the relay and admin listeners
    Run(ConfigArgs),
    /// Load and validate the config file, then exit
    CheckConfig(ConfigArgs),
}

#[derive(Args)]
struct ConfigArgs {
    #[arg(long, short, default_value = "config.yaml")]
    config: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        CliCommand::Run(args) => run(args),
        CliCommand::CheckConfig(args) => match config::Config::from_file(&args.config) {
            Ok(_) => {
                println!("{}: ok", args.config.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}: {e}", args.config.display());
                ExitCode::FAILURE
            }
        },
    }
}

fn run(args: ConfigArgs) -> ExitCode {
    let config = match config::Config::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {e}", args.config.display());
            return ExitCode::FAILURE;
        }
    };

    // Sentry has to be initialised before the runtime starts.
    let _sentry = match observability::init_logging(config.common.logging.as_ref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("failed to initialise logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = observability::init_metrics(config.common.metrics.as_ref()) {
        tracing::error!(error = %e, "failed to initialise metrics");
        return ExitCode::FAILURE;
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(error = %e, "failed to start tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    rt.block_on(async {
        tokio::select! {
            result = answer_relay::run(config.relay) => match result {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    tracing::error!(error = %e, "relay stopped");
                    ExitCode::FAILURE
                }
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received interrupt, shutting down");
                ExitCode::SUCCESS
            }
        }
    })
}
