use std::process::ExitCode;

use clap::Parser;
use shardcheck_manifest::Role;

use crate::cli::{App, Commands};
use crate::config::RunConfig;

mod cli;
mod commands;
mod config;
mod logging;

/// Exit code for failures before any round ran.
const SETUP_FAILURE: u8 = 2;

fn main() -> ExitCode {
    let app = App::parse();

    let run = match &app.cmd {
        Commands::Produce(args) | Commands::Consume(args) => {
            let config = RunConfig::load_or_default(args.config.as_deref()).and_then(|mut config| {
                args.apply(&mut config);
                config.validate()?;
                Ok(config)
            });
            Some(config)
        }
        Commands::Verify(_) => None,
    };

    let level = app
        .log_level
        .clone()
        .or_else(|| run.as_ref().and_then(|c| c.as_ref().ok()).map(|c| c.log_level.clone()))
        .unwrap_or_else(|| "info".to_string());
    if let Err(error) = logging::init(&level) {
        eprintln!("{error:#}");
        return ExitCode::from(SETUP_FAILURE);
    }

    let result = match (app.cmd, run) {
        (Commands::Produce(_), Some(config)) => {
            config.and_then(|config| commands::run_role(Role::Producer, config))
        }
        (Commands::Consume(_), Some(config)) => {
            config.and_then(|config| commands::run_role(Role::Consumer, config))
        }
        (Commands::Verify(args), _) => commands::verify(&args),
        (_, None) => Err(anyhow::anyhow!("run command without configuration")),
    };

    match result {
        Ok(outcome) => {
            tracing::info!(%outcome, code = outcome.exit_code(), "done");
            ExitCode::from(outcome.exit_code() as u8)
        }
        Err(error) => {
            tracing::error!("{error:#}");
            ExitCode::from(SETUP_FAILURE)
        }
    }
}
