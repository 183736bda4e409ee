mod cli;
mod commands;
mod error;
mod output;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

/// `RUST_LOG` wins, then `-v`/`-q`, then the configured `log_level`.
fn init_tracing(global: &GlobalOpts, configured: Option<&str>) {
    let level = if global.quiet {
        "error"
    } else {
        match global.verbose {
            0 => configured.unwrap_or("warn"),
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn config_file(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(serverboard_config::config_path)
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "serverboard", &mut std::io::stdout());
            Ok(())
        }

        // Config commands must work with a broken or missing file
        Command::Config(args) => {
            init_tracing(&cli.global, None);
            commands::config_cmd::handle(args, &config_file(&cli.global), &cli.global)
        }

        cmd => {
            let path = config_file(&cli.global);
            let config = serverboard_config::load_config(&path)?;
            init_tracing(&cli.global, Some(&config.log_level));

            tracing::debug!(command = ?cmd, path = %path.display(), "dispatching command");
            commands::dispatch(cmd, &config, &cli.global).await
        }
    }
}
