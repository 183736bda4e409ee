//! Config subcommand handlers.

use std::io::{self, IsTerminal};
use std::path::Path;

use secrecy::SecretString;
use serverboard_config::{self as config, ConfigError, SecretKind};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, SecretArg};
use crate::error::CliError;
use crate::output;

impl From<SecretArg> for SecretKind {
    fn from(arg: SecretArg) -> Self {
        match arg {
            SecretArg::DiscordToken => Self::DiscordToken,
            SecretArg::SteamApiKey => Self::SteamApiKey,
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, path: &Path, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&path.display().to_string(), false);
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = config::load_config(path)?.redacted();
            let out = output::render_single(global.output, &cfg, |c| {
                toml::to_string_pretty(c).map_err(|e| CliError::from(ConfigError::from(e)))
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Init: write the template ────────────────────────────────
        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }
            config::write_template(path)?;
            if !global.quiet {
                eprintln!("✓ Configuration written to {}", path.display());
                eprintln!("  Set discord.channel_id, then store the secrets:");
                eprintln!("  serverboard config set-secret discord-token");
                eprintln!("  serverboard config set-secret steam-api-key");
            }
            Ok(())
        }

        // ── Set secret (keyring) ────────────────────────────────────
        ConfigCommand::SetSecret { secret } => {
            let kind = SecretKind::from(secret);
            if io::stdin().is_terminal() {
                eprint!("{}: ", kind.label());
            }

            let mut line = String::new();
            io::stdin().read_line(&mut line)?;
            let value = line.trim();
            if value.is_empty() {
                return Err(CliError::Validation {
                    field: kind.label().into(),
                    reason: "cannot be empty".into(),
                });
            }

            config::store_secret(kind, &SecretString::from(value.to_owned()))?;
            if !global.quiet {
                eprintln!("✓ Stored {} in the system keyring", kind.label());
            }
            Ok(())
        }
    }
}
