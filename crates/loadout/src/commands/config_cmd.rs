//! `config` subcommands. These never build a session.

use std::io::{self, BufRead, IsTerminal};

use loadout_config::{KEYRING_CONTENT_KEY, KEYRING_SERVICE};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::commands::util;
use crate::error::CliError;
use crate::output;

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        // ── Path ────────────────────────────────────────────────────
        ConfigCommand::Path => {
            let path = global
                .config
                .clone()
                .unwrap_or_else(loadout_config::config_path);
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = util::load_config(global)?.redacted();
            let rendered = toml::to_string_pretty(&cfg)?;
            let out = output::render_single(
                global.output,
                &cfg,
                |_| rendered.trim_end().to_owned(),
                |_| "config".into(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── SetKey ──────────────────────────────────────────────────
        ConfigCommand::SetKey => {
            let stdin = io::stdin();
            if stdin.is_terminal() && !global.quiet {
                eprintln!("Paste the content API key and press Enter:");
            }
            let mut line = String::new();
            stdin.lock().read_line(&mut line)?;
            let secret = line.trim();
            if secret.is_empty() {
                return Err(CliError::Validation {
                    field: "content.api_key".into(),
                    reason: "no key given on stdin".into(),
                });
            }

            keyring::Entry::new(KEYRING_SERVICE, KEYRING_CONTENT_KEY)?.set_password(secret)?;
            output::print_output("content API key stored in the system keyring", global.quiet);
            Ok(())
        }
    }
}
