//! Application update handlers.

use loadout_core::{Session, UpdateStatus};

use crate::cli::{GlobalOpts, UpdateArgs, UpdateCommand};
use crate::error::CliError;
use crate::output;

pub async fn handle(session: &Session, args: &UpdateArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        UpdateCommand::Check => {
            session.check_for_update().await?;
            let state = session.update_state();
            let color = output::should_color(global.color);

            let out = output::render_single(
                global.output,
                &state,
                |s| {
                    let verdict = match s.status {
                        UpdateStatus::Available => output::status_label("update available", false, color),
                        _ => output::status_label("up to date", true, color),
                    };
                    output::detail(&[
                        ("current", s.current_version.clone()),
                        ("latest", s.latest_version.clone().unwrap_or_else(|| "-".into())),
                        ("status", verdict),
                    ])
                },
                |s| s.status.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
