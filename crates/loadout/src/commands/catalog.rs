//! Catalog cache command handlers.

use serde::Serialize;
use tracing::warn;

use loadout_core::Session;

use crate::cli::{CatalogArgs, CatalogCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct CatalogStatus {
    path: String,
    stored_version: Option<String>,
    stored_at: Option<String>,
    champions: usize,
    remote_version: Option<String>,
    up_to_date: Option<bool>,
}

fn status_detail(status: &CatalogStatus, color: bool) -> String {
    let freshness = match status.up_to_date {
        Some(true) => output::status_label("up to date", true, color),
        Some(false) => output::status_label("outdated", false, color),
        None => output::status_label("unknown (content API unreachable)", false, color),
    };
    output::detail(&[
        ("path", status.path.clone()),
        (
            "stored",
            status.stored_version.clone().unwrap_or_else(|| "none".into()),
        ),
        (
            "stored at",
            status.stored_at.clone().unwrap_or_else(|| "-".into()),
        ),
        ("champions", status.champions.to_string()),
        (
            "remote",
            status.remote_version.clone().unwrap_or_else(|| "-".into()),
        ),
        ("status", freshness),
    ])
}

pub async fn handle(session: &Session, args: &CatalogArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let color = output::should_color(global.color);
    match args.command {
        CatalogCommand::Status => {
            let stored = session.catalog_cache().get().await;
            let remote_version = match session.remote_catalog_version().await {
                Ok(version) => Some(version),
                Err(e) => {
                    warn!(error = %e, "could not reach content API");
                    None
                }
            };
            let up_to_date = remote_version
                .as_ref()
                .map(|remote| stored.as_ref().is_some_and(|s| &s.version == remote));

            let status = CatalogStatus {
                path: session.catalog_cache().path().display().to_string(),
                stored_version: stored.as_ref().map(|s| s.version.clone()),
                stored_at: stored.as_ref().map(|s| s.timestamp.to_rfc3339()),
                champions: stored.as_ref().map_or(0, |s| s.data.len()),
                remote_version,
                up_to_date,
            };
            let out = output::render_single(
                global.output,
                &status,
                |s| status_detail(s, color),
                |s| s.stored_version.clone().unwrap_or_default(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        CatalogCommand::Refresh => {
            let load = session.load_catalog().await?;
            let summary = serde_json::json!({
                "version": load.catalog.version,
                "origin": load.origin.to_string(),
                "champions": load.catalog.len(),
            });
            let out = output::render_single(
                global.output,
                &summary,
                |_| {
                    format!(
                        "catalog {} ({} champions, {})",
                        load.catalog.version,
                        load.catalog.len(),
                        load.origin
                    )
                },
                |_| load.catalog.version.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        CatalogCommand::Clear => {
            session.clear_catalog().await?;
            output::print_output("stored catalog removed", global.quiet);
            Ok(())
        }
    }
}
