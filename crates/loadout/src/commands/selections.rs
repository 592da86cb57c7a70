//! Skin selection handlers: `select` and `selections *`.

use tabled::Tabled;

use loadout_core::{Catalog, CoreError, SelectionRecord, Session};

use crate::cli::{GlobalOpts, SelectArgs, SelectionsArgs, SelectionsCommand};
use crate::commands::util;
use crate::error::CliError;
use crate::output;

// ── Rows ────────────────────────────────────────────────────────────

#[derive(Tabled)]
struct SelectionRow {
    #[tabled(rename = "Champion")]
    champion: String,
    #[tabled(rename = "Skin")]
    skin: String,
    #[tabled(rename = "Chroma")]
    chroma: String,
    #[tabled(rename = "Updated")]
    updated: String,
}

fn selection_row(record: &SelectionRecord, catalog: Option<&Catalog>) -> SelectionRow {
    let champion = catalog.and_then(|c| c.champion(record.entity_id));
    let skin = champion.and_then(|c| c.skin(record.choice_id));
    let chroma = record.sub_choice_id.map(|id| {
        skin.and_then(|s| s.chromas.iter().find(|ch| ch.id == id))
            .map_or_else(|| id.to_string(), |ch| ch.name.clone())
    });

    SelectionRow {
        champion: util::champion_label(catalog, record.entity_id),
        skin: skin.map_or_else(|| record.choice_id.to_string(), |s| s.name.clone()),
        chroma: chroma.unwrap_or_else(|| "-".into()),
        updated: record
            .timestamp
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M")
            .to_string(),
    }
}

// ── select ──────────────────────────────────────────────────────────

pub async fn select(session: &Session, args: &SelectArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let load = session.load_catalog().await?;
    let champion = util::resolve_champion(&load.catalog, &args.champion)?;

    let skin = champion.skin(args.skin).ok_or_else(|| CliError::NotFound {
        resource_type: format!("{} skin", champion.name),
        identifier: args.skin.to_string(),
        list_command: "catalog status".into(),
    })?;
    if let Some(chroma) = args.chroma {
        if !skin.chromas.iter().any(|c| c.id == chroma) {
            return Err(CliError::NotFound {
                resource_type: format!("{} chroma", skin.name),
                identifier: chroma.to_string(),
                list_command: "catalog status".into(),
            });
        }
    }

    let record = session.select(champion.id, skin.id, args.chroma).await?;
    let out = output::render_single(
        global.output,
        &record,
        |r| {
            let row = selection_row(r, Some(load.catalog.as_ref()));
            format!("{} → {}", row.champion, row.skin)
        },
        |r| r.entity_id.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

// ── selections ──────────────────────────────────────────────────────

pub async fn handle(
    session: &Session,
    args: &SelectionsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        SelectionsCommand::List => {
            let records = session.selections().list().await.map_err(CoreError::from)?;
            let catalog = util::offline_catalog(session).await;
            let out = output::render_list(
                global.output,
                &records,
                |r| selection_row(r, catalog.as_ref()),
                |r| format!("{}:{}", r.entity_id, r.choice_id),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        SelectionsCommand::Clear => {
            session.selections().clear().await.map_err(CoreError::from)?;
            output::print_output("stored selections removed", global.quiet);
            Ok(())
        }

        SelectionsCommand::Replay => {
            session.load_catalog().await?;
            let Some(report) = session.replay_selections().await? else {
                return Ok(());
            };
            let catalog = session.catalog();
            let out = output::render_single(
                global.output,
                &report,
                |s| {
                    let mut lines = vec![format!(
                        "replayed {} of {} selections",
                        s.applied.len(),
                        s.total()
                    )];
                    for (id, err) in &s.failed {
                        lines.push(format!(
                            "  failed  {}: {err}",
                            util::champion_label(catalog.as_deref(), *id)
                        ));
                    }
                    for id in &s.unknown {
                        lines.push(format!("  not in catalog: {id}"));
                    }
                    lines.join("\n")
                },
                |s| {
                    s.applied
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join("\n")
                },
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
