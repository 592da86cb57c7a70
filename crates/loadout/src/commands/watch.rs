//! `watch`: follow bound client resources until interrupted.

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use loadout_core::{
    ChampionMasteries, ChampionMastery, CurrentSummoner, Gameflow, GameflowPhase, QueryStatus,
    Resource, Session, Summoner,
};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs, WatchResource};
use crate::error::CliError;
use crate::output;

const ALL: [WatchResource; 3] = [
    WatchResource::Summoner,
    WatchResource::Mastery,
    WatchResource::Gameflow,
];

// ── Watchable resources ─────────────────────────────────────────────

/// A bound resource the CLI knows how to print.
trait Watched: Resource<Data: Serialize> {
    const LABEL: &'static str;

    fn describe(data: &Self::Data) -> String;
}

impl Watched for CurrentSummoner {
    const LABEL: &'static str = "summoner";

    fn describe(data: &Summoner) -> String {
        format!("{} (level {})", data.riot_id(), data.summoner_level)
    }
}

impl Watched for ChampionMasteries {
    const LABEL: &'static str = "mastery";

    fn describe(data: &Vec<ChampionMastery>) -> String {
        let points: u64 = data.iter().map(|m| m.champion_points).sum();
        let top = data
            .iter()
            .max_by_key(|m| m.champion_points)
            .map(|m| format!(", top champion {}", m.champion_id))
            .unwrap_or_default();
        format!("{} champions, {points} points{top}", data.len())
    }
}

impl Watched for Gameflow {
    const LABEL: &'static str = "gameflow";

    fn describe(data: &GameflowPhase) -> String {
        data.to_string()
    }
}

// ── Rendering ───────────────────────────────────────────────────────

#[derive(Serialize)]
struct WatchLine<'a, T> {
    resource: &'static str,
    data: Option<&'a T>,
}

fn render_line<R: Watched>(format: OutputFormat, data: Option<&R::Data>) -> Result<String, CliError> {
    Ok(match format {
        // Streamed output stays one document per line.
        OutputFormat::Json | OutputFormat::JsonCompact => serde_json::to_string(&WatchLine {
            resource: R::LABEL,
            data,
        })?,
        OutputFormat::Table => {
            let stamp = chrono::Local::now().format("%H:%M:%S");
            let text = data.map_or_else(|| "none".into(), R::describe);
            format!("[{stamp}] {:<9} {text}", R::LABEL)
        }
        OutputFormat::Plain => format!(
            "{}\t{}",
            R::LABEL,
            data.map_or_else(|| "none".into(), R::describe)
        ),
    })
}

/// Bind `R` and spawn a task printing every distinct value it takes.
async fn spawn_watch<R: Watched>(
    session: &Session,
    global: &GlobalOpts,
) -> Result<JoinHandle<()>, CliError> {
    let binding = session.bind::<R>().await?;
    let mut stream = binding.subscribe();
    let format = global.output;
    let quiet = global.quiet;

    Ok(tokio::spawn(async move {
        // First read goes through the host; the stream reports the result.
        binding.get().await;

        let mut last: Option<Option<R::Data>> = None;
        while let Some(snapshot) = stream.changed().await {
            let data = match snapshot {
                Some(entry) if entry.status == QueryStatus::Loading => continue,
                Some(entry) => {
                    if let Some(error) = &entry.error {
                        warn!(resource = R::NAME, %error, "refresh failed");
                    }
                    entry.data.as_deref().cloned()
                }
                None => None,
            };
            if last.as_ref() == Some(&data) {
                continue;
            }
            match render_line::<R>(format, data.as_ref()) {
                Ok(line) => output::print_output(&line, quiet),
                Err(e) => warn!(resource = R::NAME, error = %e, "could not render update"),
            }
            last = Some(data);
        }
    }))
}

// ── Handler ─────────────────────────────────────────────────────────

/// Load the catalog and replay stored selections. Failures are logged:
/// watching still works without them.
async fn warm_start(session: &Session) {
    match session.load_catalog().await {
        Ok(load) => info!(version = %load.catalog.version, origin = %load.origin, "catalog ready"),
        Err(e) => {
            warn!(error = %e, "catalog unavailable, skipping selection replay");
            return;
        }
    }
    match session.replay_selections().await {
        Ok(Some(report)) => info!(
            applied = report.applied.len(),
            failed = report.failed.len(),
            unknown = report.unknown.len(),
            "replayed stored selections"
        ),
        Ok(None) => {}
        Err(e) => warn!(error = %e, "selection replay failed"),
    }
}

pub async fn handle(session: &Session, args: &WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    session.start().await?;
    if !args.no_replay {
        warm_start(session).await;
    }

    let mut resources: Vec<WatchResource> = Vec::new();
    for resource in if args.resource.is_empty() { &ALL[..] } else { &args.resource[..] } {
        if !resources.contains(resource) {
            resources.push(*resource);
        }
    }

    let mut tasks = Vec::with_capacity(resources.len());
    for resource in resources {
        let task = match resource {
            WatchResource::Summoner => spawn_watch::<CurrentSummoner>(session, global).await?,
            WatchResource::Mastery => spawn_watch::<ChampionMasteries>(session, global).await?,
            WatchResource::Gameflow => spawn_watch::<Gameflow>(session, global).await?,
        };
        tasks.push(task);
    }

    tokio::signal::ctrl_c().await?;
    info!("interrupted, stopping watchers");
    for task in &tasks {
        task.abort();
    }
    Ok(())
}
