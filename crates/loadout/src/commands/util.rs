//! Shared helpers for command handlers.

use loadout_config::Config;
use loadout_core::{Catalog, Champion, Session};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Load config from `--config` or the default location.
pub fn load_config(global: &GlobalOpts) -> Result<Config, CliError> {
    let cfg = match global.config.as_deref() {
        Some(path) => loadout_config::load_config_from(path)?,
        None => loadout_config::load_config()?,
    };
    Ok(cfg)
}

/// Catalog for display purposes: the session's, else the stored copy.
/// Never touches the network.
pub async fn offline_catalog(session: &Session) -> Option<Catalog> {
    if let Some(catalog) = session.catalog() {
        return Some(catalog.as_ref().clone());
    }
    session.catalog_cache().get().await.map(|record| record.data)
}

/// Resolve a champion name or id against the catalog.
pub fn resolve_champion<'a>(catalog: &'a Catalog, query: &str) -> Result<&'a Champion, CliError> {
    catalog
        .resolve_champion(query)
        .ok_or_else(|| CliError::NotFound {
            resource_type: "champion".into(),
            identifier: query.into(),
            list_command: "catalog refresh".into(),
        })
}

/// `Annie` when known, else the raw id.
pub fn champion_label(catalog: Option<&Catalog>, id: i64) -> String {
    catalog
        .and_then(|c| c.champion(id))
        .map_or_else(|| id.to_string(), |c| c.name.clone())
}
