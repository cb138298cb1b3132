//! `fasim init-db` and `fasim migrate`.

use anyhow::{Context, Result};
use fasim_core::db::migrations;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tracing::info;

use super::Globals;
use crate::output::{CliError, pretty_kv, pretty_section, render_mode};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StoreReport {
    database: String,
    created: bool,
    previous_version: u32,
    schema_version: u32,
}

/// Create the database if needed and bring it to the latest schema.
///
/// # Errors
///
/// Returns an error if the database cannot be created or migrated.
pub fn run_init_db(globals: &Globals, project_root: &Path) -> Result<()> {
    let config = globals.config(project_root)?;
    let path = config.store.database_path.clone();
    let created = !path.exists();

    let conn = fasim_core::db::open_store(&config.store)?;
    let version = migrations::current_schema_version(&conn)?;
    info!(path = %path.display(), created, schema_version = version, "database initialized");

    report(
        globals,
        &StoreReport {
            database: path.display().to_string(),
            created,
            previous_version: 0,
            schema_version: version,
        },
    )
}

/// Apply pending migrations to an existing database.
///
/// # Errors
///
/// Returns an error if the database does not exist or a migration fails.
pub fn run_migrate(globals: &Globals, project_root: &Path) -> Result<()> {
    let config = globals.config(project_root)?;
    let path = config.store.database_path.clone();
    if !path.exists() {
        return Err(CliError::with_details(
            format!("database {} does not exist", path.display()),
            "run `fasim init-db` first",
            "E3001",
        )
        .into());
    }

    let previous = {
        let conn = rusqlite::Connection::open(&path)
            .with_context(|| format!("open database {}", path.display()))?;
        migrations::current_schema_version(&conn)?
    };
    let conn = fasim_core::db::open_store(&config.store)?;
    let version = migrations::current_schema_version(&conn)?;
    info!(path = %path.display(), from = previous, to = version, "database migrated");

    report(
        globals,
        &StoreReport {
            database: path.display().to_string(),
            created: false,
            previous_version: previous,
            schema_version: version,
        },
    )
}

fn report(globals: &Globals, report: &StoreReport) -> Result<()> {
    render_mode(
        globals.output,
        report,
        |r, w| {
            writeln!(
                w,
                "{}\tcreated={}\tschema={}",
                r.database, r.created, r.schema_version
            )
        },
        |r, w| {
            pretty_section(w, "Store")?;
            pretty_kv(w, "database", &r.database)?;
            pretty_kv(w, "created", r.created.to_string())?;
            pretty_kv(
                w,
                "schema",
                format!("v{} (was v{})", r.schema_version, r.previous_version),
            )
        },
    )
}
