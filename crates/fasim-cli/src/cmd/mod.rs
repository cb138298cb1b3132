//! Command handlers. Each handler opens what it needs through [`Session`]
//! and renders through [`crate::output`].

pub mod db;
pub mod facility;
pub mod item;
pub mod pipeline;

use anyhow::Result;
use fasim_core::config::{FasimConfig, resolve_config};
use fasim_core::{Repositories, RequestContext};
use rusqlite::Connection;
use std::path::{Path, PathBuf};

use crate::output::OutputMode;

/// Flags shared by every command.
#[derive(Debug, Clone)]
pub struct Globals {
    pub db: Option<PathBuf>,
    pub timeout_ms: Option<u64>,
    pub output: OutputMode,
}

impl Globals {
    /// Layer config files, environment and flags for `project_root`.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file is malformed.
    pub fn config(&self, project_root: &Path) -> Result<FasimConfig> {
        resolve_config(project_root, self.db.as_deref())
    }
}

/// An open store plus the request context for one command.
pub struct Session {
    pub conn: Connection,
    pub ctx: RequestContext,
    pub output: OutputMode,
}

impl Session {
    /// Resolve config and open (creating and migrating if needed) the store.
    ///
    /// # Errors
    ///
    /// Returns an error if config loading or opening the store fails.
    pub fn open(globals: &Globals, project_root: &Path) -> Result<Self> {
        let config = globals.config(project_root)?;
        let conn = fasim_core::db::open_store(&config.store)?;
        let timeout_ms = globals.timeout_ms.or(config.request.timeout_ms);
        Ok(Self {
            conn,
            ctx: RequestContext::from_timeout_ms(timeout_ms),
            output: globals.output,
        })
    }

    pub fn repos(&self) -> Repositories<'_> {
        Repositories::sqlite(&self.conn)
    }
}

/// Render an optional description the same way everywhere.
pub(crate) fn or_dash(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}
