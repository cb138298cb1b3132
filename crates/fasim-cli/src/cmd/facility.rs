//! `fasim facility`: facilities with their input and output lists.

use anyhow::Result;
use clap::Subcommand;
use fasim_core::model::{Facility, FacilityId, Item, ItemId};
use fasim_core::{EntityKind, RepoError};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::{Globals, Session, or_dash};
use crate::output::{Ack, pretty_kv, pretty_section, render_ack, render_mode};
use crate::payload::{FacilityPayload, read_payload};

#[derive(Subcommand, Debug)]
pub enum FacilityCommand {
    /// Create a facility from a JSON payload.
    Create {
        /// Payload file, or `-` for stdin.
        #[arg(long, short = 'f')]
        file: PathBuf,
    },
    /// Show one facility.
    Get {
        id: i64,
    },
    /// List all facilities by id.
    List,
    /// Replace a facility and both of its relation lists.
    Update {
        id: i64,
        /// Payload file, or `-` for stdin.
        #[arg(long, short = 'f')]
        file: PathBuf,
    },
    /// Delete a facility that no pipeline node uses.
    Delete {
        id: i64,
    },
}

/// Execute `fasim facility <command>`.
///
/// # Errors
///
/// Returns an error if the payload is invalid, the store cannot be opened,
/// or the repository call fails.
pub fn run_facility(
    command: &FacilityCommand,
    globals: &Globals,
    project_root: &Path,
) -> Result<()> {
    match command {
        FacilityCommand::Create { file } => {
            let payload: FacilityPayload = read_payload(file)?;
            let session = Session::open(globals, project_root)?;
            let repos = session.repos();
            let mut facility = payload.into_facility(&session.ctx, repos.items.as_ref())?;
            repos.facilities.create(&session.ctx, &mut facility)?;
            render_one(&session, &facility)
        }
        FacilityCommand::Get { id } => {
            let session = Session::open(globals, project_root)?;
            let facility = session
                .repos()
                .facilities
                .get(&session.ctx, FacilityId::new(*id))?
                .ok_or(RepoError::NotFound {
                    entity: EntityKind::Facility,
                    id: *id,
                })?;
            render_one(&session, &facility)
        }
        FacilityCommand::List => {
            let session = Session::open(globals, project_root)?;
            let facilities = session.repos().facilities.list(&session.ctx)?;
            render_mode(session.output, facilities.as_slice(), write_text, write_pretty)
        }
        FacilityCommand::Update { id, file } => {
            let payload: FacilityPayload = read_payload(file)?;
            let session = Session::open(globals, project_root)?;
            let repos = session.repos();
            let mut facility = payload.into_facility(&session.ctx, repos.items.as_ref())?;
            facility.id = Some(FacilityId::new(*id));
            repos.facilities.update(&session.ctx, &mut facility)?;
            render_one(&session, &facility)
        }
        FacilityCommand::Delete { id } => {
            let session = Session::open(globals, project_root)?;
            session
                .repos()
                .facilities
                .delete(&session.ctx, FacilityId::new(*id))?;
            render_ack(session.output, &Ack::new("deleted", EntityKind::Facility, *id))
        }
    }
}

fn render_one(session: &Session, facility: &Facility) -> Result<()> {
    render_mode(
        session.output,
        facility,
        |f, w| write_text(std::slice::from_ref(f), w),
        |f, w| write_pretty(std::slice::from_ref(f), w),
    )
}

fn id_of(facility: &Facility) -> i64 {
    facility.id.map_or(0, FacilityId::get)
}

fn write_text(facilities: &[Facility], w: &mut dyn Write) -> io::Result<()> {
    for facility in facilities {
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}",
            id_of(facility),
            facility.name,
            facility.processing_time,
            facility.input_requirements.len(),
            facility.output_definitions.len()
        )?;
    }
    Ok(())
}

fn write_pretty(facilities: &[Facility], w: &mut dyn Write) -> io::Result<()> {
    for facility in facilities {
        pretty_section(w, &format!("Facility {}", id_of(facility)))?;
        pretty_kv(w, "name", &facility.name)?;
        pretty_kv(w, "description", or_dash(facility.description.as_deref()))?;
        pretty_kv(w, "processing", facility.processing_time.to_string())?;

        let inputs = facility
            .input_requirements
            .iter()
            .map(|r| (&r.item, r.quantity));
        write_quantities(w, "inputs", inputs)?;
        let outputs = facility
            .output_definitions
            .iter()
            .map(|d| (&d.item, d.quantity));
        write_quantities(w, "outputs", outputs)?;
    }
    Ok(())
}

fn write_quantities<'a>(
    w: &mut dyn Write,
    key: &str,
    rows: impl Iterator<Item = (&'a Item, u32)>,
) -> io::Result<()> {
    let mut first = true;
    for (item, quantity) in rows {
        let line = format!("{quantity} x {} (#{})", item.name, item.id.map_or(0, ItemId::get));
        if first {
            pretty_kv(w, key, line)?;
            first = false;
        } else {
            writeln!(w, "{:<16} {line}", "")?;
        }
    }
    if first {
        pretty_kv(w, key, "-")?;
    }
    Ok(())
}
