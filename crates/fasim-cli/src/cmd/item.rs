//! `fasim item`: catalog items.

use anyhow::Result;
use clap::{Args, Subcommand};
use fasim_core::model::{Item, ItemId};
use fasim_core::{EntityKind, RepoError};
use std::io::{self, Write};
use std::path::Path;

use super::{Globals, Session, or_dash};
use crate::output::{Ack, pretty_kv, pretty_section, render_ack, render_mode};

#[derive(Subcommand, Debug)]
pub enum ItemCommand {
    /// Create an item.
    Create(ItemFields),
    /// Show one item.
    Get {
        id: i64,
    },
    /// List all items by id.
    List,
    /// Replace an item's name and description.
    Update {
        id: i64,
        #[command(flatten)]
        fields: ItemFields,
    },
    /// Delete an item that no facility references.
    Delete {
        id: i64,
    },
}

#[derive(Args, Debug)]
pub struct ItemFields {
    /// Unique item name.
    #[arg(long)]
    pub name: String,

    /// Free-form description.
    #[arg(long)]
    pub description: Option<String>,
}

impl ItemFields {
    fn to_item(&self) -> Item {
        let mut item = Item::new(self.name.clone());
        item.description.clone_from(&self.description);
        item
    }
}

/// Execute `fasim item <command>`.
///
/// # Errors
///
/// Returns an error if the store cannot be opened, the repository call
/// fails, or the item does not exist.
pub fn run_item(command: &ItemCommand, globals: &Globals, project_root: &Path) -> Result<()> {
    let session = Session::open(globals, project_root)?;
    let repos = session.repos();
    let ctx = &session.ctx;

    match command {
        ItemCommand::Create(fields) => {
            let mut item = fields.to_item();
            repos.items.create(ctx, &mut item)?;
            render_items(&session, std::slice::from_ref(&item), false)
        }
        ItemCommand::Get { id } => {
            let item = repos
                .items
                .get(ctx, ItemId::new(*id))?
                .ok_or(RepoError::NotFound {
                    entity: EntityKind::Item,
                    id: *id,
                })?;
            render_items(&session, std::slice::from_ref(&item), false)
        }
        ItemCommand::List => {
            let items = repos.items.list(ctx)?;
            render_items(&session, &items, true)
        }
        ItemCommand::Update { id, fields } => {
            let mut item = fields.to_item();
            item.id = Some(ItemId::new(*id));
            repos.items.update(ctx, &item)?;
            render_items(&session, std::slice::from_ref(&item), false)
        }
        ItemCommand::Delete { id } => {
            repos.items.delete(ctx, ItemId::new(*id))?;
            render_ack(session.output, &Ack::new("deleted", EntityKind::Item, *id))
        }
    }
}

/// Lists render as a JSON array, single results as one object.
fn render_items(session: &Session, items: &[Item], as_list: bool) -> Result<()> {
    match items {
        [item] if !as_list => render_mode(
            session.output,
            item,
            |i, w| write_text(std::slice::from_ref(i), w),
            |i, w| write_pretty(std::slice::from_ref(i), w),
        ),
        _ => render_mode(session.output, items, write_text, write_pretty),
    }
}

fn write_text(items: &[Item], w: &mut dyn Write) -> io::Result<()> {
    for item in items {
        writeln!(
            w,
            "{}\t{}\t{}",
            item.id.map_or(0, ItemId::get),
            item.name,
            or_dash(item.description.as_deref())
        )?;
    }
    Ok(())
}

fn write_pretty(items: &[Item], w: &mut dyn Write) -> io::Result<()> {
    for item in items {
        pretty_section(w, &format!("Item {}", item.id.map_or(0, ItemId::get)))?;
        pretty_kv(w, "name", &item.name)?;
        pretty_kv(w, "description", or_dash(item.description.as_deref()))?;
    }
    Ok(())
}
