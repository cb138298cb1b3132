use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{debug, info};

use super::{ItemRepository, note_rollback};
use crate::context::RequestContext;
use crate::db::{begin_read, begin_write, now_us};
use crate::error::{EntityKind, RepoError, Result};
use crate::model::{Item, ItemId};

/// [`ItemRepository`] over a borrowed SQLite connection.
#[derive(Debug, Clone, Copy)]
pub struct SqliteItemRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteItemRepository<'conn> {
    #[must_use]
    pub const fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn insert(&self, ctx: &RequestContext, item: &Item) -> Result<ItemId> {
        ctx.check()?;
        let tx = begin_write(self.conn)?;
        let now = now_us();
        tx.execute(
            "INSERT INTO items (name, description, created_at_us, updated_at_us)
             VALUES (?1, ?2, ?3, ?3)",
            params![item.name, item.description, now],
        )?;
        let id = ItemId::new(tx.last_insert_rowid());
        ctx.check()?;
        tx.commit()?;
        Ok(id)
    }

    fn rewrite(&self, ctx: &RequestContext, id: ItemId, item: &Item) -> Result<()> {
        ctx.check()?;
        let tx = begin_write(self.conn)?;
        let changed = tx.execute(
            "UPDATE items SET name = ?1, description = ?2, updated_at_us = ?3 WHERE id = ?4",
            params![item.name, item.description, now_us(), id],
        )?;
        if changed == 0 {
            return Err(not_found(id));
        }
        ctx.check()?;
        tx.commit()?;
        Ok(())
    }

    fn remove(&self, ctx: &RequestContext, id: ItemId) -> Result<()> {
        ctx.check()?;
        let tx = begin_write(self.conn)?;
        if !item_exists(&tx, id)? {
            return Err(not_found(id));
        }

        let references: i64 = tx.query_row(
            "SELECT (SELECT COUNT(*) FROM input_requirements WHERE item_id = ?1)
                  + (SELECT COUNT(*) FROM output_definitions WHERE item_id = ?1)",
            [id],
            |row| row.get(0),
        )?;
        if references > 0 {
            return Err(RepoError::constraint(format!(
                "item {id} is still referenced by {references} facility input/output rows"
            )));
        }

        ctx.check()?;
        tx.execute("DELETE FROM items WHERE id = ?1", [id])?;
        tx.commit()?;
        Ok(())
    }
}

impl ItemRepository for SqliteItemRepository<'_> {
    fn create(&self, ctx: &RequestContext, item: &mut Item) -> Result<()> {
        item.validate()?;
        let id = self
            .insert(ctx, item)
            .inspect_err(|e| note_rollback("create", EntityKind::Item, e))?;
        item.id = Some(id);
        info!(item_id = %id, name = %item.name, "item created");
        Ok(())
    }

    fn get(&self, ctx: &RequestContext, id: ItemId) -> Result<Option<Item>> {
        ctx.check()?;
        let item = load_item(self.conn, id)?;
        debug!(item_id = %id, found = item.is_some(), "item loaded");
        Ok(item)
    }

    fn list(&self, ctx: &RequestContext) -> Result<Vec<Item>> {
        ctx.check()?;
        let tx = begin_read(self.conn)?;
        let items = {
            let mut stmt =
                tx.prepare_cached("SELECT id, name, description FROM items ORDER BY id")?;
            let rows = stmt.query_map([], item_from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };
        tx.commit()?;
        debug!(count = items.len(), "items listed");
        Ok(items)
    }

    fn update(&self, ctx: &RequestContext, item: &Item) -> Result<()> {
        item.validate()?;
        let id = item.require_id()?;
        self.rewrite(ctx, id, item)
            .inspect_err(|e| note_rollback("update", EntityKind::Item, e))?;
        info!(item_id = %id, name = %item.name, "item updated");
        Ok(())
    }

    fn delete(&self, ctx: &RequestContext, id: ItemId) -> Result<()> {
        self.remove(ctx, id)
            .inspect_err(|e| note_rollback("delete", EntityKind::Item, e))?;
        info!(item_id = %id, "item deleted");
        Ok(())
    }
}

pub(super) fn item_from_row(row: &Row<'_>) -> rusqlite::Result<Item> {
    Ok(Item {
        id: Some(row.get(0)?),
        name: row.get(1)?,
        description: row.get(2)?,
    })
}

pub(super) fn load_item(conn: &Connection, id: ItemId) -> Result<Option<Item>> {
    Ok(conn
        .query_row(
            "SELECT id, name, description FROM items WHERE id = ?1",
            [id],
            item_from_row,
        )
        .optional()?)
}

fn item_exists(conn: &Connection, id: ItemId) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM items WHERE id = ?1)",
        [id],
        |row| row.get(0),
    )?)
}

const fn not_found(id: ItemId) -> RepoError {
    RepoError::NotFound {
        entity: EntityKind::Item,
        id: id.get(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    #[test]
    fn create_assigns_increasing_ids() {
        let conn = open_in_memory().expect("store");
        let repo = SqliteItemRepository::new(&conn);
        let ctx = RequestContext::background();

        let mut ore = Item::new("Iron Ore");
        let mut plate = Item::new("Iron Plate").with_description("rolled");
        repo.create(&ctx, &mut ore).expect("create ore");
        repo.create(&ctx, &mut plate).expect("create plate");

        let (a, b) = (ore.id.expect("ore id"), plate.id.expect("plate id"));
        assert!(a < b);

        let loaded = repo.get(&ctx, b).expect("get").expect("present");
        assert_eq!(loaded, plate);
    }

    #[test]
    fn blank_name_never_reaches_storage() {
        let conn = open_in_memory().expect("store");
        let repo = SqliteItemRepository::new(&conn);
        let mut item = Item::new(" ");

        let err = repo
            .create(&RequestContext::background(), &mut item)
            .expect_err("blank name");
        assert!(matches!(err, RepoError::Validation(_)));
        assert!(item.id.is_none());
    }

    #[test]
    fn cancelled_create_stores_nothing() {
        let conn = open_in_memory().expect("store");
        let repo = SqliteItemRepository::new(&conn);
        let ctx = RequestContext::background();
        ctx.cancel_handle().cancel();

        let err = repo
            .create(&ctx, &mut Item::new("Copper"))
            .expect_err("cancelled");
        assert!(matches!(err, RepoError::Cancelled));
        assert!(
            repo.list(&RequestContext::background())
                .expect("list")
                .is_empty()
        );
    }
}
