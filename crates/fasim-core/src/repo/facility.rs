use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use super::item::item_from_row;
use super::{FacilityRepository, note_rollback};
use crate::context::RequestContext;
use crate::db::{begin_read, begin_write, now_us};
use crate::error::{EntityKind, RepoError, Result};
use crate::model::{Facility, FacilityId, InputRequirement, Item, ItemId, OutputDefinition};

const SELECT_INPUTS: &str = "
    SELECT i.id, i.name, i.description, r.quantity
    FROM input_requirements r
    JOIN items i ON i.id = r.item_id
    WHERE r.facility_id = ?1
    ORDER BY r.position, r.id";

const SELECT_OUTPUTS: &str = "
    SELECT i.id, i.name, i.description, r.quantity
    FROM output_definitions r
    JOIN items i ON i.id = r.item_id
    WHERE r.facility_id = ?1
    ORDER BY r.position, r.id";

/// [`FacilityRepository`] over a borrowed SQLite connection.
#[derive(Debug, Clone, Copy)]
pub struct SqliteFacilityRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteFacilityRepository<'conn> {
    #[must_use]
    pub const fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn insert(&self, ctx: &RequestContext, facility: &Facility) -> Result<Facility> {
        ctx.check()?;
        let tx = begin_write(self.conn)?;
        let now = now_us();
        tx.execute(
            "INSERT INTO facilities (name, description, processing_time, created_at_us, updated_at_us)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![facility.name, facility.description, facility.processing_time, now],
        )?;
        let id = FacilityId::new(tx.last_insert_rowid());
        write_relations(&tx, ctx, id, facility)?;

        let stored = load_facility(&tx, id)?.ok_or_else(|| not_found(id))?;
        ctx.check()?;
        tx.commit()?;
        Ok(stored)
    }

    fn rewrite(
        &self,
        ctx: &RequestContext,
        id: FacilityId,
        facility: &Facility,
    ) -> Result<Facility> {
        ctx.check()?;
        let tx = begin_write(self.conn)?;
        if !facility_exists(&tx, id)? {
            return Err(not_found(id));
        }

        delete_relations(&tx, ctx, id)?;
        ctx.check()?;
        tx.execute(
            "UPDATE facilities
             SET name = ?1, description = ?2, processing_time = ?3, updated_at_us = ?4
             WHERE id = ?5",
            params![
                facility.name,
                facility.description,
                facility.processing_time,
                now_us(),
                id
            ],
        )?;
        write_relations(&tx, ctx, id, facility)?;

        let stored = load_facility(&tx, id)?.ok_or_else(|| not_found(id))?;
        ctx.check()?;
        tx.commit()?;
        Ok(stored)
    }

    fn remove(&self, ctx: &RequestContext, id: FacilityId) -> Result<()> {
        ctx.check()?;
        let tx = begin_write(self.conn)?;
        if !facility_exists(&tx, id)? {
            return Err(not_found(id));
        }

        let nodes: i64 = tx.query_row(
            "SELECT COUNT(*) FROM pipeline_nodes WHERE facility_id = ?1",
            [id],
            |row| row.get(0),
        )?;
        if nodes > 0 {
            return Err(RepoError::constraint(format!(
                "facility {id} is still used by {nodes} pipeline nodes"
            )));
        }

        delete_relations(&tx, ctx, id)?;
        ctx.check()?;
        tx.execute("DELETE FROM facilities WHERE id = ?1", [id])?;
        tx.commit()?;
        Ok(())
    }
}

impl FacilityRepository for SqliteFacilityRepository<'_> {
    fn create(&self, ctx: &RequestContext, facility: &mut Facility) -> Result<()> {
        facility.validate()?;
        let stored = self
            .insert(ctx, facility)
            .inspect_err(|e| note_rollback("create", EntityKind::Facility, e))?;
        info!(
            facility_id = ?stored.id,
            name = %stored.name,
            inputs = stored.input_requirements.len(),
            outputs = stored.output_definitions.len(),
            "facility created"
        );
        *facility = stored;
        Ok(())
    }

    fn get(&self, ctx: &RequestContext, id: FacilityId) -> Result<Option<Facility>> {
        ctx.check()?;
        let tx = begin_read(self.conn)?;
        let facility = load_facility(&tx, id)?;
        tx.commit()?;
        debug!(facility_id = %id, found = facility.is_some(), "facility loaded");
        Ok(facility)
    }

    fn list(&self, ctx: &RequestContext) -> Result<Vec<Facility>> {
        ctx.check()?;
        let tx = begin_read(self.conn)?;
        let ids = {
            let mut stmt = tx.prepare_cached("SELECT id FROM facilities ORDER BY id")?;
            let rows = stmt.query_map([], |row| row.get::<_, FacilityId>(0))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        let mut facilities = Vec::with_capacity(ids.len());
        for id in ids {
            ctx.check()?;
            if let Some(facility) = load_facility(&tx, id)? {
                facilities.push(facility);
            }
        }
        tx.commit()?;
        debug!(count = facilities.len(), "facilities listed");
        Ok(facilities)
    }

    fn update(&self, ctx: &RequestContext, facility: &mut Facility) -> Result<()> {
        facility.validate()?;
        let id = facility.require_id()?;
        let stored = self
            .rewrite(ctx, id, facility)
            .inspect_err(|e| note_rollback("update", EntityKind::Facility, e))?;
        info!(facility_id = %id, name = %stored.name, "facility updated");
        *facility = stored;
        Ok(())
    }

    fn delete(&self, ctx: &RequestContext, id: FacilityId) -> Result<()> {
        self.remove(ctx, id)
            .inspect_err(|e| note_rollback("delete", EntityKind::Facility, e))?;
        info!(facility_id = %id, "facility deleted");
        Ok(())
    }
}

/// Load one facility with both relation lists resolved to full items.
pub(super) fn load_facility(conn: &Connection, id: FacilityId) -> Result<Option<Facility>> {
    let facility = conn
        .query_row(
            "SELECT id, name, description, processing_time FROM facilities WHERE id = ?1",
            [id],
            |row| {
                Ok(Facility {
                    id: Some(row.get(0)?),
                    name: row.get(1)?,
                    description: row.get(2)?,
                    processing_time: row.get(3)?,
                    input_requirements: Vec::new(),
                    output_definitions: Vec::new(),
                })
            },
        )
        .optional()?;

    let Some(mut facility) = facility else {
        return Ok(None);
    };

    facility.input_requirements = load_relation(conn, SELECT_INPUTS, id)?
        .into_iter()
        .map(|(item, quantity)| InputRequirement::new(item, quantity))
        .collect();
    facility.output_definitions = load_relation(conn, SELECT_OUTPUTS, id)?
        .into_iter()
        .map(|(item, quantity)| OutputDefinition::new(item, quantity))
        .collect();

    Ok(Some(facility))
}

fn load_relation(conn: &Connection, sql: &str, id: FacilityId) -> Result<Vec<(Item, u32)>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt.query_map([id], |row| Ok((item_from_row(row)?, row.get::<_, u32>(3)?)))?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

fn write_relations(
    conn: &Connection,
    ctx: &RequestContext,
    id: FacilityId,
    facility: &Facility,
) -> Result<()> {
    let inputs = facility
        .input_requirements
        .iter()
        .map(|r| (&r.item, r.quantity));
    insert_relation(
        conn,
        ctx,
        "INSERT INTO input_requirements (facility_id, item_id, quantity, position)
         VALUES (?1, ?2, ?3, ?4)",
        id,
        inputs,
    )?;

    let outputs = facility
        .output_definitions
        .iter()
        .map(|d| (&d.item, d.quantity));
    insert_relation(
        conn,
        ctx,
        "INSERT INTO output_definitions (facility_id, item_id, quantity, position)
         VALUES (?1, ?2, ?3, ?4)",
        id,
        outputs,
    )
}

fn insert_relation<'a>(
    conn: &Connection,
    ctx: &RequestContext,
    sql: &str,
    id: FacilityId,
    rows: impl Iterator<Item = (&'a Item, u32)>,
) -> Result<()> {
    let mut stmt = conn.prepare_cached(sql)?;
    for (position, (item, quantity)) in rows.enumerate() {
        ctx.check()?;
        let item_id = item.require_id()?;
        let position = i64::try_from(position)
            .map_err(|_| RepoError::validation("too many facility relations"))?;
        stmt.execute(params![id, item_id, quantity, position])
            .map_err(|error| unknown_item(error, item, item_id))?;
    }
    Ok(())
}

fn delete_relations(conn: &Connection, ctx: &RequestContext, id: FacilityId) -> Result<()> {
    ctx.check()?;
    conn.execute("DELETE FROM input_requirements WHERE facility_id = ?1", [id])?;
    ctx.check()?;
    conn.execute("DELETE FROM output_definitions WHERE facility_id = ?1", [id])?;
    Ok(())
}

/// Name the offending item when a relation insert trips the foreign key.
fn unknown_item(error: rusqlite::Error, item: &Item, item_id: ItemId) -> RepoError {
    match RepoError::from(error) {
        RepoError::ConstraintViolation { reason, source } => RepoError::ConstraintViolation {
            reason: format!("{reason} (item '{}' id {item_id})", item.name),
            source,
        },
        other => other,
    }
}

fn facility_exists(conn: &Connection, id: FacilityId) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM facilities WHERE id = ?1)",
        [id],
        |row| row.get(0),
    )?)
}

const fn not_found(id: FacilityId) -> RepoError {
    RepoError::NotFound {
        entity: EntityKind::Facility,
        id: id.get(),
    }
}
