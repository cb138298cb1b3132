use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};

use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use super::facility::load_facility;
use super::{PipelineRepository, note_rollback};
use crate::context::RequestContext;
use crate::db::{begin_read, begin_write, now_us};
use crate::error::{EntityKind, RepoError, Result};
use crate::mapper::{self, GraphPlan, NodeRecord};
use crate::model::{Facility, FacilityId, NodeId, Pipeline, PipelineId};

/// [`PipelineRepository`] over a borrowed SQLite connection.
#[derive(Debug, Clone, Copy)]
pub struct SqlitePipelineRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePipelineRepository<'conn> {
    #[must_use]
    pub const fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn insert(
        &self,
        ctx: &RequestContext,
        pipeline: &Pipeline,
        plan: &GraphPlan,
    ) -> Result<Pipeline> {
        ctx.check()?;
        let tx = begin_write(self.conn)?;
        tx.execute(
            "INSERT INTO pipelines (name, description, created_at_us, updated_at_us)
             VALUES (?1, ?2, ?3, ?3)",
            params![pipeline.name, pipeline.description, now_us()],
        )?;
        let id = PipelineId::new(tx.last_insert_rowid());
        mapper::write_graph(&tx, ctx, id, plan)?;

        let stored = load_pipeline(&tx, ctx, id)?.ok_or_else(|| not_found(id))?;
        ctx.check()?;
        tx.commit()?;
        Ok(stored)
    }

    fn replace(
        &self,
        ctx: &RequestContext,
        id: PipelineId,
        pipeline: &Pipeline,
        plan: &GraphPlan,
    ) -> Result<Pipeline> {
        ctx.check()?;
        let tx = begin_write(self.conn)?;
        if !pipeline_exists(&tx, id)? {
            return Err(not_found(id));
        }

        mapper::delete_graph(&tx, ctx, id)?;
        ctx.check()?;
        tx.execute(
            "UPDATE pipelines SET name = ?1, description = ?2, updated_at_us = ?3 WHERE id = ?4",
            params![pipeline.name, pipeline.description, now_us(), id],
        )?;
        mapper::write_graph(&tx, ctx, id, plan)?;

        let stored = load_pipeline(&tx, ctx, id)?.ok_or_else(|| not_found(id))?;
        ctx.check()?;
        tx.commit()?;
        Ok(stored)
    }

    fn remove(&self, ctx: &RequestContext, id: PipelineId) -> Result<usize> {
        ctx.check()?;
        let tx = begin_write(self.conn)?;
        if !pipeline_exists(&tx, id)? {
            return Err(not_found(id));
        }

        let nodes = mapper::delete_graph(&tx, ctx, id)?;
        ctx.check()?;
        tx.execute("DELETE FROM pipelines WHERE id = ?1", [id])?;
        tx.commit()?;
        Ok(nodes)
    }
}

impl PipelineRepository for SqlitePipelineRepository<'_> {
    fn create(&self, ctx: &RequestContext, pipeline: &mut Pipeline) -> Result<()> {
        pipeline.validate()?;
        let plan = mapper::plan(pipeline)?;
        let stored = self
            .insert(ctx, pipeline, &plan)
            .inspect_err(|e| note_rollback("create", EntityKind::Pipeline, e))?;
        info!(
            pipeline_id = ?stored.id,
            name = %stored.name,
            nodes = stored.nodes.len(),
            edges = stored.edge_count(),
            "pipeline created"
        );
        *pipeline = stored;
        Ok(())
    }

    fn get(&self, ctx: &RequestContext, id: PipelineId) -> Result<Option<Pipeline>> {
        ctx.check()?;
        let tx = begin_read(self.conn)?;
        let pipeline = load_pipeline(&tx, ctx, id)?;
        tx.commit()?;
        debug!(pipeline_id = %id, found = pipeline.is_some(), "pipeline loaded");
        Ok(pipeline)
    }

    fn list(&self, ctx: &RequestContext) -> Result<Vec<Pipeline>> {
        ctx.check()?;
        let tx = begin_read(self.conn)?;
        let ids = {
            let mut stmt = tx.prepare_cached("SELECT id FROM pipelines ORDER BY id")?;
            let rows = stmt.query_map([], |row| row.get::<_, PipelineId>(0))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        let mut pipelines = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(pipeline) = load_pipeline(&tx, ctx, id)? {
                pipelines.push(pipeline);
            }
        }
        tx.commit()?;
        debug!(count = pipelines.len(), "pipelines listed");
        Ok(pipelines)
    }

    fn update(&self, ctx: &RequestContext, pipeline: &mut Pipeline) -> Result<()> {
        pipeline.validate()?;
        let id = pipeline.require_id()?;
        let plan = mapper::plan(pipeline)?;
        let stored = self
            .replace(ctx, id, pipeline, &plan)
            .inspect_err(|e| note_rollback("update", EntityKind::Pipeline, e))?;
        info!(
            pipeline_id = %id,
            name = %stored.name,
            nodes = stored.nodes.len(),
            edges = stored.edge_count(),
            "pipeline replaced"
        );
        *pipeline = stored;
        Ok(())
    }

    fn delete(&self, ctx: &RequestContext, id: PipelineId) -> Result<()> {
        let nodes = self
            .remove(ctx, id)
            .inspect_err(|e| note_rollback("delete", EntityKind::Pipeline, e))?;
        info!(pipeline_id = %id, nodes, "pipeline deleted");
        Ok(())
    }
}

/// Load a pipeline header, its nodes with resolved facilities, and every
/// outgoing edge, then rebuild the graph.
fn load_pipeline(
    conn: &Connection,
    ctx: &RequestContext,
    id: PipelineId,
) -> Result<Option<Pipeline>> {
    ctx.check()?;
    let header = conn
        .query_row(
            "SELECT name, description FROM pipelines WHERE id = ?1",
            [id],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?)),
        )
        .optional()?;
    let Some((name, description)) = header else {
        return Ok(None);
    };

    let node_rows = {
        let mut stmt = conn.prepare_cached(
            "SELECT id, facility_id FROM pipeline_nodes WHERE pipeline_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map([id], |row| {
            Ok((row.get::<_, NodeId>(0)?, row.get::<_, FacilityId>(1)?))
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    };

    let mut targets: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    {
        let mut stmt = conn.prepare_cached(
            "SELECT e.source_node_id, e.target_node_id
             FROM pipeline_node_edges e
             JOIN pipeline_nodes n ON n.id = e.source_node_id
             WHERE n.pipeline_id = ?1
             ORDER BY e.id",
        )?;
        let rows = stmt.query_map([id], |row| {
            Ok((row.get::<_, NodeId>(0)?, row.get::<_, NodeId>(1)?))
        })?;
        for row in rows {
            let (source, target) = row?;
            targets.entry(source).or_default().push(target);
        }
    }

    // Nodes of one pipeline often share a facility.
    let mut facilities: BTreeMap<FacilityId, Facility> = BTreeMap::new();
    let mut records = Vec::with_capacity(node_rows.len());
    for (node_id, facility_id) in node_rows {
        ctx.check()?;
        let facility = match facilities.entry(facility_id) {
            Entry::Occupied(cached) => cached.get().clone(),
            Entry::Vacant(slot) => {
                let loaded = load_facility(conn, facility_id)?.ok_or_else(|| {
                    RepoError::constraint(format!(
                        "node {node_id} references missing facility {facility_id}"
                    ))
                })?;
                slot.insert(loaded).clone()
            }
        };

        records.push(NodeRecord {
            id: node_id,
            facility,
            targets: targets.remove(&node_id).unwrap_or_default(),
        });
    }

    Ok(Some(Pipeline {
        id: Some(id),
        name,
        description,
        nodes: mapper::to_graph(records)?,
    }))
}

fn pipeline_exists(conn: &Connection, id: PipelineId) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM pipelines WHERE id = ?1)",
        [id],
        |row| row.get(0),
    )?)
}

const fn not_found(id: PipelineId) -> RepoError {
    RepoError::NotFound {
        entity: EntityKind::Pipeline,
        id: id.get(),
    }
}
