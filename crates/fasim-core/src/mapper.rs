//! Conversion between a [`Pipeline`] graph and its relational rows.
//!
//! Write direction: [`plan`] resolves every successor against the node set
//! and turns the graph into an arena of nodes plus `(source, target)` arena
//! index pairs. [`write_graph`] then inserts one `pipeline_nodes` row per
//! node, collecting the durable ids, and only afterwards inserts one
//! `pipeline_node_edges` row per edge through those ids.
//!
//! Read direction: [`to_graph`] rebuilds the node map from [`NodeRecord`]s,
//! keyed by durable id with successors in stored edge order.
//!
//! Neither direction opens or commits a transaction. The repository owns
//! the transaction and the mapper runs inside it.

use std::collections::{BTreeMap, HashMap, HashSet};

use rusqlite::{Connection, params};
use tracing::debug;

use crate::context::RequestContext;
use crate::error::{RepoError, Result};
use crate::model::{Facility, FacilityId, NodeId, Pipeline, PipelineId, PipelineNode};

// ---------------------------------------------------------------------------
// Write direction
// ---------------------------------------------------------------------------

/// A pipeline graph flattened into insert order.
#[derive(Debug)]
pub struct GraphPlan {
    /// `(placeholder id, facility id)` per node, in arena order.
    nodes: Vec<(NodeId, FacilityId)>,
    /// Directed edges as arena indices, grouped by source in arena order.
    edges: Vec<(usize, usize)>,
}

impl GraphPlan {
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

/// Flatten a pipeline into a [`GraphPlan`].
///
/// # Errors
///
/// Returns [`RepoError::Validation`] when a node's facility has no identity
/// or a successor id names no node of this pipeline.
pub fn plan(pipeline: &Pipeline) -> Result<GraphPlan> {
    let index: HashMap<NodeId, usize> = pipeline
        .nodes
        .keys()
        .enumerate()
        .map(|(slot, id)| (*id, slot))
        .collect();

    let mut nodes = Vec::with_capacity(pipeline.nodes.len());
    let mut edges = Vec::with_capacity(pipeline.edge_count());

    for (source, node) in pipeline.nodes.values().enumerate() {
        nodes.push((node.id, node.facility.require_id()?));

        for target in &node.next_node_ids {
            let Some(&target) = index.get(target) else {
                return Err(RepoError::validation(format!(
                    "node {} points at node {target}, which is not part of pipeline '{}'",
                    node.id, pipeline.name
                )));
            };
            edges.push((source, target));
        }
    }

    Ok(GraphPlan { nodes, edges })
}

/// Insert the planned nodes and edges for `pipeline_id`.
///
/// Every node row is written before any edge row. The context is checked
/// before each row so a cancelled request stops mid-write; the caller's
/// transaction then rolls back.
///
/// Returns the placeholder to durable id mapping for the written nodes.
///
/// # Errors
///
/// Returns the first storage, constraint, or cancellation error.
pub fn write_graph(
    conn: &Connection,
    ctx: &RequestContext,
    pipeline_id: PipelineId,
    plan: &GraphPlan,
) -> Result<HashMap<NodeId, NodeId>> {
    let mut durable = Vec::with_capacity(plan.nodes.len());
    {
        let mut insert_node = conn.prepare_cached(
            "INSERT INTO pipeline_nodes (pipeline_id, facility_id) VALUES (?1, ?2)",
        )?;
        for (_, facility_id) in &plan.nodes {
            ctx.check()?;
            insert_node.execute(params![pipeline_id, facility_id])?;
            durable.push(NodeId::new(conn.last_insert_rowid()));
        }
    }

    {
        let mut insert_edge = conn.prepare_cached(
            "INSERT INTO pipeline_node_edges (source_node_id, target_node_id) VALUES (?1, ?2)",
        )?;
        for &(source, target) in &plan.edges {
            ctx.check()?;
            insert_edge.execute(params![durable[source], durable[target]])?;
        }
    }

    debug!(
        pipeline_id = %pipeline_id,
        nodes = plan.nodes.len(),
        edges = plan.edges.len(),
        "pipeline graph written"
    );

    Ok(plan
        .nodes
        .iter()
        .map(|(placeholder, _)| *placeholder)
        .zip(durable)
        .collect())
}

/// Remove every edge touching a node of `pipeline_id`, then the nodes.
///
/// Returns the number of nodes removed.
///
/// # Errors
///
/// Returns the first storage or cancellation error.
pub fn delete_graph(
    conn: &Connection,
    ctx: &RequestContext,
    pipeline_id: PipelineId,
) -> Result<usize> {
    ctx.check()?;
    let edges = conn.execute(
        "DELETE FROM pipeline_node_edges
         WHERE source_node_id IN (SELECT id FROM pipeline_nodes WHERE pipeline_id = ?1)
            OR target_node_id IN (SELECT id FROM pipeline_nodes WHERE pipeline_id = ?1)",
        [pipeline_id],
    )?;

    ctx.check()?;
    let nodes = conn.execute(
        "DELETE FROM pipeline_nodes WHERE pipeline_id = ?1",
        [pipeline_id],
    )?;

    debug!(pipeline_id = %pipeline_id, nodes, edges, "pipeline graph removed");
    Ok(nodes)
}

// ---------------------------------------------------------------------------
// Read direction
// ---------------------------------------------------------------------------

/// One stored node with its resolved facility and outgoing edge targets in
/// stored edge order.
#[derive(Debug, Clone)]
pub struct NodeRecord {
    pub id: NodeId,
    pub facility: Facility,
    pub targets: Vec<NodeId>,
}

/// Rebuild the node map of a pipeline from its stored node records.
///
/// # Errors
///
/// Returns [`RepoError::ConstraintViolation`] if an edge target is not one
/// of the given nodes, which means the stored graph is corrupt.
pub fn to_graph(records: Vec<NodeRecord>) -> Result<BTreeMap<NodeId, PipelineNode>> {
    let known: HashSet<NodeId> = records.iter().map(|record| record.id).collect();

    records
        .into_iter()
        .map(|record| {
            if let Some(stray) = record.targets.iter().find(|t| !known.contains(*t)) {
                return Err(RepoError::constraint(format!(
                    "stored edge {} -> {stray} leaves its pipeline",
                    record.id
                )));
            }
            let node = PipelineNode::new(record.id, record.facility, record.targets);
            Ok((node.id, node))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facility(id: i64) -> Facility {
        let mut facility = Facility::new(format!("F{id}"), 1);
        facility.id = Some(FacilityId::new(id));
        facility
    }

    #[test]
    fn plan_resolves_edges_to_arena_slots() {
        let pipeline = Pipeline::new("Line")
            .with_node(30, facility(1), [10])
            .with_node(10, facility(2), [20, 30])
            .with_node(20, facility(3), [20]);

        let plan = plan(&pipeline).expect("plan");
        assert_eq!(plan.node_count(), 3);
        // Arena order follows node id: 10, 20, 30.
        assert_eq!(plan.edges, vec![(0, 1), (0, 2), (1, 1), (2, 0)]);
        assert_eq!(plan.nodes[2], (NodeId::new(30), FacilityId::new(1)));
    }

    #[test]
    fn plan_keeps_duplicate_edges() {
        let pipeline = Pipeline::new("Line")
            .with_node(1, facility(1), [2, 2])
            .with_node(2, facility(1), []);
        assert_eq!(plan(&pipeline).expect("plan").edge_count(), 2);
    }

    #[test]
    fn plan_rejects_dangling_successor() {
        let pipeline = Pipeline::new("Line").with_node(1, facility(1), [9]);
        let err = plan(&pipeline).expect_err("dangling successor");
        assert!(matches!(err, RepoError::Validation(_)));
        assert!(err.to_string().contains("node 9"));
    }

    #[test]
    fn plan_of_empty_pipeline_is_empty() {
        let plan = plan(&Pipeline::new("Empty")).expect("plan");
        assert_eq!(plan.node_count(), 0);
        assert_eq!(plan.edge_count(), 0);
    }

    #[test]
    fn to_graph_keys_by_durable_id_and_keeps_edge_order() {
        let records = vec![
            NodeRecord {
                id: NodeId::new(8),
                facility: facility(1),
                targets: vec![NodeId::new(9), NodeId::new(8)],
            },
            NodeRecord {
                id: NodeId::new(9),
                facility: facility(2),
                targets: vec![],
            },
        ];

        let nodes = to_graph(records).expect("rebuild");
        assert_eq!(nodes.len(), 2);
        assert_eq!(
            nodes[&NodeId::new(8)].next_node_ids,
            vec![NodeId::new(9), NodeId::new(8)]
        );
        assert_eq!(nodes[&NodeId::new(9)].facility.name, "F2");
    }

    #[test]
    fn to_graph_rejects_stray_target() {
        let records = vec![NodeRecord {
            id: NodeId::new(1),
            facility: facility(1),
            targets: vec![NodeId::new(2)],
        }];
        let err = to_graph(records).expect_err("stray target");
        assert!(matches!(err, RepoError::ConstraintViolation { .. }));
    }
}
