use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::facility::Facility;
use super::id::{NodeId, PipelineId};
use crate::error::{RepoError, Result};

/// One facility's placement within a pipeline.
///
/// The node embeds a full copy of the facility. `next_node_ids` are the
/// directed edges to other nodes of the same pipeline; duplicates and
/// self-loops are representable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineNode {
    pub id: NodeId,
    pub facility: Facility,
    #[serde(default)]
    pub next_node_ids: Vec<NodeId>,
}

impl PipelineNode {
    #[must_use]
    pub fn new(id: NodeId, facility: Facility, next_node_ids: Vec<NodeId>) -> Self {
        Self {
            id,
            facility,
            next_node_ids,
        }
    }
}

/// A production line: facility nodes connected by material-flow edges.
///
/// Nodes are keyed by identity. The graph may contain cycles, self-loops
/// and disconnected components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pipeline {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<PipelineId>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub nodes: BTreeMap<NodeId, PipelineNode>,
}

impl Pipeline {
    /// Create an unsaved pipeline with no nodes.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: None,
            nodes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Builder-style [`Pipeline::insert_node`].
    #[must_use]
    pub fn with_node(
        mut self,
        id: i64,
        facility: Facility,
        next_node_ids: impl IntoIterator<Item = i64>,
    ) -> Self {
        let next = next_node_ids.into_iter().map(NodeId::new).collect();
        self.insert_node(PipelineNode::new(NodeId::new(id), facility, next));
        self
    }

    /// Insert a node keyed by its own identity, replacing any node that
    /// already had that identity.
    pub fn insert_node(&mut self, node: PipelineNode) -> Option<PipelineNode> {
        self.nodes.insert(node.id, node)
    }

    /// Number of directed edges across all nodes.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(|n| n.next_node_ids.len()).sum()
    }

    /// Every directed edge as `(source, target)`, grouped by source node.
    pub fn edges(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.nodes
            .values()
            .flat_map(|n| n.next_node_ids.iter().map(move |target| (n.id, *target)))
    }

    /// Check the scalar fields and node keys.
    ///
    /// Successor resolution is checked by the persistence mapper when it
    /// plans the write.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::Validation`] for a blank name, a node stored
    /// under a key other than its own id, or a node whose facility was never
    /// stored.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(RepoError::validation("pipeline name must not be blank"));
        }

        for (key, node) in &self.nodes {
            if *key != node.id {
                return Err(RepoError::validation(format!(
                    "node stored under key {key} carries id {}",
                    node.id
                )));
            }
            node.facility.require_id()?;
        }

        Ok(())
    }

    /// The identity of a stored pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::Validation`] when the pipeline was never stored.
    pub fn require_id(&self) -> Result<PipelineId> {
        self.id.ok_or_else(|| {
            RepoError::validation(format!("pipeline '{}' has no identity", self.name))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FacilityId;

    fn stored_facility(id: i64) -> Facility {
        let mut facility = Facility::new(format!("F{id}"), 10);
        facility.id = Some(FacilityId::new(id));
        facility
    }

    #[test]
    fn edges_and_counts() {
        let pipeline = Pipeline::new("Line")
            .with_node(1, stored_facility(1), [2, 3])
            .with_node(2, stored_facility(2), [2])
            .with_node(3, stored_facility(3), []);

        assert_eq!(pipeline.nodes.len(), 3);
        assert_eq!(pipeline.edge_count(), 3);

        let edges: Vec<_> = pipeline.edges().map(|(s, t)| (s.get(), t.get())).collect();
        assert_eq!(edges, vec![(1, 2), (1, 3), (2, 2)]);
    }

    #[test]
    fn empty_pipeline_is_valid() {
        let pipeline = Pipeline::new("Empty");
        assert!(pipeline.validate().is_ok());
        assert_eq!(pipeline.edge_count(), 0);
    }

    #[test]
    fn mismatched_node_key_is_rejected() {
        let mut pipeline = Pipeline::new("Line");
        pipeline.nodes.insert(
            NodeId::new(5),
            PipelineNode::new(NodeId::new(6), stored_facility(1), vec![]),
        );

        let err = pipeline.validate().expect_err("key mismatch");
        assert!(err.to_string().contains("key 5"));
    }

    #[test]
    fn node_with_unsaved_facility_is_rejected() {
        let pipeline = Pipeline::new("Line").with_node(1, Facility::new("Draft", 1), []);
        assert!(pipeline.validate().is_err());
    }

    #[test]
    fn json_shape_uses_next_node_ids() {
        let pipeline = Pipeline::new("Line").with_node(1, stored_facility(4), [1]);
        let json = serde_json::to_value(&pipeline).expect("serialize");
        assert_eq!(json["nodes"]["1"]["nextNodeIds"], serde_json::json!([1]));
        assert_eq!(json["nodes"]["1"]["facility"]["id"], 4);
    }
}
