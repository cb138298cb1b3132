//! JSON request payloads for `facility` and `pipeline` writes.
//!
//! Payloads reference items and facilities by id. Resolution loads the
//! referenced entities through the repositories so the domain values carry
//! full data; an unknown id is rejected as invalid input.

use anyhow::{Context, Result};
use fasim_core::model::{Facility, FacilityId, ItemId, NodeId, Pipeline, PipelineNode};
use fasim_core::{FacilityRepository, ItemRepository, RepoError, RequestContext};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct QuantityPayload {
    pub item_id: ItemId,
    pub quantity: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FacilityPayload {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub processing_time: i64,
    #[serde(default)]
    pub inputs: Vec<QuantityPayload>,
    #[serde(default)]
    pub outputs: Vec<QuantityPayload>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NodePayload {
    /// Placeholder id, only used to describe edges.
    pub id: NodeId,
    pub facility_id: FacilityId,
    #[serde(default)]
    pub next_node_ids: Vec<NodeId>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PipelinePayload {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub nodes: Vec<NodePayload>,
}

/// Read and parse a JSON payload from `path`, or stdin when `path` is `-`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a valid payload.
pub fn read_payload<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("read payload from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("read payload {}", path.display()))?
    };

    serde_json::from_str(&raw).with_context(|| format!("parse payload {}", path.display()))
}

impl FacilityPayload {
    /// Build an unsaved facility, resolving every item id.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::Validation`] for an unknown item id, or any
    /// repository failure.
    pub fn into_facility(
        self,
        ctx: &RequestContext,
        items: &dyn ItemRepository,
    ) -> Result<Facility, RepoError> {
        let mut facility = Facility::new(self.name, self.processing_time);
        facility.description = self.description;

        for input in self.inputs {
            let item = resolve_item(ctx, items, input.item_id)?;
            facility = facility.with_input(item, input.quantity);
        }
        for output in self.outputs {
            let item = resolve_item(ctx, items, output.item_id)?;
            facility = facility.with_output(item, output.quantity);
        }

        Ok(facility)
    }
}

impl PipelinePayload {
    /// Build an unsaved pipeline, resolving every facility id.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::Validation`] for a repeated node id or an
    /// unknown facility id, or any repository failure.
    pub fn into_pipeline(
        self,
        ctx: &RequestContext,
        facilities: &dyn FacilityRepository,
    ) -> Result<Pipeline, RepoError> {
        let mut pipeline = Pipeline::new(self.name);
        pipeline.description = self.description;

        for node in self.nodes {
            let facility = facilities.get(ctx, node.facility_id)?.ok_or_else(|| {
                RepoError::Validation(format!(
                    "node {} references unknown facility {}",
                    node.id, node.facility_id
                ))
            })?;

            let replaced =
                pipeline.insert_node(PipelineNode::new(node.id, facility, node.next_node_ids));
            if replaced.is_some() {
                return Err(RepoError::Validation(format!(
                    "node id {} appears more than once",
                    node.id
                )));
            }
        }

        Ok(pipeline)
    }
}

fn resolve_item(
    ctx: &RequestContext,
    items: &dyn ItemRepository,
    id: ItemId,
) -> Result<fasim_core::model::Item, RepoError> {
    items
        .get(ctx, id)?
        .ok_or_else(|| RepoError::Validation(format!("unknown item {id}")))
}
