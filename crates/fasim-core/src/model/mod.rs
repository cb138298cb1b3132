//! Domain types: items, facilities, and pipeline graphs.
//!
//! These types carry no storage concerns beyond their optional durable
//! identity. Persistence lives in [`crate::mapper`] and [`crate::repo`].

mod facility;
mod id;
mod item;
mod pipeline;

pub use facility::{Facility, InputRequirement, OutputDefinition};
pub use id::{FacilityId, ItemId, NodeId, PipelineId};
pub use item::Item;
pub use pipeline::{Pipeline, PipelineNode};
