//! Repository contracts and their SQLite implementations.
//!
//! Each entity has one trait with the same five operations. `get` reports
//! absence as `Ok(None)`; `update` and `delete` report it as
//! [`RepoError::NotFound`]. Every write runs in one `BEGIN IMMEDIATE`
//! transaction that commits only after the last statement succeeded.

mod facility;
mod item;
mod pipeline;

pub use facility::SqliteFacilityRepository;
pub use item::SqliteItemRepository;
pub use pipeline::SqlitePipelineRepository;

use rusqlite::Connection;
use tracing::warn;

use crate::context::RequestContext;
use crate::error::{EntityKind, RepoError, Result};
use crate::model::{Facility, FacilityId, Item, ItemId, Pipeline, PipelineId};

pub trait ItemRepository {
    /// Store a new item and assign its durable id into `item`.
    ///
    /// # Errors
    ///
    /// Fails on invalid input, a duplicate name, cancellation, or storage
    /// failure.
    fn create(&self, ctx: &RequestContext, item: &mut Item) -> Result<()>;

    /// # Errors
    ///
    /// Fails on cancellation or storage failure, never on absence.
    fn get(&self, ctx: &RequestContext, id: ItemId) -> Result<Option<Item>>;

    /// # Errors
    ///
    /// Fails on cancellation or storage failure.
    fn list(&self, ctx: &RequestContext) -> Result<Vec<Item>>;

    /// Overwrite name and description of a stored item.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::NotFound`] when no item has that id.
    fn update(&self, ctx: &RequestContext, item: &Item) -> Result<()>;

    /// # Errors
    ///
    /// Returns [`RepoError::NotFound`] when absent and
    /// [`RepoError::ConstraintViolation`] while a facility references it.
    fn delete(&self, ctx: &RequestContext, id: ItemId) -> Result<()>;
}

pub trait FacilityRepository {
    /// Store a facility with its relations. On success `facility` holds
    /// its durable id and fully resolved items.
    ///
    /// # Errors
    ///
    /// Fails on invalid input, an unknown item, cancellation, or storage
    /// failure.
    fn create(&self, ctx: &RequestContext, facility: &mut Facility) -> Result<()>;

    /// # Errors
    ///
    /// Fails on cancellation or storage failure, never on absence.
    fn get(&self, ctx: &RequestContext, id: FacilityId) -> Result<Option<Facility>>;

    /// # Errors
    ///
    /// Fails on cancellation or storage failure.
    fn list(&self, ctx: &RequestContext) -> Result<Vec<Facility>>;

    /// Replace the scalar fields and both relation lists.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::NotFound`] when no facility has that id.
    fn update(&self, ctx: &RequestContext, facility: &mut Facility) -> Result<()>;

    /// # Errors
    ///
    /// Returns [`RepoError::NotFound`] when absent and
    /// [`RepoError::ConstraintViolation`] while a pipeline node uses it.
    fn delete(&self, ctx: &RequestContext, id: FacilityId) -> Result<()>;
}

pub trait PipelineRepository {
    /// Store a pipeline graph. On success `pipeline` is replaced by the
    /// stored graph: durable pipeline and node ids, resolved facilities.
    ///
    /// # Errors
    ///
    /// Fails on invalid input (including dangling successors), a duplicate
    /// name, cancellation, or storage failure. Nothing is stored on failure.
    fn create(&self, ctx: &RequestContext, pipeline: &mut Pipeline) -> Result<()>;

    /// # Errors
    ///
    /// Fails on cancellation or storage failure, never on absence.
    fn get(&self, ctx: &RequestContext, id: PipelineId) -> Result<Option<Pipeline>>;

    /// # Errors
    ///
    /// Fails on cancellation or storage failure.
    fn list(&self, ctx: &RequestContext) -> Result<Vec<Pipeline>>;

    /// Replace the whole graph of a stored pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::NotFound`] when no pipeline has that id.
    fn update(&self, ctx: &RequestContext, pipeline: &mut Pipeline) -> Result<()>;

    /// # Errors
    ///
    /// Returns [`RepoError::NotFound`] when absent.
    fn delete(&self, ctx: &RequestContext, id: PipelineId) -> Result<()>;
}

/// The three repositories behind trait objects, so callers stay agnostic of
/// the storage engine.
pub struct Repositories<'conn> {
    pub items: Box<dyn ItemRepository + 'conn>,
    pub facilities: Box<dyn FacilityRepository + 'conn>,
    pub pipelines: Box<dyn PipelineRepository + 'conn>,
}

impl<'conn> Repositories<'conn> {
    /// SQLite-backed repositories sharing one connection.
    #[must_use]
    pub fn sqlite(conn: &'conn Connection) -> Self {
        Self {
            items: Box::new(SqliteItemRepository::new(conn)),
            facilities: Box::new(SqliteFacilityRepository::new(conn)),
            pipelines: Box::new(SqlitePipelineRepository::new(conn)),
        }
    }
}

/// Log a write that was abandoned after its transaction opened.
fn note_rollback(op: &'static str, entity: EntityKind, error: &RepoError) {
    match error {
        RepoError::Cancelled | RepoError::DeadlineExceeded => {
            warn!(op, %entity, %error, "write abandoned, transaction rolled back");
        }
        RepoError::Storage(_) | RepoError::ConstraintViolation { .. } => {
            warn!(op, %entity, %error, "write failed, transaction rolled back");
        }
        RepoError::Validation(_) | RepoError::NotFound { .. } => {}
    }
}
