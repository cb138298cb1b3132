//! fasim-core library.
//!
//! Catalog of manufacturing entities backed by SQLite: [`model::Item`],
//! [`model::Facility`] and the [`model::Pipeline`] graph, the [`mapper`]
//! that flattens a pipeline graph into node and edge rows, and the
//! [`repo`] traits with their transactional SQLite implementations.
//!
//! # Conventions
//!
//! - **Errors**: library operations return [`error::RepoError`]; store
//!   bootstrap and config loading use `anyhow::Result`.
//! - **Logging**: use `tracing` macros with structured fields.
//! - **Cancellation**: every repository call takes a
//!   [`context::RequestContext`].

pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod mapper;
pub mod model;
pub mod repo;

pub use context::{CancelHandle, RequestContext};
pub use error::{EntityKind, ErrorCode, RepoError};
pub use repo::{FacilityRepository, ItemRepository, PipelineRepository, Repositories};
