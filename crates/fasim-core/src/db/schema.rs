//! Canonical SQLite schema for the fasim catalog.
//!
//! - `items`, `facilities` and `pipelines` hold the scalar fields of each
//!   entity plus audit timestamps
//! - `input_requirements` / `output_definitions` are the facility relation
//!   tables, ordered by `position`
//! - `pipeline_nodes` and `pipeline_node_edges` hold the flattened graph
//! - `store_meta` mirrors the schema version
//!
//! Foreign keys never cascade. Dependent rows are removed explicitly by the
//! repositories so a delete of a still-referenced entity fails loudly.

/// Migration v1: catalog tables, graph tables and store metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE CHECK (length(trim(name)) > 0),
    description TEXT,
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS facilities (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL CHECK (length(trim(name)) > 0),
    description TEXT,
    processing_time INTEGER NOT NULL CHECK (processing_time >= 0),
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS input_requirements (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    facility_id INTEGER NOT NULL REFERENCES facilities(id),
    item_id INTEGER NOT NULL REFERENCES items(id),
    quantity INTEGER NOT NULL CHECK (quantity > 0),
    position INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS output_definitions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    facility_id INTEGER NOT NULL REFERENCES facilities(id),
    item_id INTEGER NOT NULL REFERENCES items(id),
    quantity INTEGER NOT NULL CHECK (quantity > 0),
    position INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS pipelines (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE CHECK (length(trim(name)) > 0),
    description TEXT,
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS pipeline_nodes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    pipeline_id INTEGER NOT NULL REFERENCES pipelines(id),
    facility_id INTEGER NOT NULL REFERENCES facilities(id)
);

CREATE TABLE IF NOT EXISTS pipeline_node_edges (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_node_id INTEGER NOT NULL REFERENCES pipeline_nodes(id),
    target_node_id INTEGER NOT NULL REFERENCES pipeline_nodes(id)
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL
);

INSERT OR IGNORE INTO store_meta (id, schema_version) VALUES (1, 0);

CREATE INDEX IF NOT EXISTS idx_input_requirements_facility
    ON input_requirements(facility_id, position);

CREATE INDEX IF NOT EXISTS idx_input_requirements_item
    ON input_requirements(item_id);

CREATE INDEX IF NOT EXISTS idx_output_definitions_facility
    ON output_definitions(facility_id, position);

CREATE INDEX IF NOT EXISTS idx_output_definitions_item
    ON output_definitions(item_id);

CREATE INDEX IF NOT EXISTS idx_pipeline_nodes_pipeline
    ON pipeline_nodes(pipeline_id);

CREATE INDEX IF NOT EXISTS idx_pipeline_nodes_facility
    ON pipeline_nodes(facility_id);

CREATE INDEX IF NOT EXISTS idx_pipeline_node_edges_source
    ON pipeline_node_edges(source_node_id);

CREATE INDEX IF NOT EXISTS idx_pipeline_node_edges_target
    ON pipeline_node_edges(target_node_id);
";

/// Indexes the relation loaders and restrict-on-delete checks depend on.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_input_requirements_facility",
    "idx_input_requirements_item",
    "idx_output_definitions_facility",
    "idx_output_definitions_item",
    "idx_pipeline_nodes_pipeline",
    "idx_pipeline_nodes_facility",
    "idx_pipeline_node_edges_source",
    "idx_pipeline_node_edges_target",
];
