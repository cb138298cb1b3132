#![allow(dead_code)]

use fasim_core::model::{Facility, Item, NodeId, Pipeline};
use fasim_core::{FacilityRepository, ItemRepository, Repositories, RequestContext};
use rusqlite::Connection;

pub fn store() -> Connection {
    fasim_core::db::open_in_memory().expect("in-memory store")
}

pub fn ctx() -> RequestContext {
    RequestContext::background()
}

pub fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get(0)
    })
    .expect("count rows")
}

pub fn create_item(repos: &Repositories<'_>, name: &str) -> Item {
    let mut item = Item::new(name);
    repos.items.create(&ctx(), &mut item).expect("create item");
    item
}

/// Stored facilities `F1..=Fn`, each turning ore into plate.
pub fn seed_facilities(repos: &Repositories<'_>, n: usize) -> Vec<Facility> {
    let ore = create_item(repos, "Ore");
    let plate = create_item(repos, "Plate");

    (1..=n)
        .map(|i| {
            let mut facility = Facility::new(format!("F{i}"), 10)
                .with_input(ore.clone(), 2)
                .with_output(plate.clone(), 1);
            repos
                .facilities
                .create(&ctx(), &mut facility)
                .expect("create facility");
            facility
        })
        .collect()
}

/// Node ids in ascending order with each node's successors written as
/// ranks into that order, plus the facility name per rank.
///
/// Two graphs with the same shape compare equal regardless of the concrete
/// ids they use.
pub fn shape(pipeline: &Pipeline) -> Vec<(String, Vec<usize>)> {
    let rank = |id: &NodeId| {
        pipeline
            .nodes
            .keys()
            .position(|k| k == id)
            .expect("successor names a node of the pipeline")
    };

    pipeline
        .nodes
        .values()
        .map(|node| {
            (
                node.facility.name.clone(),
                node.next_node_ids.iter().map(rank).collect(),
            )
        })
        .collect()
}
