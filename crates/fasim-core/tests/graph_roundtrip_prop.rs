//! Arbitrary pipeline graphs survive create + get up to relabeling.

mod common;

use common::{ctx, seed_facilities, shape, store};
use fasim_core::Repositories;
use fasim_core::model::Pipeline;
use proptest::prelude::*;

/// Distinct placeholder ids, a facility slot per node, and successor lists
/// as indices into the node list. Self-loops, duplicate edges, cycles and
/// disconnected parts all fall out of the unconstrained indices.
fn arb_graph() -> impl Strategy<Value = Vec<(i64, usize, Vec<usize>)>> {
    prop::collection::btree_set(-1_000_i64..1_000, 0..8).prop_flat_map(|ids| {
        let ids: Vec<i64> = ids.into_iter().collect();
        let n = ids.len();
        let successors = if n == 0 {
            Just(Vec::new()).boxed()
        } else {
            prop::collection::vec(prop::collection::vec(0..n, 0..4), n).boxed()
        };
        let slots = prop::collection::vec(0_usize..3, n);
        (Just(ids), slots, successors).prop_map(|(ids, slots, successors)| {
            ids.into_iter()
                .zip(slots)
                .zip(successors)
                .map(|((id, slot), next)| (id, slot, next))
                .collect()
        })
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn create_then_get_preserves_graph_shape(layout in arb_graph()) {
        let conn = store();
        let repos = Repositories::sqlite(&conn);
        let facilities = seed_facilities(&repos, 3);

        let ids: Vec<i64> = layout.iter().map(|(id, _, _)| *id).collect();
        let mut pipeline = Pipeline::new("Generated");
        for (id, slot, next) in &layout {
            pipeline = pipeline.with_node(
                *id,
                facilities[*slot].clone(),
                next.iter().map(|&target| ids[target]),
            );
        }
        let expected_edges = pipeline.edge_count();
        let expected_shape = shape(&pipeline);

        repos.pipelines.create(&ctx(), &mut pipeline).expect("create");
        let loaded = repos
            .pipelines
            .get(&ctx(), pipeline.id.expect("id"))
            .expect("get")
            .expect("present");

        prop_assert_eq!(loaded.nodes.len(), layout.len());
        prop_assert_eq!(loaded.edge_count(), expected_edges);
        prop_assert_eq!(shape(&loaded), expected_shape);
        prop_assert_eq!(&loaded, &pipeline);
    }
}
