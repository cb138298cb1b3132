mod common;

use common::{count, create_item, ctx, seed_facilities, store};
use fasim_core::model::{Facility, FacilityId, Pipeline};
use fasim_core::{RepoError, Repositories, RequestContext};

#[test]
fn source_and_sink_facilities_round_trip() {
    let conn = store();
    let repos = Repositories::sqlite(&conn);
    let ore = create_item(&repos, "Ore");

    let mut mine = Facility::new("Mine", 12).with_output(ore.clone(), 3);
    let mut dock = Facility::new("Dock", 0)
        .with_description("terminal sink")
        .with_input(ore, 10);
    repos.facilities.create(&ctx(), &mut mine).expect("mine");
    repos.facilities.create(&ctx(), &mut dock).expect("dock");

    let listed = repos.facilities.list(&ctx()).expect("list");
    assert_eq!(listed, vec![mine.clone(), dock.clone()]);
    assert!(listed[0].input_requirements.is_empty());
    assert!(listed[1].output_definitions.is_empty());
}

#[test]
fn update_rewrites_relations() {
    let conn = store();
    let repos = Repositories::sqlite(&conn);
    let ore = create_item(&repos, "Ore");
    let coal = create_item(&repos, "Coal");
    let plate = create_item(&repos, "Plate");

    let mut smelter = Facility::new("Smelter", 30)
        .with_input(ore.clone(), 2)
        .with_output(plate.clone(), 1);
    repos.facilities.create(&ctx(), &mut smelter).expect("create");
    let id = smelter.id.expect("id");

    let mut upgraded = Facility::new("Blast Furnace", 20)
        .with_input(coal, 1)
        .with_input(ore, 4)
        .with_output(plate, 3);
    upgraded.id = Some(id);
    repos
        .facilities
        .update(&ctx(), &mut upgraded)
        .expect("update");

    let loaded = repos
        .facilities
        .get(&ctx(), id)
        .expect("get")
        .expect("present");
    assert_eq!(loaded, upgraded);
    assert_eq!(loaded.input_requirements.len(), 2);
    assert_eq!(loaded.input_requirements[0].item.name, "Coal");
    assert_eq!(count(&conn, "input_requirements"), 2);
    assert_eq!(count(&conn, "output_definitions"), 1);
}

#[test]
fn absent_facility_is_not_found_on_update_and_delete() {
    let conn = store();
    let repos = Repositories::sqlite(&conn);

    assert!(
        repos
            .facilities
            .get(&ctx(), FacilityId::new(3))
            .expect("get")
            .is_none()
    );

    let mut ghost = Facility::new("Ghost", 1);
    ghost.id = Some(FacilityId::new(3));
    assert!(
        repos
            .facilities
            .update(&ctx(), &mut ghost)
            .expect_err("update")
            .is_not_found()
    );
    assert!(
        repos
            .facilities
            .delete(&ctx(), FacilityId::new(3))
            .expect_err("delete")
            .is_not_found()
    );
}

#[test]
fn facility_used_by_a_pipeline_cannot_be_deleted() {
    let conn = store();
    let repos = Repositories::sqlite(&conn);
    let facilities = seed_facilities(&repos, 1);

    let mut line = Pipeline::new("Line").with_node(1, facilities[0].clone(), []);
    repos.pipelines.create(&ctx(), &mut line).expect("pipeline");

    let err = repos
        .facilities
        .delete(&ctx(), facilities[0].id.expect("id"))
        .expect_err("in use");
    assert!(matches!(err, RepoError::ConstraintViolation { .. }));
    assert_eq!(count(&conn, "facilities"), 1);
    assert_eq!(count(&conn, "input_requirements"), 1);
}

#[test]
fn pipeline_sees_facility_updates() {
    let conn = store();
    let repos = Repositories::sqlite(&conn);
    let facilities = seed_facilities(&repos, 1);

    let mut line = Pipeline::new("Line").with_node(1, facilities[0].clone(), []);
    repos.pipelines.create(&ctx(), &mut line).expect("pipeline");

    let mut faster = facilities[0].clone();
    faster.processing_time = 4;
    repos.facilities.update(&ctx(), &mut faster).expect("update");

    let loaded = repos
        .pipelines
        .get(&ctx(), line.id.expect("id"))
        .expect("get")
        .expect("present");
    let node = loaded.nodes.values().next().expect("node");
    assert_eq!(node.facility.processing_time, 4);
}

#[test]
fn cancelled_update_keeps_old_relations() {
    let conn = store();
    let repos = Repositories::sqlite(&conn);
    let facilities = seed_facilities(&repos, 1);

    let cancelled = RequestContext::background();
    cancelled.cancel_handle().cancel();

    let mut stripped = facilities[0].clone();
    stripped.input_requirements.clear();
    let err = repos
        .facilities
        .update(&cancelled, &mut stripped)
        .expect_err("cancelled");
    assert!(matches!(err, RepoError::Cancelled));

    let loaded = repos
        .facilities
        .get(&ctx(), facilities[0].id.expect("id"))
        .expect("get")
        .expect("present");
    assert_eq!(loaded, facilities[0]);
}
