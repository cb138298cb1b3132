mod common;

use common::{count, create_item, ctx, store};
use fasim_core::model::{Facility, Item, ItemId};
use fasim_core::{EntityKind, ErrorCode, RepoError, Repositories};

#[test]
fn create_get_list_update_delete() {
    let conn = store();
    let repos = Repositories::sqlite(&conn);

    let mut ore = Item::new("Iron Ore").with_description("raw");
    repos.items.create(&ctx(), &mut ore).expect("create");
    let id = ore.id.expect("id");

    let loaded = repos.items.get(&ctx(), id).expect("get").expect("present");
    assert_eq!(loaded, ore);

    let mut renamed = loaded;
    renamed.name = "Hematite".to_string();
    renamed.description = None;
    repos.items.update(&ctx(), &renamed).expect("update");
    assert_eq!(repos.items.list(&ctx()).expect("list"), vec![renamed]);

    repos.items.delete(&ctx(), id).expect("delete");
    assert!(repos.items.get(&ctx(), id).expect("get").is_none());
}

#[test]
fn duplicate_item_name_is_rejected() {
    let conn = store();
    let repos = Repositories::sqlite(&conn);
    create_item(&repos, "Copper");

    let err = repos
        .items
        .create(&ctx(), &mut Item::new("Copper"))
        .expect_err("duplicate");
    assert_eq!(err.error_code(), ErrorCode::ConstraintViolation);
    assert_eq!(count(&conn, "items"), 1);
}

#[test]
fn update_and_delete_of_absent_item_are_not_found() {
    let conn = store();
    let repos = Repositories::sqlite(&conn);

    let mut ghost = Item::new("Ghost");
    ghost.id = Some(ItemId::new(9));
    let err = repos.items.update(&ctx(), &ghost).expect_err("absent");
    assert!(matches!(
        err,
        RepoError::NotFound {
            entity: EntityKind::Item,
            id: 9
        }
    ));

    let err = repos
        .items
        .delete(&ctx(), ItemId::new(9))
        .expect_err("absent");
    assert!(err.is_not_found());
}

#[test]
fn referenced_item_cannot_be_deleted() {
    let conn = store();
    let repos = Repositories::sqlite(&conn);
    let ore = create_item(&repos, "Ore");

    let mut mine = Facility::new("Mine", 5).with_output(ore.clone(), 1);
    repos.facilities.create(&ctx(), &mut mine).expect("facility");

    let err = repos
        .items
        .delete(&ctx(), ore.id.expect("id"))
        .expect_err("still referenced");
    assert!(matches!(err, RepoError::ConstraintViolation { .. }));
    assert_eq!(count(&conn, "items"), 1);

    repos
        .facilities
        .delete(&ctx(), mine.id.expect("id"))
        .expect("drop facility");
    repos
        .items
        .delete(&ctx(), ore.id.expect("id"))
        .expect("now unreferenced");
}
