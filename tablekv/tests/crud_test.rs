mod common;

use common::*;
use tablekv::*;

#[tokio::test]
async fn create_then_find_by_primary_returns_the_record() {
    let db = mock_database();
    let users = db.table("users").unwrap();
    let created = users.create(CreateArgs::new(record! { "id" => "u1", "createdAt" => epoch(), "name" => "John" })).await.unwrap();

    let found = users.find_first(FindArgs::new(Where::new().eq("id", "u1"))).await.unwrap().unwrap();
    assert_eq!(found.value, created.value);
    assert_eq!(found.versionstamp, created.versionstamp);
    assert_eq!(found.versionstamp.to_string().len(), 20);
}

#[tokio::test]
async fn create_validates_input() {
    let db = mock_database();
    let users = db.table("users").unwrap();
    let err = users.create(CreateArgs::new(record! { "id" => "u1", "name" => 5 })).await.unwrap_err();
    let Error::Validation(validation) = err else { panic!("expected a validation error") };
    let fields: Vec<_> = validation.issues().iter().map(|i| i.field.as_str()).collect();
    assert_eq!(fields, vec!["createdAt", "name"]);
    assert!(users.find_many(FindArgs::all()).await.unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_primary_is_rejected_and_nothing_changes() {
    let db = mock_database();
    let users = db.table("users").unwrap();
    users.create(CreateArgs::new(record! { "id" => "u1", "createdAt" => epoch(), "name" => "John" })).await.unwrap();
    let err = users.create(CreateArgs::new(record! { "id" => "u1", "createdAt" => epoch(), "name" => "Impostor" })).await.unwrap_err();
    assert!(matches!(err, Error::CreateItem(_)));

    let all = users.find_many(FindArgs::all()).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].get("name"), Some(&Value::from("John")));
}

#[tokio::test]
async fn update_merges_patch_and_bumps_versionstamp() {
    let db = mock_database();
    populate(&db).await;
    let users = db.table("users").unwrap();
    let before = users.find_first(FindArgs::new(Where::new().eq("id", JOHN))).await.unwrap().unwrap();

    let updated = users.update(UpdateArgs::new(Where::new().eq("id", JOHN), record! { "name" => "Johnny" })).await.unwrap();
    assert_eq!(updated.get("name"), Some(&Value::from("Johnny")));
    assert_eq!(updated.get("createdAt"), before.get("createdAt"));
    assert!(updated.versionstamp > before.versionstamp);
}

#[tokio::test]
async fn update_pinned_to_a_versionstamp_succeeds_once() {
    let db = mock_database();
    let users = db.table("users").unwrap();
    users.create(CreateArgs::new(record! { "id" => "u1", "createdAt" => epoch(), "name" => "John" })).await.unwrap();
    let v1 = users.find_first(FindArgs::new(Where::new().eq("id", "u1"))).await.unwrap().unwrap().versionstamp;

    let jane = users.update(UpdateArgs::new(Where::new().eq("id", "u1").versionstamp(v1), record! { "name" => "Jane" })).await.unwrap();
    assert_eq!(jane.get("name"), Some(&Value::from("Jane")));
    assert_ne!(jane.versionstamp, v1);

    let again = users.update(UpdateArgs::new(Where::new().eq("id", "u1").versionstamp(v1), record! { "name" => "Joan" })).await;
    assert!(matches!(again, Err(Error::Update { .. })));
}

#[tokio::test]
async fn update_without_match_is_an_update_error() {
    let db = mock_database();
    let users = db.table("users").unwrap();
    let err = users.update(UpdateArgs::new(Where::new().eq("id", "ghost"), record! { "name" => "x" })).await.unwrap_err();
    assert!(matches!(err, Error::Update { conflict: false, .. }));
}

#[tokio::test]
async fn update_many_touches_every_match() {
    let db = mock_database();
    let posts = db.table("posts").unwrap();
    for (id, category) in [("p1", "Storage"), ("p2", "Storage"), ("p3", "Poetry")] {
        posts.create(CreateArgs::new(record! { "id" => id, "createdAt" => epoch(), "title" => id, "category" => category })).await.unwrap();
    }
    let updated = posts.update_many(UpdateArgs::new(Where::new().eq("category", "Storage"), record! { "category" => "Rust" })).await.unwrap();
    assert_eq!(updated.len(), 2);

    assert!(posts.find_many(FindArgs::new(Where::new().eq("category", "Storage"))).await.unwrap().is_empty());
    let rust = posts.find_many(FindArgs::new(Where::new().eq("category", "Rust"))).await.unwrap();
    assert_eq!(ids(&rust), vec!["p1", "p2"]);
}

#[tokio::test]
async fn delete_removes_the_record_and_its_index_copies() {
    let db = mock_database();
    populate(&db).await;
    let orders = db.table("orders").unwrap();
    let response = orders.delete(DeleteArgs::new(Where::new().eq("id", CHEESEBURGER))).await.unwrap();
    assert_eq!(response.deleted, 1);
    assert!(response.versionstamp.is_some());

    assert!(orders.find_many(FindArgs::new(Where::new().eq("userId", JOHN))).await.unwrap().is_empty());
    let prefix = Key::new(vec!["orders_by_userId".into()]);
    assert!(db.store().scan(&prefix).await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_of_nothing_is_not_an_error() {
    let db = mock_database();
    let users = db.table("users").unwrap();
    let response = users.delete(DeleteArgs::new(Where::new().eq("id", "ghost"))).await.unwrap();
    assert_eq!(response, DeleteResponse { deleted: 0, versionstamp: None });
}

#[tokio::test]
async fn unknown_table_is_reported() {
    let db = mock_database();
    assert!(matches!(db.table("comments"), Err(Error::UnknownTable(_))));
}
