mod common;

use common::*;
use tablekv::*;

fn titles(value: &Value) -> Vec<String> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item.as_object().unwrap().get("title").and_then(Value::as_str).unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn to_many_include_attaches_whole_records() {
    let db = mock_database();
    populate(&db).await;
    let user = db
        .table("users")
        .unwrap()
        .find_first(FindArgs::new(Where::new().eq("name", "John Doe")).include("myOrders", Include::All))
        .await
        .unwrap()
        .unwrap();

    let expected_order = record! { "id" => CHEESEBURGER, "createdAt" => epoch(), "userId" => JOHN, "name" => "Cheeseburger" };
    assert_eq!(
        user.value,
        record! { "id" => JOHN, "createdAt" => epoch(), "name" => "John Doe", "myOrders" => vec![Value::Object(expected_order)] }
    );
}

#[tokio::test]
async fn nested_select_narrows_included_records() {
    let db = mock_database();
    populate(&db).await;
    let user = db
        .table("users")
        .unwrap()
        .find_first(
            FindArgs::new(Where::new().eq("name", "John Doe")).include("myOrders", Include::Nested(IncludeQuery::default().select(["name"]))),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.get("myOrders"), Some(&Value::from(vec![Value::Object(record! { "name" => "Cheeseburger" })])));
}

#[tokio::test]
async fn to_many_without_matches_is_an_empty_array() {
    let db = mock_database();
    let users = db.table("users").unwrap();
    users.create(CreateArgs::new(record! { "id" => "f407a8f8", "createdAt" => epoch(), "name" => "Rick Regression" })).await.unwrap();
    let user = users.find_first(FindArgs::new(Where::new().eq("id", "f407a8f8")).include("myOrders", Include::All)).await.unwrap().unwrap();
    assert_eq!(user.get("myOrders"), Some(&Value::Array(vec![])));
}

#[tokio::test]
async fn to_one_include_attaches_record_or_null() {
    let db = mock_database();
    populate(&db).await;
    let order = db
        .table("orders")
        .unwrap()
        .find_first(FindArgs::new(Where::new().eq("id", CHEESEBURGER)).include("user", Include::All))
        .await
        .unwrap()
        .unwrap();
    let user = order.get("user").and_then(Value::as_object).unwrap();
    assert_eq!(user.get("name"), Some(&Value::from("John Doe")));

    let posts = db.table("posts").unwrap();
    posts.create(CreateArgs::new(record! { "id" => "p1", "createdAt" => epoch(), "title" => "Orphan" })).await.unwrap();
    let orphan = posts.find_first(FindArgs::new(Where::new().eq("id", "p1")).include("user", Include::All)).await.unwrap().unwrap();
    assert_eq!(orphan.get("user"), Some(&Value::Null));
}

#[tokio::test]
async fn many_to_many_through_array_fields() {
    let db = mock_database();
    populate(&db).await;
    let songs = db.table("songs").unwrap();
    let zonestic = songs.find_first(FindArgs::new(Where::new().eq("id", ZONESTIC)).include("playlists", Include::All)).await.unwrap().unwrap();
    assert_eq!(titles(zonestic.get("playlists").unwrap()), vec!["First songs on my feed", "Jammer"]);

    let playlist = db
        .table("playlists")
        .unwrap()
        .find_first(FindArgs::new(Where::new().eq("id", JAMMER)).include("songs", Include::All))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(titles(playlist.get("songs").unwrap()), vec!["Zonestic"]);
}

#[tokio::test]
async fn includes_nest_to_the_depth_of_the_query() {
    let db = mock_database();
    populate(&db).await;
    let nested = IncludeQuery::default().select(["name"]).include("user", Include::Nested(IncludeQuery::default().select(["name"])));
    let user = db
        .table("users")
        .unwrap()
        .find_first(FindArgs::new(Where::new().eq("id", JOHN)).include("myOrders", Include::Nested(nested)))
        .await
        .unwrap()
        .unwrap();
    let orders = user.get("myOrders").and_then(Value::as_array).unwrap();
    assert_eq!(
        orders[0],
        Value::Object(record! { "name" => "Cheeseburger", "user" => Value::Object(record! { "name" => "John Doe" }) })
    );
}

#[tokio::test]
async fn relations_survive_top_level_select() {
    let db = mock_database();
    populate(&db).await;
    let user = db
        .table("users")
        .unwrap()
        .find_first(FindArgs::new(Where::new().eq("id", JOHN)).select(["id"]).include("myOrders", Include::All))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.value.keys().collect::<Vec<_>>(), vec!["id", "myOrders"]);
}

#[tokio::test]
async fn unknown_relation_is_a_relation_error() {
    let db = mock_database();
    populate(&db).await;
    let err = db
        .table("users")
        .unwrap()
        .find_many(FindArgs::all().include("friends", Include::All))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Relation(_)));
}

#[tokio::test]
async fn relations_sharing_a_local_key_resolve_from_the_stored_record() {
    let mut tables = mock_tables();
    let songs = tables.remove("songs").unwrap().relation("zPlaylists", RelationDefinition::to_many("playlists", "playlists", "id"));
    tables.insert("songs".to_string(), songs);
    let db = Database::new(std::sync::Arc::new(MemoryStore::new()), tables).unwrap();
    populate(&db).await;

    let song = db
        .table("songs")
        .unwrap()
        .find_first(FindArgs::new(Where::new().eq("id", ZONESTIC)).include("playlists", Include::All).include("zPlaylists", Include::All))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(titles(song.get("playlists").unwrap()), vec!["First songs on my feed", "Jammer"]);
    assert_eq!(titles(song.get("zPlaylists").unwrap()), vec!["First songs on my feed", "Jammer"]);
}
