#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tablekv::*;

pub const JOHN: &str = "67218087-d9a8-4a57-b058-adc01f179ff9";
pub const CHEESEBURGER: &str = "aaa62b91-a021-41c3-a2ce-ef079859d59c";
pub const ZONESTIC: &str = "aaa62b91-a021-41c3-a2ce-ef079859d5aa";
pub const SUPERSTAR: &str = "aaa62b91-a021-41c3-a2ce-ef079859d5bb";
pub const FIRST_SONGS: &str = "aaa62b91-a021-41c3-a2ce-ef079859d5cc";
pub const JAMMER: &str = "aaa62b91-a021-41c3-a2ce-ef079859d5dd";

pub fn epoch() -> DateTime<Utc> {
    Utc.timestamp_millis_opt(0).unwrap()
}

pub fn random_id() -> String {
    format!("{:032x}", rand::random::<u128>())
}

pub fn user_schema() -> Schema {
    Schema::new(vec![Field::string("id").describe("primary"), Field::timestamp("createdAt"), Field::string("name")])
}

pub fn mock_tables() -> BTreeMap<String, TableDefinition> {
    let users = TableDefinition::new(user_schema())
        .relation("myOrders", RelationDefinition::to_many("orders", "id", "userId"))
        .relation("myPosts", RelationDefinition::to_many("posts", "id", "userId"));
    let orders = TableDefinition::new(Schema::new(vec![
        Field::string("id").describe("primary"),
        Field::timestamp("createdAt"),
        Field::string("name"),
        Field::string("userId").describe("index"),
    ]))
    .relation("user", RelationDefinition::to_one("users", "userId", "id"));
    let posts = TableDefinition::new(Schema::new(vec![
        Field::string("id").describe("primary"),
        Field::timestamp("createdAt"),
        Field::string("title"),
        Field::string("category").describe("index").optional(),
        Field::string("userId").optional(),
    ]))
    .relation("user", RelationDefinition::to_one("users", "userId", "id"));
    let songs = TableDefinition::new(Schema::new(vec![
        Field::string("id").describe("primary"),
        Field::timestamp("createdAt"),
        Field::array("playlists", FieldType::String),
        Field::string("title"),
    ]))
    .relation("playlists", RelationDefinition::to_many("playlists", "playlists", "id"));
    let playlists = TableDefinition::new(Schema::new(vec![
        Field::string("id").describe("primary"),
        Field::timestamp("createdAt"),
        Field::array("songs", FieldType::String),
        Field::string("title"),
    ]))
    .relation("songs", RelationDefinition::to_many("songs", "songs", "id"));

    BTreeMap::from([
        ("users".to_string(), users),
        ("orders".to_string(), orders),
        ("posts".to_string(), posts),
        ("songs".to_string(), songs),
        ("playlists".to_string(), playlists),
    ])
}

pub fn mock_database() -> Database<MemoryStore> {
    Database::new(Arc::new(MemoryStore::new()), mock_tables()).unwrap()
}

pub async fn populate<S: KvStore>(db: &Database<S>) {
    db.table("users")
        .unwrap()
        .create(CreateArgs::new(record! { "id" => JOHN, "createdAt" => epoch(), "name" => "John Doe" }))
        .await
        .unwrap();
    db.table("orders")
        .unwrap()
        .create(CreateArgs::new(record! { "id" => CHEESEBURGER, "createdAt" => epoch(), "userId" => JOHN, "name" => "Cheeseburger" }))
        .await
        .unwrap();

    let songs = db.table("songs").unwrap();
    songs
        .create(CreateArgs::new(record! { "id" => ZONESTIC, "createdAt" => epoch(), "playlists" => vec![FIRST_SONGS, JAMMER], "title" => "Zonestic" }))
        .await
        .unwrap();
    songs
        .create(CreateArgs::new(record! { "id" => SUPERSTAR, "createdAt" => epoch(), "playlists" => vec![FIRST_SONGS], "title" => "Superstar" }))
        .await
        .unwrap();

    let playlists = db.table("playlists").unwrap();
    playlists
        .create(CreateArgs::new(record! { "id" => FIRST_SONGS, "createdAt" => epoch(), "songs" => vec![ZONESTIC, SUPERSTAR], "title" => "First songs on my feed" }))
        .await
        .unwrap();
    playlists
        .create(CreateArgs::new(record! { "id" => JAMMER, "createdAt" => epoch(), "songs" => vec![ZONESTIC], "title" => "Jammer" }))
        .await
        .unwrap();
}

pub fn ids(documents: &[Document]) -> Vec<String> {
    documents.iter().filter_map(|d| d.get("id").and_then(Value::as_str).map(str::to_string)).collect()
}
