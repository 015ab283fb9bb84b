#![allow(missing_docs)]

use std::fs;

use jsonapi_query::config::QueryConfig;
use jsonapi_query::query::{
    InMemoryMetadata, OperatorRegistry, QuerySpecBuilder, QuerySpecification, RelationshipMeta,
};
use jsonapi_query::repository::memory::{MemoryStore, StoreError};
use jsonapi_query::repository::{ObjectReader, Repository};
use tempfile::TempDir;

const FIXTURE: &str = r#"{
  "books": [
    {"id": "1", "attributes": {"title": "Dune", "year": 1965, "subtitle": null}, "relationships": {"author": "fh"}},
    {"id": "2", "attributes": {"title": "Dune Messiah", "year": 1969}, "relationships": {"author": "fh"}},
    {"id": "3", "attributes": {"title": "Hyperion", "year": 1989, "subtitle": "Cantos I"}, "relationships": {"author": "ds"}},
    {"id": "4", "attributes": {"title": "Emma", "year": "1815"}, "relationships": {"author": "ja"}},
    {"id": "5", "attributes": {"title": "100% Pure"}}
  ],
  "writers": [
    {"id": "fh", "attributes": {"name": "Frank Herbert"}},
    {"id": "ds", "attributes": {"name": "Dan Simmons"}},
    {"id": "ja", "attributes": {"name": "Jane Austen"}}
  ]
}"#;

fn metadata() -> InMemoryMetadata {
    InMemoryMetadata::new()
        .with_type("books", ["title", "year", "subtitle"])
        .with_type("writers", ["name"])
        .with_relationship("books", "author", RelationshipMeta::to_one("writers"))
}

fn load(dir: &TempDir) -> MemoryStore {
    let path = dir.path().join("books.json");
    fs::write(&path, FIXTURE).expect("write fixture");
    MemoryStore::from_path(&path, &metadata()).expect("fixture loads")
}

fn spec(query: &str) -> QuerySpecification {
    let meta = metadata();
    let operators = OperatorRegistry::with_builtins();
    let config = QueryConfig::default();
    QuerySpecBuilder::new(&meta, &operators, &config)
        .build_from_query_string("books", query)
        .expect("valid query")
}

fn ids(store: &MemoryStore, query: &str) -> Vec<String> {
    store
        .find_collection("books", &spec(query))
        .expect("query runs")
        .items
        .iter()
        .map(|book| store.identifier_of("books", book))
        .collect()
}

#[test]
fn loads_fixture_from_disk() {
    let dir = TempDir::new().expect("tempdir");
    let store = load(&dir);
    assert_eq!(store.len_of("books"), 5);
    assert_eq!(store.len_of("writers"), 3);
    assert!(store.get("writers", "ja").is_some());
}

#[test]
fn missing_file_is_a_read_error() {
    let dir = TempDir::new().expect("tempdir");
    let err = MemoryStore::from_path(&dir.path().join("absent.json"), &metadata()).unwrap_err();
    assert!(matches!(err, StoreError::Read { .. }));
}

#[test]
fn declared_type_without_records_is_empty() {
    let store = MemoryStore::from_json_str(r#"{"books": []}"#, &metadata()).expect("loads");
    assert_eq!(store.len_of("writers"), 0);
    let writers = QuerySpecBuilder::new(
        &metadata(),
        &OperatorRegistry::with_builtins(),
        &QueryConfig::default(),
    )
    .build_from_query_string("writers", "")
    .expect("valid query");
    let slice = store.find_collection("writers", &writers).expect("query runs");
    assert!(slice.items.is_empty());
    assert_eq!(slice.total, 0);
    assert!(store.find_one("writers", "fh", &writers).expect("lookup").is_none());
}

#[test]
fn to_many_relationship_rejects_a_scalar() {
    let meta = metadata().with_relationship("writers", "books", RelationshipMeta::to_many("books"));
    let err = MemoryStore::from_json_str(
        r#"{"writers": [{"id": "fh", "relationships": {"books": "1"}}]}"#,
        &meta,
    )
    .unwrap_err();
    assert!(matches!(err, StoreError::InvalidFixture(_)));
}

#[test]
fn undeclared_type_is_rejected() {
    let err = MemoryStore::from_json_str(r#"{"magazines": []}"#, &metadata()).unwrap_err();
    assert!(matches!(err, StoreError::InvalidFixture(_)));
}

#[test]
fn comparisons_coerce_numeric_strings() {
    let dir = TempDir::new().expect("tempdir");
    let store = load(&dir);
    assert_eq!(ids(&store, "filter[year][gte]=1965&filter[year][lt]=1980"), vec!["1", "2"]);
    assert_eq!(ids(&store, "filter[year][lt]=1900"), vec!["4"]);
}

#[test]
fn like_and_in_and_between() {
    let dir = TempDir::new().expect("tempdir");
    let store = load(&dir);
    assert_eq!(ids(&store, "filter[title][like]=Dune%25"), vec!["1", "2"]);
    assert_eq!(ids(&store, "filter[title][like]=100\\%25%25"), vec!["5"]);
    assert_eq!(ids(&store, "filter[id][in]=3,1"), vec!["1", "3"]);
    assert_eq!(ids(&store, "filter[year][between]=1960,1970"), vec!["1", "2"]);
}

#[test]
fn isnull_treats_absent_and_null_alike() {
    let dir = TempDir::new().expect("tempdir");
    let store = load(&dir);
    assert_eq!(ids(&store, "filter[subtitle][isnull]=false"), vec!["3"]);
    assert_eq!(ids(&store, "filter[subtitle][isnull]=true"), vec!["1", "2", "4", "5"]);
}

#[test]
fn filters_follow_relationship_paths() {
    let dir = TempDir::new().expect("tempdir");
    let store = load(&dir);
    assert_eq!(ids(&store, "filter[author.name]=Frank%20Herbert"), vec!["1", "2"]);
    assert_eq!(
        ids(&store, "filter[or][0][author.name]=Jane%20Austen&filter[or][1][year]=1989"),
        vec!["3", "4"]
    );
}

#[test]
fn sort_places_missing_values_first() {
    let dir = TempDir::new().expect("tempdir");
    let store = load(&dir);
    assert_eq!(ids(&store, "sort=subtitle"), vec!["1", "2", "4", "5", "3"]);
    assert_eq!(ids(&store, "sort=title"), vec!["5", "1", "2", "4", "3"]);
    assert_eq!(ids(&store, "sort=-id"), vec!["5", "4", "3", "2", "1"]);
}

#[test]
fn pagination_reports_total_matches() {
    let dir = TempDir::new().expect("tempdir");
    let store = load(&dir);
    let slice = store
        .find_collection("books", &spec("sort=id&page[number]=2&page[size]=2"))
        .expect("query runs");
    assert_eq!(slice.total, 5);
    let ids: Vec<String> = slice
        .items
        .iter()
        .map(|book| store.identifier_of("books", book))
        .collect();
    assert_eq!(ids, vec!["3", "4"]);

    let past_end = store
        .find_collection("books", &spec("page[number]=9&page[size]=2"))
        .expect("query runs");
    assert!(past_end.items.is_empty());
    assert_eq!(past_end.total, 5);
}

#[test]
fn find_one_checks_the_collection() {
    let dir = TempDir::new().expect("tempdir");
    let store = load(&dir);
    let spec = spec("");
    assert!(store.find_one("books", "3", &spec).expect("lookup").is_some());
    assert!(store.find_one("books", "33", &spec).expect("lookup").is_none());
    assert!(matches!(
        store.find_one("magazines", "1", &spec),
        Err(StoreError::UnknownResourceType(_))
    ));
}
