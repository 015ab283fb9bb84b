#![allow(missing_docs)]

use jsonapi_query::config::QueryConfig;
use jsonapi_query::document::links::pagination_links;
use jsonapi_query::document::{Document, DocumentAssembler, LinkagePolicy};
use jsonapi_query::query::{
    InMemoryMetadata, OperatorRegistry, QuerySpecBuilder, QuerySpecification, RelationshipMeta,
};
use jsonapi_query::repository::memory::{MemoryStore, StoredRef};
use jsonapi_query::repository::Repository;
use serde_json::{json, Value as Json};
use url::Url;

fn metadata() -> InMemoryMetadata {
    InMemoryMetadata::new()
        .with_type("articles", ["title", "year"])
        .with_type("authors", ["name"])
        .with_type("tags", ["label"])
        .with_relationship("articles", "author", RelationshipMeta::to_one("authors"))
        .with_relationship("articles", "tags", RelationshipMeta::to_many("tags"))
        .with_relationship("authors", "articles", RelationshipMeta::to_many("articles"))
}

fn store(meta: &InMemoryMetadata) -> MemoryStore {
    MemoryStore::from_value(
        json!({
            "articles": [
                {"id": "1", "attributes": {"title": "Dune", "year": 1965},
                 "relationships": {"author": "a1", "tags": ["t1", "t2"]}},
                {"id": "2", "attributes": {"title": "Dune Messiah", "year": 1969},
                 "relationships": {"author": "a1", "tags": ["t2"]}},
                {"id": "3", "attributes": {"title": "Hyperion", "year": 1989},
                 "relationships": {"author": "a2"}}
            ],
            "authors": [
                {"id": "a1", "attributes": {"name": "Frank Herbert"},
                 "relationships": {"articles": ["1", "2"]}},
                {"id": "a2", "attributes": {"name": "Dan Simmons"},
                 "relationships": {"articles": ["3"]}}
            ],
            "tags": [
                {"id": "t1", "attributes": {"label": "classic"}},
                {"id": "t2", "attributes": {"label": "desert"}}
            ]
        }),
        meta,
    )
    .expect("fixture loads")
}

fn spec_for(meta: &InMemoryMetadata, query: &str) -> QuerySpecification {
    let operators = OperatorRegistry::with_builtins();
    let config = QueryConfig::default();
    QuerySpecBuilder::new(meta, &operators, &config)
        .build_from_query_string("articles", query)
        .expect("valid query")
}

fn render_one(meta: &InMemoryMetadata, store: &MemoryStore, id: &str, query: &str) -> Document {
    let spec = spec_for(meta, query);
    let primary = store.find_one("articles", id, &spec).expect("lookup");
    DocumentAssembler::<StoredRef>::new(meta, store, store)
        .assemble_one(&spec, primary.as_ref())
        .expect("assembles")
}

fn render_collection(
    meta: &InMemoryMetadata,
    store: &MemoryStore,
    query: &str,
    linkage: LinkagePolicy,
) -> Document {
    let spec = spec_for(meta, query);
    let slice = store.find_collection("articles", &spec).expect("query");
    DocumentAssembler::<StoredRef>::new(meta, store, store)
        .with_linkage(linkage)
        .assemble_collection(&spec, &slice.items)
        .expect("assembles")
        .with_meta("total", slice.total)
}

#[test]
fn article_with_author_and_tags() {
    let meta = metadata();
    let store = store(&meta);
    let doc = render_one(&meta, &store, "1", "include=author,tags").to_json();

    assert_eq!(doc["data"]["type"], "articles");
    assert_eq!(doc["data"]["id"], "1");
    assert_eq!(
        doc["data"]["relationships"]["author"]["data"],
        json!({"type": "authors", "id": "a1"})
    );
    assert_eq!(
        doc["data"]["relationships"]["tags"]["data"],
        json!([{"type": "tags", "id": "t1"}, {"type": "tags", "id": "t2"}])
    );
    let included = doc["included"].as_array().expect("included array");
    assert_eq!(included.len(), 3);
    assert!(included
        .iter()
        .any(|node| node["type"] == "authors" && node["attributes"]["name"] == "Frank Herbert"));
}

#[test]
fn primary_resources_never_appear_in_included() {
    let meta = metadata();
    let store = store(&meta);
    let doc = render_collection(
        &meta,
        &store,
        "include=author.articles",
        LinkagePolicy::WhenIncluded,
    );
    let primary: Vec<(String, String)> = doc
        .data
        .nodes()
        .iter()
        .map(|node| (node.resource_type.clone(), node.id.clone()))
        .collect();
    assert_eq!(primary.len(), 3);
    for node in &doc.included {
        assert!(!primary.contains(&(node.resource_type.clone(), node.id.clone())));
    }
    let mut seen: Vec<(String, String)> = doc
        .included
        .iter()
        .map(|node| (node.resource_type.clone(), node.id.clone()))
        .collect();
    let before = seen.len();
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), before);
    assert_eq!(before, 2);
}

#[test]
fn sparse_fields_limit_attributes_and_relationships() {
    let meta = metadata();
    let store = store(&meta);
    let doc = render_one(&meta, &store, "1", "fields[articles]=title&include=author").to_json();
    assert_eq!(doc["data"]["attributes"], json!({"title": "Dune"}));
    assert!(doc["data"].get("relationships").is_none());
    assert_eq!(doc["included"][0]["type"], "authors");
}

#[test]
fn linkage_policy_controls_relationship_data() {
    let meta = metadata();
    let store = store(&meta);

    let never = render_collection(&meta, &store, "include=author", LinkagePolicy::Never).to_json();
    assert!(never["data"][0].get("relationships").is_none());
    assert_eq!(never["included"].as_array().map(Vec::len), Some(2));

    let always = render_collection(&meta, &store, "", LinkagePolicy::Always).to_json();
    assert_eq!(
        always["data"][0]["relationships"]["author"]["data"],
        json!({"type": "authors", "id": "a1"})
    );
    assert!(always.get("included").is_none());
}

#[test]
fn missing_single_resource_renders_null() {
    let meta = metadata();
    let store = store(&meta);
    let doc = render_one(&meta, &store, "404", "include=author").to_json();
    assert_eq!(doc["data"], Json::Null);
    assert!(doc.get("included").is_none());
}

#[test]
fn filtered_sorted_page_with_links() {
    let meta = metadata();
    let store = store(&meta);
    let query = "filter[year][gte]=1965&sort=-year&page[number]=1&page[size]=2";
    let spec = spec_for(&meta, query);
    let doc = render_collection(&meta, &store, query, LinkagePolicy::WhenIncluded);
    let base = Url::parse(&format!("https://api.test/articles?{query}")).expect("url");
    let doc = doc.with_links(pagination_links(&base, &spec.page, 3)).to_json();

    let ids: Vec<&str> = doc["data"]
        .as_array()
        .expect("collection")
        .iter()
        .filter_map(|node| node["id"].as_str())
        .collect();
    assert_eq!(ids, vec!["3", "2"]);
    assert_eq!(doc["meta"]["total"], 3);
    assert!(doc["links"]["next"]
        .as_str()
        .is_some_and(|link| link.contains("page%5Bnumber%5D=2")));
    assert!(doc["links"].get("prev").is_none());
}
