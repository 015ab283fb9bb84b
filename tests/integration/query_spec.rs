#![allow(missing_docs)]

use jsonapi_query::config::QueryConfig;
use jsonapi_query::document::ErrorDocument;
use jsonapi_query::query::{
    Comparison, FilterNode, InMemoryMetadata, OperatorRegistry, QueryError, QueryParams,
    QuerySpecBuilder, QuerySpecification, RelationshipMeta, SortKey, ValidationError, Value,
};
use serde_json::json;

fn metadata() -> InMemoryMetadata {
    InMemoryMetadata::new()
        .with_type("articles", ["title", "year", "body"])
        .with_type("authors", ["name"])
        .with_type("tags", ["label"])
        .with_type("comments", ["text"])
        .with_relationship("articles", "author", RelationshipMeta::to_one("authors"))
        .with_relationship("articles", "tags", RelationshipMeta::to_many("tags"))
        .with_relationship("articles", "comments", RelationshipMeta::to_many("comments"))
        .with_relationship("authors", "articles", RelationshipMeta::to_many("articles"))
        .with_relationship("comments", "author", RelationshipMeta::to_one("authors"))
}

fn build_with(config: &QueryConfig, query: &str) -> Result<QuerySpecification, QueryError> {
    let meta = metadata();
    let operators = OperatorRegistry::with_builtins();
    QuerySpecBuilder::new(&meta, &operators, config).build_from_query_string("articles", query)
}

fn build(query: &str) -> Result<QuerySpecification, QueryError> {
    build_with(&QueryConfig::default(), query)
}

fn codes(err: &QueryError) -> Vec<&'static str> {
    err.validation_errors().iter().map(|e| e.code()).collect()
}

#[test]
fn resolves_filter_sort_and_page() {
    let spec = build("filter[year][gte]=1965&sort=-year,title&page[number]=2&page[size]=5")
        .expect("valid query");
    assert_eq!(
        spec.filter,
        Some(FilterNode::Comparison(Comparison {
            field: "year".into(),
            operator: "gte".into(),
            values: vec![Value::from("1965")],
        }))
    );
    assert_eq!(spec.sort, vec![SortKey::desc("year"), SortKey::asc("title")]);
    assert_eq!(spec.page.number, 2);
    assert_eq!(spec.page.size, 5);
    assert_eq!(spec.page.offset(), 5);
}

#[test]
fn defaults_apply_without_parameters() {
    let spec = build("").expect("empty query is valid");
    assert!(spec.filter.is_none());
    assert!(spec.sort.is_empty());
    assert_eq!(spec.page.number, 1);
    assert_eq!(spec.page.size, 20);
    assert!(spec.fields.is_empty());
    assert!(spec.include.is_empty());
    assert_eq!(spec.complexity.total, 0);
}

#[test]
fn oversized_page_is_clamped() {
    let spec = build("page[size]=1000").expect("clamped, not rejected");
    assert_eq!(spec.page.size, 100);
}

#[test]
fn page_number_zero_is_rejected() {
    let err = build("page[number]=0").unwrap_err();
    assert_eq!(codes(&err), vec!["InvalidPageNumber"]);
    let doc = ErrorDocument::from(&err).to_json();
    assert_eq!(doc["errors"][0]["source"], json!({"parameter": "page[number]"}));
}

#[test]
fn include_deeper_than_limit_is_rejected() {
    let err = build("include=author.articles.author.articles").unwrap_err();
    assert!(matches!(
        err.validation_errors(),
        [ValidationError::IncludeTooDeep { depth: 4, max: 3, .. }]
    ));
}

#[test]
fn unknown_include_segment_names_the_segment() {
    let err = build("include=author.publisher").unwrap_err();
    match err.validation_errors() {
        [ValidationError::UnknownRelationship {
            segment,
            resource_type,
            ..
        }] => {
            assert_eq!(segment, "publisher");
            assert_eq!(resource_type, "authors");
        }
        other => panic!("unexpected errors: {other:?}"),
    }
    assert_eq!(codes(&err), vec!["InvalidIncludePath"]);
}

#[test]
fn include_paths_share_prefixes() {
    let spec = build("include=comments.author,author,comments").expect("valid includes");
    let mut leaves: Vec<String> = spec
        .include
        .leaf_paths()
        .iter()
        .map(ToString::to_string)
        .collect();
    leaves.sort();
    assert_eq!(leaves, vec!["author", "comments.author"]);
    assert!(spec
        .include
        .child("comments")
        .is_some_and(|tree| tree.contains("author")));
}

#[test]
fn sparse_fieldset_is_recorded_per_type() {
    let spec = build("fields[articles]=title&fields[authors]=name").expect("valid fields");
    let articles: Vec<&str> = spec
        .fields
        .get("articles")
        .expect("articles fieldset")
        .iter()
        .map(String::as_str)
        .collect();
    assert_eq!(articles, vec!["title"]);
    assert!(spec.fields.allows("authors", "name"));
    assert!(!spec.fields.allows("articles", "year"));
}

#[test]
fn independent_errors_are_collected_in_order() {
    let err = build("fields[articles]=rating&sort=body.length&page[number]=-1&include=editor")
        .unwrap_err();
    assert_eq!(
        codes(&err),
        vec![
            "UnknownField",
            "UnsupportedSortField",
            "InvalidPageNumber",
            "InvalidIncludePath"
        ]
    );
}

#[test]
fn malformed_parameters_are_reported() {
    let err = build("page[size]=ten").unwrap_err();
    assert_eq!(codes(&err), vec!["MalformedParameter"]);
    assert_eq!(err.validation_errors()[0].parameter(), "page[size]");
}

#[test]
fn unknown_filter_field_is_rejected() {
    let err = build("filter[rating][gt]=3").unwrap_err();
    assert_eq!(codes(&err), vec!["UnknownFilterField"]);
}

#[test]
fn unknown_operator_on_attribute_is_named() {
    let err = build("filter[year][approx]=2").unwrap_err();
    assert_eq!(
        err.validation_errors(),
        &[ValidationError::UnknownOperator {
            field: "year".into(),
            operator: "approx".into(),
        }]
    );
    let err = build("filter[author][name][near]=Frank").unwrap_err();
    assert_eq!(codes(&err), vec!["UnknownOperator"]);
}

#[test]
fn filter_may_follow_relationships() {
    let spec = build("filter[author.name]=Frank").expect("relationship path");
    assert_eq!(spec.filter.expect("filter").fields(), vec!["author.name"]);
}

#[test]
fn or_groups_build_disjunctions() {
    let spec = build("filter[or][0][year]=1965&filter[or][1][title][like]=Dune%25")
        .expect("valid disjunction");
    match spec.filter {
        Some(FilterNode::Disjunction { children }) => assert_eq!(children.len(), 2),
        other => panic!("expected disjunction, got {other:?}"),
    }
}

#[test]
fn complexity_budget_is_enforced() {
    let mut config = QueryConfig::default();
    config.limits.complexity_budget = 3;
    let spec = build_with(&config, "include=author&fields[articles]=title,year")
        .expect("score equals budget");
    assert_eq!(spec.complexity.total, 3);

    let err = build_with(&config, "include=comments.author&fields[articles]=title,year")
        .unwrap_err();
    assert_eq!(
        err,
        QueryError::ComplexityBudgetExceeded {
            score: 4,
            budget: 3
        }
    );
}

#[test]
fn programmatic_params_match_query_string() {
    let meta = metadata();
    let operators = OperatorRegistry::with_builtins();
    let config = QueryConfig::default();
    let builder = QuerySpecBuilder::new(&meta, &operators, &config);
    let params = QueryParams::new()
        .with_filter(json!({"year": {"gte": "1965"}}))
        .with_sort("-year")
        .with_page_size(5)
        .with_fields("articles", ["title"])
        .with_include("author");
    let from_params = builder.build("articles", &params).expect("valid params");
    let from_query = builder
        .build_from_query_string(
            "articles",
            "filter[year][gte]=1965&sort=-year&page[size]=5&fields[articles]=title&include=author",
        )
        .expect("valid query");
    assert_eq!(from_params, from_query);
}
