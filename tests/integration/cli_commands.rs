#![allow(missing_docs)]

use std::fs;
use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::{json, Value};
use tempfile::TempDir;

const CONFIG: &str = r#"
[pagination]
default_size = 10
max_size = 100

[limits]
include_max_depth = 2

[resources.articles]
attributes = ["title", "year"]

[resources.articles.relationships]
author = { target = "authors" }
tags = { target = "tags", to_many = true }

[resources.authors]
attributes = ["name"]

[resources.tags]
attributes = ["label"]
"#;

const DATA: &str = r#"{
  "articles": [
    {"id": "1", "attributes": {"title": "Dune", "year": 1965},
     "relationships": {"author": "a1", "tags": ["t1", "t2"]}},
    {"id": "2", "attributes": {"title": "Hyperion", "year": 1989},
     "relationships": {"author": "a2", "tags": ["t2"]}}
  ],
  "authors": [
    {"id": "a1", "attributes": {"name": "Frank Herbert"}},
    {"id": "a2", "attributes": {"name": "Dan Simmons"}}
  ],
  "tags": [
    {"id": "t1", "attributes": {"label": "classic"}},
    {"id": "t2", "attributes": {"label": "space"}}
  ]
}"#;

struct Workspace {
    _dir: TempDir,
    config: PathBuf,
    data: PathBuf,
}

fn workspace() -> Workspace {
    let dir = TempDir::new().expect("tempdir");
    let config = dir.path().join("config.toml");
    let data = dir.path().join("data.json");
    fs::write(&config, CONFIG).expect("write config");
    fs::write(&data, DATA).expect("write data");
    Workspace {
        _dir: dir,
        config,
        data,
    }
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("valid json")
}

#[test]
fn inspect_prints_specification_json() {
    let ws = workspace();
    let output = cargo_bin_cmd!("jsonapi-query")
        .arg("--config")
        .arg(&ws.config)
        .args([
            "--format",
            "json",
            "inspect",
            "articles",
            "sort=-year&page[size]=1000&fields[articles]=title",
        ])
        .assert()
        .success()
        .get_output()
        .clone();
    let spec = stdout_json(&output);
    assert_eq!(spec["resource_type"], "articles");
    assert_eq!(spec["page"], json!({"number": 1, "size": 100}));
    assert_eq!(spec["sort"][0]["field"], "year");
    assert_eq!(spec["sort"][0]["descending"], true);
}

#[test]
fn inspect_text_output_is_human_readable() {
    let ws = workspace();
    let output = cargo_bin_cmd!("jsonapi-query")
        .env("JSONAPI_QUERY_CONFIG", &ws.config)
        .args(["inspect", "articles", "include=author,tags"])
        .assert()
        .success()
        .get_output()
        .clone();
    let text = String::from_utf8(output.stdout).expect("utf8");
    assert!(text.contains("type: articles"));
    assert!(text.contains("page: number=1 size=10"));
    assert!(text.contains("include: author,tags"));
}

#[test]
fn invalid_query_prints_error_document() {
    let ws = workspace();
    let output = cargo_bin_cmd!("jsonapi-query")
        .arg("--config")
        .arg(&ws.config)
        .args(["inspect", "articles", "page[number]=0&include=author.publisher"])
        .assert()
        .code(2)
        .get_output()
        .clone();
    let doc = stdout_json(&output);
    let codes: Vec<&str> = doc["errors"]
        .as_array()
        .expect("errors array")
        .iter()
        .filter_map(|err| err["code"].as_str())
        .collect();
    assert_eq!(codes, vec!["InvalidPageNumber", "InvalidIncludePath"]);
    assert_eq!(doc["errors"][1]["source"]["parameter"], "include");
}

#[test]
fn include_depth_is_limited_by_config() {
    let ws = workspace();
    let output = cargo_bin_cmd!("jsonapi-query")
        .arg("--config")
        .arg(&ws.config)
        .args(["inspect", "articles", "include=author.x.y"])
        .assert()
        .code(2)
        .get_output()
        .clone();
    let doc = stdout_json(&output);
    assert_eq!(doc["errors"][0]["code"], "IncludeTooDeep");
}

#[test]
fn render_single_resource_with_includes() {
    let ws = workspace();
    let output = cargo_bin_cmd!("jsonapi-query")
        .arg("--config")
        .arg(&ws.config)
        .args([
            "--format",
            "json",
            "render",
            "articles",
            "include=author,tags",
            "--id",
            "1",
            "--data",
        ])
        .arg(&ws.data)
        .assert()
        .success()
        .get_output()
        .clone();
    let doc = stdout_json(&output);
    assert_eq!(doc["data"]["id"], "1");
    assert_eq!(
        doc["data"]["relationships"]["author"]["data"],
        json!({"type": "authors", "id": "a1"})
    );
    assert_eq!(doc["included"].as_array().map(Vec::len), Some(3));
}

#[test]
fn render_collection_with_links_and_total() {
    let ws = workspace();
    let output = cargo_bin_cmd!("jsonapi-query")
        .arg("--config")
        .arg(&ws.config)
        .args([
            "--format",
            "json",
            "render",
            "articles",
            "sort=-year&page[size]=1&fields[articles]=title",
            "--base-url",
            "https://api.test/articles",
            "--data",
        ])
        .arg(&ws.data)
        .assert()
        .success()
        .get_output()
        .clone();
    let doc = stdout_json(&output);
    assert_eq!(doc["data"][0]["id"], "2");
    assert_eq!(doc["data"][0]["attributes"], json!({"title": "Hyperion"}));
    assert_eq!(doc["meta"]["total"], 2);
    assert!(doc["links"]["next"]
        .as_str()
        .is_some_and(|link| link.ends_with("page%5Bnumber%5D=2&page%5Bsize%5D=1")));
}

#[test]
fn render_text_output_summarises_the_document() {
    let ws = workspace();
    let output = cargo_bin_cmd!("jsonapi-query")
        .arg("--config")
        .arg(&ws.config)
        .args(["render", "articles", "include=tags", "--id", "1", "--data"])
        .arg(&ws.data)
        .assert()
        .success()
        .get_output()
        .clone();
    let text = String::from_utf8(output.stdout).expect("utf8");
    assert!(text.starts_with("articles/1 "));
    assert!(text.contains("  tags -> tags/t1, tags/t2"));
    assert!(text.contains("included: 2"));
    assert!(serde_json::from_str::<Value>(&text).is_err());
}

#[test]
fn render_declared_type_without_records_is_empty() {
    let ws = workspace();
    let data = ws.data.with_file_name("articles_only.json");
    fs::write(&data, r#"{"articles": []}"#).expect("write data");
    let output = cargo_bin_cmd!("jsonapi-query")
        .arg("--config")
        .arg(&ws.config)
        .args(["--format", "json", "render", "tags", "--data"])
        .arg(&data)
        .assert()
        .success()
        .get_output()
        .clone();
    let doc = stdout_json(&output);
    assert_eq!(doc["data"], json!([]));
    assert_eq!(doc["meta"]["total"], 0);
}

#[test]
fn missing_config_fails_with_message() {
    let ws = workspace();
    let absent = ws.config.with_file_name("absent.toml");
    let output = cargo_bin_cmd!("jsonapi-query")
        .arg("--config")
        .arg(&absent)
        .args(["inspect", "articles"])
        .assert()
        .code(1)
        .get_output()
        .clone();
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to read config"));
    assert!(output.stdout.is_empty());
}
