// Copyright 2026 EduBase Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::Path;

use assert_cmd::Command;
use jsonschema::JSONSchema;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

fn edubase_cmd(db: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("edubase"));
    cmd.env("EDUBASE_DB", db);
    cmd
}

fn load_schema() -> JSONSchema {
    let schema_text = include_str!("../schemas/response.schema.json");
    let schema_json: Value = serde_json::from_str(schema_text).expect("schema json");
    JSONSchema::options()
        .compile(&schema_json)
        .expect("compile schema")
}

fn run_json(db: &Path, args: &[&str]) -> Value {
    let output = edubase_cmd(db).args(args).output().expect("run command");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout).expect("parse json")
}

fn assert_valid(schema: &JSONSchema, value: &Value) {
    let result = schema.validate(value);
    if let Err(errors) = result {
        let messages: Vec<String> = errors.map(|e| e.to_string()).collect();
        panic!("schema violations: {messages:?}\nvalue: {value}");
    }
}

fn material_ids(value: &Value) -> Vec<i64> {
    value["materials"]
        .as_array()
        .expect("materials array")
        .iter()
        .map(|m| m["id"].as_i64().expect("material id"))
        .collect()
}

fn seed_catalog(db: &Path) {
    edubase_cmd(db).arg("init").assert().success();
    run_json(
        db,
        &[
            "register",
            "--email",
            "alice@example.com",
            "--name",
            "Alice",
            "--json",
        ],
    );
    run_json(
        db,
        &[
            "register",
            "--email",
            "bob@example.com",
            "--name",
            "Bob",
            "--json",
        ],
    );
    run_json(
        db,
        &[
            "add",
            "--author",
            "1",
            "--title",
            "Osmosis Lecture",
            "--subject",
            "biology",
            "--grade",
            "9",
            "--type",
            "notes",
            "--file",
            "/uploads/osmosis.pdf,osmosis.pdf,1024,application/pdf",
            "--file",
            "/uploads/slides.pptx,slides.pptx",
            "--json",
        ],
    );
    run_json(
        db,
        &[
            "add",
            "--author",
            "2",
            "--title",
            "Pressure notes",
            "--subject",
            "biology",
            "--grade",
            "9",
            "--type",
            "notes",
            "--description",
            "Notes on osmotic pressure and diffusion across membranes in cells",
            "--json",
        ],
    );
    run_json(
        db,
        &[
            "add",
            "--author",
            "2",
            "--title",
            "Algebra Drills",
            "--subject",
            "math",
            "--grade",
            "7",
            "--type",
            "worksheet",
            "--json",
        ],
    );
}

#[test]
fn list_pages_validate_against_schema() {
    let temp = TempDir::new().expect("tempdir");
    let db = temp.path().join("edubase.db");
    let schema = load_schema();
    seed_catalog(&db);

    let page = run_json(&db, &["list", "--json"]);
    assert_valid(&schema, &page);
    assert_eq!(page["ok"], Value::Bool(true));
    assert_eq!(material_ids(&page), vec![3, 2, 1]);
    assert_eq!(page["query"]["sort"], "new");
    assert_eq!(page["query"]["limit"], 20);
    assert!(page.get("next_offset").is_none());

    // The first material carries the main file and one extra attachment.
    let osmosis = &page["materials"][2];
    assert_eq!(osmosis["file_url"], "/uploads/osmosis.pdf");
    assert_eq!(osmosis["author_name"], "Alice");
    let attachments = osmosis["attachments"].as_array().expect("attachments");
    assert_eq!(attachments.len(), 1);
    assert_eq!(attachments[0]["file_name"], "slides.pptx");
    assert_eq!(attachments[0]["is_main"], Value::Bool(true));
}

#[test]
fn text_search_ranks_by_relevance() {
    let temp = TempDir::new().expect("tempdir");
    let db = temp.path().join("edubase.db");
    let schema = load_schema();
    seed_catalog(&db);

    let page = run_json(&db, &["list", "osm", "--json"]);
    assert_valid(&schema, &page);
    // Title match outranks description match even though it is older.
    assert_eq!(material_ids(&page), vec![1, 2]);
    assert_eq!(page["query"]["match_expr"], "\"osm\"*");

    let page = run_json(&db, &["list", "osm", "--sort", "relevance", "--json"]);
    assert_eq!(material_ids(&page), vec![1, 2]);
}

#[test]
fn filters_conjoin_and_favorites_restrict() {
    let temp = TempDir::new().expect("tempdir");
    let db = temp.path().join("edubase.db");
    let schema = load_schema();
    seed_catalog(&db);

    let page = run_json(
        &db,
        &[
            "list", "--subject", "biology", "--grade", "9", "--type", "notes", "--json",
        ],
    );
    assert_eq!(material_ids(&page), vec![2, 1]);

    run_json(&db, &["favorite", "2", "--user", "1", "--json"]);
    let page = run_json(&db, &["list", "--favorites-of", "1", "--json"]);
    assert_valid(&schema, &page);
    assert_eq!(material_ids(&page), vec![2]);

    // Other filters still conjoin with the favorites restriction.
    let page = run_json(
        &db,
        &["list", "--favorites-of", "1", "--subject", "biology", "--json"],
    );
    assert_eq!(material_ids(&page), vec![2]);
    let page = run_json(
        &db,
        &["list", "--favorites-of", "1", "--subject", "math", "--json"],
    );
    assert_eq!(material_ids(&page), Vec::<i64>::new());

    run_json(&db, &["unfavorite", "2", "--user", "1", "--json"]);
    let page = run_json(&db, &["list", "--favorites-of", "1", "--json"]);
    assert_eq!(material_ids(&page), Vec::<i64>::new());
}

#[test]
fn counters_drive_popular_sort() {
    let temp = TempDir::new().expect("tempdir");
    let db = temp.path().join("edubase.db");
    seed_catalog(&db);

    run_json(&db, &["view", "3", "--json"]);
    run_json(&db, &["view", "3", "--json"]);
    let download = run_json(&db, &["download", "1", "--json"]);
    assert_eq!(download["material"]["file_url"], "/uploads/osmosis.pdf");

    // Downloads beat views; views break the zero-download tie.
    let page = run_json(&db, &["list", "--sort", "popular", "--json"]);
    assert_eq!(material_ids(&page), vec![1, 3, 2]);
}

#[test]
fn pagination_signals_more_with_a_full_page() {
    let temp = TempDir::new().expect("tempdir");
    let db = temp.path().join("edubase.db");
    seed_catalog(&db);

    let first = run_json(&db, &["list", "--limit", "2", "--json"]);
    assert_eq!(material_ids(&first), vec![3, 2]);
    assert_eq!(first["next_offset"], 2);

    let second = run_json(&db, &["list", "--limit", "2", "--offset", "2", "--json"]);
    assert_eq!(material_ids(&second), vec![1]);
    assert!(second.get("next_offset").is_none());
}

#[test]
fn abusive_parameters_degrade_to_defaults() {
    let temp = TempDir::new().expect("tempdir");
    let db = temp.path().join("edubase.db");
    let schema = load_schema();
    seed_catalog(&db);

    let page = run_json(
        &db,
        &[
            "list",
            "\"; DROP TABLE material; --",
            "--limit",
            "abc",
            "--offset=-5",
            "--sort",
            "wild",
            "--json",
        ],
    );
    assert_valid(&schema, &page);
    assert_eq!(page["ok"], Value::Bool(true));
    assert_eq!(page["query"]["limit"], 20);
    assert_eq!(page["query"]["offset"], 0);
    assert_eq!(page["query"]["sort"], "new");

    // The store is intact afterwards.
    let page = run_json(&db, &["list", "--json"]);
    assert_eq!(material_ids(&page).len(), 3);
}

#[test]
fn errors_are_reported_in_the_envelope() {
    let temp = TempDir::new().expect("tempdir");
    let db = temp.path().join("edubase.db");
    let schema = load_schema();
    seed_catalog(&db);

    let resp = run_json(&db, &["view", "999", "--json"]);
    assert_valid(&schema, &resp);
    assert_eq!(resp["ok"], Value::Bool(false));
    assert!(
        resp["error"]["message"]
            .as_str()
            .expect("error message")
            .contains("not found")
    );

    let resp = run_json(
        &db,
        &[
            "register",
            "--email",
            "alice@example.com",
            "--name",
            "Alice Again",
            "--json",
        ],
    );
    assert_eq!(resp["ok"], Value::Bool(false));

    edubase_cmd(&db)
        .args(["rm", "999"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn lifecycle_keeps_store_and_index_consistent() {
    let temp = TempDir::new().expect("tempdir");
    let db = temp.path().join("edubase.db");
    let schema = load_schema();
    seed_catalog(&db);

    run_json(
        &db,
        &["update", "1", "--title", "Diffusion Lecture", "--json"],
    );
    let page = run_json(&db, &["list", "diffusion", "--json"]);
    let ids = material_ids(&page);
    assert!(ids.contains(&1));

    run_json(&db, &["rm", "1", "--json"]);
    let page = run_json(&db, &["list", "--json"]);
    assert_eq!(material_ids(&page), vec![3, 2]);

    let stats = run_json(&db, &["stats", "--json"]);
    assert_valid(&schema, &stats);
    assert_eq!(stats["stats"]["material_count"], 2);
    assert_eq!(stats["stats"]["attachment_count"], 0);

    let doctor = run_json(&db, &["doctor", "--json"]);
    assert_valid(&schema, &doctor);
    assert_eq!(doctor["diagnostics"]["integrity"], "ok");
    assert_eq!(doctor["diagnostics"]["consistency"]["fts_missing"], 0);

    run_json(&db, &["compact", "--json"]);
}

#[test]
fn table_output_lists_materials() {
    let temp = TempDir::new().expect("tempdir");
    let db = temp.path().join("edubase.db");
    seed_catalog(&db);

    edubase_cmd(&db)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("Osmosis Lecture"))
        .stdout(predicate::str::contains("Alice"));

    edubase_cmd(&db)
        .args(["list", "--subject", "math"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Algebra Drills"))
        .stdout(predicate::str::contains("Osmosis Lecture").not());
}
