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
use serde_json::Value;
use serde_json::json;
use tempfile::TempDir;

fn edubase_cmd(db: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("edubase"));
    cmd.env("EDUBASE_DB", db);
    cmd
}

fn normalize_json(mut value: Value) -> Value {
    if let Some(stats) = value.get_mut("stats")
        && let Some(obj) = stats.as_object_mut()
    {
        obj.insert("took_ms".to_string(), json!(0));
        if obj.contains_key("db_size_bytes") {
            obj.insert("db_size_bytes".to_string(), json!(0));
        }
    }
    value
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

fn assert_repeatable(db: &Path, args: &[&str], runs: usize) {
    let mut baseline: Option<Value> = None;
    for _ in 0..runs {
        let json = normalize_json(run_json(db, args));
        if let Some(ref expected) = baseline {
            assert_eq!(&json, expected);
        } else {
            baseline = Some(json);
        }
    }
}

#[test]
fn deterministic_outputs() {
    let temp = TempDir::new().expect("tempdir");
    let db = temp.path().join("edubase.db");

    edubase_cmd(&db).arg("init").assert().success();
    run_json(
        &db,
        &[
            "register",
            "--email",
            "alice@example.com",
            "--name",
            "Alice",
            "--json",
        ],
    );
    for (title, subject, grade, kind, description) in [
        ("Osmosis Lecture", "biology", "9", "notes", None),
        (
            "Pressure notes",
            "biology",
            "9",
            "notes",
            Some("Notes on osmotic pressure in cells"),
        ),
        ("Algebra Drills", "math", "7", "worksheet", None),
        ("Cell Membranes", "biology", "9", "presentation", None),
    ] {
        let mut args = vec![
            "add", "--author", "1", "--title", title, "--subject", subject, "--grade", grade,
            "--type", kind,
        ];
        if let Some(description) = description {
            args.extend_from_slice(&["--description", description]);
        }
        args.push("--json");
        run_json(&db, &args);
    }
    run_json(&db, &["view", "2", "--json"]);
    run_json(&db, &["view", "2", "--json"]);

    assert_repeatable(&db, &["list", "--json"], 20);
    assert_repeatable(&db, &["list", "osmo", "--json"], 20);
    assert_repeatable(
        &db,
        &["list", "osmo", "--sort", "relevance", "--limit", "1", "--json"],
        20,
    );
    assert_repeatable(&db, &["list", "--sort", "popular", "--limit", "2", "--json"], 20);
    assert_repeatable(&db, &["list", "--subject", "biology", "--offset", "1", "--json"], 20);
}
