//! End-to-end tests of the astcache binary.
//!
//! Every run points `--config` at a file whose `cache_dir` is a temporary
//! directory, so the user's cache is never touched.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

fn testdata_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata")
}

struct Env {
    dir: TempDir,
    config: PathBuf,
}

impl Env {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("astcache.yaml");
        let cache = dir.path().join("cache");
        fs::write(
            &config,
            format!("cache_dir: {:?}\nexcluded_paths:\n  - \"**/*.go\"\n", cache),
        )
        .unwrap();
        Self { dir, config }
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_astcache"))
            .arg("--config")
            .arg(&self.config)
            .args(args)
            .env_remove("ASTCACHE_LOG")
            .env_remove("RUST_LOG")
            .output()
            .expect("binary should run")
    }

    fn json(&self, args: &[&str]) -> Value {
        let out = self.run(args);
        assert!(
            out.status.success(),
            "astcache {:?} failed: {}",
            args,
            String::from_utf8_lossy(&out.stderr)
        );
        serde_json::from_slice(&out.stdout).expect("stdout should be JSON")
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

fn as_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_analyze_json() {
    let env = Env::new();
    let calc = testdata_path().join("calc.py");
    let report = env.json(&["analyze", as_str(&calc), "--format", "json"]);

    assert_eq!(report["command"], "analyze");
    let result = &report["result"];
    assert_eq!(result["language"], "python");
    let names: Vec<&str> = result["functions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["add", "sub"]);
}

#[test]
fn test_index_find_summary_cleanup() {
    let env = Env::new();
    let project = testdata_path().join("project");

    let index = env.json(&["index", as_str(&project), "-p", "demo", "--format", "json"]);
    // server.go is excluded by the config; README.notes has no language.
    assert_eq!(index["result"]["files"], 2);
    assert_eq!(index["result"]["analyzed"], 2);

    let again = env.json(&["index", as_str(&project), "-p", "demo", "--format", "json"]);
    assert_eq!(again["result"]["unchanged"], 2);

    let found = env.json(&["find", "item", "-p", "demo", "--format", "json"]);
    let files: Vec<&str> = found["result"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["file_path"].as_str().unwrap())
        .collect();
    assert!(files.contains(&"src/inventory.py"));
    assert!(files.contains(&"web/cart.js"));

    let summary = env.json(&["summary", "--format", "json"]);
    assert_eq!(summary["result"]["total_projects"], 1);
    assert_eq!(summary["result"]["projects"][0]["total_files"], 2);

    let cleanup = env.run(&["cleanup", "-p", "demo", "--max-age-days", "0"]);
    assert!(cleanup.status.success());
    assert!(String::from_utf8_lossy(&cleanup.stdout).contains("Removed 2 entries"));

    let empty = env.json(&["find", "item", "-p", "demo", "--format", "json"]);
    assert!(empty["result"].as_array().unwrap().is_empty());
}

#[test]
fn test_plan_lists_targets() {
    let env = Env::new();
    let calc = testdata_path().join("calc.py");
    let plan = env.json(&["plan", as_str(&calc), "fix the add function", "--format", "json"]);

    assert_eq!(plan["result"]["modification_type"], "add");
    let targets = plan["result"]["targets"].as_array().unwrap();
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0]["name"], "add");
}

#[cfg(unix)]
#[test]
fn test_modify_writes_file() {
    let env = Env::new();
    let file = env.path("calc.py");
    fs::copy(testdata_path().join("calc.py"), &file).unwrap();

    let script = env.path("rewrite.sh");
    fs::write(
        &script,
        "cat > /dev/null\nprintf 'def add(a, b):\\n    return b + a\\n'\n",
    )
    .unwrap();
    let rewriter = format!("sh {}", as_str(&script));

    let out = env.run(&[
        "modify",
        as_str(&file),
        "fix the add function",
        "--rewriter",
        &rewriter,
        "--write",
        "--format",
        "json",
    ]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let report: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(report["result"]["targets_modified"], 1);
    assert_eq!(
        fs::read_to_string(&file).unwrap(),
        "def add(a, b):\n    return b + a\ndef sub(a, b): return a - b\n"
    );
}

#[cfg(unix)]
#[test]
fn test_modify_reports_rewriter_failure() {
    let env = Env::new();
    let file = env.path("calc.py");
    fs::copy(testdata_path().join("calc.py"), &file).unwrap();

    let out = env.run(&["modify", as_str(&file), "fix add", "--rewriter", "false"]);
    assert_eq!(out.status.code(), Some(1));
    assert_eq!(
        fs::read_to_string(&file).unwrap(),
        fs::read_to_string(testdata_path().join("calc.py")).unwrap()
    );
}

#[test]
fn test_invalid_config_exits_with_error() {
    let env = Env::new();
    fs::write(&env.config, "variable_cap: 0\n").unwrap();

    let out = env.run(&["languages"]);
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("variable_cap"));
}

#[test]
fn test_languages_table() {
    let env = Env::new();
    let report = env.json(&["languages", "--format", "json"]);
    let rows = report["result"].as_array().unwrap();
    let python = rows.iter().find(|r| r["language"] == "python").unwrap();
    assert_eq!(python["heuristic"], true);
    if cfg!(feature = "tree-sitter") {
        assert_eq!(python["structural"], true);
    }
}
