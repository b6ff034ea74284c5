// tests/fingerprint.rs

use std::fs;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tempfile::TempDir;

use buildgraph::cli::CliArgs;
use buildgraph::dag::{TaskNode, TaskNodeBuilder};
use buildgraph::errors::BuildError;
use buildgraph::exec::fingerprint::{HASH_FILE_PATH, compute_fingerprint};
use buildgraph::exec::{
    FileHashStore, FingerprintUpToDate, HashStore, MemoryHashStore, UpToDateCheck,
};
use buildgraph::fs::mock::MockFileSystem;
use buildgraph::fs::{FileSystem, RealFileSystem};
use buildgraph_test_utils::init_tracing;

fn compile_task() -> TaskNode {
    TaskNodeBuilder::new("compile")
        .input("/p/src")
        .input("/p/build.cfg")
        .output("/p/out/app")
        .build()
}

fn project() -> MockFileSystem {
    let fs = MockFileSystem::new();
    fs.add_file("/p/src/main.c", "int main() {}");
    fs.add_file("/p/src/util/str.c", "void f() {}");
    fs.add_file("/p/build.cfg", "opt=2");
    fs
}

#[test]
fn fingerprint_tracks_content_of_nested_inputs() {
    let fs = project();
    let task = compile_task();

    let before = compute_fingerprint(&fs, &task).unwrap();
    assert_eq!(before, compute_fingerprint(&fs, &task).unwrap());

    fs.add_file("/p/src/util/str.c", "void f() { return; }");
    let edited = compute_fingerprint(&fs, &task).unwrap();
    assert_ne!(before, edited);

    fs.add_file("/p/src/util/new.c", "");
    assert_ne!(edited, compute_fingerprint(&fs, &task).unwrap());
}

#[test]
fn fingerprint_ignores_declaration_order_but_sees_missing_paths() {
    let fs = project();
    let forward = compute_fingerprint(&fs, &compile_task()).unwrap();
    let reversed = TaskNodeBuilder::new("compile")
        .input("/p/build.cfg")
        .input("/p/src")
        .output("/p/out/app")
        .build();
    assert_eq!(forward, compute_fingerprint(&fs, &reversed).unwrap());

    fs.add_file("/p/out/app", "ELF");
    let with_output = compute_fingerprint(&fs, &compile_task()).unwrap();
    assert_ne!(forward, with_output);

    fs.remove("/p/build.cfg");
    assert_ne!(with_output, compute_fingerprint(&fs, &compile_task()).unwrap());
}

#[test]
fn up_to_date_lifecycle() {
    let fs = project();
    let check = FingerprintUpToDate::new(Arc::new(fs.clone()), Box::new(MemoryHashStore::new()));
    let task = compile_task();

    // Output missing: not up to date, and a "successful" run that did not
    // produce it cannot be recorded.
    assert!(!check.is_up_to_date(&task).unwrap());
    let err = check.record(&task).unwrap_err();
    assert!(err.to_string().contains("was not produced"), "got {err:#}");

    fs.add_file("/p/out/app", "ELF");
    assert!(!check.is_up_to_date(&task).unwrap(), "nothing recorded yet");
    check.record(&task).unwrap();
    assert!(check.is_up_to_date(&task).unwrap());

    fs.add_file("/p/src/main.c", "int main() { return 1; }");
    assert!(!check.is_up_to_date(&task).unwrap());
    check.record(&task).unwrap();
    assert!(check.is_up_to_date(&task).unwrap());

    fs.remove("/p/out/app");
    assert!(!check.is_up_to_date(&task).unwrap());
}

#[test]
fn task_without_outputs_is_never_up_to_date() {
    let fs = project();
    let check = FingerprintUpToDate::new(Arc::new(fs), Box::new(MemoryHashStore::new()));
    let task = TaskNodeBuilder::new("lint").input("/p/src").build();

    check.record(&task).unwrap();
    assert!(!check.is_up_to_date(&task).unwrap());
}

#[test]
fn file_store_persists_and_prunes() {
    let dir = TempDir::new().unwrap();
    let real: Arc<dyn FileSystem> = Arc::new(RealFileSystem);

    let mut store = FileHashStore::new(dir.path().to_path_buf(), Arc::clone(&real));
    assert_eq!(store.load("compile").unwrap(), None);
    store.save("compile", "aaa").unwrap();
    store.save("test", "bbb").unwrap();
    store.save("compile", "ccc").unwrap();

    let reopened = FileHashStore::new(dir.path().to_path_buf(), real);
    assert_eq!(reopened.load("compile").unwrap().as_deref(), Some("ccc"));
    assert_eq!(reopened.load("test").unwrap().as_deref(), Some("bbb"));

    store.prune(&["compile"]).unwrap();
    let contents = fs::read_to_string(dir.path().join(HASH_FILE_PATH)).unwrap();
    assert_eq!(contents, "compile ccc\n");
}

#[test]
fn memory_store_prunes_inactive_tasks() {
    let mut store = MemoryHashStore::new();
    store.save("a", "1").unwrap();
    store.save("b", "2").unwrap();
    store.prune(&["b"]).unwrap();
    assert_eq!(store.load("a").unwrap(), None);
    assert_eq!(store.load("b").unwrap().as_deref(), Some("2"));
}

fn write_build_file(dir: &Path, contents: &str) -> String {
    let path = dir.join("Buildgraph.toml");
    fs::write(&path, contents).unwrap();
    path.to_string_lossy().into_owned()
}

fn args(config: &str, extra: &[&str]) -> CliArgs {
    let mut argv = vec!["buildgraph", "--config", config];
    argv.extend_from_slice(extra);
    CliArgs::parse_from(argv)
}

const GENERATE: &str = r#"
[config]
hash_storage_mode = "file"
default_tasks = ["generate"]

[task.generate]
cmd = "echo run >> runs.log && printf hello > out.txt"
outputs = ["out.txt"]
"#;

#[tokio::test]
async fn run_skips_up_to_date_tasks_across_invocations() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let config = write_build_file(dir.path(), GENERATE);

    assert_eq!(buildgraph::run(args(&config, &[])).await.unwrap(), 0);
    assert_eq!(fs::read_to_string(dir.path().join("out.txt")).unwrap(), "hello");
    assert!(dir.path().join(HASH_FILE_PATH).is_file());

    assert_eq!(buildgraph::run(args(&config, &[])).await.unwrap(), 0);
    let runs = fs::read_to_string(dir.path().join("runs.log")).unwrap();
    assert_eq!(runs.lines().count(), 1, "second build should be up to date");

    assert_eq!(
        buildgraph::run(args(&config, &["--rerun-tasks"])).await.unwrap(),
        0
    );
    let runs = fs::read_to_string(dir.path().join("runs.log")).unwrap();
    assert_eq!(runs.lines().count(), 2);
}

#[tokio::test]
async fn run_reports_task_failure_as_exit_code_one() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let config = write_build_file(
        dir.path(),
        r#"
[task.broken]
cmd = "exit 3"

[task.after]
cmd = "touch after.txt"
depends_on = ["broken"]
"#,
    );

    assert_eq!(buildgraph::run(args(&config, &["after"])).await.unwrap(), 1);
    assert!(!dir.path().join("after.txt").exists());
}

#[tokio::test]
async fn only_if_command_sees_the_build_file_directory() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("marker"), "").unwrap();
    let config = write_build_file(
        dir.path(),
        r#"
[task.gen]
cmd = "touch made.txt"
only_if = [{ name = "hasMarker", cmd = "test -f marker" }]
"#,
    );

    assert_eq!(buildgraph::run(args(&config, &["gen"])).await.unwrap(), 0);
    assert!(dir.path().join("made.txt").is_file());
}

#[tokio::test]
async fn run_rejects_unknown_tasks_before_executing() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let config = write_build_file(dir.path(), GENERATE);

    let err = buildgraph::run(args(&config, &["publish"])).await.unwrap_err();
    assert!(matches!(&err, BuildError::UnknownTask(name) if name == "publish"));
    assert_eq!(err.exit_code(), 2);
    assert!(!dir.path().join("out.txt").exists());
}

#[tokio::test]
async fn dry_run_executes_nothing() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let config = write_build_file(dir.path(), GENERATE);

    assert_eq!(buildgraph::run(args(&config, &["--dry-run"])).await.unwrap(), 0);
    assert!(!dir.path().join("out.txt").exists());
    assert!(!dir.path().join(HASH_FILE_PATH).exists());
}
