// tests/config_loading.rs

use std::io::Write;
use std::path::Path;

use clap::Parser;
use tempfile::{NamedTempFile, TempDir};

use buildgraph::cli::{CliArgs, LogLevel};
use buildgraph::config::{BuildSettings, ConfigFile, load_and_validate, load_from_str};
use buildgraph::dag::freeze;
use buildgraph::errors::BuildError;
use buildgraph::logging::effective_level;
use buildgraph::types::{FailurePolicy, HashStorageMode};
use buildgraph_test_utils::builders::{ConfigFileBuilder, TaskConfigBuilder};

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp file");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

fn validate(contents: &str) -> Result<ConfigFile, BuildError> {
    ConfigFile::try_from(load_from_str(contents)?)
}

fn config_message(err: BuildError) -> String {
    match err {
        BuildError::Config(msg) => msg,
        other => panic!("expected a config error, got {other:?}"),
    }
}

#[test]
fn loads_a_valid_file_in_declaration_order() {
    let file = write_config(
        r#"
[config]
concurrency = 3
failure_policy = "keep-going"
hash_storage_mode = "file"
default_tasks = ["check"]

[task.compile]
cmd = "cargo build"
outputs = ["target/debug/app"]

[task.test]
cmd = "cargo test"
depends_on = ["compile"]

[task.check]
depends_on = ["test"]
"#,
    );

    let cfg = load_and_validate(file.path()).expect("config should be valid");
    assert_eq!(cfg.config.concurrency, 3);
    assert_eq!(cfg.config.failure_policy, FailurePolicy::KeepGoing);
    assert_eq!(cfg.config.hash_storage_mode, HashStorageMode::File);
    assert_eq!(cfg.config.default_tasks, vec!["check"]);
    assert_eq!(
        cfg.task.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["compile", "test", "check"]
    );
    assert!(cfg.task["check"].cmd.is_none());
    assert!(cfg.task["check"].enabled);
}

#[test]
fn defaults_apply_when_config_section_is_missing() {
    let cfg = validate("[task.a]\ncmd = \"true\"\n").unwrap();
    assert_eq!(cfg.config.concurrency, 1);
    assert_eq!(cfg.config.failure_policy, FailurePolicy::FailFast);
    assert_eq!(cfg.config.hash_storage_mode, HashStorageMode::Memory);
    assert!(cfg.config.default_tasks.is_empty());
}

fn sorted_cycle(err: BuildError) -> Vec<String> {
    match err {
        BuildError::Cycle { mut members } => {
            members.sort();
            members
        }
        other => panic!("expected Cycle, got {other:?}"),
    }
}

#[test]
fn cycle_is_reported_with_members_when_requested() {
    let file = write_config(
        r#"
[task.a]
depends_on = ["b"]

[task.b]
depends_on = ["a"]
"#,
    );

    let cfg = load_and_validate(file.path()).expect("cycles are checked per plan");
    let tasks = cfg.to_task_set(Path::new("/work")).unwrap();

    let err = freeze(&tasks, &["a"]).unwrap_err();
    assert_eq!(err.exit_code(), 2);
    assert_eq!(sorted_cycle(err), vec!["a", "b"]);
}

#[test]
fn cycle_outside_the_requested_closure_does_not_block_the_build() {
    let cfg = validate(
        r#"
[task.a]
cmd = "true"

[task.x]
must_run_after = ["y"]

[task.y]
must_run_after = ["x"]
"#,
    )
    .expect("unrequested cycle is not a load error");
    let tasks = cfg.to_task_set(Path::new("/work")).unwrap();

    let plan = freeze(&tasks, &["a"]).unwrap();
    assert_eq!(plan.order(), vec!["a"]);

    let err = freeze(&tasks, &["x", "y"]).unwrap_err();
    assert_eq!(sorted_cycle(err), vec!["x", "y"]);
}

#[test]
fn finalizer_edges_take_part_in_cycle_detection() {
    let cfg = validate(
        r#"
[task.a]
depends_on = ["b"]
finalized_by = ["b"]
[task.b]
"#,
    )
    .unwrap();
    let tasks = cfg.to_task_set(Path::new("/work")).unwrap();
    assert_eq!(sorted_cycle(freeze(&tasks, &["a"]).unwrap_err()), vec!["a", "b"]);
}

#[test]
fn unknown_relation_target_is_rejected() {
    let err = validate("[task.test]\ndepends_on = [\"compile\"]\n").unwrap_err();
    assert_eq!(
        config_message(err),
        "task 'test' has unknown task 'compile' in `depends_on`"
    );

    let err = validate("[task.test]\nmust_run_after = [\"lint\"]\n").unwrap_err();
    assert!(config_message(err).contains("`must_run_after`"));
}

#[test]
fn self_reference_is_rejected() {
    let err = validate("[task.a]\nfinalized_by = [\"a\"]\n").unwrap_err();
    assert_eq!(config_message(err), "task 'a' cannot refer to itself in `finalized_by`");
}

#[test]
fn only_if_needs_exactly_one_source() {
    let both = r#"
[task.deploy]
only_if = [{ name = "ci", env = "CI", cmd = "true" }]
"#;
    assert!(config_message(validate(both).unwrap_err()).contains("exactly one of `env` or `cmd`"));

    let neither = r#"
[task.deploy]
only_if = [{ name = "ci" }]
"#;
    assert!(config_message(validate(neither).unwrap_err()).contains("exactly one"));

    let equals_with_cmd = r#"
[task.deploy]
only_if = [{ name = "ci", cmd = "true", equals = "1" }]
"#;
    assert!(config_message(validate(equals_with_cmd).unwrap_err()).contains("`equals` without `env`"));
}

#[test]
fn global_settings_are_checked() {
    let raw = ConfigFileBuilder::new()
        .with_task("a", TaskConfigBuilder::new("true").build())
        .concurrency(0)
        .build_raw();
    assert!(config_message(ConfigFile::try_from(raw).unwrap_err()).contains("concurrency"));

    let raw = ConfigFileBuilder::new()
        .with_task("a", TaskConfigBuilder::new("true").build())
        .default_task("missing")
        .build_raw();
    assert!(config_message(ConfigFile::try_from(raw).unwrap_err()).contains("'missing'"));

    let raw = ConfigFileBuilder::new().build_raw();
    assert!(config_message(ConfigFile::try_from(raw).unwrap_err()).contains("at least one"));
}

#[test]
fn unknown_fields_and_bad_toml_are_parse_errors() {
    let err = load_from_str("[task.a]\ncommand = \"make\"\n").unwrap_err();
    assert!(matches!(err, BuildError::Toml(_)), "got {err:?}");

    let err = load_from_str("[task.a\n").unwrap_err();
    assert!(matches!(err, BuildError::Toml(_)));
    assert_eq!(err.exit_code(), 2);

    let err = load_from_str("[config]\nfailure_policy = \"sometimes\"\n").unwrap_err();
    assert!(matches!(err, BuildError::Toml(_)));
}

#[test]
fn missing_file_is_an_io_error() {
    let err = load_and_validate("/definitely/not/here/Buildgraph.toml").unwrap_err();
    assert!(matches!(err, BuildError::Io(_)));
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn task_set_resolves_paths_and_keeps_relations() {
    let cfg = ConfigFileBuilder::new()
        .with_task(
            "compile",
            TaskConfigBuilder::new("make")
                .input("src")
                .output("out/app")
                .finalized_by("docs")
                .build(),
        )
        .with_task(
            "test",
            TaskConfigBuilder::new("make test")
                .depends_on("compile")
                .only_if_env("onCi", "CI", Some("true"))
                .build(),
        )
        .with_task(
            "docs",
            TaskConfigBuilder::lifecycle()
                .must_run_after("test")
                .enabled(false)
                .build(),
        )
        .build();

    let root = Path::new("/work/project");
    let tasks = cfg.to_task_set(root).unwrap();

    assert_eq!(tasks.names().collect::<Vec<_>>(), vec!["compile", "test", "docs"]);

    let compile = tasks.get("compile").unwrap();
    assert!(compile.action.is_some());
    assert_eq!(compile.inputs, vec![root.join("src")]);
    assert_eq!(compile.outputs, vec![root.join("out/app")]);
    assert_eq!(compile.finalized_by, vec!["docs"]);

    let test = tasks.get("test").unwrap();
    assert_eq!(test.depends_on, vec!["compile"]);
    assert_eq!(test.predicates.len(), 1);
    assert_eq!(test.predicates[0].name(), "onCi");

    let docs = tasks.get("docs").unwrap();
    assert!(docs.action.is_none());
    assert!(!docs.enabled);
    assert_eq!(docs.must_run_after, vec!["test"]);
}

#[test]
fn command_predicate_runs_in_the_project_root() {
    let cfg = validate(
        r#"
[task.gen]
cmd = "true"
only_if = [{ name = "hasMarker", cmd = "test -f marker" }]
"#,
    )
    .unwrap();

    let root = TempDir::new().unwrap();
    let tasks = cfg.to_task_set(root.path()).unwrap();
    let gen_task = tasks.get("gen").unwrap();
    assert!(!gen_task.predicates[0].evaluate(gen_task).unwrap());

    std::fs::write(root.path().join("marker"), "").unwrap();
    assert!(gen_task.predicates[0].evaluate(gen_task).unwrap());
}

#[test]
fn cli_flags_override_the_build_file() {
    let cfg = ConfigFileBuilder::new()
        .with_task("a", TaskConfigBuilder::new("true").build())
        .with_task("b", TaskConfigBuilder::new("true").build())
        .concurrency(2)
        .failure_policy(FailurePolicy::KeepGoing)
        .default_task("a")
        .build();

    let args = CliArgs::parse_from(["buildgraph"]);
    let settings = BuildSettings::resolve(&args, &cfg).unwrap();
    assert_eq!(settings.tasks, vec!["a"]);
    assert_eq!(settings.concurrency, 2);
    assert_eq!(settings.failure_policy, FailurePolicy::KeepGoing);
    assert!(!settings.rerun_tasks);

    let args = CliArgs::parse_from([
        "buildgraph",
        "b",
        "-j",
        "8",
        "--fail-fast",
        "-x",
        "a",
        "--rerun-tasks",
        "--dry-run",
    ]);
    let settings = BuildSettings::resolve(&args, &cfg).unwrap();
    assert_eq!(settings.tasks, vec!["b"]);
    assert_eq!(settings.concurrency, 8);
    assert_eq!(settings.failure_policy, FailurePolicy::FailFast);
    assert_eq!(settings.excluded, vec!["a"]);
    assert!(settings.rerun_tasks);
    assert!(settings.dry_run);
}

#[test]
fn settings_reject_empty_requests_and_zero_jobs() {
    let cfg = ConfigFileBuilder::new()
        .with_task("a", TaskConfigBuilder::new("true").build())
        .build();

    let err = BuildSettings::resolve(&CliArgs::parse_from(["buildgraph"]), &cfg).unwrap_err();
    assert!(matches!(err, BuildError::NoTasksRequested));

    let args = CliArgs::parse_from(["buildgraph", "a", "--jobs", "0"]);
    let err = BuildSettings::resolve(&args, &cfg).unwrap_err();
    assert!(matches!(err, BuildError::Config(_)));
}

#[test]
fn keep_going_and_fail_fast_conflict() {
    assert!(CliArgs::try_parse_from(["buildgraph", "--keep-going", "--fail-fast"]).is_err());
}

#[test]
fn log_level_prefers_cli_then_env() {
    assert_eq!(
        effective_level(Some(LogLevel::Debug), Some("error")),
        tracing::Level::DEBUG
    );
    assert_eq!(effective_level(None, Some("warn")), tracing::Level::WARN);
    assert_eq!(effective_level(None, Some(" TRACE ")), tracing::Level::TRACE);
    assert_eq!(effective_level(None, Some("loud")), tracing::Level::INFO);
    assert_eq!(effective_level(None, None), tracing::Level::INFO);
}
