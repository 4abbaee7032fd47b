#![cfg(unix)]

mod common;

use std::ffi::OsString;
use std::io::Write;

use common::{MemorySink, RecordingStarter, ShellTaskBuilder, TestResult, init_tracing, with_timeout};
use tempfile::NamedTempFile;

use shtask::cli::CliArgs;
use shtask::config::load_from_path;
use shtask::errors::{ConfigError, ErrorKind};

use clap::Parser;

fn task_file(contents: &str) -> std::io::Result<NamedTempFile> {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
    file.write_all(contents.as_bytes())?;
    Ok(file)
}

#[tokio::test]
async fn task_file_with_nested_section_runs() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let file = task_file(
        r#"
GREETING = "hello"
COUNT = 2

[sh]
_command = "echo \"$GREETING x$COUNT ${secret:name}\""
shell = ["/bin/sh", "-eu"]
"#,
    )?;

    let config = load_from_path(file.path())?;
    let starter = RecordingStarter::new();
    let sink = MemorySink::new();

    let task = ShellTaskBuilder::from_config(config)
        .secret("name", "world")
        .working_dir(dir.path())
        .build(starter.clone(), sink.clone());

    with_timeout(task.run()).await?;

    assert_eq!(sink.text(), "hello x2 world\n");
    assert_eq!(
        starter.launches()[0].interpreter,
        vec!["/bin/sh".to_string(), "-eu".to_string()]
    );
    Ok(())
}

#[tokio::test]
async fn task_file_without_command_is_a_config_error() -> TestResult {
    init_tracing();
    let file = task_file("shell = [\"/bin/sh\"]\n")?;
    let starter = RecordingStarter::new();

    let task = ShellTaskBuilder::from_config(load_from_path(file.path())?)
        .build(starter.clone(), MemorySink::new());

    let err = task.run().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(matches!(
        err,
        shtask::errors::ShellTaskError::Config(ConfigError::MissingParam { ref key }) if key == "_command"
    ));
    assert_eq!(starter.launch_count(), 0);
    Ok(())
}

#[tokio::test]
async fn harness_returns_child_exit_code() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let file = task_file("_command = \"exit ${secret:CODE}\"\n")?;

    let args = CliArgs::try_parse_from([
        OsString::from("shtask"),
        "--config".into(),
        file.path().into(),
        "--workdir".into(),
        dir.path().into(),
        "--secret".into(),
        "CODE=5".into(),
        "--output".into(),
        "log".into(),
    ])?;

    let code = with_timeout(shtask::run(args)).await?;

    assert_eq!(code, 5);
    Ok(())
}

#[tokio::test]
async fn harness_dry_run_starts_nothing() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let marker = dir.path().join("ran");
    let file = task_file(&format!("_command = \"touch {}\"\n", marker.display()))?;

    let args = CliArgs::try_parse_from([
        OsString::from("shtask"),
        "--config".into(),
        file.path().into(),
        "--workdir".into(),
        dir.path().into(),
        "--dry-run".into(),
    ])?;

    let code = shtask::run(args).await?;

    assert_eq!(code, 0);
    assert!(!marker.exists());
    Ok(())
}

#[tokio::test]
async fn harness_reports_unreadable_task_file() {
    init_tracing();
    let args = CliArgs::try_parse_from(["shtask", "--config", "/no/such/task.toml"]).unwrap();

    let err = shtask::run(args).await.unwrap_err();

    assert!(format!("{err:#}").contains("/no/such/task.toml"));
}
