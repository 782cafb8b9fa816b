//! End-to-end runs against the library with a recording logger

#![cfg(unix)]

use std::fs;
use std::path::Path;

use layr::{ConfigLayers, LayrError, LogEntry, RecordingLogger, Runtime};
use tempfile::TempDir;

fn project(config: &str, scripts: &[(&str, &str)]) -> (TempDir, Runtime) {
    let temp = tempfile::tempdir().unwrap();
    fs::write(temp.path().join("layr.toml"), config).unwrap();

    let actions = temp.path().join("env");
    fs::create_dir_all(&actions).unwrap();
    for (name, body) in scripts {
        fs::write(actions.join(name), body).unwrap();
    }

    let layers = ConfigLayers::discover(temp.path(), None).unwrap();
    let runtime = Runtime::new(layers.load().unwrap(), &layers.root).unwrap();
    (temp, runtime)
}

const CONFIG: &str = r#"
paths = ["env"]

[const]
NAME = "world"
VAR = "bar"
"#;

async fn run(runtime: &Runtime, name: &str) -> (layr::Result<()>, RecordingLogger) {
    let mut logger = RecordingLogger::new();
    let result = runtime
        .run(&[name.to_string()], &mut logger)
        .await
        .map(|_| ());
    (result, logger)
}

#[tokio::test]
async fn test_constant_placeholder_is_substituted() {
    let (_temp, runtime) = project(CONFIG, &[("hello.sh", "echo hello %NAME%\n")]);

    let (result, logger) = run(&runtime, "hello").await;

    assert!(result.is_ok());
    assert_eq!(logger.output(), vec!["hello world"]);
    assert!(logger.entries.iter().any(|entry| matches!(
        entry,
        LogEntry::Start { subject, .. } if subject == "echo hello world"
    )));
    assert_eq!(logger.count(&LogEntry::Success), 1);
}

#[tokio::test]
async fn test_ignored_failure_continues() {
    let (_temp, runtime) = project(CONFIG, &[("tolerant.sh", "- false\necho ok\n")]);

    let (result, logger) = run(&runtime, "tolerant").await;

    assert!(result.is_ok());
    assert_eq!(logger.warnings().len(), 1);
    assert_eq!(logger.output(), vec!["ok"]);
    assert_eq!(logger.count(&LogEntry::Success), 1);
    assert_eq!(logger.count(&LogEntry::FinishScript("tolerant".to_string())), 1);
}

#[tokio::test]
async fn test_failure_aborts_script() {
    let (_temp, runtime) = project(CONFIG, &[("broken.sh", "false\necho never\n")]);

    let (result, logger) = run(&runtime, "broken").await;

    match result {
        Err(LayrError::ExecutionFailed { script, line, code, .. }) => {
            assert_eq!(script, "broken");
            assert_eq!(line, 1);
            assert_eq!(code, Some(1));
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(logger.output().is_empty());
    assert_eq!(logger.count(&LogEntry::Failure), 1);
    assert_eq!(logger.count(&LogEntry::FinishScript("broken".to_string())), 0);
}

#[tokio::test]
async fn test_template_directive_renders_destination() {
    let (temp, runtime) = project(
        CONFIG,
        &[
            ("render.sh", "#!template app.tpl app.ini\n"),
            ("app.tpl", "foo::%VAR%::baz"),
        ],
    );

    let (result, _) = run(&runtime, "render").await;

    assert!(result.is_ok());
    let rendered = fs::read_to_string(Path::new(temp.path()).join("env/app.ini")).unwrap();
    assert_eq!(rendered, "foo::bar::baz");
}

#[tokio::test]
async fn test_override_layer_replaces_constant() {
    let (temp, _) = project(CONFIG, &[("hello.sh", "echo hello %NAME%\n")]);
    fs::write(
        temp.path().join("layr.toml.override"),
        "[const]\nNAME = \"override\"\n",
    )
    .unwrap();

    let layers = ConfigLayers::discover(temp.path(), None).unwrap();
    let runtime = Runtime::new(layers.load().unwrap(), &layers.root).unwrap();
    let (result, logger) = run(&runtime, "hello").await;

    assert!(result.is_ok());
    assert_eq!(logger.output(), vec!["hello override"]);
}

#[tokio::test]
async fn test_later_dotenv_file_wins() {
    let config = r#"
paths = ["env"]
dotenv = ["z.env", "a.env"]
"#;
    let temp = tempfile::tempdir().unwrap();
    fs::write(temp.path().join("z.env"), "KEY=from-z\n").unwrap();
    fs::write(temp.path().join("a.env"), "KEY=from-a\n").unwrap();
    fs::write(temp.path().join("layr.toml"), config).unwrap();
    fs::create_dir_all(temp.path().join("env")).unwrap();
    fs::write(temp.path().join("env/key.sh"), "echo %KEY%\n").unwrap();

    let layers = ConfigLayers::discover(temp.path(), None).unwrap();
    let runtime = Runtime::new(layers.load().unwrap(), &layers.root).unwrap();
    let (result, logger) = run(&runtime, "key").await;

    assert!(result.is_ok());
    assert_eq!(logger.output(), vec!["from-a"]);
}
