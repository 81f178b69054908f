//! End-to-end checks of the `potluck` binary that need no database.

use std::path::Path;
use std::process::{Command, Output};

fn potluck(config_home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_potluck"))
        .args(args)
        .env("XDG_CONFIG_HOME", config_home)
        .env_remove("POTLUCK_USER_ID")
        .env_remove("POTLUCK_DATABASE_URL")
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run potluck binary")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn help_lists_command_groups() {
    let tmp = tempfile::TempDir::new().unwrap();
    let output = potluck(tmp.path(), &["--help"]);
    assert!(output.status.success());
    let text = stdout(&output);
    for group in ["init", "db-init", "meal", "guest", "item", "recipe", "dish", "relate", "feed"] {
        assert!(text.contains(group), "help is missing {group}:\n{text}");
    }
}

#[test]
fn init_writes_config_once() {
    let tmp = tempfile::TempDir::new().unwrap();

    let first = potluck(tmp.path(), &["init", "--name", "Ada"]);
    assert!(first.status.success(), "{}", stderr(&first));
    assert!(stdout(&first).contains("user.id = "));

    let path = tmp.path().join("potluck").join("config.toml");
    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("[database]"));
    assert!(contents.contains("display_name = \"Ada\""));

    let second = potluck(tmp.path(), &["init", "--name", "Ada"]);
    assert!(!second.status.success());
    assert!(stderr(&second).contains("already exists"));

    let forced = potluck(tmp.path(), &["init", "--name", "Bo", "--force"]);
    assert!(forced.status.success(), "{}", stderr(&forced));
    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("display_name = \"Bo\""));
}

#[test]
fn init_rejects_blank_name() {
    let tmp = tempfile::TempDir::new().unwrap();
    let output = potluck(tmp.path(), &["init", "--name", "   "]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("display name must not be blank"));
    assert!(!tmp.path().join("potluck").join("config.toml").exists());
}

#[test]
fn commands_need_a_user() {
    let tmp = tempfile::TempDir::new().unwrap();
    let output = potluck(tmp.path(), &["meal", "list"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(
        stderr(&output).contains("no user configured"),
        "unexpected stderr: {}",
        stderr(&output)
    );
}

#[test]
fn malformed_ids_fail_at_parse_time() {
    let tmp = tempfile::TempDir::new().unwrap();
    let output = potluck(tmp.path(), &["item", "claim", "slot-7"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("slot-7"));
}
