use std::path::Path;
use std::process::Command;

fn syncstore(args: &[&str], cwd: &Path) -> serde_json::Value {
    let output = Command::new(env!("CARGO_BIN_EXE_syncstore"))
        .args(args)
        .current_dir(cwd)
        .env("NO_COLOR", "1")
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn init_honors_json_flag() {
    let dir = tempfile::tempdir().unwrap();
    let database = dir.path().join("data").join("sync.db");

    let value = syncstore(
        &["--json", "--database", database.to_str().unwrap(), "init"],
        dir.path(),
    );

    assert_eq!(value["initialized"], database.to_str().unwrap());
    assert!(database.exists());
}

#[test]
fn config_init_honors_json_flag() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("syncstore.toml");

    let value = syncstore(
        &["--json", "--config", path.to_str().unwrap(), "config", "init"],
        dir.path(),
    );

    assert_eq!(value["config"], path.to_str().unwrap());
    assert!(path.exists());
}
