use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;

// 1x1 transparent PNG
const PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52, 0x00, 0x00, 0x00,
    0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49,
    0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00,
    0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

const METADATA: &str = r#"
chunks:
  - archives:
      - objects:
          - _pbtype: TSP.PackageMetadata
            datas:
              - identifier: 7
                fileName: logo.png
                preferredFileName: Company logo.png
              - identifier: 8
                fileName: missing.jpg
"#;

fn work_tree(root: &Path) {
    std::fs::create_dir_all(root.join("Index")).unwrap();
    std::fs::create_dir_all(root.join("Data")).unwrap();
    std::fs::write(root.join("Index/Metadata.iwa.yaml"), METADATA).unwrap();
    std::fs::write(root.join("Data/logo.png"), PNG).unwrap();
}

fn deckslim(cwd: &Path) -> Command {
    let mut cmd = Command::cargo_bin("deckslim").unwrap();
    cmd.current_dir(cwd).env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_lists_commands() {
    let dir = tempfile::tempdir().unwrap();
    deckslim(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("slim").and(predicate::str::contains("inspect")));
}

#[test]
fn inspect_unpacked_tree_as_json() {
    let dir = tempfile::tempdir().unwrap();
    work_tree(&dir.path().join("deck"));

    let output = deckslim(dir.path()).args(["inspect", "deck", "--json"]).output().unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["images"].as_array().unwrap().len(), 1);
    assert_eq!(json["images"][0]["identifier"], "7");
    assert_eq!(json["images"][0]["name"], "Company logo.png");
    assert_eq!(json["images"][0]["basis"], "unreferenced");
    assert_eq!(json["diagnostics"][0]["stage"], "registry");
}

#[test]
fn slim_unpacked_tree_leaves_unused_images_alone() {
    let dir = tempfile::tempdir().unwrap();
    let deck = dir.path().join("deck");
    work_tree(&deck);

    let output = deckslim(dir.path()).args(["slim", "--unpacked", "deck", "--json"]).output().unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["report"]["totals"]["assets"], 1);
    assert_eq!(json["report"]["totals"]["original"], PNG.len() as u64);
    assert_eq!(json["report"]["totals"]["optimized"], PNG.len() as u64);
    assert_eq!(std::fs::read(deck.join("Data/logo.png")).unwrap(), PNG);
}

#[test]
fn slim_missing_document_fails() {
    let dir = tempfile::tempdir().unwrap();
    deckslim(dir.path())
        .args(["slim", "absent.key"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("File not found"));
}

#[test]
fn missing_config_file_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    work_tree(&dir.path().join("deck"));
    deckslim(dir.path())
        .args(["--config", "nope.toml", "inspect", "deck"])
        .assert()
        .code(3);
}

#[test]
fn missing_index_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("empty")).unwrap();
    deckslim(dir.path())
        .args(["inspect", "empty"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Metadata.iwa.yaml"));
}
