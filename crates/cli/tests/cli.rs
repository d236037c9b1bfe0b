use assert_cmd::Command;

fn bookstore() -> Command {
    let mut cmd = Command::cargo_bin("bookstore").unwrap();
    cmd.env("BOOKSTORE_CONFIG_DIR", env!("CARGO_TARGET_TMPDIR"))
        .env("RUST_LOG", "warn");
    cmd
}

#[test]
fn openapi_prints_versioned_book_paths() {
    let output = bookstore().arg("openapi").output().unwrap();
    assert!(output.status.success());

    let document: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(document["paths"]["/api/v1/books"].is_object());
    assert!(document["paths"]["/api/v2/books/{id}"].is_object());
    assert!(document["components"]["securitySchemes"]["bearerAuth"].is_object());
}

#[test]
fn migrate_against_memory_database_succeeds() {
    bookstore()
        .arg("migrate")
        .env("BOOKSTORE_DATABASE__URL", "sqlite::memory:")
        .assert()
        .success();
}

#[test]
fn unknown_subcommand_fails() {
    bookstore().arg("frobnicate").assert().failure();
}
