//! Integration tests for the bob verb: channel updates, version selection
//! and the content-addressed jar cache, all against a local mock archive.

mod common;

use assert_cmd::Command;
use common::TestEnv;
use predicates::prelude::*;

const SHA: &str = "5295afc3878441fb12f497df8831b0a81d6ee241";
const BETA_SHA: &str = "aaaabbbbccccddddeeeeffff0000111122223333";

fn manifest_body() -> String {
    format!(
        r#"{{"versions": [{{"version": "1.2.165", "sha1": "{}"}}]}}"#,
        SHA
    )
}

/// A defbuild command pointed at the mock archive.
fn bob_cmd(env: &TestEnv, server: &mockito::Server) -> Command {
    let mut cmd = env.defbuild();
    cmd.env("DEFBUILD_ARCHIVE_URL", server.url());
    cmd.env(
        "DEFBUILD_VERSIONS_URL",
        format!("{}/versions.json", server.url()),
    );
    cmd
}

fn jar_path(env: &TestEnv, sha: &str) -> std::path::PathBuf {
    env.cache_path().join("bob").join(format!("bob_{}.jar", sha))
}

// ==================== Update Tests ====================

#[test]
fn test_update_downloads_the_stable_channel() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/stable/info.json")
        .with_body(format!(r#"{{"version": "1.2.165", "sha1": "{}"}}"#, SHA))
        .create();
    server
        .mock("GET", "/versions.json")
        .with_body(manifest_body())
        .create();
    server
        .mock("HEAD", format!("/archive/{}/bob/bob.jar", SHA).as_str())
        .create();
    server
        .mock("GET", format!("/archive/{}/bob/bob.jar", SHA).as_str())
        .with_body("jar payload")
        .create();

    let env = TestEnv::new();
    bob_cmd(&env, &server)
        .args(["bob", "--update"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Downloading new bob 1.2.165"))
        .stdout(predicate::str::contains("Bob set to 1.2.165"));

    assert!(jar_path(&env, SHA).exists());
    assert!(env.read_session().contains(&format!("bob_{}.jar", SHA)));
}

#[test]
fn test_update_with_unreachable_channel_is_fatal() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/stable/info.json")
        .with_status(500)
        .create();

    let env = TestEnv::new();
    bob_cmd(&env, &server)
        .args(["bob", "--update"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("HTTP request failed"));

    assert!(!env.read_session().contains("bob="));
}

// ==================== Selection Tests ====================

#[test]
fn test_set_sha_downloads_once_then_reuses_the_cache() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/versions.json")
        .with_body(manifest_body())
        .expect(2)
        .create();
    let head = server
        .mock("HEAD", format!("/archive/{}/bob/bob.jar", SHA).as_str())
        .expect(1)
        .create();
    let get = server
        .mock("GET", format!("/archive/{}/bob/bob.jar", SHA).as_str())
        .with_body("jar payload")
        .expect(1)
        .create();

    let env = TestEnv::new();
    bob_cmd(&env, &server)
        .args(["bob", "--set", SHA])
        .assert()
        .success()
        .stdout(predicate::str::contains("Bob set to 1.2.165"));

    bob_cmd(&env, &server)
        .args(["bob", "--set", SHA])
        .assert()
        .success()
        .stdout(predicate::str::contains("Using cached version 1.2.165"));

    head.assert();
    get.assert();
}

#[test]
fn test_set_release_version_resolves_through_the_manifest() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/versions.json")
        .with_body(manifest_body())
        .create();
    server
        .mock("HEAD", format!("/archive/{}/bob/bob.jar", SHA).as_str())
        .create();
    server
        .mock("GET", format!("/archive/{}/bob/bob.jar", SHA).as_str())
        .with_body("jar payload")
        .create();

    let env = TestEnv::new();
    bob_cmd(&env, &server)
        .args(["bob", "--set", "1.2.165"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Bob set to 1.2.165"));

    assert!(jar_path(&env, SHA).exists());
}

#[test]
fn test_set_unlisted_version_is_fatal() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/versions.json")
        .with_body(manifest_body())
        .create();

    let env = TestEnv::new();
    bob_cmd(&env, &server)
        .args(["bob", "--set", "9.9.9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unable to find version 9.9.9"));

    // Nothing was downloaded, so the jar directory was never created.
    assert!(!env.cache_path().join("bob").exists());
}

#[test]
fn test_set_beta_follows_the_beta_channel() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/beta/info.json")
        .with_body(format!(
            r#"{{"version": "1.2.166", "sha1": "{}"}}"#,
            BETA_SHA
        ))
        .create();
    server
        .mock("GET", "/versions.json")
        .with_body(manifest_body())
        .create();
    server
        .mock("HEAD", format!("/archive/{}/bob/bob.jar", BETA_SHA).as_str())
        .create();
    server
        .mock("GET", format!("/archive/{}/bob/bob.jar", BETA_SHA).as_str())
        .with_body("beta jar payload")
        .create();

    let env = TestEnv::new();
    bob_cmd(&env, &server)
        .args(["bob", "--set", "beta"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Bob set to 1.2.166"));

    assert!(jar_path(&env, BETA_SHA).exists());
}

#[test]
fn test_set_rejects_a_junk_selector_offline() {
    let env = TestEnv::new();
    env.defbuild()
        .args(["bob", "--set", "not-a-thing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "'not-a-thing' is not a release version, a sha1 or 'beta'",
        ));
}

#[test]
fn test_set_force_replaces_a_stale_jar() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/versions.json")
        .with_body(manifest_body())
        .create();
    server
        .mock("HEAD", format!("/archive/{}/bob/bob.jar", SHA).as_str())
        .create();
    server
        .mock("GET", format!("/archive/{}/bob/bob.jar", SHA).as_str())
        .with_body("fresh jar payload")
        .create();

    let env = TestEnv::new();
    env.seed_bob(SHA);

    bob_cmd(&env, &server)
        .args(["bob", "--set", SHA, "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Downloading new bob 1.2.165"));

    assert_eq!(
        std::fs::read(jar_path(&env, SHA)).unwrap(),
        b"fresh jar payload"
    );
}

#[test]
fn test_set_sha_missing_from_the_archive_is_fatal() {
    let sha = "0123456789012345678901234567890123456789";
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/versions.json")
        .with_body(manifest_body())
        .create();
    server
        .mock("GET", "/beta/info.json")
        .with_body(format!(
            r#"{{"version": "1.2.166", "sha1": "{}"}}"#,
            BETA_SHA
        ))
        .create();
    server
        .mock("HEAD", format!("/archive/{}/bob/bob.jar", sha).as_str())
        .with_status(404)
        .create();

    let env = TestEnv::new();
    bob_cmd(&env, &server)
        .args(["bob", "--set", sha])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Can't find bob version"));

    assert!(!env.read_session().contains("bob="));
}

// ==================== Report Tests ====================

#[test]
fn test_bare_bob_reports_the_selected_version() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/versions.json")
        .with_body(manifest_body())
        .create();

    let env = TestEnv::new();
    let jar = env.seed_bob(SHA);
    env.write_session(&format!("[config]\nbob={}\n", jar.display()));

    bob_cmd(&env, &server)
        .args(["bob"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Using version '1.2.165'"))
        .stdout(predicate::str::contains(SHA));
}

#[test]
fn test_bare_bob_without_a_selection_is_fatal() {
    let env = TestEnv::new();
    env.defbuild()
        .args(["bob"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("defbuild bob --update"));
}
