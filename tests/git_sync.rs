// ABOUTME: Integration tests for cloning and updating a checkout from an upstream repository.
// ABOUTME: Covers fast-forward, force pull after a history rewrite, and remote comparison.

mod support;

use keel::git::{
    GitError, GitRepository, RepoOptions, UpdateOutcome, initialize_repository, update_repository,
};
use keel::output::{Output, SharedBuffer};
use support::git_fixture::{Upstream, credential};
use tempfile::TempDir;

struct Checkout {
    _keys: TempDir,
    _dir: TempDir,
    opts: RepoOptions,
}

fn checkout_options(branch: &str) -> Checkout {
    let keys = tempfile::tempdir().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let opts = RepoOptions {
        directory: dir.path().join("project"),
        branch: branch.to_string(),
        credential: credential(keys.path()),
    };
    Checkout {
        _keys: keys,
        _dir: dir,
        opts,
    }
}

#[tokio::test]
async fn clone_checks_out_the_requested_branch() {
    support::init_tracing();
    let upstream = Upstream::new();
    let checkout = checkout_options("main");

    let repo = initialize_repository(&upstream.url(), &checkout.opts, &Output::new())
        .await
        .unwrap();

    let head = repo.head().unwrap();
    assert_eq!(head.branch, "main");
    assert_eq!(head.commit_hash, upstream.head().to_string());
    assert_eq!(head.message, "Initial commit");
    assert!(checkout.opts.directory.join("README.md").exists());
}

#[tokio::test]
async fn update_fast_forwards_to_new_commits() {
    support::init_tracing();
    let upstream = Upstream::new();
    let checkout = checkout_options("main");
    let repo = initialize_repository(&upstream.url(), &checkout.opts, &Output::new())
        .await
        .unwrap();

    let new_head = upstream.commit("app.txt", "v2", "Second commit");
    let outcome = update_repository(&repo, &checkout.opts, &Output::new())
        .await
        .unwrap();

    assert_eq!(outcome, UpdateOutcome::FastForwarded);
    assert_eq!(repo.head().unwrap().commit_hash, new_head.to_string());
    assert_eq!(
        std::fs::read_to_string(checkout.opts.directory.join("app.txt")).unwrap(),
        "v2"
    );
}

#[tokio::test]
async fn update_without_changes_is_up_to_date() {
    let upstream = Upstream::new();
    let checkout = checkout_options("main");
    let repo = initialize_repository(&upstream.url(), &checkout.opts, &Output::new())
        .await
        .unwrap();

    let outcome = update_repository(&repo, &checkout.opts, &Output::new())
        .await
        .unwrap();

    assert_eq!(outcome, UpdateOutcome::UpToDate);
}

#[tokio::test]
async fn diverged_history_is_recovered_by_force_pull() {
    support::init_tracing();
    let upstream = Upstream::new();
    let root = upstream.head();
    upstream.commit("app.txt", "first draft", "Second commit");

    let checkout = checkout_options("main");
    let repo = initialize_repository(&upstream.url(), &checkout.opts, &Output::new())
        .await
        .unwrap();

    upstream.reset_to(root);
    let rewritten = upstream.commit("app.txt", "rewritten", "Rewritten second commit");

    let buffer = SharedBuffer::new();
    let out = Output::new().with_writer(buffer.clone());
    let outcome = update_repository(&repo, &checkout.opts, &out).await.unwrap();

    assert_eq!(outcome, UpdateOutcome::ForcePulled);
    assert_eq!(repo.head().unwrap().commit_hash, rewritten.to_string());
    assert_eq!(
        std::fs::read_to_string(checkout.opts.directory.join("app.txt")).unwrap(),
        "rewritten"
    );
    assert!(buffer.contents().contains("WARNING:"));
}

#[tokio::test]
async fn update_switches_to_a_branch_that_only_exists_upstream() {
    let upstream = Upstream::new();
    let checkout = checkout_options("main");
    let repo = initialize_repository(&upstream.url(), &checkout.opts, &Output::new())
        .await
        .unwrap();

    upstream.create_branch("release");
    let mut opts = checkout.opts.clone();
    opts.branch = "release".to_string();
    update_repository(&repo, &opts, &Output::new()).await.unwrap();

    assert_eq!(repo.head().unwrap().branch, "release");
}

#[tokio::test]
async fn missing_branch_is_reported() {
    let upstream = Upstream::new();
    let checkout = checkout_options("main");
    let repo = initialize_repository(&upstream.url(), &checkout.opts, &Output::new())
        .await
        .unwrap();

    let mut opts = checkout.opts.clone();
    opts.branch = "does-not-exist".to_string();
    let err = update_repository(&repo, &opts, &Output::new())
        .await
        .unwrap_err();

    assert!(matches!(err, GitError::BranchNotFound(name) if name == "does-not-exist"));
}

#[tokio::test]
async fn compare_remotes_detects_a_different_repository() {
    let upstream = Upstream::new();
    let checkout = checkout_options("main");
    initialize_repository(&upstream.url(), &checkout.opts, &Output::new())
        .await
        .unwrap();

    let repo = GitRepository::open(&checkout.opts.directory).unwrap();

    repo.compare_remotes(&upstream.url()).unwrap();
    repo.compare_remotes(&format!("{}/", upstream.url())).unwrap();
    let err = repo.compare_remotes("git@github.com:someone/else.git").unwrap_err();
    assert!(matches!(err, GitError::RemoteMismatch { .. }));
    assert!(err.to_string().contains("does not match"));
}
