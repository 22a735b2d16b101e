// ABOUTME: Git synchronization of the project checkout: clone, fetch, fast-forward, force pull.
// ABOUTME: libgit2 calls run on the blocking pool; the repository is reopened per operation.

mod credential;
mod error;
pub mod remote;

pub use credential::GitCredential;
pub use error::GitError;
pub use remote::{canonical_remote, ssh_remote_url};

use crate::output::Output;
use credential::CredentialAttempts;
use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{AutotagOption, FetchOptions, FetchPrune, RemoteCallbacks, Repository};
use std::path::{Path, PathBuf};

const FETCH_REFSPEC: &str = "+refs/heads/*:refs/remotes/origin/*";

/// Where and what to check out, and how to authenticate.
#[derive(Debug, Clone)]
pub struct RepoOptions {
    pub directory: PathBuf,
    pub branch: String,
    pub credential: GitCredential,
}

/// Branch, commit hash and message of the checked-out HEAD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadInfo {
    pub branch: String,
    pub commit_hash: String,
    pub message: String,
}

/// How an update brought the checkout in line with the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    UpToDate,
    FastForwarded,
    /// History diverged; the checkout was deleted and cloned again.
    ForcePulled,
}

/// Handle to a local checkout.
#[derive(Debug, Clone)]
pub struct GitRepository {
    directory: PathBuf,
}

impl GitRepository {
    /// Open an existing checkout.
    pub fn open(directory: impl Into<PathBuf>) -> Result<Self, GitError> {
        let directory = directory.into();
        Repository::open(&directory).map_err(GitError::git("open"))?;
        Ok(Self { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn repo(&self) -> Result<Repository, GitError> {
        Repository::open(&self.directory).map_err(GitError::git("open"))
    }

    pub fn head(&self) -> Result<HeadInfo, GitError> {
        let repo = self.repo()?;
        head_info(&repo)
    }

    pub fn origin_url(&self) -> Result<String, GitError> {
        let repo = self.repo()?;
        origin_url(&repo)
    }

    /// Check that `candidate` names the same repository as origin.
    ///
    /// An empty candidate always matches.
    pub fn compare_remotes(&self, candidate: &str) -> Result<(), GitError> {
        if candidate.trim().is_empty() {
            return Ok(());
        }
        let local = self.origin_url()?;
        if canonical_remote(&local) == canonical_remote(candidate) {
            Ok(())
        } else {
            Err(GitError::RemoteMismatch {
                local,
                given: candidate.to_string(),
            })
        }
    }
}

/// Clone `remote_url` at `opts.branch` into `opts.directory`.
///
/// The directory must be empty or absent. Returns once HEAD resolves to a commit.
pub async fn initialize_repository(
    remote_url: &str,
    opts: &RepoOptions,
    out: &Output,
) -> Result<GitRepository, GitError> {
    let remote_url = remote_url.to_string();
    let opts = opts.clone();
    let out = out.clone();
    tokio::task::spawn_blocking(move || clone_into(&remote_url, &opts, &out)).await?
}

/// Fetch all branches and tags, check out `opts.branch`, and bring it up to date.
///
/// When the local branch cannot be fast-forwarded the checkout is deleted and
/// cloned again, discarding any local state.
pub async fn update_repository(
    repo: &GitRepository,
    opts: &RepoOptions,
    out: &Output,
) -> Result<UpdateOutcome, GitError> {
    let directory = repo.directory.clone();
    let opts = opts.clone();
    let out = out.clone();
    tokio::task::spawn_blocking(move || update(&directory, &opts, &out)).await?
}

/// Delete everything inside `dir`, keeping `dir` itself. A missing directory is fine.
pub fn remove_contents(dir: &Path) -> std::io::Result<()> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() && !path.is_symlink() {
            std::fs::remove_dir_all(&path)?;
        } else {
            std::fs::remove_file(&path)?;
        }
    }
    Ok(())
}

fn fetch_options<'a>(opts: &'a RepoOptions, out: &Output) -> FetchOptions<'a> {
    let mut callbacks = RemoteCallbacks::new();
    let mut attempts = CredentialAttempts::new(&opts.credential);
    callbacks.credentials(move |_url, username, allowed| attempts.next(username, allowed));
    let out = out.clone();
    callbacks.sideband_progress(move |data| {
        out.raw(data);
        true
    });

    let mut fetch = FetchOptions::new();
    fetch.remote_callbacks(callbacks);
    fetch
}

fn network_error(op: &'static str, opts: &RepoOptions) -> impl FnOnce(git2::Error) -> GitError {
    move |source| {
        if error::is_auth_failure(&source) {
            GitError::AuthenticationFailed {
                deploy_key: opts.credential.public_key(),
            }
        } else {
            GitError::Git { op, source }
        }
    }
}

fn clone_into(remote_url: &str, opts: &RepoOptions, out: &Output) -> Result<GitRepository, GitError> {
    out.progress(format!(
        "Cloning {} ({}) into {}...",
        ssh_remote_url(remote_url),
        opts.branch,
        opts.directory.display()
    ));

    let mut builder = RepoBuilder::new();
    builder.branch(&opts.branch);
    builder.fetch_options(fetch_options(opts, out));
    let repo = builder
        .clone(remote_url, &opts.directory)
        .map_err(network_error("clone", opts))?;

    let head = head_info(&repo)?;
    tracing::info!(
        branch = %head.branch,
        commit = %head.commit_hash,
        "repository cloned"
    );
    Ok(GitRepository {
        directory: opts.directory.clone(),
    })
}

fn update(directory: &Path, opts: &RepoOptions, out: &Output) -> Result<UpdateOutcome, GitError> {
    let repo = Repository::open(directory).map_err(GitError::git("open"))?;
    out.progress(format!("Updating repository ({})...", opts.branch));

    fetch_all(&repo, opts, out)?;
    checkout_branch(&repo, &opts.branch)?;

    match fast_forward(&repo, &opts.branch) {
        Err(GitError::NotFastForward) => {
            let url = origin_url(&repo)?;
            drop(repo);
            tracing::warn!(
                directory = %directory.display(),
                "branch cannot be fast-forwarded, re-cloning"
            );
            out.warning("Local history has diverged from the remote; discarding the checkout and cloning again");
            remove_contents(directory)?;
            clone_into(&url, opts, out)?;
            Ok(UpdateOutcome::ForcePulled)
        }
        other => other,
    }
}

fn fetch_all(repo: &Repository, opts: &RepoOptions, out: &Output) -> Result<(), GitError> {
    let mut remote = repo.find_remote("origin").map_err(|_| GitError::NoOrigin)?;
    let mut fetch = fetch_options(opts, out);
    fetch.download_tags(AutotagOption::All);
    fetch.prune(FetchPrune::On);
    remote
        .fetch(&[FETCH_REFSPEC], Some(&mut fetch), None)
        .map_err(network_error("fetch", opts))
}

/// Point HEAD at the local branch, creating it from the remote-tracking ref if needed.
fn checkout_branch(repo: &Repository, branch: &str) -> Result<(), GitError> {
    let local = format!("refs/heads/{branch}");
    if repo.find_reference(&local).is_err() {
        let target = repo
            .find_reference(&format!("refs/remotes/origin/{branch}"))
            .map_err(|_| GitError::BranchNotFound(branch.to_string()))?
            .peel_to_commit()
            .map_err(GitError::git("resolve branch"))?;
        repo.branch(branch, &target, false)
            .map_err(GitError::git("create branch"))?;
    }
    repo.set_head(&local).map_err(GitError::git("set HEAD"))?;
    repo.checkout_head(Some(CheckoutBuilder::new().force()))
        .map_err(GitError::git("checkout"))
}

fn fast_forward(repo: &Repository, branch: &str) -> Result<UpdateOutcome, GitError> {
    let upstream = repo
        .find_reference(&format!("refs/remotes/origin/{branch}"))
        .map_err(|_| GitError::BranchNotFound(branch.to_string()))?;
    let incoming = repo
        .reference_to_annotated_commit(&upstream)
        .map_err(GitError::git("resolve upstream"))?;
    let (analysis, _) = repo
        .merge_analysis(&[&incoming])
        .map_err(GitError::git("merge analysis"))?;

    if analysis.is_up_to_date() {
        return Ok(UpdateOutcome::UpToDate);
    }
    if !analysis.is_fast_forward() {
        return Err(GitError::NotFastForward);
    }

    let mut local = repo
        .find_reference(&format!("refs/heads/{branch}"))
        .map_err(GitError::git("find branch"))?;
    local
        .set_target(incoming.id(), "keel: fast-forward")
        .map_err(GitError::git("fast-forward"))?;
    repo.checkout_head(Some(CheckoutBuilder::new().force()))
        .map_err(GitError::git("checkout"))?;
    Ok(UpdateOutcome::FastForwarded)
}

fn head_info(repo: &Repository) -> Result<HeadInfo, GitError> {
    let head = repo.head().map_err(GitError::git("read HEAD"))?;
    let commit = head.peel_to_commit().map_err(GitError::git("resolve HEAD"))?;
    Ok(HeadInfo {
        branch: head.shorthand().unwrap_or_default().to_string(),
        commit_hash: commit.id().to_string(),
        message: commit.message().unwrap_or_default().trim().to_string(),
    })
}

fn origin_url(repo: &Repository) -> Result<String, GitError> {
    let remote = repo.find_remote("origin").map_err(|_| GitError::NoOrigin)?;
    remote
        .url()
        .map(str::to_string)
        .ok_or(GitError::NoOrigin)
}
