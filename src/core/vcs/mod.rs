//! Version control abstraction
//!
//! The stage driver only needs a handful of porcelain operations; they are
//! behind a trait so the controller tests can run against a recording fake
//! while production uses system git.

mod system_git;

pub use system_git::SystemGit;

use std::path::Path;

use crate::core::error::ReleaseResult;

/// Version-control operations consumed by the release stages.
///
/// Every operation fails fast on a non-zero exit of the underlying command;
/// recovery is re-invoking the orchestrator at the recorded stage, never an
/// internal retry.
pub trait Vcs {
  /// Fetch a ref from a remote
  fn fetch(&self, remote: &str, refname: &str) -> ReleaseResult<()>;

  /// Create a branch at `start_point` and switch to it
  fn create_branch(&self, name: &str, start_point: &str) -> ReleaseResult<()>;

  /// Switch to a branch, optionally pulling it from the given remote first
  fn switch_branch(&self, name: &str, pull_from: Option<&str>) -> ReleaseResult<()>;

  /// Push a branch to a remote, setting upstream
  fn push_branch(&self, remote: &str, name: &str) -> ReleaseResult<()>;

  /// Tag the current HEAD
  fn tag(&self, name: &str) -> ReleaseResult<()>;

  /// Push a tag to a remote
  fn push_tag(&self, remote: &str, name: &str) -> ReleaseResult<()>;

  /// Merge `source` into the current branch
  fn merge(&self, source: &str) -> ReleaseResult<()>;

  /// Stage a file
  fn add(&self, path: &Path) -> ReleaseResult<()>;

  /// Commit staged changes
  fn commit(&self, message: &str) -> ReleaseResult<()>;
}
