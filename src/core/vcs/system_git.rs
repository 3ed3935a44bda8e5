//! System git backend - zero dependencies
//!
//! Uses porcelain git commands against the working copy named by `--code`.
//! Subprocesses run with an isolated environment so local git configuration
//! cannot change behavior under the orchestrator.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::core::error::{GitError, ReleaseError, ReleaseResult, ResultExt};
use crate::core::vcs::Vcs;

/// Git backend using system git (zero crate dependencies)
pub struct SystemGit {
  /// Repository working directory
  repo_path: PathBuf,
}

impl SystemGit {
  /// Open a git repository
  ///
  /// This performs ONE subprocess call to verify the path is a working copy.
  pub fn open(path: &Path) -> ReleaseResult<Self> {
    let output = Command::new("git")
      .arg("-C")
      .arg(path)
      .args(["rev-parse", "--show-toplevel"])
      .output()
      .context("Failed to execute git rev-parse")?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      if stderr.contains("not a git repository") {
        return Err(ReleaseError::Git(GitError::RepoNotFound {
          path: path.to_path_buf(),
        }));
      }
      return Err(ReleaseError::message(format!("Failed to open git repository: {}", stderr)));
    }

    Ok(Self {
      repo_path: path.to_path_buf(),
    })
  }

  /// Get current branch name
  pub fn current_branch(&self) -> ReleaseResult<String> {
    let output = self
      .git_cmd()
      .args(["rev-parse", "--abbrev-ref", "HEAD"])
      .output()
      .context("Failed to get current branch")?;

    if !output.status.success() {
      return Ok("HEAD".to_string()); // Detached HEAD
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
  }

  /// Create a safe git command with isolated environment
  ///
  /// - Sets working directory to repo path
  /// - Clears environment variables
  /// - Whitelists only PATH and HOME
  /// - Adds safe configuration overrides
  fn git_cmd(&self) -> Command {
    let mut cmd = Command::new("git");

    cmd.arg("-C").arg(&self.repo_path);

    // Isolated environment (don't trust global config)
    cmd.env_clear();
    if let Ok(path) = std::env::var("PATH") {
      cmd.env("PATH", path);
    }
    if let Ok(home) = std::env::var("HOME") {
      cmd.env("HOME", home);
    }

    cmd.arg("-c").arg("protocol.version=2");
    cmd.arg("-c").arg("advice.detachedHead=false");

    cmd
  }

  /// Run a git command, mapping a non-zero exit to `GitError::CommandFailed`
  fn run(&self, args: &[&str]) -> ReleaseResult<()> {
    let output = self
      .git_cmd()
      .args(args)
      .output()
      .with_context(|| format!("Failed to execute git {}", args.join(" ")))?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      return Err(ReleaseError::Git(GitError::CommandFailed {
        command: format!("git {}", args.join(" ")),
        stderr: stderr.to_string(),
      }));
    }

    Ok(())
  }
}

impl Vcs for SystemGit {
  fn fetch(&self, remote: &str, refname: &str) -> ReleaseResult<()> {
    self.run(&["fetch", remote, refname])
  }

  fn create_branch(&self, name: &str, start_point: &str) -> ReleaseResult<()> {
    self.run(&["checkout", "-b", name, start_point])
  }

  fn switch_branch(&self, name: &str, pull_from: Option<&str>) -> ReleaseResult<()> {
    self.run(&["checkout", name])?;
    if let Some(remote) = pull_from {
      self.run(&["pull", remote, name])?;
    }
    Ok(())
  }

  fn push_branch(&self, remote: &str, name: &str) -> ReleaseResult<()> {
    let output = self
      .git_cmd()
      .args(["push", "-u", remote, name])
      .output()
      .context("Failed to push")?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      return Err(ReleaseError::Git(GitError::PushFailed {
        remote: remote.to_string(),
        branch: name.to_string(),
        reason: stderr.to_string(),
      }));
    }

    Ok(())
  }

  fn tag(&self, name: &str) -> ReleaseResult<()> {
    self.run(&["tag", name])
  }

  fn push_tag(&self, remote: &str, name: &str) -> ReleaseResult<()> {
    self.run(&["push", remote, name])
  }

  fn merge(&self, source: &str) -> ReleaseResult<()> {
    self.run(&["merge", source])
  }

  fn add(&self, path: &Path) -> ReleaseResult<()> {
    let path = path.to_string_lossy();
    self.run(&["add", path.as_ref()])
  }

  fn commit(&self, message: &str) -> ReleaseResult<()> {
    self.run(&["commit", "-m", message])
  }
}
