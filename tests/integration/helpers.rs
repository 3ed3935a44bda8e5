//! Test helpers for integration tests

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// A working copy wired to a local bare origin, so push/fetch/pull are real
pub struct TestRepo {
  _root: TempDir,
  pub origin: PathBuf,
  pub path: PathBuf,
}

impl TestRepo {
  /// Create a repo with master + develop pushed to origin
  pub fn new() -> Result<Self> {
    let root = TempDir::new()?;

    let origin = root.path().join("origin.git");
    std::fs::create_dir(&origin)?;
    git(&origin, &["init", "--bare", "--initial-branch=master"])?;

    let path = root.path().join("work");
    std::fs::create_dir(&path)?;
    git(&path, &["init", "--initial-branch=master"])?;
    git(&path, &["config", "user.name", "Test User"])?;
    git(&path, &["config", "user.email", "test@example.com"])?;

    std::fs::write(path.join("README.md"), "# test repo\n")?;
    git(&path, &["add", "."])?;
    git(&path, &["commit", "-m", "Initial commit"])?;

    git(&path, &["remote", "add", "origin", origin.to_str().unwrap()])?;
    git(&path, &["push", "-u", "origin", "master"])?;

    git(&path, &["checkout", "-b", "develop"])?;
    git(&path, &["push", "-u", "origin", "develop"])?;

    Ok(Self {
      _root: root,
      origin,
      path,
    })
  }

  /// Run git in the working copy
  pub fn git(&self, args: &[&str]) -> Result<Output> {
    git(&self.path, args)
  }

  /// Write a file relative to the working copy root
  pub fn write(&self, rel: &str, content: &str) -> Result<()> {
    let file = self.path.join(rel);
    if let Some(parent) = file.parent() {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(file, content)?;
    Ok(())
  }

  /// Read a file relative to the working copy root
  pub fn read(&self, rel: &str) -> Result<String> {
    Ok(std::fs::read_to_string(self.path.join(rel))?)
  }

  /// Stage and commit everything
  pub fn commit_all(&self, message: &str) -> Result<()> {
    self.git(&["add", "."])?;
    self.git(&["commit", "-m", message])?;
    Ok(())
  }

  /// Current branch of the working copy
  pub fn current_branch(&self) -> Result<String> {
    let output = self.git(&["rev-parse", "--abbrev-ref", "HEAD"])?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
  }

  /// Last commit subject on the current branch
  pub fn last_commit_message(&self) -> Result<String> {
    let output = self.git(&["log", "-1", "--format=%s"])?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
  }

  /// Whether origin has a branch of this name
  pub fn origin_has_branch(&self, branch: &str) -> Result<bool> {
    let output = self.git(&["ls-remote", "--heads", "origin", branch])?;
    Ok(!output.stdout.is_empty())
  }

  /// Whether origin has a tag of this name
  pub fn origin_has_tag(&self, tag: &str) -> Result<bool> {
    let output = self.git(&["ls-remote", "--tags", "origin", tag])?;
    Ok(!output.stdout.is_empty())
  }
}

/// Run git command in a directory
pub fn git(cwd: &Path, args: &[&str]) -> Result<Output> {
  let output = Command::new("git")
    .current_dir(cwd)
    .args(args)
    .output()
    .context("Failed to run git command")?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    anyhow::bail!("Git command failed: git {}\n{}", args.join(" "), stderr);
  }

  Ok(output)
}
