//! Integration tests for the system git backend and branch composites

use anyhow::Result;
use tempfile::TempDir;

use release_pilot::core::branches::BranchManager;
use release_pilot::core::config::BranchConfig;
use release_pilot::core::release::{Release, Stage};
use release_pilot::core::vcs::{SystemGit, Vcs};

use crate::helpers::TestRepo;

fn release(label: &str) -> Release {
  Release::new(label, Stage::Start, 1, false, None, &BranchConfig::default())
}

#[test]
fn test_open_rejects_non_repo() -> Result<()> {
  let dir = TempDir::new()?;
  assert!(SystemGit::open(dir.path()).is_err());
  Ok(())
}

#[test]
fn test_branch_create_push_switch() -> Result<()> {
  let repo = TestRepo::new()?;
  let git = SystemGit::open(&repo.path)?;

  git.fetch("origin", "develop")?;
  git.create_branch("release-4.2.0", "origin/develop")?;
  git.push_branch("origin", "release-4.2.0")?;

  assert!(repo.origin_has_branch("release-4.2.0")?);
  assert_eq!(repo.current_branch()?, "release-4.2.0");

  git.switch_branch("master", Some("origin"))?;
  assert_eq!(repo.current_branch()?, "master");
  Ok(())
}

#[test]
fn test_tag_is_pushed() -> Result<()> {
  let repo = TestRepo::new()?;
  let git = SystemGit::open(&repo.path)?;

  git.switch_branch("master", Some("origin"))?;
  git.tag("4.2.0-rc1")?;
  git.push_tag("origin", "4.2.0-rc1")?;

  assert!(repo.origin_has_tag("4.2.0-rc1")?);
  Ok(())
}

#[test]
fn test_add_commit_fail_fast_on_nothing_staged() -> Result<()> {
  let repo = TestRepo::new()?;
  let git = SystemGit::open(&repo.path)?;

  repo.write("notes.txt", "hello\n")?;
  git.add(std::path::Path::new("notes.txt"))?;
  git.commit("Add notes")?;
  assert_eq!(repo.last_commit_message()?, "Add notes");

  // No retry, no tolerance: an empty commit is a hard failure
  assert!(git.commit("Nothing to commit").is_err());
  Ok(())
}

#[test]
fn test_merge_lands_source_commits_on_target() -> Result<()> {
  let repo = TestRepo::new()?;
  let git = SystemGit::open(&repo.path)?;

  git.create_branch("feature", "develop")?;
  repo.write("feature.txt", "feature work\n")?;
  repo.commit_all("Add feature")?;
  git.push_branch("origin", "feature")?;

  let manager = BranchManager::new(&git, "origin");
  manager.merge("feature", "develop")?;

  assert_eq!(repo.current_branch()?, "develop");
  assert!(repo.read("feature.txt")?.contains("feature work"));

  // The merge result is on origin too
  let log = repo.git(&["log", "origin/develop", "--oneline"])?;
  assert!(String::from_utf8_lossy(&log.stdout).contains("Add feature"));
  Ok(())
}

#[test]
fn test_create_release_branches_is_deterministic() -> Result<()> {
  let repo = TestRepo::new()?;
  let git = SystemGit::open(&repo.path)?;
  let manager = BranchManager::new(&git, "origin");

  let issue_branch = manager.create_release_branches(&release("4.2.0"), "DP-2")?;

  assert_eq!(issue_branch, "issue-DP-2-release-4.2.0");
  assert!(repo.origin_has_branch("release-4.2.0")?);
  assert!(repo.origin_has_branch("issue-DP-2-release-4.2.0")?);
  Ok(())
}

#[test]
fn test_tag_composite_switches_first() -> Result<()> {
  let repo = TestRepo::new()?;
  let git = SystemGit::open(&repo.path)?;
  let manager = BranchManager::new(&git, "origin");

  manager.create_release_branches(&release("4.2.0"), "DP-2")?;
  manager.tag("release-4.2.0", "4.2.0-rc1")?;

  assert_eq!(repo.current_branch()?, "release-4.2.0");
  assert!(repo.origin_has_tag("4.2.0-rc1")?);
  Ok(())
}
