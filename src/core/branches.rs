//! Branch composites used by the release stages

use crate::core::error::ReleaseResult;
use crate::core::release::Release;
use crate::core::vcs::Vcs;

/// Higher-level branch operations over the raw [`Vcs`] primitives.
///
/// Working-copy checkouts make this a de facto global mutex: nothing here
/// supports two orchestrators sharing one working copy.
pub struct BranchManager<'a> {
  vcs: &'a dyn Vcs,
  remote: String,
}

impl<'a> BranchManager<'a> {
  pub fn new(vcs: &'a dyn Vcs, remote: impl Into<String>) -> Self {
    Self {
      vcs,
      remote: remote.into(),
    }
  }

  /// Create the release branch from the remote devel branch and the bump
  /// issue branch from the release branch, pushing both.
  ///
  /// Returns the issue branch name.
  pub fn create_release_branches(&self, release: &Release, issue_key: &str) -> ReleaseResult<String> {
    self.vcs.fetch(&self.remote, &release.devel)?;
    self.vcs.fetch(&self.remote, &release.trunk)?;

    let release_branch = release.release_branch();
    self
      .vcs
      .create_branch(&release_branch, &format!("{}/{}", self.remote, release.devel))?;
    self.vcs.push_branch(&self.remote, &release_branch)?;

    let issue_branch = release.issue_branch(issue_key);
    self.vcs.create_branch(&issue_branch, &release_branch)?;
    self.vcs.push_branch(&self.remote, &issue_branch)?;

    println!("🌿 Created {} and {}", release_branch, issue_branch);
    Ok(issue_branch)
  }

  /// Switch to `branch`, pull it, tag HEAD and push the tag
  pub fn tag(&self, branch: &str, tag: &str) -> ReleaseResult<()> {
    self.vcs.switch_branch(branch, Some(&self.remote))?;
    self.vcs.tag(tag)?;
    self.vcs.push_tag(&self.remote, tag)?;
    println!("🏷️  Tagged {} with {}", branch, tag);
    Ok(())
  }

  /// Merge `source` into `target` and push the result
  pub fn merge(&self, source: &str, target: &str) -> ReleaseResult<()> {
    self.vcs.switch_branch(target, Some(&self.remote))?;
    self.vcs.fetch(&self.remote, source)?;
    self.vcs.merge(source)?;
    self.vcs.push_branch(&self.remote, target)?;
    println!("🔀 Merged {} into {}", source, target);
    Ok(())
  }

  /// Create and push the uid-suffixed test branches a debug run operates on,
  /// branched from the real devel/trunk.
  pub fn bootstrap_test_branches(&self, release: &Release, base_devel: &str, base_trunk: &str) -> ReleaseResult<()> {
    self.vcs.create_branch(&release.devel, base_devel)?;
    self.vcs.create_branch(&release.trunk, base_trunk)?;
    self.vcs.push_branch(&self.remote, &release.trunk)?;
    self.vcs.push_branch(&self.remote, &release.devel)?;
    println!("🧪 Bootstrapped test branches {} and {}", release.devel, release.trunk);
    Ok(())
  }
}
