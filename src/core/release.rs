//! The release being driven and the stage it is in
//!
//! All branch and tag names derive deterministically from the version label,
//! so a restarted run lands on the same names. Debug mode swaps in
//! uid-suffixed test names so repeated test runs never collide with each
//! other or with a real release.

use chrono::Utc;
use clap::ValueEnum;
use std::fmt;

use crate::core::config::BranchConfig;

/// Resumption points of the release process, in forward order.
///
/// The only backward edge is post-testing -> post-scope-review, taken when
/// testing surfaces new release-blocking issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Stage {
  Start,
  PostBump,
  PostBumpReview,
  PostScopeReview,
  PostTesting,
  PostMasterMerge,
}

impl Stage {
  pub fn as_str(&self) -> &'static str {
    match self {
      Stage::Start => "start",
      Stage::PostBump => "post-bump",
      Stage::PostBumpReview => "post-bump-review",
      Stage::PostScopeReview => "post-scope-review",
      Stage::PostTesting => "post-testing",
      Stage::PostMasterMerge => "post-master-merge",
    }
  }
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// One release run: the label under release, the stage to enter, and the
/// effective branch names
#[derive(Debug, Clone)]
pub struct Release {
  /// Version label as given on the command line, used for the tracker's
  /// fix-version and for patching version files
  pub label: String,
  /// Effective version used in branch, tag and review-request names;
  /// rewritten to a test name in debug mode
  pub version: String,
  pub stage: Stage,
  pub rc_num: u32,
  pub debug: bool,
  /// Collision-avoidance suffix for debug runs
  pub uid: Option<String>,
  /// Effective development branch
  pub devel: String,
  /// Effective trunk branch
  pub trunk: String,
}

impl Release {
  pub fn new(
    label: impl Into<String>,
    stage: Stage,
    rc_num: u32,
    debug: bool,
    uid: Option<String>,
    branches: &BranchConfig,
  ) -> Self {
    let label = label.into();
    let uid = if debug {
      Some(uid.unwrap_or_else(|| Utc::now().timestamp().to_string()))
    } else {
      None
    };
    let (version, devel, trunk) = match &uid {
      Some(uid) => (
        format!("test-version-{}", uid),
        format!("release-test-{}-{}", branches.devel, uid),
        format!("release-test-{}-{}", branches.trunk, uid),
      ),
      None => (label.clone(), branches.devel.clone(), branches.trunk.clone()),
    };
    Self {
      label,
      version,
      stage,
      rc_num,
      debug,
      uid,
      devel,
      trunk,
    }
  }

  /// Branch holding the release scope
  pub fn release_branch(&self) -> String {
    format!("release-{}", self.version)
  }

  /// Branch the version bump lands on before review
  pub fn issue_branch(&self, issue_key: &str) -> String {
    format!("issue-{}-release-{}", issue_key, self.version)
  }

  /// Tag name for the current release candidate
  pub fn rc_tag(&self) -> String {
    format!("{}-rc{}", self.version, self.rc_num)
  }

  /// Title of the version-bump review request
  pub fn bump_title(&self) -> String {
    format!("Version bump for {} release", self.version)
  }

  /// Title of the release-scope review request
  pub fn scope_title(&self) -> String {
    format!("Release {} scope", self.version)
  }
}
