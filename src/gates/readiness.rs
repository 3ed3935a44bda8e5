//! Release-scope readiness check
//!
//! Runs before the first stage and again after testing to detect scope
//! drift. Every issue bound to the fix-version must be "Resolved" or
//! "In Testing"; the one exception is the release tracking issue itself,
//! whose summary names the release and the version.

use crate::core::error::{BlockedRelease, ReleaseResult};
use crate::tracker::{Issue, IssueTracker};

/// Outcome of a passing readiness check
#[derive(Debug, Clone)]
pub struct Readiness {
  /// The self-referential release tracking issue, when present
  pub release_issue: Option<Issue>,
  /// Total number of issues bound to the fix-version
  pub total: usize,
}

/// Check that every issue in the release scope is ready.
///
/// Fails with [`BlockedRelease`] naming the offending issues otherwise.
pub fn check(tracker: &dyn IssueTracker, project: &str, fix_version: &str, version: &str) -> ReleaseResult<Readiness> {
  let issues = tracker.search_issues(project, fix_version)?;

  let mut release_issue = None;
  let mut blocked = Vec::new();

  for issue in &issues {
    if is_release_issue(issue, version) {
      println!("📋 {} is about releasing itself.", issue.key);
      release_issue = Some(issue.clone());
    } else if issue.status.is_ready() {
      println!("✅ {} ready.", issue.key);
    } else {
      println!("⏳ {} not ready: {}", issue.key, issue.status);
      blocked.push((issue.key.clone(), issue.status.to_string()));
    }
  }

  if !blocked.is_empty() {
    return Err(BlockedRelease { issues: blocked }.into());
  }

  println!("✅ All {} issues ready for releasing", issues.len());
  Ok(Readiness {
    release_issue,
    total: issues.len(),
  })
}

/// The issue tracking the release itself: summary mentions "release"
/// (case-insensitively) and contains the version label
fn is_release_issue(issue: &Issue, version: &str) -> bool {
  issue.summary.to_lowercase().contains("release") && issue.summary.contains(version)
}
