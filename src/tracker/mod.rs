//! Issue tracker abstraction
//!
//! The release scope lives in the tracker: issues bound to the release's
//! fix-version, one self-referential release tracking issue among them, and
//! the RC testing sub-tasks created per candidate. The trait keeps the
//! stage driver testable; [`jira::JiraTracker`] is the production client.

pub mod jira;

pub use jira::JiraTracker;

use std::fmt;

use crate::core::error::ReleaseResult;

/// Status of a tracker issue.
///
/// Only "Resolved" and "In Testing" count as ready for release; every other
/// status blocks the scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueStatus {
  Resolved,
  InTesting,
  Other(String),
}

impl IssueStatus {
  pub fn parse(name: &str) -> Self {
    match name {
      "Resolved" => IssueStatus::Resolved,
      "In Testing" => IssueStatus::InTesting,
      other => IssueStatus::Other(other.to_string()),
    }
  }

  pub fn as_str(&self) -> &str {
    match self {
      IssueStatus::Resolved => "Resolved",
      IssueStatus::InTesting => "In Testing",
      IssueStatus::Other(name) => name,
    }
  }

  /// Ready for release
  pub fn is_ready(&self) -> bool {
    matches!(self, IssueStatus::Resolved | IssueStatus::InTesting)
  }
}

impl fmt::Display for IssueStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A tracker issue, reduced to what the release flow consumes
#[derive(Debug, Clone)]
pub struct Issue {
  /// Tracker-internal id, used for parent links
  pub id: String,
  /// Human-facing key, e.g. "DP-1234"
  pub key: String,
  pub summary: String,
  pub status: IssueStatus,
  pub issue_type: String,
}

/// Operations the release flow performs against the issue tracker
pub trait IssueTracker {
  /// All issues bound to the project + fix-version pair
  fn search_issues(&self, project: &str, fix_version: &str) -> ReleaseResult<Vec<Issue>>;

  /// Find an existing RC testing sub-task by summary and fix-version
  fn find_subtask(&self, project: &str, summary: &str, fix_version: &str) -> ReleaseResult<Option<Issue>>;

  /// Create an RC testing sub-task under the release issue
  fn create_subtask(
    &self,
    project: &str,
    parent: &Issue,
    summary: &str,
    description: &str,
    fix_version: &str,
    component: Option<&str>,
  ) -> ReleaseResult<Issue>;

  /// Apply a named workflow transition to an issue
  fn transition(&self, issue: &Issue, transition: &str) -> ReleaseResult<()>;

  /// Re-fetch an issue by key for fresh status
  fn fetch(&self, key: &str) -> ReleaseResult<Issue>;

  /// Add a comment to an issue
  fn comment(&self, issue: &Issue, body: &str) -> ReleaseResult<()>;
}
