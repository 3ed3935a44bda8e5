//! Review/CI service abstraction
//!
//! Merge requests, their approval state and pipelines, and the publish
//! pipeline with its jobs. The trait keeps the stage driver testable;
//! [`gitlab::GitLabForge`] is the production client.

pub mod gitlab;

pub use gitlab::GitLabForge;

use serde::Deserialize;

use crate::core::error::ReleaseResult;

/// An open review request between two branches
#[derive(Debug, Clone)]
pub struct MergeRequest {
  /// Project-scoped id used in API paths
  pub iid: u64,
  pub source_branch: String,
  pub target_branch: String,
  pub title: String,
}

/// Status of a pipeline run or job.
///
/// `failed` is terminal and fatal. `success`, `canceled` and `skipped` count
/// as done. Anything else (pending, running, manual, ...) means the run is
/// not finished and polling continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
  Pending,
  Running,
  Success,
  Canceled,
  Skipped,
  Failed,
  #[serde(other)]
  Other,
}

impl PipelineStatus {
  pub fn is_done(self) -> bool {
    matches!(
      self,
      PipelineStatus::Success | PipelineStatus::Canceled | PipelineStatus::Skipped
    )
  }

  pub fn is_failed(self) -> bool {
    self == PipelineStatus::Failed
  }
}

/// A pipeline run attached to a merge request
#[derive(Debug, Clone)]
pub struct PipelineRun {
  pub id: u64,
  pub status: PipelineStatus,
}

/// A pipeline created directly on a ref (the publish pipeline)
#[derive(Debug, Clone)]
pub struct Pipeline {
  pub id: u64,
  pub ref_name: String,
}

/// A job inside a pipeline
#[derive(Debug, Clone)]
pub struct Job {
  pub id: u64,
  pub name: String,
  pub status: PipelineStatus,
}

/// Operations the release flow performs against the review/CI service
pub trait Forge {
  /// First open merge request from `source` into `target`, if any
  fn find_open_merge_request(&self, source: &str, target: &str) -> ReleaseResult<Option<MergeRequest>>;

  /// Open a new merge request
  fn create_merge_request(&self, source: &str, target: &str, title: &str) -> ReleaseResult<MergeRequest>;

  /// Subscribe the token's user to merge request notifications
  fn subscribe(&self, mr: &MergeRequest) -> ReleaseResult<()>;

  /// Outstanding approvals before the merge request is accepted
  fn approvals_left(&self, mr: &MergeRequest) -> ReleaseResult<u32>;

  /// Pipeline runs attached to the merge request
  fn pipelines(&self, mr: &MergeRequest) -> ReleaseResult<Vec<PipelineRun>>;

  /// Merge an accepted merge request. The service rejects this while the
  /// request is not yet mergeable; callers retry.
  fn merge(&self, mr: &MergeRequest) -> ReleaseResult<()>;

  /// Trigger a pipeline on a ref with the dry-run toggle
  fn create_pipeline(&self, ref_name: &str, dry_run: bool) -> ReleaseResult<Pipeline>;

  /// Jobs of a pipeline
  fn jobs(&self, pipeline: &Pipeline) -> ReleaseResult<Vec<Job>>;
}
