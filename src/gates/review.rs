//! Review-request gate
//!
//! Locates or creates a merge request between two branches, waits out human
//! review and CI, and performs the merge. Lookup by (source, target, open)
//! makes every entry point here safe to re-run after a crash.

use crate::core::error::{PipelineError, ReleaseResult};
use crate::core::poll::PollPolicy;
use crate::forge::{Forge, MergeRequest, PipelineRun};

pub struct ReviewGate<'a> {
  forge: &'a dyn Forge,
  policy: &'a PollPolicy,
}

impl<'a> ReviewGate<'a> {
  pub fn new(forge: &'a dyn Forge, policy: &'a PollPolicy) -> Self {
    Self { forge, policy }
  }

  /// Find the open merge request between the branches or create it.
  ///
  /// Calling this twice yields the same request; re-running after a restart
  /// never duplicates it.
  pub fn get_or_create(&self, source: &str, target: &str, title: &str) -> ReleaseResult<MergeRequest> {
    let mr = match self.forge.find_open_merge_request(source, target)? {
      Some(existing) => {
        println!("🔁 Merge request !{} is already there ({} -> {})", existing.iid, source, target);
        existing
      }
      None => {
        println!("📝 Creating '{}' merge request ({} -> {})", title, source, target);
        self.forge.create_merge_request(source, target, title)?
      }
    };

    // Notifications only; a failed subscription never blocks the release.
    let _ = self.forge.subscribe(&mr);

    Ok(mr)
  }

  /// Poll until no approvals are outstanding.
  ///
  /// Human review latency is unpredictable, so the default policy waits
  /// indefinitely.
  pub fn wait_for_approval(&self, mr: &MergeRequest) -> ReleaseResult<()> {
    println!("⏳ Waiting for '{}' to be accepted", mr.title);
    self.policy.wait_until("approval", || {
      let left = self.forge.approvals_left(mr)?;
      Ok((left == 0).then_some(()))
    })
  }

  /// Poll until every pipeline run on the request is done.
  ///
  /// A `failed` run raises immediately; no further polls are made.
  pub fn wait_for_pipelines(&self, mr: &MergeRequest) -> ReleaseResult<()> {
    println!("\n⏳ Waiting for pipelines of !{} to finish", mr.iid);
    self.policy.wait_until("pipelines", || {
      let runs = self.forge.pipelines(mr)?;
      pipelines_done(&runs).map(|done| done.then_some(()))
    })
  }

  /// Merge the request, retrying while the service still reports it
  /// unmergeable. Unbounded with the default policy.
  pub fn merge(&self, mr: &MergeRequest) -> ReleaseResult<()> {
    println!("\n🔀 Merging !{} into {}", mr.iid, mr.target_branch);
    self.policy.retry_until("merge", || self.forge.merge(mr))
  }
}

/// All runs done, or an error for the first failed one
fn pipelines_done(runs: &[PipelineRun]) -> ReleaseResult<bool> {
  for run in runs {
    if run.status.is_failed() {
      return Err(PipelineError::PipelineFailed { id: run.id }.into());
    }
  }
  Ok(runs.iter().all(|run| run.status.is_done()))
}
