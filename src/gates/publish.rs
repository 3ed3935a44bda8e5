//! Publication gate
//!
//! Triggers the publish pipeline on the release tag and polls its jobs to
//! completion. Debug runs pass the dry-run toggle so nothing real is
//! published.

use crate::core::error::{PipelineError, ReleaseResult};
use crate::core::poll::PollPolicy;
use crate::forge::{Forge, Job, Pipeline, PipelineStatus};
use crate::ui::progress::JobProgress;

pub struct PublishGate<'a> {
  forge: &'a dyn Forge,
  policy: &'a PollPolicy,
}

impl<'a> PublishGate<'a> {
  pub fn new(forge: &'a dyn Forge, policy: &'a PollPolicy) -> Self {
    Self { forge, policy }
  }

  /// Trigger the publish pipeline on a tag
  pub fn trigger(&self, ref_name: &str, dry_run: bool) -> ReleaseResult<Pipeline> {
    println!("🚀 Triggering publish pipeline on '{}' (dry-run: {})", ref_name, dry_run);
    self.forge.create_pipeline(ref_name, dry_run)
  }

  /// Poll until every job in the pipeline is done.
  ///
  /// A `failed` job raises immediately with no further polls. After
  /// completion every job must report `success`; a pipeline whose jobs only
  /// got canceled or skipped is not a publication. Returns the final job
  /// list for the release announcement.
  pub fn wait_for_jobs(&self, pipeline: &Pipeline) -> ReleaseResult<Vec<Job>> {
    println!("⏳ Waiting for publish jobs to finish");

    let mut bar: Option<JobProgress> = None;
    let jobs = self.policy.wait_until("publish jobs", || {
      let jobs = self.forge.jobs(pipeline)?;
      for job in &jobs {
        if job.status.is_failed() {
          return Err(PipelineError::JobFailed { name: job.name.clone() }.into());
        }
      }
      if jobs.is_empty() {
        // Jobs may not have materialized yet right after pipeline creation
        return Ok(None);
      }
      let done = jobs.iter().filter(|j| j.status.is_done()).count();
      bar
        .get_or_insert_with(|| JobProgress::new(jobs.len(), "publish jobs"))
        .set(done);
      Ok((done == jobs.len()).then_some(jobs))
    })?;

    if let Some(job) = jobs.iter().find(|j| j.status != PipelineStatus::Success) {
      return Err(PipelineError::JobFailed { name: job.name.clone() }.into());
    }

    println!("\n✅ All {} publish jobs succeeded", jobs.len());
    Ok(jobs)
  }
}
