//! Release-candidate testing gate
//!
//! Each RC gets one testing sub-task under the release issue. The sub-task
//! is found by its summary so a restarted run reuses it instead of filing a
//! duplicate, then sits in "In Testing" until a human resolves it.

use crate::core::error::ReleaseResult;
use crate::core::poll::PollPolicy;
use crate::tracker::{Issue, IssueStatus, IssueTracker};

const DESCRIPTION: &str =
  "Check the tickets that are part of this release for hints on what is important to test.";

pub struct TestingGate<'a> {
  tracker: &'a dyn IssueTracker,
  policy: &'a PollPolicy,
}

impl<'a> TestingGate<'a> {
  pub fn new(tracker: &'a dyn IssueTracker, policy: &'a PollPolicy) -> Self {
    Self { tracker, policy }
  }

  /// Find or create the RC testing sub-task and move it into testing
  pub fn ensure_subtask(
    &self,
    project: &str,
    parent: &Issue,
    summary: &str,
    fix_version: &str,
    component: Option<&str>,
  ) -> ReleaseResult<Issue> {
    let subtask = match self.tracker.find_subtask(project, summary, fix_version)? {
      Some(existing) => {
        println!("🔁 Testing sub-task {} is already there", existing.key);
        existing
      }
      None => {
        println!("📝 Creating testing sub-task '{}'", summary);
        self
          .tracker
          .create_subtask(project, parent, summary, DESCRIPTION, fix_version, component)?
      }
    };

    // Already in or past testing on re-entry; the transition would not exist
    if !subtask.status.is_ready() {
      self.tracker.transition(&subtask, "In Testing")?;
    }

    Ok(subtask)
  }

  /// Poll the sub-task until a human resolves it. Manual testing duration is
  /// unpredictable, so the default policy waits indefinitely.
  pub fn wait_for_resolution(&self, subtask: &Issue) -> ReleaseResult<()> {
    println!("⏳ Waiting for testing of {} to complete", subtask.key);
    self.policy.wait_until("testing to complete", || {
      let current = self.tracker.fetch(&subtask.key)?;
      Ok((current.status == IssueStatus::Resolved).then_some(()))
    })?;
    println!("\n✅ Testing done.");
    Ok(())
  }
}
