//! The stage driver
//!
//! Dispatches the release through its six stages in an explicit loop keyed
//! on the stage enum; the retest rollback is a normal transition in that
//! loop, not recursion, so arbitrarily many retest cycles cost no stack.
//!
//! No release state is persisted here. Every stage re-derives what it needs
//! from the external systems, which is what makes killing the process and
//! re-entering with `--stage` safe.

use std::path::Path;

use crate::core::branches::BranchManager;
use crate::core::bump;
use crate::core::config::Config;
use crate::core::error::{ReleaseError, ReleaseResult};
use crate::core::poll::PollPolicy;
use crate::core::release::{Release, Stage};
use crate::core::vcs::Vcs;
use crate::forge::{Forge, Job};
use crate::gates::publish::PublishGate;
use crate::gates::readiness::{self, Readiness};
use crate::gates::review::ReviewGate;
use crate::gates::testing::TestingGate;
use crate::tracker::IssueTracker;

pub struct StageController<'a> {
  release: Release,
  config: &'a Config,
  /// Working copy root, for version-file patching
  code: &'a Path,
  vcs: &'a dyn Vcs,
  tracker: &'a dyn IssueTracker,
  forge: &'a dyn Forge,
  policy: PollPolicy,
}

impl<'a> StageController<'a> {
  pub fn new(
    release: Release,
    config: &'a Config,
    code: &'a Path,
    vcs: &'a dyn Vcs,
    tracker: &'a dyn IssueTracker,
    forge: &'a dyn Forge,
    policy: PollPolicy,
  ) -> Self {
    Self {
      release,
      config,
      code,
      vcs,
      tracker,
      forge,
      policy,
    }
  }

  /// Stage the run is currently in; after a failure this is the operator's
  /// resumption point
  pub fn stage(&self) -> Stage {
    self.release.stage
  }

  pub fn rc_num(&self) -> u32 {
    self.release.rc_num
  }

  /// Drive the release from the entry stage to completion.
  ///
  /// Any error aborts the whole run; the caller reports `stage()` alongside
  /// it. Side effects behind us are idempotent, so the recovery action is
  /// re-invoking with `--stage`, never an internal retry.
  pub fn run(&mut self) -> ReleaseResult<()> {
    let config = self.config;
    let vcs = self.vcs;
    let tracker = self.tracker;
    let policy = self.policy.clone();

    let branches = BranchManager::new(vcs, config.branches.remote.as_str());
    let review = ReviewGate::new(self.forge, &policy);
    let testing = TestingGate::new(tracker, &policy);
    let publish = PublishGate::new(self.forge, &policy);

    let project = config.tracker.project.as_str();
    let fix_version = config.tracker.fix_version_for(&self.release.label);

    if self.release.debug && self.release.rc_num == 1 && self.release.stage == Stage::Start {
      branches.bootstrap_test_branches(&self.release, &config.branches.devel, &config.branches.trunk)?;
    }

    // The pre-check gates the run and supplies the release issue plus the
    // issue-count baseline the post-testing drift check compares against.
    let mut scope = readiness::check(tracker, project, &fix_version, &self.release.label)?;
    let release_issue = scope.release_issue.clone().ok_or_else(|| {
      ReleaseError::with_help(
        format!("No release tracking issue found for fix version '{}'", fix_version),
        "File an issue whose summary names the release and the version, bound to the fix version.",
      )
    })?;

    loop {
      println!("\n📍 Stage: {}", self.release.stage);

      match self.release.stage {
        Stage::Start => {
          branches.create_release_branches(&self.release, &release_issue.key)?;
          bump::bump_and_commit(
            vcs,
            &config.branches.remote,
            self.code,
            &config.version_files,
            &self.release,
            &release_issue.key,
          )?;
          self.release.stage = Stage::PostBump;
        }

        Stage::PostBump => {
          let source = self.release.issue_branch(&release_issue.key);
          let mr = review.get_or_create(&source, &self.release.release_branch(), &self.release.bump_title())?;
          review.wait_for_approval(&mr)?;
          review.wait_for_pipelines(&mr)?;
          review.merge(&mr)?;
          self.release.stage = Stage::PostBumpReview;
        }

        Stage::PostBumpReview => {
          // Scope pipelines are checked later, after testing; approval is
          // enough to cut a candidate.
          let mr = review.get_or_create(&self.release.release_branch(), &self.release.trunk, &self.release.scope_title())?;
          review.wait_for_approval(&mr)?;
          self.release.stage = Stage::PostScopeReview;
        }

        Stage::PostScopeReview => {
          branches.tag(&self.release.release_branch(), &self.release.rc_tag())?;
          let summary = config.tracker.rc_summary_for(&self.release.version, self.release.rc_num);
          let subtask = testing.ensure_subtask(
            project,
            &release_issue,
            &summary,
            &fix_version,
            config.tracker.component.as_deref(),
          )?;
          testing.wait_for_resolution(&subtask)?;
          self.release.stage = Stage::PostTesting;
        }

        Stage::PostTesting => {
          let current = self.wait_for_clean_scope(project, &fix_version)?;

          let grown = current.total as i64 - scope.total as i64;
          if grown < 0 || grown > i64::from(config.release.accepted_new_issues) {
            println!(
              "\n📋 Release scope changed during testing ({} -> {} issues). Sending for retesting.",
              scope.total, current.total
            );
            scope = current;
            self.release.rc_num += 1;
            self.release.stage = Stage::PostScopeReview;
            continue;
          }

          let mr = review.get_or_create(&self.release.release_branch(), &self.release.trunk, &self.release.scope_title())?;
          review.wait_for_pipelines(&mr)?;
          review.merge(&mr)?;
          self.release.stage = Stage::PostMasterMerge;
        }

        Stage::PostMasterMerge => {
          branches.tag(&self.release.trunk, &self.release.version)?;
          let pipeline = publish.trigger(&self.release.version, self.release.debug)?;
          let jobs = publish.wait_for_jobs(&pipeline)?;
          tracker.comment(&release_issue, &self.announce_body(&jobs))?;
          branches.merge(&self.release.release_branch(), &self.release.devel)?;
          println!("\n🎉 RELEASED!");
          return Ok(());
        }
      }
    }
  }

  /// Re-run the readiness gate until the scope is clean again.
  ///
  /// Bugs filed during testing block the gate until someone resolves or
  /// re-scopes them; that is a wait, not a failure. Anything else the gate
  /// reports is fatal.
  fn wait_for_clean_scope(&self, project: &str, fix_version: &str) -> ReleaseResult<Readiness> {
    let tracker = self.tracker;
    let label = self.release.label.clone();
    let mut announced = false;
    self.policy.wait_until("release scope to settle", move || {
      match readiness::check(tracker, project, fix_version, &label) {
        Ok(readiness) => Ok(Some(readiness)),
        Err(ReleaseError::Blocked(_)) => {
          if !announced {
            println!("⏳ Waiting for fixes for issues discovered in testing");
            announced = true;
          }
          Ok(None)
        }
        Err(err) => Err(err),
      }
    })
  }

  /// Comment body posted to the release issue after a successful publish
  fn announce_body(&self, jobs: &[Job]) -> String {
    let mut body = format!("Publish pipeline finished successfully ({} jobs).", jobs.len());
    let links: Vec<String> = self
      .config
      .publish
      .announce
      .iter()
      .map(|template| template.replace("{version}", &self.release.version))
      .collect();
    if !links.is_empty() {
      body.push_str("\nArtifacts:");
      for link in links {
        body.push('\n');
        body.push_str(&link);
      }
    }
    body
  }
}
