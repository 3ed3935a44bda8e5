//! Stage driver scenarios against in-memory fakes
//!
//! The fakes script what the external systems report per call, so the
//! forward path, the retest rollback and the fatal aborts can all be
//! exercised without a tracker, a forge or a network.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::Path;

use release_pilot::controller::StageController;
use release_pilot::core::config::Config;
use release_pilot::core::error::{PipelineError, ReleaseError, ReleaseResult};
use release_pilot::core::poll::PollPolicy;
use release_pilot::core::release::{Release, Stage};
use release_pilot::core::vcs::Vcs;
use release_pilot::forge::{Forge, Job, MergeRequest, Pipeline, PipelineRun, PipelineStatus};
use release_pilot::tracker::{Issue, IssueStatus, IssueTracker};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Records every operation; all of them succeed
#[derive(Default)]
struct FakeVcs {
  ops: RefCell<Vec<String>>,
}

impl FakeVcs {
  fn ops(&self) -> Vec<String> {
    self.ops.borrow().clone()
  }

  fn has(&self, op: &str) -> bool {
    self.ops.borrow().iter().any(|o| o.as_str() == op)
  }

  fn record(&self, op: String) -> ReleaseResult<()> {
    self.ops.borrow_mut().push(op);
    Ok(())
  }
}

impl Vcs for FakeVcs {
  fn fetch(&self, remote: &str, refname: &str) -> ReleaseResult<()> {
    self.record(format!("fetch {} {}", remote, refname))
  }

  fn create_branch(&self, name: &str, start_point: &str) -> ReleaseResult<()> {
    self.record(format!("create {} from {}", name, start_point))
  }

  fn switch_branch(&self, name: &str, _pull_from: Option<&str>) -> ReleaseResult<()> {
    self.record(format!("switch {}", name))
  }

  fn push_branch(&self, remote: &str, name: &str) -> ReleaseResult<()> {
    self.record(format!("push {} {}", remote, name))
  }

  fn tag(&self, name: &str) -> ReleaseResult<()> {
    self.record(format!("tag {}", name))
  }

  fn push_tag(&self, remote: &str, name: &str) -> ReleaseResult<()> {
    self.record(format!("push-tag {} {}", remote, name))
  }

  fn merge(&self, source: &str) -> ReleaseResult<()> {
    self.record(format!("merge {}", source))
  }

  fn add(&self, path: &Path) -> ReleaseResult<()> {
    self.record(format!("add {}", path.display()))
  }

  fn commit(&self, message: &str) -> ReleaseResult<()> {
    self.record(format!("commit {}", message))
  }
}

/// Scripted issue tracker: successive `search_issues` calls walk the scope
/// script (last entry repeats); sub-tasks accumulate; fetched issues are
/// always resolved so testing completes on the first poll
struct FakeTracker {
  scopes: RefCell<Vec<Vec<Issue>>>,
  searches: Cell<usize>,
  subtasks: RefCell<Vec<Issue>>,
  created_subtasks: RefCell<Vec<String>>,
  transitions: RefCell<Vec<(String, String)>>,
  comments: RefCell<Vec<String>>,
}

impl FakeTracker {
  fn with_scopes(scopes: Vec<Vec<Issue>>) -> Self {
    Self {
      scopes: RefCell::new(scopes),
      searches: Cell::new(0),
      subtasks: RefCell::new(Vec::new()),
      created_subtasks: RefCell::new(Vec::new()),
      transitions: RefCell::new(Vec::new()),
      comments: RefCell::new(Vec::new()),
    }
  }
}

impl IssueTracker for FakeTracker {
  fn search_issues(&self, _project: &str, _fix_version: &str) -> ReleaseResult<Vec<Issue>> {
    let scopes = self.scopes.borrow();
    let i = self.searches.get().min(scopes.len() - 1);
    self.searches.set(self.searches.get() + 1);
    Ok(scopes[i].clone())
  }

  fn find_subtask(&self, _project: &str, summary: &str, _fix_version: &str) -> ReleaseResult<Option<Issue>> {
    Ok(self.subtasks.borrow().iter().find(|i| i.summary == summary).cloned())
  }

  fn create_subtask(
    &self,
    _project: &str,
    _parent: &Issue,
    summary: &str,
    _description: &str,
    _fix_version: &str,
    _component: Option<&str>,
  ) -> ReleaseResult<Issue> {
    let n = self.created_subtasks.borrow().len() + 1;
    let subtask = Issue {
      id: format!("{}", 100 + n),
      key: format!("DP-{}", 100 + n),
      summary: summary.to_string(),
      status: IssueStatus::Other("Open".into()),
      issue_type: "Sub-task".to_string(),
    };
    self.subtasks.borrow_mut().push(subtask.clone());
    self.created_subtasks.borrow_mut().push(summary.to_string());
    Ok(subtask)
  }

  fn transition(&self, issue: &Issue, transition: &str) -> ReleaseResult<()> {
    self
      .transitions
      .borrow_mut()
      .push((issue.key.clone(), transition.to_string()));
    Ok(())
  }

  fn fetch(&self, key: &str) -> ReleaseResult<Issue> {
    Ok(Issue {
      id: "0".into(),
      key: key.to_string(),
      summary: String::new(),
      status: IssueStatus::Resolved,
      issue_type: "Sub-task".to_string(),
    })
  }

  fn comment(&self, _issue: &Issue, body: &str) -> ReleaseResult<()> {
    self.comments.borrow_mut().push(body.to_string());
    Ok(())
  }
}

/// Scripted forge: approvals always clear, pipelines succeed unless targeted
/// at `fail_pipelines_into`, jobs report `job_status`
struct FakeForge {
  open: RefCell<Vec<MergeRequest>>,
  next_iid: Cell<u64>,
  created: RefCell<Vec<(String, String)>>,
  merged: RefCell<Vec<String>>,
  fail_pipelines_into: Option<String>,
  pipeline_polls: RefCell<HashMap<String, u32>>,
  job_status: PipelineStatus,
  pipelines_created: RefCell<Vec<(String, bool)>>,
}

impl FakeForge {
  fn new() -> Self {
    Self {
      open: RefCell::new(Vec::new()),
      next_iid: Cell::new(0),
      created: RefCell::new(Vec::new()),
      merged: RefCell::new(Vec::new()),
      fail_pipelines_into: None,
      pipeline_polls: RefCell::new(HashMap::new()),
      job_status: PipelineStatus::Success,
      pipelines_created: RefCell::new(Vec::new()),
    }
  }

  fn failing_pipelines_into(target: &str) -> Self {
    Self {
      fail_pipelines_into: Some(target.to_string()),
      ..Self::new()
    }
  }

  fn failing_jobs() -> Self {
    Self {
      job_status: PipelineStatus::Failed,
      ..Self::new()
    }
  }

  fn polls_into(&self, target: &str) -> u32 {
    self.pipeline_polls.borrow().get(target).copied().unwrap_or(0)
  }
}

impl Forge for FakeForge {
  fn find_open_merge_request(&self, source: &str, target: &str) -> ReleaseResult<Option<MergeRequest>> {
    Ok(
      self
        .open
        .borrow()
        .iter()
        .find(|mr| mr.source_branch == source && mr.target_branch == target)
        .cloned(),
    )
  }

  fn create_merge_request(&self, source: &str, target: &str, title: &str) -> ReleaseResult<MergeRequest> {
    self.next_iid.set(self.next_iid.get() + 1);
    let mr = MergeRequest {
      iid: self.next_iid.get(),
      source_branch: source.to_string(),
      target_branch: target.to_string(),
      title: title.to_string(),
    };
    self.open.borrow_mut().push(mr.clone());
    self.created.borrow_mut().push((source.to_string(), target.to_string()));
    Ok(mr)
  }

  fn subscribe(&self, _mr: &MergeRequest) -> ReleaseResult<()> {
    Ok(())
  }

  fn approvals_left(&self, _mr: &MergeRequest) -> ReleaseResult<u32> {
    Ok(0)
  }

  fn pipelines(&self, mr: &MergeRequest) -> ReleaseResult<Vec<PipelineRun>> {
    *self
      .pipeline_polls
      .borrow_mut()
      .entry(mr.target_branch.clone())
      .or_insert(0) += 1;
    let status = match &self.fail_pipelines_into {
      Some(target) if *target == mr.target_branch => PipelineStatus::Failed,
      _ => PipelineStatus::Success,
    };
    Ok(vec![PipelineRun { id: 13, status }])
  }

  fn merge(&self, mr: &MergeRequest) -> ReleaseResult<()> {
    self.merged.borrow_mut().push(mr.target_branch.clone());
    Ok(())
  }

  fn create_pipeline(&self, ref_name: &str, dry_run: bool) -> ReleaseResult<Pipeline> {
    self.pipelines_created.borrow_mut().push((ref_name.to_string(), dry_run));
    Ok(Pipeline {
      id: 500,
      ref_name: ref_name.to_string(),
    })
  }

  fn jobs(&self, _pipeline: &Pipeline) -> ReleaseResult<Vec<Job>> {
    Ok(vec![
      Job {
        id: 1,
        name: "publish-artifact".to_string(),
        status: self.job_status,
      },
      Job {
        id: 2,
        name: "publish-docs".to_string(),
        status: PipelineStatus::Success,
      },
    ])
  }
}

// ---------------------------------------------------------------------------
// Scope scripts
// ---------------------------------------------------------------------------

fn issue(key: &str, summary: &str, status: &str) -> Issue {
  Issue {
    id: key.to_string(),
    key: key.to_string(),
    summary: summary.to_string(),
    status: IssueStatus::parse(status),
    issue_type: "Bug".to_string(),
  }
}

/// Release issue plus two resolved scope issues (total 3)
fn base_scope() -> Vec<Issue> {
  vec![
    issue("DP-2", "Release 4.2.0", "In Progress"),
    issue("DP-3", "Fix crash on rotate", "Resolved"),
    issue("DP-4", "Memory leak in worker", "Resolved"),
  ]
}

/// Base scope plus `extra` resolved issues (the testing sub-task and any
/// bugs filed during testing)
fn scope_with_extra(extra: usize) -> Vec<Issue> {
  let mut issues = base_scope();
  for n in 0..extra {
    issues.push(issue(&format!("DP-9{}", n), "Filed during release", "Resolved"));
  }
  issues
}

fn config() -> Config {
  toml_edit::de::from_str(
    r#"
[tracker]
base_url = "http://tracker.invalid"
project = "DP"
fix_version = "WebView {version}"
rc_summary = "WebView {version} RC{rc}"

[forge]
base_url = "http://forge.invalid"
project = "group/app"

[publish]
announce = ["https://artifacts.invalid/app/{version}"]
"#,
  )
  .unwrap()
}

fn release(stage: Stage) -> Release {
  Release::new("4.2.0", stage, 1, false, None, &config().branches)
}

fn run(
  rel: Release,
  cfg: &Config,
  vcs: &FakeVcs,
  tracker: &FakeTracker,
  forge: &FakeForge,
) -> (ReleaseResult<()>, Stage, u32) {
  let mut controller = StageController::new(rel, cfg, Path::new("."), vcs, tracker, forge, PollPolicy::immediate(25));
  let result = controller.run();
  (result, controller.stage(), controller.rc_num())
}

fn index_of(ops: &[String], needle: &str) -> usize {
  ops
    .iter()
    .position(|op| op.as_str() == needle)
    .unwrap_or_else(|| panic!("operation '{}' not found in {:?}", needle, ops))
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_scenario_forward_run_without_rollback() {
  // Scope stays at 3 + the testing sub-task: no retest
  let tracker = FakeTracker::with_scopes(vec![base_scope(), scope_with_extra(1)]);
  let forge = FakeForge::new();
  let vcs = FakeVcs::default();
  let cfg = config();

  let (result, stage, rc_num) = run(release(Stage::Start), &cfg, &vcs, &tracker, &forge);

  result.unwrap();
  assert_eq!(stage, Stage::PostMasterMerge);
  assert_eq!(rc_num, 1);

  // Stage monotonicity, expressed through the side effects
  let ops = vcs.ops();
  let created = index_of(&ops, "create release-4.2.0 from origin/develop");
  let rc_tag = index_of(&ops, "tag 4.2.0-rc1");
  let trunk_tag = index_of(&ops, "tag 4.2.0");
  let merge_back = index_of(&ops, "merge release-4.2.0");
  assert!(created < rc_tag && rc_tag < trunk_tag && trunk_tag < merge_back);
  assert_eq!(ops.iter().filter(|op| op.starts_with("tag 4.2.0-rc")).count(), 1);

  // Both review requests, both merged, one real publish
  assert_eq!(
    *forge.created.borrow(),
    vec![
      ("issue-DP-2-release-4.2.0".to_string(), "release-4.2.0".to_string()),
      ("release-4.2.0".to_string(), "master".to_string()),
    ]
  );
  assert_eq!(*forge.merged.borrow(), vec!["release-4.2.0".to_string(), "master".to_string()]);
  assert_eq!(*forge.pipelines_created.borrow(), vec![("4.2.0".to_string(), false)]);

  // Readiness ran exactly twice: pre-check and post-testing
  assert_eq!(tracker.searches.get(), 2);

  // Success is reported to the release issue with the artifact links
  let comments = tracker.comments.borrow();
  assert_eq!(comments.len(), 1);
  assert!(comments[0].contains("https://artifacts.invalid/app/4.2.0"));
}

#[test]
fn test_scenario_one_rollback_then_release() {
  // Post-testing sees 5 issues against a baseline of 3: one is the testing
  // sub-task, one is a bug filed during testing. That forces exactly one
  // retest with rc 2; the next pass sees 6 against a baseline of 5.
  let tracker = FakeTracker::with_scopes(vec![base_scope(), scope_with_extra(2), scope_with_extra(3)]);
  let forge = FakeForge::new();
  let vcs = FakeVcs::default();
  let cfg = config();

  let (result, stage, rc_num) = run(release(Stage::Start), &cfg, &vcs, &tracker, &forge);

  result.unwrap();
  assert_eq!(stage, Stage::PostMasterMerge);
  assert_eq!(rc_num, 2, "rc counter increments exactly once per rollback");

  let ops = vcs.ops();
  assert!(vcs.has("tag 4.2.0-rc1"));
  assert!(vcs.has("tag 4.2.0-rc2"));
  assert_eq!(ops.iter().filter(|op| op.starts_with("tag 4.2.0-rc")).count(), 2);
  assert!(index_of(&ops, "tag 4.2.0-rc2") < index_of(&ops, "tag 4.2.0"));

  // One testing sub-task per candidate
  assert_eq!(
    *tracker.created_subtasks.borrow(),
    vec!["WebView 4.2.0 RC1".to_string(), "WebView 4.2.0 RC2".to_string()]
  );

  // Still a single publication at the end
  assert_eq!(forge.pipelines_created.borrow().len(), 1);
}

#[test]
fn test_scenario_scope_pipeline_failure_aborts_before_trunk() {
  let tracker = FakeTracker::with_scopes(vec![base_scope(), scope_with_extra(1)]);
  let forge = FakeForge::failing_pipelines_into("master");
  let vcs = FakeVcs::default();
  let cfg = config();

  let (result, stage, _) = run(release(Stage::Start), &cfg, &vcs, &tracker, &forge);

  let err = result.unwrap_err();
  assert!(matches!(err, ReleaseError::Pipeline(PipelineError::PipelineFailed { .. })));
  assert_eq!(stage, Stage::PostTesting, "the failure surfaces before the trunk merge stage");

  // Trunk untouched: no version tag, no merge into trunk or devel
  assert!(vcs.has("tag 4.2.0-rc1"));
  assert!(!vcs.has("tag 4.2.0"));
  assert!(!vcs.has("merge release-4.2.0"));
  assert_eq!(*forge.merged.borrow(), vec!["release-4.2.0".to_string()]);

  // Fatal propagation: zero additional polls after the failed report
  assert_eq!(forge.polls_into("master"), 1);
}

#[test]
fn test_blocked_scope_waits_without_rollback() {
  // A bug is open when testing ends, then resolves; the count settles at
  // baseline + 1 (the testing sub-task), so no retest happens.
  let mut blocked = scope_with_extra(1);
  blocked.push(issue("DP-99", "Bug found in RC1", "Open"));
  let tracker = FakeTracker::with_scopes(vec![scope_with_extra(1), blocked, scope_with_extra(2)]);
  let forge = FakeForge::new();
  let vcs = FakeVcs::default();
  let cfg = config();

  let (result, _, rc_num) = run(release(Stage::Start), &cfg, &vcs, &tracker, &forge);

  result.unwrap();
  assert_eq!(rc_num, 1, "waiting for fixes is not a retest");
  assert_eq!(vcs.ops().iter().filter(|op| op.starts_with("tag 4.2.0-rc")).count(), 1);
  assert!(tracker.searches.get() >= 3, "the blocked check was polled");
}

#[test]
fn test_failed_publish_job_aborts_without_merge_back() {
  let tracker = FakeTracker::with_scopes(vec![base_scope(), scope_with_extra(1)]);
  let forge = FakeForge::failing_jobs();
  let vcs = FakeVcs::default();
  let cfg = config();

  let (result, stage, _) = run(release(Stage::Start), &cfg, &vcs, &tracker, &forge);

  let err = result.unwrap_err();
  assert!(matches!(err, ReleaseError::Pipeline(PipelineError::JobFailed { .. })));
  assert_eq!(stage, Stage::PostMasterMerge);

  // The tag exists (it triggered the pipeline) but nothing was announced or
  // merged back
  assert!(vcs.has("tag 4.2.0"));
  assert!(!vcs.has("merge release-4.2.0"));
  assert!(tracker.comments.borrow().is_empty());
}

#[test]
fn test_reentry_reuses_open_review_request() {
  let tracker = FakeTracker::with_scopes(vec![base_scope(), scope_with_extra(1)]);
  let forge = FakeForge::new();
  // A previous run already opened the bump review request
  forge.open.borrow_mut().push(MergeRequest {
    iid: 40,
    source_branch: "issue-DP-2-release-4.2.0".to_string(),
    target_branch: "release-4.2.0".to_string(),
    title: "Version bump for 4.2.0 release".to_string(),
  });
  let vcs = FakeVcs::default();
  let cfg = config();

  let (result, _, _) = run(release(Stage::PostBump), &cfg, &vcs, &tracker, &forge);

  result.unwrap();
  // Only the scope request was created; the bump request was found
  assert_eq!(
    *forge.created.borrow(),
    vec![("release-4.2.0".to_string(), "master".to_string())]
  );
  assert!(forge.merged.borrow().contains(&"release-4.2.0".to_string()));
}

#[test]
fn test_resume_at_publish_stage_skips_earlier_work() {
  let tracker = FakeTracker::with_scopes(vec![scope_with_extra(1)]);
  let forge = FakeForge::new();
  let vcs = FakeVcs::default();
  let cfg = config();

  let (result, _, _) = run(release(Stage::PostMasterMerge), &cfg, &vcs, &tracker, &forge);

  result.unwrap();
  let ops = vcs.ops();
  assert!(!ops.iter().any(|op| op.starts_with("create ")));
  assert!(vcs.has("tag 4.2.0"));
  assert!(vcs.has("merge release-4.2.0"));
}

#[test]
fn test_missing_release_issue_fails_at_entry_stage() {
  let tracker = FakeTracker::with_scopes(vec![vec![
    issue("DP-3", "Fix crash on rotate", "Resolved"),
    issue("DP-4", "Memory leak in worker", "Resolved"),
  ]]);
  let forge = FakeForge::new();
  let vcs = FakeVcs::default();
  let cfg = config();

  let (result, stage, _) = run(release(Stage::Start), &cfg, &vcs, &tracker, &forge);

  let err = result.unwrap_err();
  assert!(err.to_string().contains("No release tracking issue"));
  assert_eq!(stage, Stage::Start);
  assert!(vcs.ops().is_empty(), "nothing happens without the release issue");
}

#[test]
fn test_blocked_precheck_stops_the_run() {
  let mut scope = base_scope();
  scope.push(issue("DP-50", "Half-finished feature", "In Progress"));
  let tracker = FakeTracker::with_scopes(vec![scope]);
  let forge = FakeForge::new();
  let vcs = FakeVcs::default();
  let cfg = config();

  let (result, _, _) = run(release(Stage::Start), &cfg, &vcs, &tracker, &forge);

  assert!(matches!(result.unwrap_err(), ReleaseError::Blocked(_)));
  assert!(vcs.ops().is_empty());
}

#[test]
fn test_debug_run_isolates_names_and_dry_runs_publish() {
  let tracker = FakeTracker::with_scopes(vec![base_scope(), scope_with_extra(1)]);
  let forge = FakeForge::new();
  let vcs = FakeVcs::default();
  let cfg = config();
  let rel = Release::new("4.2.0", Stage::Start, 1, true, Some("X".into()), &cfg.branches);

  let (result, _, _) = run(rel, &cfg, &vcs, &tracker, &forge);

  result.unwrap();
  // Test branches bootstrapped from the real ones
  assert!(vcs.has("create release-test-develop-X from develop"));
  assert!(vcs.has("create release-test-master-X from master"));
  // All names carry the uid, and the publish is a dry run
  assert!(vcs.has("tag test-version-X-rc1"));
  assert!(vcs.has("tag test-version-X"));
  assert_eq!(*forge.pipelines_created.borrow(), vec![("test-version-X".to_string(), true)]);
}
