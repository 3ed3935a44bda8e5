//! GitLab-protocol REST client (API v4)
//!
//! All calls are scoped to one project, configured as a path with namespace
//! or a numeric id. Authenticated with a private token from the environment.

use serde::Deserialize;
use serde_json::json;

use crate::core::error::{ApiError, ReleaseResult};
use crate::forge::{Forge, Job, MergeRequest, Pipeline, PipelineRun, PipelineStatus};

pub struct GitLabForge {
  http: reqwest::blocking::Client,
  base_url: String,
  /// URL-encoded project path or numeric id
  project: String,
  token: String,
}

#[derive(Deserialize)]
struct RawMergeRequest {
  iid: u64,
  source_branch: String,
  target_branch: String,
  title: String,
}

#[derive(Deserialize)]
struct RawApprovals {
  #[serde(default)]
  approvals_left: u32,
}

#[derive(Deserialize)]
struct RawPipeline {
  id: u64,
  status: PipelineStatus,
}

#[derive(Deserialize)]
struct RawCreatedPipeline {
  id: u64,
  #[serde(rename = "ref")]
  ref_name: String,
}

#[derive(Deserialize)]
struct RawJob {
  id: u64,
  name: String,
  status: PipelineStatus,
}

impl From<RawMergeRequest> for MergeRequest {
  fn from(raw: RawMergeRequest) -> Self {
    MergeRequest {
      iid: raw.iid,
      source_branch: raw.source_branch,
      target_branch: raw.target_branch,
      title: raw.title,
    }
  }
}

impl GitLabForge {
  pub fn new(
    base_url: impl Into<String>,
    project: impl Into<String>,
    token: impl Into<String>,
  ) -> ReleaseResult<Self> {
    let http = reqwest::blocking::Client::builder()
      .build()
      .map_err(|e| ApiError::transport("build forge client", e))?;
    Ok(Self {
      http,
      base_url: base_url.into().trim_end_matches('/').to_string(),
      project: project.into().replace('/', "%2F"),
      token: token.into(),
    })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/api/v4/projects/{}/{}", self.base_url, self.project, path)
  }

  fn send(&self, action: &str, request: reqwest::blocking::RequestBuilder) -> ReleaseResult<reqwest::blocking::Response> {
    let response = request
      .header("PRIVATE-TOKEN", &self.token)
      .send()
      .map_err(|e| ApiError::transport(action, e))?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().unwrap_or_default();
      return Err(ApiError::http(action, status.as_u16(), body).into());
    }

    Ok(response)
  }
}

impl Forge for GitLabForge {
  fn find_open_merge_request(&self, source: &str, target: &str) -> ReleaseResult<Option<MergeRequest>> {
    let action = "list merge requests";
    let request = self.http.get(self.url("merge_requests")).query(&[
      ("state", "opened"),
      ("source_branch", source),
      ("target_branch", target),
    ]);
    let list: Vec<RawMergeRequest> = self
      .send(action, request)?
      .json()
      .map_err(|e| ApiError::transport(action, e))?;
    Ok(list.into_iter().next().map(MergeRequest::from))
  }

  fn create_merge_request(&self, source: &str, target: &str, title: &str) -> ReleaseResult<MergeRequest> {
    let action = "create merge request";
    let body = json!({
      "source_branch": source,
      "target_branch": target,
      "title": title,
    });
    let raw: RawMergeRequest = self
      .send(action, self.http.post(self.url("merge_requests")).json(&body))?
      .json()
      .map_err(|e| ApiError::transport(action, e))?;
    Ok(raw.into())
  }

  fn subscribe(&self, mr: &MergeRequest) -> ReleaseResult<()> {
    self.send(
      "subscribe to merge request",
      self
        .http
        .post(self.url(&format!("merge_requests/{}/subscribe", mr.iid))),
    )?;
    Ok(())
  }

  fn approvals_left(&self, mr: &MergeRequest) -> ReleaseResult<u32> {
    let action = "read merge request approvals";
    let raw: RawApprovals = self
      .send(
        action,
        self
          .http
          .get(self.url(&format!("merge_requests/{}/approvals", mr.iid))),
      )?
      .json()
      .map_err(|e| ApiError::transport(action, e))?;
    Ok(raw.approvals_left)
  }

  fn pipelines(&self, mr: &MergeRequest) -> ReleaseResult<Vec<PipelineRun>> {
    let action = "list merge request pipelines";
    let raw: Vec<RawPipeline> = self
      .send(
        action,
        self
          .http
          .get(self.url(&format!("merge_requests/{}/pipelines", mr.iid))),
      )?
      .json()
      .map_err(|e| ApiError::transport(action, e))?;
    Ok(
      raw
        .into_iter()
        .map(|p| PipelineRun {
          id: p.id,
          status: p.status,
        })
        .collect(),
    )
  }

  fn merge(&self, mr: &MergeRequest) -> ReleaseResult<()> {
    self.send(
      "merge merge request",
      self.http.put(self.url(&format!("merge_requests/{}/merge", mr.iid))),
    )?;
    Ok(())
  }

  fn create_pipeline(&self, ref_name: &str, dry_run: bool) -> ReleaseResult<Pipeline> {
    let action = "create pipeline";
    let body = json!({
      "ref": ref_name,
      "variables": [{ "key": "DRY_RUN", "value": if dry_run { "true" } else { "false" } }],
    });
    let raw: RawCreatedPipeline = self
      .send(action, self.http.post(self.url("pipeline")).json(&body))?
      .json()
      .map_err(|e| ApiError::transport(action, e))?;
    Ok(Pipeline {
      id: raw.id,
      ref_name: raw.ref_name,
    })
  }

  fn jobs(&self, pipeline: &Pipeline) -> ReleaseResult<Vec<Job>> {
    let action = "list pipeline jobs";
    let raw: Vec<RawJob> = self
      .send(
        action,
        self.http.get(self.url(&format!("pipelines/{}/jobs", pipeline.id))),
      )?
      .json()
      .map_err(|e| ApiError::transport(action, e))?;
    Ok(
      raw
        .into_iter()
        .map(|j| Job {
          id: j.id,
          name: j.name,
          status: j.status,
        })
        .collect(),
    )
  }
}
