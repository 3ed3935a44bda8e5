//! JIRA-protocol REST client (API v2)
//!
//! Authenticated with a bearer token taken from the environment. The client
//! is constructed once per run in `main` and handed down by reference; every
//! call re-queries the server, nothing is cached.

use serde::Deserialize;
use serde_json::json;

use crate::core::error::{ApiError, ReleaseResult};
use crate::tracker::{Issue, IssueStatus, IssueTracker};

pub struct JiraTracker {
  http: reqwest::blocking::Client,
  base_url: String,
  token: String,
}

#[derive(Deserialize)]
struct SearchResponse {
  issues: Vec<RawIssue>,
}

#[derive(Deserialize)]
struct RawIssue {
  id: String,
  key: String,
  fields: RawFields,
}

#[derive(Deserialize)]
struct RawFields {
  #[serde(default)]
  summary: String,
  status: RawNamed,
  issuetype: RawNamed,
}

#[derive(Deserialize)]
struct RawNamed {
  name: String,
}

#[derive(Deserialize)]
struct TransitionsResponse {
  transitions: Vec<RawTransition>,
}

#[derive(Deserialize)]
struct RawTransition {
  id: String,
  name: String,
}

#[derive(Deserialize)]
struct CreatedIssue {
  key: String,
}

impl From<RawIssue> for Issue {
  fn from(raw: RawIssue) -> Self {
    Issue {
      id: raw.id,
      key: raw.key,
      summary: raw.fields.summary,
      status: IssueStatus::parse(&raw.fields.status.name),
      issue_type: raw.fields.issuetype.name,
    }
  }
}

const ISSUE_FIELDS: &str = "summary,status,issuetype";

impl JiraTracker {
  pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> ReleaseResult<Self> {
    let http = reqwest::blocking::Client::builder()
      .build()
      .map_err(|e| ApiError::transport("build tracker client", e))?;
    Ok(Self {
      http,
      base_url: base_url.into().trim_end_matches('/').to_string(),
      token: token.into(),
    })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/rest/api/2/{}", self.base_url, path)
  }

  fn send(&self, action: &str, request: reqwest::blocking::RequestBuilder) -> ReleaseResult<reqwest::blocking::Response> {
    let response = request
      .header("Authorization", format!("Bearer {}", self.token))
      .send()
      .map_err(|e| ApiError::transport(action, e))?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().unwrap_or_default();
      return Err(ApiError::http(action, status.as_u16(), body).into());
    }

    Ok(response)
  }

  fn search(&self, action: &str, jql: &str) -> ReleaseResult<Vec<Issue>> {
    let request = self.http.get(self.url("search")).query(&[
      ("jql", jql),
      ("fields", ISSUE_FIELDS),
      ("maxResults", "200"),
    ]);
    let response: SearchResponse = self
      .send(action, request)?
      .json()
      .map_err(|e| ApiError::transport(action, e))?;
    Ok(response.issues.into_iter().map(Issue::from).collect())
  }
}

impl IssueTracker for JiraTracker {
  fn search_issues(&self, project: &str, fix_version: &str) -> ReleaseResult<Vec<Issue>> {
    let jql = format!(r#"project={} AND fixVersion="{}""#, project, fix_version);
    self.search("search release issues", &jql)
  }

  fn find_subtask(&self, project: &str, summary: &str, fix_version: &str) -> ReleaseResult<Option<Issue>> {
    let jql = format!(
      r#"project={} AND summary ~ "{}" AND issuetype=Sub-task AND fixVersion="{}""#,
      project, summary, fix_version
    );
    Ok(self.search("search testing sub-task", &jql)?.into_iter().next())
  }

  fn create_subtask(
    &self,
    project: &str,
    parent: &Issue,
    summary: &str,
    description: &str,
    fix_version: &str,
    component: Option<&str>,
  ) -> ReleaseResult<Issue> {
    let body = json!({
      "fields": {
        "project": { "key": project },
        "parent": { "id": parent.id },
        "issuetype": { "name": "Sub-task" },
        "summary": summary,
        "description": description,
      }
    });
    let created: CreatedIssue = self
      .send("create testing sub-task", self.http.post(self.url("issue")).json(&body))?
      .json()
      .map_err(|e| ApiError::transport("create testing sub-task", e))?;

    // Fix version and component go in a second step; some create screens
    // don't accept them inline.
    let mut fields = json!({ "fixVersions": [{ "name": fix_version }] });
    if let Some(component) = component {
      fields["components"] = json!([{ "name": component }]);
    }
    self.send(
      "update testing sub-task",
      self
        .http
        .put(self.url(&format!("issue/{}", created.key)))
        .json(&json!({ "fields": fields })),
    )?;

    self.fetch(&created.key)
  }

  fn transition(&self, issue: &Issue, transition: &str) -> ReleaseResult<()> {
    let action = "list issue transitions";
    let response: TransitionsResponse = self
      .send(
        action,
        self.http.get(self.url(&format!("issue/{}/transitions", issue.key))),
      )?
      .json()
      .map_err(|e| ApiError::transport(action, e))?;

    let Some(found) = response.transitions.into_iter().find(|t| t.name == transition) else {
      return Err(
        ApiError::unexpected(
          "transition issue",
          format!("no '{}' transition available for {}", transition, issue.key),
        )
        .into(),
      );
    };

    self.send(
      "transition issue",
      self
        .http
        .post(self.url(&format!("issue/{}/transitions", issue.key)))
        .json(&json!({ "transition": { "id": found.id } })),
    )?;
    Ok(())
  }

  fn fetch(&self, key: &str) -> ReleaseResult<Issue> {
    let action = "fetch issue";
    let raw: RawIssue = self
      .send(
        action,
        self
          .http
          .get(self.url(&format!("issue/{}", key)))
          .query(&[("fields", ISSUE_FIELDS)]),
      )?
      .json()
      .map_err(|e| ApiError::transport(action, e))?;
    Ok(raw.into())
  }

  fn comment(&self, issue: &Issue, body: &str) -> ReleaseResult<()> {
    self.send(
      "comment on issue",
      self
        .http
        .post(self.url(&format!("issue/{}/comment", issue.key)))
        .json(&json!({ "body": body })),
    )?;
    Ok(())
  }
}
