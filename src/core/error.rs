//! Error types for release-pilot with contextual messages and exit codes
//!
//! One unified error type categorizes everything that can stop a release:
//! a blocked issue scope, a failed git command, a rejected API call, or a
//! failed CI pipeline/job. Fatal conditions bubble up to the stage driver
//! untouched; the driver reports the stage they surfaced in.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Exit codes for release-pilot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
  /// User error (config, invalid args, missing tokens)
  User = 1,
  /// System error (git, network, CI)
  System = 2,
  /// Release scope not ready
  Blocked = 3,
}

impl ExitCode {
  /// Convert to i32 for process exit
  pub fn as_i32(self) -> i32 {
    self as i32
  }
}

/// Main error type for release-pilot
#[derive(Debug)]
pub enum ReleaseError {
  /// Configuration errors
  Config(ConfigError),

  /// Git operation errors
  Git(GitError),

  /// Issue tracker / review service API errors
  Api(ApiError),

  /// Release scope contains issues that are not ready
  Blocked(BlockedRelease),

  /// A CI pipeline or job reported failure
  Pipeline(PipelineError),

  /// I/O errors
  Io(io::Error),

  /// Generic error with message and optional context
  Message {
    message: String,
    context: Option<String>,
    help: Option<String>,
  },
}

impl ReleaseError {
  /// Create a simple error message
  pub fn message(msg: impl Into<String>) -> Self {
    ReleaseError::Message {
      message: msg.into(),
      context: None,
      help: None,
    }
  }

  /// Create an error with help text
  pub fn with_help(msg: impl Into<String>, help: impl Into<String>) -> Self {
    ReleaseError::Message {
      message: msg.into(),
      context: None,
      help: Some(help.into()),
    }
  }

  /// Add context to an existing error
  pub fn context(self, ctx: impl Into<String>) -> Self {
    let ctx_str = ctx.into();
    match self {
      ReleaseError::Message { message, context, help } => ReleaseError::Message {
        message,
        context: Some(context.map(|c| format!("{}\n{}", ctx_str, c)).unwrap_or(ctx_str)),
        help,
      },
      _ => self,
    }
  }

  /// Get the appropriate exit code for this error
  pub fn exit_code(&self) -> ExitCode {
    match self {
      ReleaseError::Config(_) => ExitCode::User,
      ReleaseError::Git(_) => ExitCode::System,
      ReleaseError::Api(_) => ExitCode::System,
      ReleaseError::Blocked(_) => ExitCode::Blocked,
      ReleaseError::Pipeline(_) => ExitCode::System,
      ReleaseError::Io(_) => ExitCode::System,
      ReleaseError::Message { .. } => ExitCode::User,
    }
  }

  /// Get contextual help message for this error
  pub fn help_message(&self) -> Option<String> {
    match self {
      ReleaseError::Config(e) => e.help_message(),
      ReleaseError::Git(e) => e.help_message(),
      ReleaseError::Blocked(_) => Some(
        "Resolve the listed issues, move them out of the release scope, or wait for them to be fixed, then re-invoke with --stage.".to_string(),
      ),
      ReleaseError::Pipeline(_) => Some(
        "Inspect the failed run in the CI service, fix or retry it, then re-invoke with --stage.".to_string(),
      ),
      ReleaseError::Message { help, .. } => help.clone(),
      _ => None,
    }
  }
}

impl fmt::Display for ReleaseError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ReleaseError::Config(e) => write!(f, "{}", e),
      ReleaseError::Git(e) => write!(f, "{}", e),
      ReleaseError::Api(e) => write!(f, "{}", e),
      ReleaseError::Blocked(e) => write!(f, "{}", e),
      ReleaseError::Pipeline(e) => write!(f, "{}", e),
      ReleaseError::Io(e) => write!(f, "I/O error: {}", e),
      ReleaseError::Message { message, context, .. } => {
        write!(f, "{}", message)?;
        if let Some(ctx) = context {
          write!(f, "\n{}", ctx)?;
        }
        Ok(())
      }
    }
  }
}

impl std::error::Error for ReleaseError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      ReleaseError::Io(e) => Some(e),
      _ => None,
    }
  }
}

impl From<io::Error> for ReleaseError {
  fn from(err: io::Error) -> Self {
    ReleaseError::Io(err)
  }
}

impl From<String> for ReleaseError {
  fn from(msg: String) -> Self {
    ReleaseError::message(msg)
  }
}

impl From<&str> for ReleaseError {
  fn from(msg: &str) -> Self {
    ReleaseError::message(msg)
  }
}

impl From<toml_edit::de::Error> for ReleaseError {
  fn from(err: toml_edit::de::Error) -> Self {
    ReleaseError::message(format!("TOML deserialization error: {}", err))
  }
}

impl From<anyhow::Error> for ReleaseError {
  fn from(err: anyhow::Error) -> Self {
    ReleaseError::message(err.to_string())
  }
}

impl From<ConfigError> for ReleaseError {
  fn from(err: ConfigError) -> Self {
    ReleaseError::Config(err)
  }
}

impl From<GitError> for ReleaseError {
  fn from(err: GitError) -> Self {
    ReleaseError::Git(err)
  }
}

impl From<ApiError> for ReleaseError {
  fn from(err: ApiError) -> Self {
    ReleaseError::Api(err)
  }
}

impl From<BlockedRelease> for ReleaseError {
  fn from(err: BlockedRelease) -> Self {
    ReleaseError::Blocked(err)
  }
}

impl From<PipelineError> for ReleaseError {
  fn from(err: PipelineError) -> Self {
    ReleaseError::Pipeline(err)
  }
}

/// Configuration-related errors
#[derive(Debug)]
pub enum ConfigError {
  /// release.toml not found in the working copy
  NotFound { dir: PathBuf },

  /// release.toml could not be parsed
  Invalid { path: PathBuf, message: String },
}

impl ConfigError {
  fn help_message(&self) -> Option<String> {
    match self {
      ConfigError::NotFound { dir } => Some(format!(
        "Create {}/release.toml with [tracker], [forge] and [[version_files]] sections.",
        dir.display()
      )),
      ConfigError::Invalid { .. } => None,
    }
  }
}

impl fmt::Display for ConfigError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ConfigError::NotFound { dir } => {
        write!(
          f,
          "No release-pilot configuration found.\nExpected file: {}/release.toml",
          dir.display()
        )
      }
      ConfigError::Invalid { path, message } => {
        write!(f, "Failed to parse {}: {}", path.display(), message)
      }
    }
  }
}

/// Git operation errors
#[derive(Debug)]
pub enum GitError {
  /// Git command failed
  CommandFailed { command: String, stderr: String },

  /// Repository not found
  RepoNotFound { path: PathBuf },

  /// Push failed
  PushFailed {
    remote: String,
    branch: String,
    reason: String,
  },
}

impl GitError {
  fn help_message(&self) -> Option<String> {
    match self {
      GitError::PushFailed { reason, .. } => {
        if reason.contains("non-fast-forward") {
          Some("The remote has commits you don't have. Pull first, then re-invoke with --stage.".to_string())
        } else if reason.contains("permission denied") || reason.contains("403") {
          Some("Check your SSH key permissions and access to the remote repository.".to_string())
        } else {
          None
        }
      }
      GitError::RepoNotFound { path } => Some(format!(
        "Check the --code path points at a git working copy: {}",
        path.display()
      )),
      _ => None,
    }
  }
}

impl fmt::Display for GitError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      GitError::CommandFailed { command, stderr } => {
        write!(f, "Git command failed: {}\n{}", command, stderr)
      }
      GitError::RepoNotFound { path } => {
        write!(f, "Git repository not found at: {}", path.display())
      }
      GitError::PushFailed { remote, branch, reason } => {
        write!(f, "Push to {}/{} failed: {}", remote, branch, reason)
      }
    }
  }
}

/// Issue tracker / review service API errors
#[derive(Debug)]
pub enum ApiError {
  /// The service answered with a non-success status
  Http {
    action: String,
    status: u16,
    body: String,
  },

  /// The request never completed (network, TLS, timeout)
  Transport { action: String, message: String },

  /// The response was missing something the flow needs
  Unexpected { action: String, message: String },
}

impl ApiError {
  pub fn http(action: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
    ApiError::Http {
      action: action.into(),
      status,
      body: body.into(),
    }
  }

  pub fn transport(action: impl Into<String>, err: impl fmt::Display) -> Self {
    ApiError::Transport {
      action: action.into(),
      message: err.to_string(),
    }
  }

  pub fn unexpected(action: impl Into<String>, message: impl Into<String>) -> Self {
    ApiError::Unexpected {
      action: action.into(),
      message: message.into(),
    }
  }
}

impl fmt::Display for ApiError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ApiError::Http { action, status, body } => {
        write!(f, "{} failed: HTTP {}: {}", action, status, body)
      }
      ApiError::Transport { action, message } => {
        write!(f, "{} failed: {}", action, message)
      }
      ApiError::Unexpected { action, message } => {
        write!(f, "{} returned an unexpected response: {}", action, message)
      }
    }
  }
}

/// The release scope contains issues that are not ready
#[derive(Debug)]
pub struct BlockedRelease {
  /// Offending issues as (key, status) pairs
  pub issues: Vec<(String, String)>,
}

impl fmt::Display for BlockedRelease {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Not all issues ready: ")?;
    for (i, (key, status)) in self.issues.iter().enumerate() {
      if i > 0 {
        write!(f, ", ")?;
      }
      write!(f, "{} ({})", key, status)?;
    }
    Ok(())
  }
}

/// A CI pipeline or job reported failure
#[derive(Debug)]
pub enum PipelineError {
  /// A pipeline run attached to a merge request failed
  PipelineFailed { id: u64 },

  /// A publish job failed
  JobFailed { name: String },
}

impl fmt::Display for PipelineError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PipelineError::PipelineFailed { id } => {
        write!(f, "Pipeline {} failed! Aborting.", id)
      }
      PipelineError::JobFailed { name } => {
        write!(f, "Job '{}' failed! Aborting.", name)
      }
    }
  }
}

/// Result type alias for release-pilot
pub type ReleaseResult<T> = Result<T, ReleaseError>;

/// Helper trait to add context to Results
pub trait ResultExt<T> {
  /// Add context to an error result
  fn context(self, ctx: impl Into<String>) -> ReleaseResult<T>;

  /// Add context using a closure (lazy evaluation)
  fn with_context<F>(self, f: F) -> ReleaseResult<T>
  where
    F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
  E: Into<ReleaseError>,
{
  fn context(self, ctx: impl Into<String>) -> ReleaseResult<T> {
    self.map_err(|e| e.into().context(ctx))
  }

  fn with_context<F>(self, f: F) -> ReleaseResult<T>
  where
    F: FnOnce() -> String,
  {
    self.map_err(|e| e.into().context(f()))
  }
}
