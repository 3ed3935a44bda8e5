//! Version bumping in build-descriptor files
//!
//! Strictly local text substitution: lines are matched by a literal marker
//! string and only the token immediately after the marker is rewritten.
//! Which files and markers exist is configuration, not knowledge baked in
//! here.

use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use crate::core::config::{BumpAction, VersionFile};
use crate::core::error::{ReleaseError, ReleaseResult, ResultExt};
use crate::core::release::Release;
use crate::core::vcs::Vcs;

/// First version-ish token: digits/letters/dots/dashes, starting alphanumeric
static TOKEN_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._\-]*").expect("valid token regex"));

/// Rewrite the version token after the marker, if this line carries one.
///
/// Returns `None` when the marker does not occur or nothing parseable
/// follows it. A token that is already the target value round-trips
/// unchanged, which keeps re-entry harmless.
pub fn patch_line(line: &str, file: &VersionFile, version: &str) -> Option<String> {
  let at = line.find(&file.marker)?;
  let rest = &line[at + file.marker.len()..];
  let found = TOKEN_RE.find(rest)?;
  let token = found.as_str();

  let replacement = match file.action {
    BumpAction::Set => version.to_string(),
    BumpAction::Increment => {
      let value: i64 = token.parse().ok()?;
      (value + 1).to_string()
    }
  };

  let start = at + file.marker.len() + found.start();
  let mut patched = String::with_capacity(line.len());
  patched.push_str(&line[..start]);
  patched.push_str(&replacement);
  patched.push_str(&line[start + token.len()..]);
  Some(patched)
}

/// Patch one descriptor file in place. Returns whether anything changed.
pub fn patch_file(root: &Path, file: &VersionFile, version: &str) -> ReleaseResult<bool> {
  let path = root.join(&file.path);
  let content =
    fs::read_to_string(&path).with_context(|| format!("Failed to read version file {}", path.display()))?;

  let mut changed = false;
  let mut lines: Vec<String> = Vec::new();
  for line in content.lines() {
    match patch_line(line, file, version) {
      Some(patched) => {
        if patched != line {
          changed = true;
        }
        lines.push(patched);
      }
      None => lines.push(line.to_string()),
    }
  }

  if changed {
    let mut output = lines.join("\n");
    if content.ends_with('\n') {
      output.push('\n');
    }
    fs::write(&path, output).with_context(|| format!("Failed to write version file {}", path.display()))?;
  }

  Ok(changed)
}

/// Patch every configured descriptor file on the bump issue branch, commit
/// and push the result.
pub fn bump_and_commit(
  vcs: &dyn Vcs,
  remote: &str,
  root: &Path,
  files: &[VersionFile],
  release: &Release,
  issue_key: &str,
) -> ReleaseResult<()> {
  if files.is_empty() {
    println!("ℹ️  No version files configured, skipping bump");
    return Ok(());
  }

  let issue_branch = release.issue_branch(issue_key);
  vcs.switch_branch(&issue_branch, None)?;

  let mut changed_any = false;
  for file in files {
    if patch_file(root, file, &release.label)? {
      println!("✏️  Bumped {}", file.path.display());
      changed_any = true;
    }
    vcs.add(&file.path)?;
  }

  if !changed_any {
    // Re-entry after a finished bump; nothing to commit
    println!("ℹ️  Versions already bumped");
    return Ok(());
  }

  vcs.commit(&format!("Issue {} - Release {}. Bump versions", issue_key, release.label))?;
  vcs.push_branch(remote, &issue_branch)
}

/// Fail when a configured version file does not exist in the working copy
pub fn check_files_exist(root: &Path, files: &[VersionFile]) -> ReleaseResult<()> {
  for file in files {
    let path = root.join(&file.path);
    if !path.exists() {
      return Err(ReleaseError::with_help(
        format!("Version file not found: {}", path.display()),
        "Fix the [[version_files]] paths in release.toml.",
      ));
    }
  }
  Ok(())
}
