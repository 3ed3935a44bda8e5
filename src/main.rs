use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use release_pilot::controller::StageController;
use release_pilot::core::bump;
use release_pilot::core::config::Config;
use release_pilot::core::error::{ReleaseError, ReleaseResult};
use release_pilot::core::poll::PollPolicy;
use release_pilot::core::release::{Release, Stage};
use release_pilot::core::vcs::SystemGit;
use release_pilot::forge::GitLabForge;
use release_pilot::tracker::JiraTracker;

/// Drive a gated, multi-stage release: branch, bump, review, test, publish.
///
/// The process can be killed at any point; re-invoke with --stage at the
/// last reported stage to resume. All state lives in the external systems.
#[derive(Parser)]
#[command(name = "release-pilot")]
#[command(about, long_about = None)]
#[command(styles = get_styles())]
struct Cli {
  /// Version label to release, e.g. 4.2.0
  #[arg(long)]
  version: String,

  /// Path to the git working copy to operate on
  #[arg(long)]
  code: PathBuf,

  /// Stage to (re-)enter; work of earlier stages must already be in place
  #[arg(long, value_enum, default_value_t = Stage::Start)]
  stage: Stage,

  /// Use test-isolated branch/tag names and a dry-run publish
  #[arg(long)]
  debug: bool,

  /// Release candidate number to start counting from
  #[arg(long = "rc_num", default_value_t = 1)]
  rc_num: u32,

  /// Unique suffix for debug branch/tag names (default: current unix time)
  #[arg(long)]
  uid: Option<String>,
}

fn get_styles() -> clap::builder::Styles {
  clap::builder::Styles::styled()
    .usage(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .header(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .literal(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))))
    .invalid(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .error(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .valid(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
    )
    .placeholder(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::White))))
}

fn main() {
  let cli = Cli::parse();

  if let Err((stage, err)) = run(cli) {
    eprintln!("\n❌ Release failed at {} stage with '{}' error", stage, err);
    if let Some(help) = err.help_message() {
      eprintln!("💡 Help: {}", help);
    }
    std::process::exit(err.exit_code().as_i32());
  }
}

fn run(cli: Cli) -> Result<(), (Stage, ReleaseError)> {
  // Anything failing before the driver starts fails "at" the entry stage
  let entry = cli.stage;

  let config = Config::load(&cli.code).map_err(|e| (entry, e))?;
  bump::check_files_exist(&cli.code, &config.version_files).map_err(|e| (entry, e))?;

  let tracker_token = token_from_env(&config.tracker.token_env).map_err(|e| (entry, e))?;
  let forge_token = token_from_env(&config.forge.token_env).map_err(|e| (entry, e))?;

  let vcs = SystemGit::open(&cli.code).map_err(|e| (entry, e))?;
  let tracker = JiraTracker::new(config.tracker.base_url.as_str(), tracker_token).map_err(|e| (entry, e))?;
  let forge = GitLabForge::new(config.forge.base_url.as_str(), config.forge.project.as_str(), forge_token)
    .map_err(|e| (entry, e))?;

  if !cli.debug && semver::Version::parse(&cli.version).is_err() {
    eprintln!("⚠️  '{}' is not a semantic version; releasing it as-is", cli.version);
  }

  let release = Release::new(cli.version, entry, cli.rc_num, cli.debug, cli.uid, &config.branches);
  println!(
    "🚆 Releasing {} (branch {}, rc {})",
    release.label,
    release.release_branch(),
    release.rc_num
  );

  let policy = PollPolicy::new(Duration::from_secs(config.release.poll_interval_secs));
  let mut controller = StageController::new(release, &config, &cli.code, &vcs, &tracker, &forge, policy);
  controller.run().map_err(|e| (controller.stage(), e))
}

fn token_from_env(var: &str) -> ReleaseResult<String> {
  std::env::var(var).map_err(|_| {
    ReleaseError::with_help(
      format!("{} not found in environment", var),
      format!("Export an API token first: export {}=<token>", var),
    )
  })
}
