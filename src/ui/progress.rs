//! Progress output for the polling loops
//!
//! Waits with no known end (review, testing) print a dot per poll so the
//! operator can see the run is alive. Waits with a known total (publish
//! jobs) get a `linya` bar.

use linya::{Bar, Progress};
use std::io::{self, Write};

/// One dot per poll iteration, flushed so it shows up immediately
pub fn tick() {
  print!(".");
  let _ = io::stdout().flush();
}

/// Progress bar over the jobs of a publish pipeline
pub struct JobProgress {
  progress: Progress,
  bar: Bar,
}

impl JobProgress {
  /// Create a new bar over `total` jobs
  pub fn new(total: usize, label: impl Into<String>) -> Self {
    let mut progress = Progress::new();
    let bar = progress.bar(total, label.into());
    Self { progress, bar }
  }

  /// Set the number of finished jobs
  pub fn set(&mut self, done: usize) {
    self.progress.set_and_draw(&self.bar, done);
  }
}
