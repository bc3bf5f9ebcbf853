use std::{io::Write, time::Duration};

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use mass_merge::{ActionResult, GroupMap, Progress, PullRequestRecord};

const TICK: Duration = Duration::from_millis(80);

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

/// Terminal progress: a spinner while paging, a bar while acting.
pub struct CliProgress {
    fetch: ProgressBar,
    action: ProgressBar,
}

impl CliProgress {
    pub fn new() -> Self {
        Self {
            fetch: ProgressBar::new_spinner(),
            action: ProgressBar::new(0),
        }
    }
}

impl Progress for CliProgress {
    fn fetch_started(&self) {
        self.fetch.reset();
        self.fetch.set_style(spinner_style());
        self.fetch.set_message("Fetching pull requests...");
        self.fetch.enable_steady_tick(TICK);
    }

    fn record_fetched(&self, _record: &PullRequestRecord) {
        self.fetch.inc(1);
        self.fetch
            .set_message(format!("Fetched {} pull requests", self.fetch.position()));
    }

    fn fetch_finished(&self, _count: usize) {
        self.fetch.finish_and_clear();
    }

    fn action_started(&self, total: usize) {
        self.action.reset();
        self.action.set_style(bar_style());
        self.action.set_length(total as u64);
    }

    fn item_completed(&self, title: &str, _result: &ActionResult) {
        self.action.set_message(title.to_string());
        self.action.inc(1);
    }

    fn action_finished(&self) {
        self.action.finish_and_clear();
    }
}

/// Writes each group with its size and the repositories it touches.
pub fn print_groups<W: Write>(groups: &GroupMap, writer: &mut W) -> Result<()> {
    if groups.is_empty() {
        writeln!(writer, "Nothing to do")?;
        return Ok(());
    }

    for group in groups.iter() {
        writeln!(writer, "{} ({})", group.key, group.records.len())?;
        for repository in group.repositories() {
            writeln!(writer, " ● {repository}")?;
        }
    }
    Ok(())
}
