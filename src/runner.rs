//! Stage runner - ordered, partitionable iteration over a work list
//!
//! A run visits indices `skip, skip + step, skip + 2 * step, ...` in exactly
//! that order. Every item's action is responsible for its own idempotent
//! gate; the runner only reports progress and contains failures so that one
//! bad repository never ends a multi-day run.

use crate::ui::{self, StageProgress};
use crate::{Error, Result};
use std::fmt::Display;
use std::time::Instant;

/// Start offset and stride into an ordered work list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    skip: usize,
    step: usize,
}

impl Default for Schedule {
    fn default() -> Self {
        Self { skip: 0, step: 1 }
    }
}

impl Schedule {
    pub fn new(skip: usize, step: usize) -> Result<Self> {
        if step == 0 {
            return Err(Error::InvalidSchedule("step must be at least 1".to_string()));
        }
        Ok(Self { skip, step })
    }

    pub fn skip(&self) -> usize {
        self.skip
    }

    pub fn step(&self) -> usize {
        self.step
    }

    /// Global indices visited for a list of `len` items, in visiting order
    pub fn indices(&self, len: usize) -> std::iter::StepBy<std::ops::Range<usize>> {
        (self.skip.min(len)..len).step_by(self.step)
    }

    /// Number of items a run over `len` items will visit
    pub fn count(&self, len: usize) -> usize {
        if self.skip >= len {
            0
        } else {
            (len - self.skip).div_ceil(self.step)
        }
    }
}

/// What an action did with its item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The artifact was produced by this call
    Done,
    /// Produced, with a detail shown next to the item
    DoneWith(String),
    /// Nothing was done; the reason is reported to the operator
    Skipped(String),
}

impl Outcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Outcome::Skipped(reason.into())
    }

    pub fn done_with(detail: impl Into<String>) -> Self {
        Outcome::DoneWith(detail.into())
    }
}

/// Counts for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub visited: usize,
    pub done: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Position of the current item within the run and within the full list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub local: usize,
    pub local_total: usize,
    pub global: usize,
    pub global_total: usize,
}

impl Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}/{}][{}/{}]",
            self.local + 1,
            self.local_total,
            self.global + 1,
            self.global_total
        )
    }
}

/// Drives one stage over a work list
pub struct StageRunner {
    stage: String,
    schedule: Schedule,
}

impl StageRunner {
    pub fn new(stage: impl Into<String>, schedule: Schedule) -> Self {
        Self {
            stage: stage.into(),
            schedule,
        }
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Visit the scheduled items in order, calling `action` on each.
    ///
    /// Action errors are logged with the stage and item and counted as
    /// failures; the run always continues with the next item.
    pub fn run<T, F>(&self, items: &[T], mut action: F) -> RunSummary
    where
        T: Display,
        F: FnMut(&T) -> Result<Outcome>,
    {
        let local_total = self.schedule.count(items.len());
        let progress = StageProgress::new(&self.stage, local_total);
        let mut summary = RunSummary::default();
        let started = Instant::now();

        tracing::info!(
            stage = %self.stage,
            total = items.len(),
            scheduled = local_total,
            skip = self.schedule.skip,
            step = self.schedule.step,
            "starting stage"
        );

        for (local, global) in self.schedule.indices(items.len()).enumerate() {
            let item = &items[global];
            let position = Position {
                local,
                local_total,
                global,
                global_total: items.len(),
            };
            let label = position.to_string();
            progress.set_message(&format!("{} {}", self.stage, item));
            summary.visited += 1;

            match action(item) {
                Ok(Outcome::Done) => {
                    summary.done += 1;
                    tracing::debug!(stage = %self.stage, item = %item, "done");
                    progress.println(&ui::item_done(&label, &item.to_string(), "done"));
                }
                Ok(Outcome::DoneWith(detail)) => {
                    summary.done += 1;
                    tracing::debug!(stage = %self.stage, item = %item, detail = %detail, "done");
                    progress.println(&ui::item_done(&label, &item.to_string(), &detail));
                }
                Ok(Outcome::Skipped(reason)) => {
                    summary.skipped += 1;
                    tracing::debug!(stage = %self.stage, item = %item, reason = %reason, "skipped");
                    progress.println(&ui::item_skipped(&label, &item.to_string(), &reason));
                }
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!(stage = %self.stage, item = %item, error = %e, "item failed");
                    progress.println(&ui::item_failed(&label, &item.to_string(), &e.to_string()));
                }
            }
            progress.inc();
        }

        progress.finish();
        tracing::info!(
            stage = %self.stage,
            done = summary.done,
            skipped = summary.skipped,
            failed = summary.failed,
            elapsed_secs = started.elapsed().as_secs(),
            "stage finished"
        );
        summary
    }
}
