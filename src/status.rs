//! Run status owned by the service
//!
//! Replaces a process-wide "last status" variable: the board is created with the
//! service, handed to the executor as a [`RunObserver`] and read by the status
//! endpoints.

use std::sync::{Mutex, MutexGuard};

use action_flow::{FlowError, PlanReport, RunObserver, SkippedEntry, StepRecord};
use chrono::{DateTime, Utc};
use serde::Serialize;
use stepwise_core_types::Step;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    Idle,
    Running {
        run_id: String,
        started_at: DateTime<Utc>,
        total_entries: usize,
        /// 1-based index of the step in progress
        current_step: Option<usize>,
        completed: usize,
        skipped: usize,
    },
    Succeeded {
        run_id: String,
        finished_at: DateTime<Utc>,
        steps_executed: usize,
        summary: String,
    },
    Failed {
        run_id: String,
        finished_at: DateTime<Utc>,
        step_index: Option<usize>,
        message: String,
    },
}

impl RunStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, RunStatus::Running { .. })
    }
}

/// Shared holder of the latest [`RunStatus`].
#[derive(Debug)]
pub struct StatusBoard {
    inner: Mutex<RunStatus>,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBoard {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RunStatus::Idle),
        }
    }

    pub fn snapshot(&self) -> RunStatus {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, RunStatus> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update_running(&self, update: impl FnOnce(&mut Option<usize>, &mut usize, &mut usize)) {
        if let RunStatus::Running {
            current_step,
            completed,
            skipped,
            ..
        } = &mut *self.lock()
        {
            update(current_step, completed, skipped);
        }
    }
}

impl RunObserver for StatusBoard {
    fn plan_started(&self, run_id: &str, total_entries: usize) {
        *self.lock() = RunStatus::Running {
            run_id: run_id.to_string(),
            started_at: Utc::now(),
            total_entries,
            current_step: None,
            completed: 0,
            skipped: 0,
        };
    }

    fn step_started(&self, index: usize, _step: &Step) {
        self.update_running(|current, _, _| *current = Some(index));
    }

    fn step_succeeded(&self, _record: &StepRecord) {
        self.update_running(|current, completed, _| {
            *current = None;
            *completed += 1;
        });
    }

    fn step_skipped(&self, _entry: &SkippedEntry) {
        self.update_running(|_, _, skipped| *skipped += 1);
    }

    fn plan_finished(&self, report: &PlanReport) {
        *self.lock() = RunStatus::Succeeded {
            run_id: report.run_id.clone(),
            finished_at: report.finished_at.unwrap_or_else(Utc::now),
            steps_executed: report.steps_executed(),
            summary: report.summary(),
        };
    }

    fn plan_failed(&self, run_id: &str, error: &FlowError) {
        *self.lock() = RunStatus::Failed {
            run_id: run_id.to_string(),
            finished_at: Utc::now(),
            step_index: error.step_index(),
            message: error.to_string(),
        };
    }
}
