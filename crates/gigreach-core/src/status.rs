use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

/// Pipeline phase, as reported to the control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    NotStarted,
    Discovery,
    Cleaning,
    Enriching,
    WaitingForCaptcha,
    Completed,
    Error,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::NotStarted => "Not Started",
            Phase::Discovery => "Phase 1: Scraping listings",
            Phase::Cleaning => "Phase 2: Cleaning listings",
            Phase::Enriching => "Phase 2: Scraping details",
            Phase::WaitingForCaptcha => "Waiting for CAPTCHA",
            Phase::Completed => "Completed",
            Phase::Error => "Error",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Live progress of one pipeline run.
///
/// Reset at run start, mutated at each phase transition, read-only from
/// the control surface. Not persisted across restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStatus {
    pub is_running: bool,
    /// 0–100.
    pub progress: u8,
    pub phase: Phase,
    pub current_city: Option<String>,
    pub last_completed: Option<String>,
    pub completed: bool,
    pub error: bool,
    pub no_results: bool,
}

impl Default for RunStatus {
    fn default() -> Self {
        Self {
            is_running: false,
            progress: 0,
            phase: Phase::NotStarted,
            current_city: None,
            last_completed: None,
            completed: false,
            error: false,
            no_results: false,
        }
    }
}

/// Shared handle to a run's status.
///
/// Owned by the pipeline instance and threaded through its constructor;
/// the control surface holds a clone and only ever reads snapshots.
#[derive(Clone, Default)]
pub struct StatusHandle(Arc<RwLock<RunStatus>>);

impl StatusHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> RunStatus {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn reset(&self) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = RunStatus::default();
    }

    /// Enter a phase with its progress mark and an operator-visible note.
    pub fn begin_phase(&self, phase: Phase, progress: u8, note: impl Into<String>) {
        let mut s = self.0.write().unwrap_or_else(PoisonError::into_inner);
        s.is_running = true;
        s.phase = phase;
        s.progress = progress;
        s.last_completed = Some(note.into());
    }

    pub fn phase(&self) -> Phase {
        self.0.read().unwrap_or_else(PoisonError::into_inner).phase
    }

    pub fn set_phase(&self, phase: Phase) {
        self.0
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .phase = phase;
    }

    pub fn set_city(&self, city: impl Into<String>) {
        self.0
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .current_city = Some(city.into());
    }

    pub fn is_running(&self) -> bool {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_running
    }

    /// Terminal success. `no_results` marks a run that found nothing.
    pub fn finish_completed(&self, no_results: bool, note: impl Into<String>) {
        let mut s = self.0.write().unwrap_or_else(PoisonError::into_inner);
        s.is_running = false;
        s.phase = Phase::Completed;
        s.progress = if no_results { 0 } else { 100 };
        s.completed = true;
        s.error = false;
        s.no_results = no_results;
        s.last_completed = Some(note.into());
    }

    /// Terminal failure.
    pub fn finish_error(&self, message: impl Into<String>) {
        let mut s = self.0.write().unwrap_or_else(PoisonError::into_inner);
        s.is_running = false;
        s.phase = Phase::Error;
        s.completed = false;
        s.error = true;
        s.last_completed = Some(message.into());
    }

    /// Mark a run stopped without a terminal flag (operator cancellation).
    pub fn mark_stopped(&self, note: impl Into<String>) {
        let mut s = self.0.write().unwrap_or_else(PoisonError::into_inner);
        s.is_running = false;
        s.last_completed = Some(note.into());
    }
}
