//! Update schedules and startup planning.
//!
//! Pure functions deciding whether a periodic check is due. The caller owns
//! persistence: after every check attempt it calls
//! [`UpdateSchedule::mark_checked`] and saves the config.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds in a day.
pub const DAILY_SECS: f64 = 86_400.0;
/// Seconds in a week.
pub const WEEKLY_SECS: f64 = 604_800.0;
/// Flat 30-day month; not calendar aware.
pub const MONTHLY_SECS: f64 = 2_592_000.0;

/// Tolerance absorbing float rounding and clock jitter.
const DUE_EPSILON: f64 = 1e-6;

/// How often a scheduled check fires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateCadence {
    /// Never check automatically.
    #[default]
    Off,
    /// Check on every launch.
    Launch,
    /// Once a day.
    Daily,
    /// Once a week.
    Weekly,
    /// Once every 30 days.
    Monthly,
}

impl UpdateCadence {
    /// Fixed interval for periodic cadences, `None` for `Off`/`Launch`.
    pub fn interval_secs(self) -> Option<f64> {
        match self {
            Self::Daily => Some(DAILY_SECS),
            Self::Weekly => Some(WEEKLY_SECS),
            Self::Monthly => Some(MONTHLY_SECS),
            Self::Off | Self::Launch => None,
        }
    }
}

impl std::fmt::Display for UpdateCadence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Off => write!(f, "off"),
            Self::Launch => write!(f, "launch"),
            Self::Daily => write!(f, "daily"),
            Self::Weekly => write!(f, "weekly"),
            Self::Monthly => write!(f, "monthly"),
        }
    }
}

/// What happens when a check finds a newer application version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateAction {
    /// Do not check at all.
    NoCheck,
    /// Report availability and let the user decide (default).
    #[default]
    Prompt,
    /// Download and stage without asking.
    Auto,
}

impl std::fmt::Display for UpdateAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoCheck => write!(f, "no_check"),
            Self::Prompt => write!(f, "prompt"),
            Self::Auto => write!(f, "auto"),
        }
    }
}

/// Cadence plus the time of the last check attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateSchedule {
    /// How often to check.
    pub cadence: UpdateCadence,
    /// Epoch seconds of the last check attempt, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_check_ts: Option<f64>,
}

impl UpdateSchedule {
    /// Create a schedule that has never run.
    pub fn new(cadence: UpdateCadence) -> Self {
        Self {
            cadence,
            last_check_ts: None,
        }
    }

    /// Epoch seconds at which the next check becomes due.
    ///
    /// `Launch` is always due now; `Off` is never due.
    pub fn next_due(&self, now: f64) -> Option<f64> {
        match self.cadence {
            UpdateCadence::Off => None,
            UpdateCadence::Launch => Some(now),
            cadence => {
                let interval = cadence.interval_secs()?;
                Some(self.last_check_ts.unwrap_or(0.0) + interval)
            }
        }
    }

    /// Returns `true` if a check should run at `now`.
    pub fn is_due(&self, now: f64) -> bool {
        match self.cadence {
            UpdateCadence::Off => false,
            UpdateCadence::Launch => true,
            _ => match self.next_due(now) {
                Some(target) => now >= target - DUE_EPSILON,
                None => false,
            },
        }
    }

    /// Record that a check was attempted at `now`, whatever its outcome.
    pub fn mark_checked(&mut self, now: f64) {
        self.last_check_ts = Some(now);
    }
}

/// What the startup routine should do for one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedRun {
    /// Nothing is due.
    Skip,
    /// Check and report availability only.
    CheckOnly,
    /// Check and install if newer.
    Install,
}

/// Combine the application schedule with the configured [`UpdateAction`].
pub fn plan_app_run(schedule: &UpdateSchedule, action: UpdateAction, now: f64) -> PlannedRun {
    if action == UpdateAction::NoCheck || !schedule.is_due(now) {
        return PlannedRun::Skip;
    }
    match action {
        UpdateAction::Auto => PlannedRun::Install,
        _ => PlannedRun::CheckOnly,
    }
}

/// The downloader binary is either auto-updated on schedule or not at all.
pub fn plan_binary_run(schedule: &UpdateSchedule, enabled: bool, now: f64) -> PlannedRun {
    if enabled && schedule.is_due(now) {
        PlannedRun::Install
    } else {
        PlannedRun::Skip
    }
}

/// Current UTC time as fractional epoch seconds.
pub fn now_epoch_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
