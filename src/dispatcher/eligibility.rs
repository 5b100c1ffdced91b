//! Magnitude threshold and per-subject cooldown.

use crate::config::DispatcherConfig;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Result of evaluating an alert against the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    /// Alert should be notified; the subject's cooldown was restarted.
    Eligible,
    /// Absolute magnitude under the threshold (or not a number).
    BelowThreshold,
    /// Subject notified too recently.
    CoolingDown,
}

/// Decides whether an alert deserves a notification.
///
/// Cooldown entries are never evicted; the table grows with the number of
/// distinct subjects seen by the process.
#[derive(Debug)]
pub struct EligibilityFilter {
    min_percentage_change: f64,
    cooldown: Duration,
    last_accepted: HashMap<String, Instant>,
}

impl EligibilityFilter {
    /// Creates a filter with an explicit threshold and cooldown.
    #[must_use]
    pub fn new(min_percentage_change: f64, cooldown: Duration) -> Self {
        Self {
            min_percentage_change,
            cooldown,
            last_accepted: HashMap::new(),
        }
    }

    /// Creates a filter from dispatcher tunables.
    #[must_use]
    pub fn from_config(config: &DispatcherConfig) -> Self {
        Self::new(config.min_percentage_change, config.cooldown())
    }

    /// Evaluates an alert. Accepting it stamps the subject's cooldown with
    /// `now`, before any delivery happens.
    pub fn evaluate(&mut self, subject: &str, magnitude_percent: f64, now: Instant) -> Eligibility {
        if magnitude_percent.is_nan() || magnitude_percent.abs() < self.min_percentage_change {
            return Eligibility::BelowThreshold;
        }

        if let Some(last) = self.last_accepted.get(subject)
            && now.saturating_duration_since(*last) < self.cooldown
        {
            return Eligibility::CoolingDown;
        }

        self.last_accepted.insert(subject.to_string(), now);
        Eligibility::Eligible
    }

    /// Returns true and restarts the cooldown if the alert is eligible.
    pub fn should_notify(&mut self, subject: &str, magnitude_percent: f64, now: Instant) -> bool {
        self.evaluate(subject, magnitude_percent, now) == Eligibility::Eligible
    }

    /// Number of subjects with a cooldown stamp.
    #[must_use]
    pub fn tracked_subjects(&self) -> usize {
        self.last_accepted.len()
    }
}
