//! Tier lifecycle classification.
//!
//! Pure mapping from (plan, expiry, reference time) to a lifecycle state.
//! The scheduler derives every side effect from the returned state; nothing
//! in this module touches the database or the clock.

use crate::config::SchedulerConfig;
use crate::entities::PlanTier;
use chrono::{DateTime, Duration, Utc};

/// Window lengths driving classification. All boundaries are evaluated at
/// second precision on `expires_at - now`.
#[derive(Debug, Clone)]
pub struct LifecycleWindows {
    /// How far before expiry the warning state begins (default 7 days).
    pub warning_window: Duration,
    /// How long after expiry the grace notification state lasts (default 24h).
    pub grace_notify_window: Duration,
    /// Total grace period after expiry before downgrade (default 7 days).
    pub grace_period: Duration,
}

impl Default for LifecycleWindows {
    fn default() -> Self {
        Self {
            warning_window: Duration::days(7),
            grace_notify_window: Duration::hours(24),
            grace_period: Duration::days(7),
        }
    }
}

impl SchedulerConfig {
    pub fn windows(&self) -> LifecycleWindows {
        LifecycleWindows {
            warning_window: Duration::days(self.warning_window_days),
            grace_notify_window: Duration::hours(self.grace_notify_hours),
            grace_period: Duration::days(self.grace_period_days),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleState {
    /// Free plan, no expiry set, or expiry comfortably in the future.
    Active,
    /// Premium expiring within the warning window; implies a warning
    /// notification carrying the remaining whole days (ceiling).
    ExpiringSoon { days_left: i64 },
    /// Just expired (within the grace-notify window); implies the grace
    /// notification with the date entitlements finally lapse.
    GracePeriod { grace_until: DateTime<Utc> },
    /// Still inside the grace period but past the notify window; the grace
    /// notification already had its chance to fire, entitlements remain.
    GraceContinuing,
    /// Grace period fully elapsed; implies the downgrade transaction.
    Downgraded,
}

/// Classify an account. Total: free plans and missing expiry timestamps
/// always map to `Active` with no implied action.
pub fn classify(
    plan: &PlanTier,
    expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    windows: &LifecycleWindows,
) -> LifecycleState {
    let expires_at = match (plan, expires_at) {
        (PlanTier::Free, _) | (_, None) => return LifecycleState::Active,
        (PlanTier::Premium, Some(t)) => t,
    };

    let delta_secs = expires_at.signed_duration_since(now).num_seconds();

    if delta_secs > windows.warning_window.num_seconds() {
        LifecycleState::Active
    } else if delta_secs > 0 {
        LifecycleState::ExpiringSoon {
            days_left: ceil_days(delta_secs),
        }
    } else if delta_secs >= -windows.grace_notify_window.num_seconds() {
        LifecycleState::GracePeriod {
            grace_until: expires_at + windows.grace_period,
        }
    } else if delta_secs >= -windows.grace_period.num_seconds() {
        LifecycleState::GraceContinuing
    } else {
        LifecycleState::Downgraded
    }
}

/// Whole days remaining, rounded up. `delta_secs` must be positive.
fn ceil_days(delta_secs: i64) -> i64 {
    (delta_secs + 86_399) / 86_400
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    // Reference time used throughout the scenario suite.
    fn t() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 8, 14, 15, 0).unwrap()
    }

    fn w() -> LifecycleWindows {
        LifecycleWindows::default()
    }

    #[test]
    fn free_plan_is_always_active() {
        assert_eq!(
            classify(&PlanTier::Free, None, t(), &w()),
            LifecycleState::Active
        );
        // A stray expiry on a free account must not change the outcome.
        assert_eq!(
            classify(&PlanTier::Free, Some(t() - Duration::days(30)), t(), &w()),
            LifecycleState::Active
        );
    }

    #[test]
    fn premium_without_expiry_is_active() {
        assert_eq!(
            classify(&PlanTier::Premium, None, t(), &w()),
            LifecycleState::Active
        );
    }

    #[test]
    fn far_future_expiry_is_active() {
        let exp = t() + Duration::days(8);
        assert_eq!(
            classify(&PlanTier::Premium, Some(exp), t(), &w()),
            LifecycleState::Active
        );
    }

    #[test]
    fn warning_window_boundaries() {
        // Exactly 7 days out is inside the warning window.
        let exp = t() + Duration::days(7);
        assert_eq!(
            classify(&PlanTier::Premium, Some(exp), t(), &w()),
            LifecycleState::ExpiringSoon { days_left: 7 }
        );
        // One second beyond is not.
        let exp = t() + Duration::days(7) + Duration::seconds(1);
        assert_eq!(
            classify(&PlanTier::Premium, Some(exp), t(), &w()),
            LifecycleState::Active
        );
    }

    #[test]
    fn two_days_out_warns_with_two_days_left() {
        let exp = t() + Duration::days(2);
        assert_eq!(
            classify(&PlanTier::Premium, Some(exp), t(), &w()),
            LifecycleState::ExpiringSoon { days_left: 2 }
        );
    }

    #[test]
    fn days_left_rounds_up() {
        let exp = t() + Duration::seconds(1);
        assert_eq!(
            classify(&PlanTier::Premium, Some(exp), t(), &w()),
            LifecycleState::ExpiringSoon { days_left: 1 }
        );
        let exp = t() + Duration::days(1) + Duration::seconds(1);
        assert_eq!(
            classify(&PlanTier::Premium, Some(exp), t(), &w()),
            LifecycleState::ExpiringSoon { days_left: 2 }
        );
    }

    #[test]
    fn expiry_at_reference_time_enters_grace() {
        let exp = t();
        assert_eq!(
            classify(&PlanTier::Premium, Some(exp), t(), &w()),
            LifecycleState::GracePeriod {
                grace_until: exp + Duration::days(7)
            }
        );
    }

    #[test]
    fn six_hours_past_expiry_is_grace() {
        let exp = t() - Duration::hours(6);
        assert_eq!(
            classify(&PlanTier::Premium, Some(exp), t(), &w()),
            LifecycleState::GracePeriod {
                grace_until: exp + Duration::days(7)
            }
        );
    }

    #[test]
    fn grace_notify_boundary_is_inclusive() {
        let exp = t() - Duration::hours(24);
        assert_eq!(
            classify(&PlanTier::Premium, Some(exp), t(), &w()),
            LifecycleState::GracePeriod {
                grace_until: exp + Duration::days(7)
            }
        );
        let exp = t() - Duration::hours(24) - Duration::seconds(1);
        assert_eq!(
            classify(&PlanTier::Premium, Some(exp), t(), &w()),
            LifecycleState::GraceContinuing
        );
    }

    #[test]
    fn two_days_past_expiry_continues_grace() {
        let exp = t() - Duration::days(2);
        assert_eq!(
            classify(&PlanTier::Premium, Some(exp), t(), &w()),
            LifecycleState::GraceContinuing
        );
    }

    #[test]
    fn grace_period_boundary() {
        // Exactly 7 days past expiry still holds grace.
        let exp = t() - Duration::days(7);
        assert_eq!(
            classify(&PlanTier::Premium, Some(exp), t(), &w()),
            LifecycleState::GraceContinuing
        );
        // One second more and the downgrade is due.
        let exp = t() - Duration::days(7) - Duration::seconds(1);
        assert_eq!(
            classify(&PlanTier::Premium, Some(exp), t(), &w()),
            LifecycleState::Downgraded
        );
    }

    #[test]
    fn ten_days_past_expiry_downgrades() {
        let exp = t() - Duration::days(10);
        assert_eq!(
            classify(&PlanTier::Premium, Some(exp), t(), &w()),
            LifecycleState::Downgraded
        );
    }
}
