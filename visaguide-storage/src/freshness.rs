//! Freshness policy for cached content records.
//!
//! Everything here is pure: the current time is an argument, never read from
//! the clock, so identical inputs always give identical answers.

use chrono::Duration;
use visaguide_core::{ContentRecord, RecordStatus, Timestamp, SECONDS_PER_DAY};

/// Default freshness window in days.
pub const DEFAULT_FRESHNESS_DAYS: u32 = 30;

/// `now - last_updated < threshold_days * 86400s`.
pub fn is_fresh(last_updated: Timestamp, threshold_days: u32, now: Timestamp) -> bool {
    now.signed_duration_since(last_updated) < window(threshold_days)
}

/// Timestamp before which a record counts as stale for a `days` window.
pub fn stale_cutoff(days: u32, now: Timestamp) -> Timestamp {
    now - window(days)
}

fn window(days: u32) -> Duration {
    Duration::seconds(i64::from(days) * SECONDS_PER_DAY)
}

/// Decides whether a stored record can be served as-is and, when it cannot,
/// which status the placeholder write should carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessPolicy {
    threshold_days: u32,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_FRESHNESS_DAYS)
    }
}

impl FreshnessPolicy {
    pub fn new(threshold_days: u32) -> Self {
        Self { threshold_days }
    }

    pub fn threshold_days(&self) -> u32 {
        self.threshold_days
    }

    /// A record that has never been generated is never fresh.
    pub fn is_record_fresh(&self, record: &ContentRecord, now: Timestamp) -> bool {
        record
            .last_updated
            .map_or(false, |at| is_fresh(at, self.threshold_days, now))
    }

    /// Exists, fresh, complete and not forced.
    pub fn is_usable(
        &self,
        record: Option<&ContentRecord>,
        force_refresh: bool,
        now: Timestamp,
    ) -> bool {
        match record {
            Some(record) => {
                !force_refresh && record.is_complete() && self.is_record_fresh(record, now)
            }
            None => false,
        }
    }

    /// Target status for an incoming request. First matching row wins:
    ///
    /// | condition                                   | status       |
    /// |---------------------------------------------|--------------|
    /// | fresh, complete, not forced                 | `ready`      |
    /// | forced and existing status is `error`       | `processing` |
    /// | exists but incomplete                       | `processing` |
    /// | exists, stale, complete                     | `refreshing` |
    /// | exists, fresh, complete, forced             | `refreshing` |
    /// | no record                                   | `queued`     |
    ///
    /// Incomplete wins over stale.
    pub fn decide(
        &self,
        existing: Option<&ContentRecord>,
        force_refresh: bool,
        now: Timestamp,
    ) -> RecordStatus {
        let Some(record) = existing else {
            return RecordStatus::Queued;
        };

        if self.is_usable(Some(record), force_refresh, now) {
            RecordStatus::Ready
        } else if force_refresh && record.status == RecordStatus::Error {
            RecordStatus::Processing
        } else if !record.is_complete() {
            RecordStatus::Processing
        } else {
            RecordStatus::Refreshing
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use visaguide_core::{GeneratedContent, Provider, RequestKey};

    fn now() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()
    }

    fn complete_content() -> GeneratedContent {
        GeneratedContent {
            visa_description: Some("Electronic tourist visa".to_string()),
            eligibility: Some("Most nationalities".to_string()),
            required_documents: Some("Passport".to_string()),
            application_process: Some("Online form".to_string()),
            processing_time: Some("3 days".to_string()),
            ..Default::default()
        }
    }

    fn record(status: RecordStatus, complete: bool, age_days: Option<i64>) -> ContentRecord {
        let key = RequestKey::new("US", "US", "JP", "Tourism", "eVisa");
        let mut record = ContentRecord::placeholder(key, status, now());
        if complete {
            record.content = complete_content();
            record.source = Some(Provider::OpenAi);
        }
        record.last_updated = age_days.map(|d| now() - Duration::days(d));
        record
    }

    #[test]
    fn test_is_fresh_boundary() {
        let at = now() - Duration::days(30);
        assert!(!is_fresh(at, 30, now()), "exactly the threshold is stale");
        assert!(is_fresh(at + Duration::seconds(1), 30, now()));
    }

    #[test]
    fn test_zero_day_window_is_never_fresh() {
        assert!(!is_fresh(now(), 0, now()));
    }

    #[test]
    fn test_stale_cutoff() {
        assert_eq!(stale_cutoff(7, now()), now() - Duration::days(7));
    }

    #[test]
    fn test_decide_no_record_is_queued() {
        let policy = FreshnessPolicy::default();
        assert_eq!(policy.decide(None, false, now()), RecordStatus::Queued);
        assert_eq!(policy.decide(None, true, now()), RecordStatus::Queued);
    }

    #[test]
    fn test_decide_fresh_complete_is_ready() {
        let policy = FreshnessPolicy::default();
        let r = record(RecordStatus::Ready, true, Some(2));
        assert_eq!(policy.decide(Some(&r), false, now()), RecordStatus::Ready);
        assert!(policy.is_usable(Some(&r), false, now()));
    }

    #[test]
    fn test_decide_forced_after_error_is_processing() {
        let policy = FreshnessPolicy::default();
        let stale = record(RecordStatus::Error, true, Some(90));
        assert_eq!(policy.decide(Some(&stale), true, now()), RecordStatus::Processing);

        let fresh = record(RecordStatus::Error, true, Some(1));
        assert_eq!(policy.decide(Some(&fresh), true, now()), RecordStatus::Processing);
    }

    #[test]
    fn test_decide_incomplete_is_processing_even_when_recent() {
        let policy = FreshnessPolicy::default();
        let r = record(RecordStatus::Queued, false, Some(0));
        assert_eq!(policy.decide(Some(&r), false, now()), RecordStatus::Processing);
    }

    #[test]
    fn test_decide_stale_and_incomplete_prefers_processing() {
        let policy = FreshnessPolicy::default();
        let r = record(RecordStatus::Error, false, Some(400));
        assert_eq!(policy.decide(Some(&r), false, now()), RecordStatus::Processing);
    }

    #[test]
    fn test_decide_stale_complete_is_refreshing() {
        let policy = FreshnessPolicy::default();
        let r = record(RecordStatus::Ready, true, Some(31));
        assert_eq!(policy.decide(Some(&r), false, now()), RecordStatus::Refreshing);
    }

    #[test]
    fn test_decide_forced_fresh_complete_is_refreshing() {
        let policy = FreshnessPolicy::default();
        let r = record(RecordStatus::Ready, true, Some(1));
        assert_eq!(policy.decide(Some(&r), true, now()), RecordStatus::Refreshing);
    }

    #[test]
    fn test_never_generated_complete_row_is_stale() {
        let policy = FreshnessPolicy::default();
        let r = record(RecordStatus::Ready, true, None);
        assert!(!policy.is_record_fresh(&r, now()));
        assert_eq!(policy.decide(Some(&r), false, now()), RecordStatus::Refreshing);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Anything younger than the window is fresh; anything at or past it is not.
        #[test]
        fn prop_freshness_matches_window(age_secs in 0i64..(120 * SECONDS_PER_DAY), days in 0u32..120) {
            let at = now() - Duration::seconds(age_secs);
            let expected = age_secs < i64::from(days) * SECONDS_PER_DAY;
            prop_assert_eq!(is_fresh(at, days, now()), expected);
        }

        /// Widening the window never turns a fresh record stale.
        #[test]
        fn prop_freshness_monotonic_in_window(age_secs in 0i64..(90 * SECONDS_PER_DAY), days in 0u32..60, extra in 0u32..60) {
            let at = now() - Duration::seconds(age_secs);
            if is_fresh(at, days, now()) {
                prop_assert!(is_fresh(at, days + extra, now()));
            }
        }

        /// `ready` is only ever decided for usable records.
        #[test]
        fn prop_ready_iff_usable(complete in any::<bool>(), force in any::<bool>(), age in proptest::option::of(0i64..60)) {
            let policy = FreshnessPolicy::default();
            let r = record(RecordStatus::Ready, complete, age);
            let decided = policy.decide(Some(&r), force, now());
            prop_assert_eq!(decided == RecordStatus::Ready, policy.is_usable(Some(&r), force, now()));
        }
    }
}
