//! Trading-hours gate. Configured with allowed weekdays, a regular session
//! window, and optional pre/post-market extensions.

use chrono::{DateTime, NaiveTime, Utc, Weekday};
use serde::Deserialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Deserialize)]
pub struct TradingHoursValidator {
    pub allowed_weekdays: HashSet<u8>,
    pub trading_start: NaiveTime,
    pub trading_end: NaiveTime,
    #[serde(default)]
    pub enable_premarket: bool,
    #[serde(default)]
    pub premarket_start: Option<NaiveTime>,
    #[serde(default)]
    pub enable_postmarket: bool,
    #[serde(default)]
    pub postmarket_end: Option<NaiveTime>,
}

impl TradingHoursValidator {
    /// Returns `(allowed, reason)`. Monday = 0.
    pub fn is_allowed(&self, now: DateTime<Utc>) -> (bool, &'static str) {
        let weekday_index = weekday_to_index(now.weekday());
        if !self.allowed_weekdays.contains(&weekday_index) {
            return (false, "Non-trading day");
        }

        let t = now.time();
        if self.enable_premarket {
            if let Some(pre_start) = self.premarket_start {
                if pre_start <= t && t < self.trading_start {
                    return (true, "Pre-market hours");
                }
            }
        }
        if self.trading_start <= t && t <= self.trading_end {
            return (true, "Regular trading hours");
        }
        if self.enable_postmarket {
            if let Some(post_end) = self.postmarket_end {
                if self.trading_end < t && t <= post_end {
                    return (true, "Post-market hours");
                }
            }
        }
        (false, "Outside trading hours")
    }
}

fn weekday_to_index(w: Weekday) -> u8 {
    w.num_days_from_monday() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn validator() -> TradingHoursValidator {
        TradingHoursValidator {
            allowed_weekdays: (0..5).collect(),
            trading_start: NaiveTime::from_hms_opt(9, 15, 0).unwrap(),
            trading_end: NaiveTime::from_hms_opt(15, 30, 0).unwrap(),
            enable_premarket: false,
            premarket_start: None,
            enable_postmarket: false,
            postmarket_end: None,
        }
    }

    #[test]
    fn saturday_is_rejected() {
        // 2025-10-11 is a Saturday.
        let v = validator();
        let dt = Utc.with_ymd_and_hms(2025, 10, 11, 10, 30, 0).unwrap();
        let (allowed, reason) = v.is_allowed(dt);
        assert!(!allowed);
        assert_eq!(reason, "Non-trading day");
    }

    #[test]
    fn thursday_during_session_is_allowed() {
        let v = validator();
        // 2025-10-09 is a Thursday.
        let dt = Utc.with_ymd_and_hms(2025, 10, 9, 10, 30, 0).unwrap();
        let (allowed, reason) = v.is_allowed(dt);
        assert!(allowed);
        assert_eq!(reason, "Regular trading hours");
    }

    #[test]
    fn outside_session_window_is_rejected() {
        let v = validator();
        let dt = Utc.with_ymd_and_hms(2025, 10, 9, 20, 0, 0).unwrap();
        let (allowed, _) = v.is_allowed(dt);
        assert!(!allowed);
    }

    #[test]
    fn premarket_window_honored_when_enabled() {
        let mut v = validator();
        v.enable_premarket = true;
        v.premarket_start = Some(NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        let dt = Utc.with_ymd_and_hms(2025, 10, 9, 9, 5, 0).unwrap();
        let (allowed, reason) = v.is_allowed(dt);
        assert!(allowed);
        assert_eq!(reason, "Pre-market hours");
    }
}
