//! Workday gate for the learn job.

use chrono::{Datelike, NaiveDate, Weekday};
use vocabot_core::config::VocabotConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Open,
    Weekend,
    Holiday,
}

impl Gate {
    pub fn is_open(self) -> bool {
        self == Gate::Open
    }
}

/// Monday to Friday and not a configured holiday.
pub fn check_workday(date: NaiveDate, config: &VocabotConfig) -> Gate {
    if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
        Gate::Weekend
    } else if config.is_holiday(date) {
        Gate::Holiday
    } else {
        Gate::Open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_weekday_open() {
        let config = VocabotConfig::default();
        // 2025-10-09 is a Thursday right after the national holiday.
        assert_eq!(check_workday(date(2025, 10, 9), &config), Gate::Open);
    }

    #[test]
    fn test_weekend_closed() {
        let config = VocabotConfig::default();
        assert_eq!(check_workday(date(2025, 10, 11), &config), Gate::Weekend);
        assert_eq!(check_workday(date(2025, 10, 12), &config), Gate::Weekend);
    }

    #[test]
    fn test_holiday_closed() {
        let config = VocabotConfig::default();
        // Wednesday, listed as a holiday.
        assert_eq!(check_workday(date(2025, 10, 1), &config), Gate::Holiday);
        assert!(!check_workday(date(2025, 10, 1), &config).is_open());
    }

    #[test]
    fn test_custom_holidays() {
        let mut config = VocabotConfig::default();
        config.holidays = vec!["2026-01-01".into()];
        assert_eq!(check_workday(date(2026, 1, 1), &config), Gate::Holiday);
        assert_eq!(check_workday(date(2025, 10, 2), &config), Gate::Open);
    }
}
