use crate::financial::AggregateError;
use serde::Serialize;

/// A validated trailing window of whole calendar days ending today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TimeWindow(u32);

impl TimeWindow {
    pub const MIN_DAYS: u32 = 1;
    pub const MAX_DAYS: u32 = 366;

    pub const WEEK: TimeWindow = TimeWindow(7);
    pub const MONTH: TimeWindow = TimeWindow(30);
    pub const QUARTER: TimeWindow = TimeWindow(90);

    /// The choices offered by the dashboard.
    pub const PRESETS: [TimeWindow; 3] = [Self::WEEK, Self::MONTH, Self::QUARTER];

    pub fn new(days: i64) -> Result<Self, AggregateError> {
        if (i64::from(Self::MIN_DAYS)..=i64::from(Self::MAX_DAYS)).contains(&days) {
            Ok(Self(days as u32))
        } else {
            Err(AggregateError::InvalidWindow { days })
        }
    }

    pub fn days(self) -> u32 {
        self.0
    }
}

impl Default for TimeWindow {
    fn default() -> Self {
        Self::WEEK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_presets_and_bounds() {
        for preset in TimeWindow::PRESETS {
            assert_eq!(TimeWindow::new(i64::from(preset.days())).unwrap(), preset);
        }
        assert_eq!(TimeWindow::new(1).unwrap().days(), 1);
        assert_eq!(TimeWindow::new(366).unwrap().days(), 366);
    }

    #[test]
    fn rejects_non_positive_and_huge_windows() {
        for days in [0, -7, 367, i64::MAX] {
            let err = TimeWindow::new(days).unwrap_err();
            assert!(matches!(err, AggregateError::InvalidWindow { days: d } if d == days));
        }
        assert_eq!(
            TimeWindow::new(0).unwrap_err().to_string(),
            "invalid window: 0 days (expected 1..=366)"
        );
    }
}
