use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::error::ReconcileError;

/// A closed interval of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Period {
    start: NaiveDate,
    end: NaiveDate,
}

impl Period {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ReconcileError> {
        if end < start {
            return Err(ReconcileError::InvalidPeriod { start, end });
        }
        Ok(Self { start, end })
    }

    /// The whole calendar month. `None` for an out-of-range month or year.
    pub fn month(year: i32, month: u32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)?
        };
        let end = next.pred_opt()?;
        Some(Self { start, end })
    }

    /// Month containing `date`.
    pub fn month_of(date: NaiveDate) -> Option<Self> {
        Self::month(date.year(), date.month())
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of days, both ends included.
    pub fn days(&self) -> u32 {
        ((self.end - self.start).num_days() + 1) as u32
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        start <= self.end && end >= self.start
    }

    /// Intersection of `[start, end]` with this period.
    pub fn clip(&self, start: NaiveDate, end: NaiveDate) -> Option<Period> {
        if !self.overlaps(start, end) || end < start {
            return None;
        }
        Some(Period {
            start: start.max(self.start),
            end: end.min(self.end),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn rejects_inverted_period() {
        let err = Period::new(d(2026, 11, 30), d(2026, 11, 1)).unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidPeriod { .. }));
        assert_eq!(Period::new(d(2026, 11, 1), d(2026, 11, 1)).unwrap().days(), 1);
    }

    #[test]
    fn month_bounds() {
        let feb = Period::month(2028, 2).unwrap();
        assert_eq!(feb.end(), d(2028, 2, 29));
        assert_eq!(feb.days(), 29);

        let dec = Period::month(2026, 12).unwrap();
        assert_eq!(dec.start(), d(2026, 12, 1));
        assert_eq!(dec.end(), d(2026, 12, 31));

        assert!(Period::month(2026, 13).is_none());
        assert_eq!(Period::month_of(d(2026, 11, 17)), Period::month(2026, 11));
    }

    #[test]
    fn clip_to_month() {
        let nov = Period::month(2026, 11).unwrap();

        let clipped = nov.clip(d(2026, 10, 28), d(2026, 11, 3)).unwrap();
        assert_eq!(clipped.start(), d(2026, 11, 1));
        assert_eq!(clipped.days(), 3);

        let spanning = nov.clip(d(2026, 10, 1), d(2027, 1, 1)).unwrap();
        assert_eq!(spanning.days(), 30);

        assert!(nov.clip(d(2026, 10, 1), d(2026, 10, 31)).is_none());
        assert!(nov.clip(d(2026, 12, 1), d(2026, 12, 2)).is_none());
    }
}
