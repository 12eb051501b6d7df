use chrono::{Datelike, FixedOffset, NaiveDateTime, NaiveTime, Utc, Weekday};

use crate::model::attendance::AttendanceStatus;

/// Current wall-clock time at the office.
pub fn office_now(offset: FixedOffset) -> NaiveDateTime {
    Utc::now().with_timezone(&offset).naive_local()
}

/// Formats a duration in minutes as `"Xh Ym"`. Negative durations format as zero.
pub fn format_minutes(minutes: i64) -> String {
    let minutes = minutes.max(0);
    format!("{}h {}m", minutes / 60, minutes % 60)
}

/// Working time between check-in and check-out as `"Xh Ym"`.
pub fn working_time(check_in: NaiveDateTime, check_out: NaiveDateTime) -> String {
    format_minutes((check_out - check_in).num_minutes())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckInOutcome {
    WeeklyOff,
    Present,
    Late { minutes: i64 },
}

impl CheckInOutcome {
    pub fn status(&self) -> AttendanceStatus {
        match self {
            CheckInOutcome::WeeklyOff => AttendanceStatus::WeeklyOff,
            CheckInOutcome::Present => AttendanceStatus::Present,
            CheckInOutcome::Late { .. } => AttendanceStatus::Late,
        }
    }

    pub fn late_time(&self) -> Option<String> {
        match self {
            CheckInOutcome::WeeklyOff => None,
            CheckInOutcome::Present => Some(format_minutes(0)),
            CheckInOutcome::Late { minutes } => Some(format_minutes(*minutes)),
        }
    }

    /// Weekly-off records carry no check-in, so they never open for check-out.
    pub fn check_in_time(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        match self {
            CheckInOutcome::WeeklyOff => None,
            CheckInOutcome::Present | CheckInOutcome::Late { .. } => Some(now),
        }
    }
}

/// Decides the status of a check-in made at `now` (office time).
pub fn classify_check_in(
    now: NaiveDateTime,
    office_start: NaiveTime,
    weekly_off: &[Weekday],
) -> CheckInOutcome {
    if weekly_off.contains(&now.weekday()) {
        return CheckInOutcome::WeeklyOff;
    }

    let start = now.date().and_time(office_start);
    let minutes = (now - start).num_minutes();
    if minutes > 0 {
        CheckInOutcome::Late { minutes }
    } else {
        CheckInOutcome::Present
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        // November 2026: the 2nd is a Monday, the 7th a Saturday
        NaiveDate::from_ymd_opt(2026, 11, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn ten() -> NaiveTime {
        NaiveTime::from_hms_opt(10, 0, 0).unwrap()
    }

    #[test]
    fn formats_minutes() {
        assert_eq!(format_minutes(0), "0h 0m");
        assert_eq!(format_minutes(95), "1h 35m");
        assert_eq!(format_minutes(-5), "0h 0m");
        assert_eq!(working_time(at(2, 9, 15), at(2, 18, 0)), "8h 45m");
    }

    #[test]
    fn on_time_and_late_check_ins() {
        let weekend = [Weekday::Sat, Weekday::Sun];

        let early = classify_check_in(at(2, 9, 45), ten(), &weekend);
        assert_eq!(early, CheckInOutcome::Present);
        assert_eq!(early.late_time().as_deref(), Some("0h 0m"));

        assert_eq!(
            classify_check_in(at(2, 10, 0), ten(), &weekend),
            CheckInOutcome::Present
        );

        let late = classify_check_in(at(2, 11, 20), ten(), &weekend);
        assert_eq!(late, CheckInOutcome::Late { minutes: 80 });
        assert_eq!(late.status(), AttendanceStatus::Late);
        assert_eq!(late.late_time().as_deref(), Some("1h 20m"));
        assert_eq!(late.check_in_time(at(2, 11, 20)), Some(at(2, 11, 20)));
    }

    #[test]
    fn weekly_off_wins_over_time() {
        let outcome = classify_check_in(at(7, 12, 0), ten(), &[Weekday::Sat, Weekday::Sun]);
        assert_eq!(outcome, CheckInOutcome::WeeklyOff);
        assert_eq!(outcome.status(), AttendanceStatus::WeeklyOff);
        assert!(outcome.late_time().is_none());
        assert!(outcome.check_in_time(at(7, 12, 0)).is_none());

        assert_eq!(
            classify_check_in(at(7, 9, 0), ten(), &[]),
            CheckInOutcome::Present
        );
    }
}
