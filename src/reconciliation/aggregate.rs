use std::collections::HashSet;

use serde::Serialize;

use super::{error::StoreError, period::Period, store::AttendanceStore};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};

/// Attendance counts of one employee over a period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AttendanceSummary {
    pub present: u32,
    pub late: u32,
    pub absent: u32,
    pub weekly_off: u32,
    pub on_leave: u32,
    pub pending: u32,
}

impl AttendanceSummary {
    /// Late arrivals still count as present for pay.
    pub fn days_present(&self) -> u32 {
        self.present + self.late
    }

    fn record(&mut self, status: AttendanceStatus) {
        let slot = match status {
            AttendanceStatus::Present => &mut self.present,
            AttendanceStatus::Late => &mut self.late,
            AttendanceStatus::Absent => &mut self.absent,
            AttendanceStatus::WeeklyOff => &mut self.weekly_off,
            AttendanceStatus::OnLeave => &mut self.on_leave,
            AttendanceStatus::Pending => &mut self.pending,
        };
        *slot += 1;
    }
}

/// Counts records inside `period`, one per calendar day (first record wins).
pub fn tally(records: &[AttendanceRecord], period: &Period) -> AttendanceSummary {
    let mut seen = HashSet::new();
    let mut summary = AttendanceSummary::default();

    for record in records {
        if !period.contains(record.date) || !seen.insert(record.date) {
            continue;
        }
        summary.record(record.status);
    }

    summary
}

pub async fn aggregate<S>(
    store: &S,
    employee_id: u64,
    period: Period,
) -> Result<AttendanceSummary, StoreError>
where
    S: AttendanceStore + ?Sized,
{
    let records = store.find_in_range(employee_id, period).await?;
    let summary = tally(&records, &period);

    tracing::debug!(employee_id, records = records.len(), summary = ?summary, "Aggregated attendance");

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(id: u64, day: u32, status: AttendanceStatus) -> AttendanceRecord {
        AttendanceRecord {
            id,
            employee_id: 1,
            date: NaiveDate::from_ymd_opt(2026, 11, day).unwrap(),
            check_in: None,
            check_out: None,
            total_working_hour: None,
            late_time: None,
            status,
        }
    }

    #[test]
    fn late_counts_towards_present() {
        let nov = Period::month(2026, 11).unwrap();
        let records = vec![
            record(1, 2, AttendanceStatus::Present),
            record(2, 3, AttendanceStatus::Late),
            record(3, 4, AttendanceStatus::Absent),
            record(4, 7, AttendanceStatus::WeeklyOff),
            record(5, 8, AttendanceStatus::WeeklyOff),
            record(6, 9, AttendanceStatus::Present),
        ];

        let summary = tally(&records, &nov);
        assert_eq!(summary.present, 2);
        assert_eq!(summary.late, 1);
        assert_eq!(summary.absent, 1);
        assert_eq!(summary.weekly_off, 2);
        assert_eq!(summary.days_present(), 3);
    }

    #[test]
    fn duplicate_days_and_out_of_period_records_are_skipped() {
        let period = Period::new(
            NaiveDate::from_ymd_opt(2026, 11, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 11, 10).unwrap(),
        )
        .unwrap();
        let records = vec![
            record(1, 2, AttendanceStatus::Present),
            record(2, 2, AttendanceStatus::Late),
            record(3, 15, AttendanceStatus::Present),
        ];

        let summary = tally(&records, &period);
        assert_eq!(summary.days_present(), 1);
        assert_eq!(summary.late, 0);
    }
}
