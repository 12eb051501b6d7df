use serde::Serialize;

use super::{error::StoreError, period::Period, store::LeaveRequestStore};
use crate::model::leave_request::{LeaveRequest, LeaveStatus, LeaveType};

/// The part of an approved leave that falls inside a reporting period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClippedLeave {
    pub leave_id: u64,
    pub leave_type: LeaveType,
    pub days: u32,
}

/// Clips one leave to `period`. Unapproved or non-intersecting leaves yield `None`.
pub fn clip_leave(leave: &LeaveRequest, period: &Period) -> Option<ClippedLeave> {
    if leave.status != LeaveStatus::Approved {
        return None;
    }
    let clipped = period.clip(leave.start_date, leave.end_date)?;
    Some(ClippedLeave {
        leave_id: leave.id,
        leave_type: leave.leave_type,
        days: clipped.days(),
    })
}

/// Approved leaves of the employee overlapping `period`, clipped, in store order.
pub async fn resolve_overlaps<S>(
    store: &S,
    employee_id: u64,
    period: Period,
) -> Result<Vec<ClippedLeave>, StoreError>
where
    S: LeaveRequestStore + ?Sized,
{
    let leaves = store.find_approved_overlapping(employee_id, period).await?;

    let clipped: Vec<ClippedLeave> = leaves
        .iter()
        .filter(|leave| leave.employee_id == employee_id)
        .filter_map(|leave| clip_leave(leave, &period))
        .collect();

    tracing::debug!(
        employee_id,
        matched = leaves.len(),
        clipped = clipped.len(),
        "Resolved leave overlaps"
    );

    Ok(clipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, day).unwrap()
    }

    fn leave(id: u64, leave_type: LeaveType, start: NaiveDate, end: NaiveDate) -> LeaveRequest {
        LeaveRequest {
            id,
            employee_id: 7,
            leave_type,
            start_date: start,
            end_date: end,
            reason: None,
            status: LeaveStatus::Approved,
            approved_by: Some(1),
            created_at: None,
        }
    }

    #[test]
    fn leave_inside_period_keeps_its_span() {
        let nov = Period::month(2026, 11).unwrap();
        let inside = leave(1, LeaveType::SickLeave, d(11, 10), d(11, 14));
        let clipped = clip_leave(&inside, &nov).unwrap();
        assert_eq!(clipped.days, inside.days());
        assert_eq!(clipped.days, 5);
    }

    #[test]
    fn leave_starting_before_period_is_clipped_at_start() {
        let nov = Period::month(2026, 11).unwrap();

        let casual = leave(2, LeaveType::CasualLeave, d(10, 28), d(11, 3));
        assert_eq!(clip_leave(&casual, &nov).unwrap().days, 3);

        let long = leave(3, LeaveType::Lwp, d(10, 20), d(12, 10));
        assert_eq!(clip_leave(&long, &nov).unwrap().days, 30);
    }

    #[test]
    fn boundary_leave_is_split_between_months() {
        let oct = Period::month(2026, 10).unwrap();
        let nov = Period::month(2026, 11).unwrap();
        let spanning = leave(4, LeaveType::CasualLeave, d(10, 28), d(11, 3));

        let in_oct = clip_leave(&spanning, &oct).unwrap().days;
        let in_nov = clip_leave(&spanning, &nov).unwrap().days;
        assert_eq!(in_oct, 4);
        assert_eq!(in_nov, 3);
        assert_eq!(in_oct + in_nov, spanning.days());
    }

    #[test]
    fn pending_or_disjoint_leave_is_ignored() {
        let nov = Period::month(2026, 11).unwrap();
        let mut pending = leave(5, LeaveType::SickLeave, d(11, 2), d(11, 3));
        pending.status = LeaveStatus::Pending;
        assert!(clip_leave(&pending, &nov).is_none());

        let october = leave(6, LeaveType::SickLeave, d(10, 2), d(10, 3));
        assert!(clip_leave(&october, &nov).is_none());
    }
}
