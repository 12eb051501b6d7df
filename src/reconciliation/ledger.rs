use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::leave_request::LeaveType;

/// Remaining paid leave of one employee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub struct LeaveBalance {
    #[schema(example = 4)]
    pub sick_leave: u32,
    #[schema(example = 8)]
    pub casual_leave: u32,
}

/// Subtracts `amount` from `balance`, never going below zero.
pub fn apply_leave_decrement(balance: u32, amount: u32) -> u32 {
    balance.saturating_sub(amount)
}

impl LeaveBalance {
    /// Remaining days for a paid leave type, `None` for LWP.
    pub fn remaining(&self, leave_type: LeaveType) -> Option<u32> {
        match leave_type {
            LeaveType::SickLeave => Some(self.sick_leave),
            LeaveType::CasualLeave => Some(self.casual_leave),
            LeaveType::Lwp => None,
        }
    }

    /// Charges up to `days` against `leave_type`.
    ///
    /// Returns the new balance and the number of days actually consumed, which
    /// is `min(remaining, days)`. LWP never consumes anything.
    pub fn charge(self, leave_type: LeaveType, days: u32) -> (LeaveBalance, u32) {
        let consumed = self.remaining(leave_type).map_or(0, |left| left.min(days));
        let next = match leave_type {
            LeaveType::SickLeave => LeaveBalance {
                sick_leave: apply_leave_decrement(self.sick_leave, consumed),
                ..self
            },
            LeaveType::CasualLeave => LeaveBalance {
                casual_leave: apply_leave_decrement(self.casual_leave, consumed),
                ..self
            },
            LeaveType::Lwp => self,
        };
        (next, consumed)
    }

    /// Days charged between `self` (before) and `after`.
    pub fn charged_since(&self, after: &LeaveBalance) -> LeaveBalance {
        LeaveBalance {
            sick_leave: self.sick_leave.saturating_sub(after.sick_leave),
            casual_leave: self.casual_leave.saturating_sub(after.casual_leave),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decrement_saturates_at_zero() {
        assert_eq!(apply_leave_decrement(4, 1), 3);
        assert_eq!(apply_leave_decrement(2, 5), 0);
        assert_eq!(apply_leave_decrement(0, 0), 0);
    }

    #[test]
    fn charge_is_bounded_by_remaining_balance() {
        let balance = LeaveBalance {
            sick_leave: 4,
            casual_leave: 8,
        };

        let (after, consumed) = balance.charge(LeaveType::SickLeave, 5);
        assert_eq!(consumed, 4);
        assert_eq!(after.sick_leave, 0);
        assert_eq!(after.casual_leave, 8);

        let (after, consumed) = after.charge(LeaveType::CasualLeave, 3);
        assert_eq!(consumed, 3);
        assert_eq!(after.casual_leave, 5);

        let (unchanged, consumed) = after.charge(LeaveType::Lwp, 10);
        assert_eq!(consumed, 0);
        assert_eq!(unchanged, after);

        assert_eq!(
            balance.charged_since(&after),
            LeaveBalance {
                sick_leave: 4,
                casual_leave: 3
            }
        );
    }
}
