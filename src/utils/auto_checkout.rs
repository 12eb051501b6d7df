use std::time::Duration;

use anyhow::Result;
use chrono::{NaiveDateTime, NaiveTime};
use sqlx::MySqlPool;
use tracing::{error, info};

use super::attendance_rules::{office_now, working_time};
use crate::config::Config;

/// Time left until the next `at` (office time) strictly after `now`.
pub fn until_next_run(now: NaiveDateTime, at: NaiveTime) -> Duration {
    let today = now.date().and_time(at);
    let next = if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    };
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

/// Closes every attendance record of `now`'s day that has a check-in but no check-out.
pub async fn run_auto_checkout(pool: &MySqlPool, now: NaiveDateTime) -> Result<usize> {
    let open = sqlx::query_as::<_, (u64, u64, NaiveDateTime)>(
        r#"
        SELECT id, employee_id, check_in
        FROM attendance
        WHERE date = ?
        AND check_in IS NOT NULL
        AND check_out IS NULL
        "#,
    )
    .bind(now.date())
    .fetch_all(pool)
    .await?;

    let mut closed = 0usize;
    for (id, employee_id, check_in) in open {
        let result = sqlx::query(
            r#"
            UPDATE attendance
            SET check_out = ?, total_working_hour = ?
            WHERE id = ?
            AND check_out IS NULL
            "#,
        )
        .bind(now)
        .bind(working_time(check_in, now))
        .bind(id)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            closed += 1;
            info!(employee_id, "Auto-checked out employee");
        }
    }

    Ok(closed)
}

/// Runs the auto check-out once a day at `config.auto_checkout_at`, forever.
pub async fn auto_checkout_loop(pool: MySqlPool, config: Config) {
    loop {
        let wait = until_next_run(office_now(config.office_offset), config.auto_checkout_at);
        tokio::time::sleep(wait).await;

        let now = office_now(config.office_offset);
        info!(at = %now.time(), "Running auto check-out");

        match run_auto_checkout(&pool, now).await {
            Ok(0) => info!("No employees found for auto check-out"),
            Ok(closed) => info!(closed, "Auto check-out completed"),
            Err(e) => error!(error = %e, "Auto check-out failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 11, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn next_run_later_today() {
        let run_at = NaiveTime::from_hms_opt(23, 30, 0).unwrap();
        assert_eq!(
            until_next_run(at(2, 23, 0), run_at),
            Duration::from_secs(30 * 60)
        );
    }

    #[test]
    fn next_run_rolls_over_to_tomorrow() {
        let run_at = NaiveTime::from_hms_opt(23, 30, 0).unwrap();
        assert_eq!(
            until_next_run(at(2, 23, 30), run_at),
            Duration::from_secs(24 * 60 * 60)
        );
        assert_eq!(
            until_next_run(at(2, 23, 45), run_at),
            Duration::from_secs((23 * 60 + 45) * 60)
        );
    }
}
