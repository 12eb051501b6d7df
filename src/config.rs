use std::{env, fmt::Display, str::FromStr};

use anyhow::{Context, Result, anyhow};
use chrono::{FixedOffset, NaiveTime, Weekday};

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_register_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,
    pub log_dir: String,

    // Office rules
    pub office_offset: FixedOffset,
    pub office_start: NaiveTime,
    pub weekly_off_days: Vec<Weekday>,
    pub auto_checkout_at: NaiveTime,

    // Leave policy
    pub default_sick_leave: u32,
    pub default_casual_leave: u32,
    pub max_leave_days_per_month: u32,

    pub bootstrap_admin: Option<(String, String)>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let offset_minutes: i32 = parse_or("OFFICE_UTC_OFFSET_MINUTES", "330")?;
        let office_offset = FixedOffset::east_opt(offset_minutes * 60)
            .ok_or_else(|| anyhow!("OFFICE_UTC_OFFSET_MINUTES out of range: {offset_minutes}"))?;

        let bootstrap_admin = match (
            env::var("BOOTSTRAP_ADMIN_USERNAME"),
            env::var("BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Ok(user), Ok(password)) if !user.trim().is_empty() && !password.is_empty() => {
                Some((user.trim().to_string(), password))
            }
            _ => None,
        };

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            access_token_ttl: parse_or("ACCESS_TOKEN_TTL", "900")?, // 15 min
            refresh_token_ttl: parse_or("REFRESH_TOKEN_TTL", "604800")?, // 7 days

            rate_login_per_min: parse_or("RATE_LOGIN_PER_MIN", "60")?,
            rate_register_per_min: parse_or("RATE_REGISTER_PER_MIN", "30")?,
            rate_refresh_per_min: parse_or("RATE_REFRESH_PER_MIN", "30")?,
            rate_protected_per_min: parse_or("RATE_PROTECTED_PER_MIN", "1000")?,

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),
            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),

            office_offset,
            office_start: parse_time(&var_or("OFFICE_START_TIME", "10:00"))
                .context("OFFICE_START_TIME")?,
            weekly_off_days: parse_weekdays(&var_or("WEEKLY_OFF_DAYS", "Sat,Sun"))
                .context("WEEKLY_OFF_DAYS")?,
            auto_checkout_at: parse_time(&var_or("AUTO_CHECKOUT_AT", "23:30"))
                .context("AUTO_CHECKOUT_AT")?,

            default_sick_leave: parse_or("DEFAULT_SICK_LEAVE", "4")?,
            default_casual_leave: parse_or("DEFAULT_CASUAL_LEAVE", "8")?,
            max_leave_days_per_month: parse_or("MAX_LEAVE_DAYS_PER_MONTH", "4")?,

            bootstrap_admin,
        })
    }
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = var_or(key, default);
    raw.trim()
        .parse()
        .map_err(|e| anyhow!("invalid {key} value {raw:?}: {e}"))
}

/// Accepts `HH:MM` or `HH:MM:SS`.
pub fn parse_time(raw: &str) -> Result<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|e| anyhow!("invalid time {raw:?}: {e}"))
}

/// Comma separated weekday names, e.g. `Sat,Sun`. Empty means no weekly off.
pub fn parse_weekdays(raw: &str) -> Result<Vec<Weekday>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<Weekday>()
                .map_err(|_| anyhow!("invalid weekday {s:?}"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_office_times() {
        assert_eq!(
            parse_time("10:00").unwrap(),
            NaiveTime::from_hms_opt(10, 0, 0).unwrap()
        );
        assert_eq!(
            parse_time(" 23:30:15 ").unwrap(),
            NaiveTime::from_hms_opt(23, 30, 15).unwrap()
        );
        assert!(parse_time("25:00").is_err());
    }

    #[test]
    fn parses_weekly_off_days() {
        assert_eq!(
            parse_weekdays("Sat, Sun").unwrap(),
            vec![Weekday::Sat, Weekday::Sun]
        );
        assert_eq!(parse_weekdays("friday").unwrap(), vec![Weekday::Fri]);
        assert!(parse_weekdays("").unwrap().is_empty());
        assert!(parse_weekdays("Funday").is_err());
    }
}
