pub mod checkin;
pub mod client;
pub mod contact;
pub mod goal;
pub mod intake;
pub mod inventory;
pub mod outreach;
pub mod user;

use crate::errors::AppError;
use chrono::{Days, Local, NaiveDate, NaiveDateTime, Timelike};

/// Local wall-clock time truncated to whole seconds, the resolution every
/// timestamp column is stored with.
pub fn local_now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Required free-text field: missing or blank is a 400 naming the field.
pub(crate) fn required(field: &str, value: &Option<String>) -> Result<String, AppError> {
    crate::extract::non_empty(value)
        .map(str::to_string)
        .ok_or_else(|| AppError::bad_request(format!("{field} is required")))
}

pub(crate) fn parse_day(field: &str, raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::invalid_field(field, raw, "Date must be in YYYY-MM-DD format"))
}

pub(crate) fn optional_day(field: &str, value: &Option<String>) -> Result<Option<NaiveDate>, AppError> {
    crate::extract::non_empty(value)
        .map(|raw| parse_day(field, raw))
        .transpose()
}

/// Day after `day`, or a 400 on `field` at the end of the calendar.
pub(crate) fn next_day(field: &str, day: NaiveDate) -> Result<NaiveDate, AppError> {
    day.checked_add_days(Days::new(1))
        .ok_or_else(|| AppError::invalid_field(field, day.to_string(), "Date out of range"))
}

/// Case-insensitive substring pattern for `LIKE ? ESCAPE '\'`.
pub(crate) fn contains_pattern(value: &str) -> String {
    let mut pattern = String::with_capacity(value.len() + 2);
    pattern.push('%');
    for ch in value.to_lowercase().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcards_are_escaped() {
        assert_eq!(contains_pattern("Alex"), "%alex%");
        assert_eq!(contains_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(contains_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn next_day_stops_at_calendar_end() {
        let day = NaiveDate::from_ymd_opt(2026, 12, 31).unwrap();
        assert_eq!(next_day("endDate", day).unwrap(), NaiveDate::from_ymd_opt(2027, 1, 1).unwrap());

        let err = next_day("endDate", NaiveDate::MAX).unwrap_err();
        assert_eq!(err.message, "Date out of range");
    }

    #[tokio::test]
    async fn timestamps_follow_the_local_clock() {
        let pool = crate::db::test_pool().await;
        let before = local_now();

        let defaulted: NaiveDateTime =
            sqlx::query_scalar("INSERT INTO clients (name) VALUES ('Alex') RETURNING created_at")
                .fetch_one(&pool)
                .await
                .unwrap();

        let payload = serde_json::json!({ "email": "dana@example.org", "can_view_client_services": true });
        let user = user::User::create(&pool, &serde_json::from_value(payload).unwrap()).await.unwrap();

        let after = local_now();
        for stamp in [defaulted, user.created_at, user.updated_at] {
            assert!(stamp >= before && stamp <= after, "{stamp} outside {before}..{after}");
        }
    }
}
