use crate::errors::AppError;
use crate::extract::non_empty;
use crate::services::{
    completion_rate, round1, sum_columns, Counts, Impact, ServiceCategory, ServiceCounters,
};
use chrono::{Datelike, Days, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum Period {
    #[strum(serialize = "Today")]
    Today,
    #[strum(serialize = "Yesterday")]
    Yesterday,
    #[strum(serialize = "This Week")]
    ThisWeek,
    #[strum(serialize = "Last Week")]
    LastWeek,
    #[strum(serialize = "This Month")]
    ThisMonth,
    #[strum(serialize = "Last Month")]
    LastMonth,
    #[strum(serialize = "Last 3 Months")]
    Last3Months,
    #[strum(serialize = "This Year")]
    ThisYear,
    #[strum(serialize = "Specific Date")]
    SpecificDate,
    #[strum(serialize = "Custom Date Range")]
    CustomDateRange,
}

impl Period {
    pub const ALL: [Period; 10] = [
        Period::Today,
        Period::Yesterday,
        Period::ThisWeek,
        Period::LastWeek,
        Period::ThisMonth,
        Period::LastMonth,
        Period::Last3Months,
        Period::ThisYear,
        Period::SpecificDate,
        Period::CustomDateRange,
    ];

    /// Unknown or missing selectors fall back to the current month.
    pub fn parse(value: Option<&str>) -> Self {
        value
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(Period::ThisMonth)
    }

    pub fn granularity(self) -> Granularity {
        match self {
            Period::Today | Period::Yesterday | Period::SpecificDate => Granularity::Hourly,
            Period::ThisWeek | Period::LastWeek => Granularity::Daily,
            Period::Last3Months => Granularity::Monthly(3),
            _ => Granularity::Monthly(6),
        }
    }

    /// Half-open `[start, end)` range covered by the period.
    pub fn window(
        self,
        today: NaiveDate,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Window, AppError> {
        let window = match self {
            Period::Today => Window::days(today, 1),
            Period::Yesterday => Window::days(today - Duration::days(1), 1),
            Period::ThisWeek => Window::days(week_start(today), 7),
            Period::LastWeek => Window::days(week_start(today) - Duration::days(7), 7),
            Period::ThisMonth => Some(Window::months(month_start(today), 1)),
            Period::LastMonth => Some(Window::months(shift_months(month_start(today), -1), 1)),
            Period::Last3Months => Some(Window::months(shift_months(month_start(today), -2), 3)),
            Period::ThisYear => {
                let first = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);
                Some(Window::months(first, 12))
            }
            Period::SpecificDate => Window::days(start.unwrap_or(today), 1),
            Period::CustomDateRange => match (start, end) {
                (Some(start), Some(end)) if end < start => {
                    return Err(AppError::bad_request("endDate must not be before startDate"));
                }
                (Some(start), Some(end)) => Window::days(start, (end - start).num_days().unsigned_abs() + 1),
                _ => Some(Window::months(month_start(today), 1)),
            },
        };

        window.ok_or_else(|| {
            let (field, date) = match (self, end) {
                (Period::CustomDateRange, Some(end)) => ("endDate", end),
                _ => ("startDate", start.unwrap_or(today)),
            };
            AppError::invalid_field(field, date.to_string(), "Date out of range")
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Hourly,
    Daily,
    Monthly(u32),
}

impl Granularity {
    /// `strftime` pattern grouping contacts into buckets; chrono formats
    /// bucket starts with the same pattern to join the two.
    fn key_format(self) -> &'static str {
        match self {
            Granularity::Hourly => "%Y-%m-%d %H",
            Granularity::Daily => "%Y-%m-%d",
            Granularity::Monthly(_) => "%Y-%m",
        }
    }

    fn label_format(self) -> &'static str {
        match self {
            Granularity::Hourly => "%H:00",
            Granularity::Daily => "%a %m/%d",
            Granularity::Monthly(_) => "%b %Y",
        }
    }

    /// Start of every bucket shown in the trend series for `window`.
    pub fn buckets(self, window: &Window) -> Vec<NaiveDateTime> {
        match self {
            Granularity::Hourly => (0..24).map(|hour| window.start + Duration::hours(hour)).collect(),
            Granularity::Daily => {
                let mut buckets = Vec::new();
                let mut cursor = window.start;
                while cursor < window.end {
                    buckets.push(cursor);
                    cursor += Duration::days(1);
                }
                buckets
            }
            Granularity::Monthly(count) => {
                let last = month_start((window.end - Duration::seconds(1)).date());
                (0..count as i32)
                    .rev()
                    .map(|back| midnight(shift_months(last, -back)))
                    .collect()
            }
        }
    }

    fn bucket_end(self, start: NaiveDateTime) -> NaiveDateTime {
        match self {
            Granularity::Hourly => start + Duration::hours(1),
            Granularity::Daily => start + Duration::days(1),
            Granularity::Monthly(_) => midnight(shift_months(start.date(), 1)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Window {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Window {
    /// `None` when the last day falls past the end of the calendar.
    fn days(first: NaiveDate, count: u64) -> Option<Self> {
        let end = first.checked_add_days(Days::new(count))?;
        Some(Self {
            start: midnight(first),
            end: midnight(end),
        })
    }

    fn months(first: NaiveDate, count: i32) -> Self {
        Self {
            start: midnight(first),
            end: midnight(shift_months(first, count)),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ImpactQuery {
    pub period: Option<String>,
    #[serde(rename = "startDate")]
    pub start_date: Option<String>,
    #[serde(rename = "endDate")]
    pub end_date: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceImpact {
    pub name: String,
    pub requested: i64,
    pub provided: i64,
    pub gap: i64,
    pub completion_rate: f64,
    pub impact: Impact,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub label: String,
    pub bucket_start: NaiveDateTime,
    pub requested: i64,
    pub provided: i64,
    pub completion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactSummary {
    pub total_requested: i64,
    pub total_provided: i64,
    pub total_gap: i64,
    pub overall_completion_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServicesImpact {
    pub services: Vec<ServiceImpact>,
    pub trends: Vec<TrendPoint>,
    pub period: String,
    pub summary: ImpactSummary,
    pub window: Window,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub total_contacts: i64,
    pub unique_clients: i64,
    pub unique_providers: i64,
    pub contacts_today: i64,
}

pub async fn services_impact_at(
    pool: &SqlitePool,
    query: &ImpactQuery,
    now: NaiveDateTime,
) -> Result<ServicesImpact, AppError> {
    let period = Period::parse(query.period.as_deref());
    let start = parse_date("startDate", non_empty(&query.start_date).or(non_empty(&query.date)))?;
    let end = parse_date("endDate", non_empty(&query.end_date))?;
    let window = period.window(now.date(), start, end)?;

    let totals = load_totals(pool, &window).await?;
    let services = build_services(&totals);
    let summary = build_summary(&services);

    let granularity = period.granularity();
    let buckets = granularity.buckets(&window);
    let trends = match (buckets.first(), buckets.last()) {
        (Some(&first), Some(&last)) => {
            let trend_window = Window {
                start: first,
                end: granularity.bucket_end(last),
            };
            let rows = load_trend_rows(pool, granularity, &trend_window).await?;
            build_trends(granularity, &buckets, &rows)
        }
        _ => Vec::new(),
    };

    Ok(ServicesImpact {
        services,
        trends,
        period: period.to_string(),
        summary,
        window,
    })
}

pub async fn overview_at(pool: &SqlitePool, today: NaiveDate) -> Result<Overview, AppError> {
    let window = Period::Today.window(today, None, None)?;
    let row = sqlx::query(
        r#"
        SELECT
            COUNT(*) AS total_contacts,
            COUNT(DISTINCT client_name) AS unique_clients,
            COUNT(DISTINCT provider_name) AS unique_providers,
            COALESCE(SUM(CASE WHEN contact_date >= ?1 AND contact_date < ?2 THEN 1 ELSE 0 END), 0) AS contacts_today
        FROM contacts
        "#,
    )
    .bind(window.start)
    .bind(window.end)
    .fetch_one(pool)
    .await?;

    Ok(Overview {
        total_contacts: row.try_get("total_contacts")?,
        unique_clients: row.try_get("unique_clients")?,
        unique_providers: row.try_get("unique_providers")?,
        contacts_today: row.try_get("contacts_today")?,
    })
}

/// Sums every counter column over the window in a single statement.
pub async fn load_totals(pool: &SqlitePool, window: &Window) -> Result<ServiceCounters, sqlx::Error> {
    let sql = format!(
        "SELECT {} FROM contacts WHERE contact_date >= ?1 AND contact_date < ?2",
        sum_columns()
    );
    let row = sqlx::query(&sql)
        .bind(window.start)
        .bind(window.end)
        .fetch_one(pool)
        .await?;
    ServiceCounters::from_row(&row)
}

async fn load_trend_rows(
    pool: &SqlitePool,
    granularity: Granularity,
    window: &Window,
) -> Result<HashMap<String, Counts>, sqlx::Error> {
    let requested = sum_expression(ServiceCategory::requested_column);
    let provided = sum_expression(ServiceCategory::provided_column);
    let sql = format!(
        "SELECT strftime(?1, contact_date) AS bucket, \
                COALESCE(SUM({requested}), 0) AS requested, \
                COALESCE(SUM({provided}), 0) AS provided \
         FROM contacts \
         WHERE contact_date >= ?2 AND contact_date < ?3 \
         GROUP BY bucket"
    );

    let rows = sqlx::query(&sql)
        .bind(granularity.key_format())
        .bind(window.start)
        .bind(window.end)
        .fetch_all(pool)
        .await?;

    let mut buckets = HashMap::with_capacity(rows.len());
    for row in rows {
        let key: Option<String> = row.try_get("bucket")?;
        if let Some(key) = key {
            buckets.insert(
                key,
                Counts {
                    requested: row.try_get("requested")?,
                    provided: row.try_get("provided")?,
                },
            );
        }
    }
    Ok(buckets)
}

fn sum_expression(column: fn(ServiceCategory) -> String) -> String {
    ServiceCategory::ALL
        .into_iter()
        .map(column)
        .collect::<Vec<_>>()
        .join(" + ")
}

/// Services with any activity, busiest first.
pub fn build_services(totals: &ServiceCounters) -> Vec<ServiceImpact> {
    let mut services: Vec<ServiceImpact> = ServiceCategory::ALL
        .into_iter()
        .map(|category| (category, totals.get(category)))
        .filter(|(_, counts)| counts.is_active())
        .map(|(category, counts)| {
            let rate = completion_rate(counts.requested, counts.provided);
            ServiceImpact {
                name: category.to_string(),
                requested: counts.requested,
                provided: counts.provided,
                gap: counts.gap(),
                completion_rate: rate,
                impact: Impact::from_rate(rate),
            }
        })
        .collect();
    services.sort_by(|a, b| b.requested.cmp(&a.requested));
    services
}

pub fn build_summary(services: &[ServiceImpact]) -> ImpactSummary {
    let rated: Vec<f64> = services
        .iter()
        .filter(|service| service.requested > 0)
        .map(|service| service.completion_rate)
        .collect();
    let overall = if rated.is_empty() {
        0.0
    } else {
        round1(rated.iter().sum::<f64>() / rated.len() as f64)
    };

    ImpactSummary {
        total_requested: services.iter().map(|service| service.requested).sum(),
        total_provided: services.iter().map(|service| service.provided).sum(),
        total_gap: services.iter().map(|service| service.gap).sum(),
        overall_completion_rate: overall,
    }
}

pub fn build_trends(
    granularity: Granularity,
    buckets: &[NaiveDateTime],
    rows: &HashMap<String, Counts>,
) -> Vec<TrendPoint> {
    buckets
        .iter()
        .map(|&start| {
            let key = start.format(granularity.key_format()).to_string();
            let counts = rows.get(&key).copied().unwrap_or_default();
            TrendPoint {
                label: start.format(granularity.label_format()).to_string(),
                bucket_start: start,
                requested: counts.requested,
                provided: counts.provided,
                completion_rate: completion_rate(counts.requested, counts.provided),
            }
        })
        .collect()
}

fn parse_date(field: &str, value: Option<&str>) -> Result<Option<NaiveDate>, AppError> {
    value
        .map(|raw| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| AppError::invalid_field(field, raw, "Date must be in YYYY-MM-DD format"))
        })
        .transpose()
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    NaiveDateTime::new(date, NaiveTime::MIN)
}

fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn shift_months(date: NaiveDate, months: i32) -> NaiveDate {
    let shifted = if months >= 0 {
        date.checked_add_months(Months::new(months as u32))
    } else {
        date.checked_sub_months(Months::new(months.unsigned_abs()))
    };
    shifted.unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::models::contact::{insert_contact, NewContact};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(date: NaiveDate, hour: u32) -> NaiveDateTime {
        date.and_hms_opt(hour, 0, 0).unwrap()
    }

    #[test]
    fn unknown_period_falls_back_to_this_month() {
        assert_eq!(Period::parse(Some("Fortnight")), Period::ThisMonth);
        assert_eq!(Period::parse(None), Period::ThisMonth);
        assert_eq!(Period::parse(Some("Last 3 Months")), Period::Last3Months);
        assert_eq!(Period::parse(Some("Custom Date Range")), Period::CustomDateRange);
    }

    #[test]
    fn windows_follow_calendar() {
        // Wednesday
        let today = day(2026, 3, 18);

        let week = Period::ThisWeek.window(today, None, None).unwrap();
        assert_eq!(week.start, midnight(day(2026, 3, 16)));
        assert_eq!(week.end, midnight(day(2026, 3, 23)));

        let last_month = Period::LastMonth.window(today, None, None).unwrap();
        assert_eq!(last_month.start, midnight(day(2026, 2, 1)));
        assert_eq!(last_month.end, midnight(day(2026, 3, 1)));

        let quarter = Period::Last3Months.window(today, None, None).unwrap();
        assert_eq!(quarter.start, midnight(day(2026, 1, 1)));
        assert_eq!(quarter.end, midnight(day(2026, 4, 1)));

        let yesterday = Period::Yesterday.window(today, None, None).unwrap();
        assert_eq!(yesterday.start, midnight(day(2026, 3, 17)));
    }

    #[test]
    fn date_driven_periods_fall_back() {
        let today = day(2026, 3, 18);

        let specific = Period::SpecificDate.window(today, None, None).unwrap();
        assert_eq!(specific, Period::Today.window(today, None, None).unwrap());

        let custom = Period::CustomDateRange.window(today, Some(day(2026, 1, 2)), None).unwrap();
        assert_eq!(custom, Period::ThisMonth.window(today, None, None).unwrap());

        let explicit = Period::CustomDateRange
            .window(today, Some(day(2026, 1, 2)), Some(day(2026, 1, 4)))
            .unwrap();
        assert_eq!(explicit.start, midnight(day(2026, 1, 2)));
        assert_eq!(explicit.end, midnight(day(2026, 1, 5)));

        let reversed = Period::CustomDateRange.window(today, Some(day(2026, 1, 4)), Some(day(2026, 1, 2)));
        assert!(reversed.is_err());
    }

    #[test]
    fn bucket_counts_match_granularity() {
        let today = day(2026, 3, 18);
        for (period, expected) in [
            (Period::Today, 24),
            (Period::LastWeek, 7),
            (Period::Last3Months, 3),
            (Period::ThisYear, 6),
            (Period::ThisMonth, 6),
        ] {
            let window = period.window(today, None, None).unwrap();
            assert_eq!(period.granularity().buckets(&window).len(), expected, "{period}");
        }

        let window = Period::ThisYear.window(today, None, None).unwrap();
        let buckets = Granularity::Monthly(6).buckets(&window);
        assert_eq!(buckets.last().copied(), Some(midnight(day(2026, 12, 1))));
    }

    #[test]
    fn food_ten_requested_five_provided() {
        let mut totals = ServiceCounters::default();
        totals.add(ServiceCategory::Food, Counts { requested: 10, provided: 5 });
        let services = build_services(&totals);

        assert_eq!(
            services,
            vec![ServiceImpact {
                name: "Food".to_string(),
                requested: 10,
                provided: 5,
                gap: 5,
                completion_rate: 50.0,
                impact: Impact::Low,
            }]
        );
    }

    #[test]
    fn services_sorted_by_demand_and_idle_ones_dropped() {
        let mut totals = ServiceCounters::default();
        totals.add(ServiceCategory::Legal, Counts { requested: 2, provided: 2 });
        totals.add(ServiceCategory::Housing, Counts { requested: 9, provided: 6 });
        totals.add(ServiceCategory::Education, Counts { requested: 0, provided: 3 });
        totals.add(ServiceCategory::Benefits, Counts::default());

        let services = build_services(&totals);
        let names: Vec<&str> = services.iter().map(|service| service.name.as_str()).collect();
        assert_eq!(names, vec!["Housing", "Legal", "Education"]);

        let summary = build_summary(&services);
        assert_eq!(summary.total_requested, 11);
        assert_eq!(summary.total_provided, 11);
        assert_eq!(summary.total_gap, 0);
        // (66.7 + 100) / 2; Education has no requests and is left out.
        assert_eq!(summary.overall_completion_rate, 83.4);
    }

    #[test]
    fn empty_summary_is_zero() {
        let summary = build_summary(&[]);
        assert_eq!(summary.total_requested, 0);
        assert_eq!(summary.overall_completion_rate, 0.0);
    }

    #[tokio::test]
    async fn today_without_contacts_is_empty() {
        let pool = test_pool().await;
        let query = ImpactQuery {
            period: Some("Today".to_string()),
            ..ImpactQuery::default()
        };

        let impact = services_impact_at(&pool, &query, at(day(2026, 3, 18), 12)).await.unwrap();
        assert!(impact.services.is_empty());
        assert_eq!(impact.summary.total_requested, 0);
        assert_eq!(impact.summary.overall_completion_rate, 0.0);
        assert_eq!(impact.period, "Today");
        assert_eq!(impact.trends.len(), 24);
    }

    #[tokio::test]
    async fn aggregates_contacts_inside_the_window() {
        let pool = test_pool().await;
        let today = day(2026, 3, 18);

        let mut counters = ServiceCounters::default();
        counters.add(ServiceCategory::Food, Counts { requested: 10, provided: 5 });
        insert_contact(&pool, &NewContact::visit(at(today, 9), "Alex Rivera", "Dana", counters))
            .await
            .unwrap();

        let mut outside = ServiceCounters::default();
        outside.add(ServiceCategory::Food, Counts { requested: 4, provided: 4 });
        insert_contact(&pool, &NewContact::visit(at(day(2026, 3, 17), 9), "Alex Rivera", "Dana", outside))
            .await
            .unwrap();

        let query = ImpactQuery {
            period: Some("Today".to_string()),
            ..ImpactQuery::default()
        };
        let impact = services_impact_at(&pool, &query, at(today, 15)).await.unwrap();

        assert_eq!(impact.services.len(), 1);
        let food = &impact.services[0];
        assert_eq!((food.requested, food.provided, food.gap), (10, 5, 5));
        assert_eq!(food.completion_rate, 50.0);
        assert_eq!(food.impact, Impact::Low);

        let nine = impact.trends.iter().find(|point| point.label == "09:00").unwrap();
        assert_eq!((nine.requested, nine.provided), (10, 5));
        assert_eq!(impact.trends.iter().map(|point| point.requested).sum::<i64>(), 10);

        let week = ImpactQuery {
            period: Some("This Week".to_string()),
            ..ImpactQuery::default()
        };
        let impact = services_impact_at(&pool, &week, at(today, 15)).await.unwrap();
        assert_eq!(impact.summary.total_requested, 14);
        assert_eq!(impact.trends.len(), 7);
    }

    #[tokio::test]
    async fn malformed_dates_are_rejected() {
        let pool = test_pool().await;
        let query = ImpactQuery {
            period: Some("Specific Date".to_string()),
            start_date: Some("03/18/2026".to_string()),
            ..ImpactQuery::default()
        };
        let err = services_impact_at(&pool, &query, at(day(2026, 3, 18), 8)).await.unwrap_err();
        assert_eq!(err.code, "VALIDATION_ERROR");
    }
    fn single(category: ServiceCategory, requested: i64, provided: i64) -> ServiceCounters {
        let mut counters = ServiceCounters::default();
        counters.add(category, Counts { requested, provided });
        counters
    }

    #[tokio::test]
    async fn last_three_months_buckets_by_month() {
        let pool = test_pool().await;
        let today = day(2026, 3, 18);
        for (when, requested, provided) in [
            (at(day(2025, 12, 30), 10), 7, 7),
            (at(day(2026, 2, 10), 9), 3, 2),
            (at(day(2026, 2, 27), 14), 1, 1),
            (at(day(2026, 3, 2), 11), 2, 0),
        ] {
            let counters = single(ServiceCategory::Food, requested, provided);
            insert_contact(&pool, &NewContact::visit(when, "Alex Rivera", "Dana", counters))
                .await
                .unwrap();
        }

        let query = ImpactQuery {
            period: Some("Last 3 Months".to_string()),
            ..ImpactQuery::default()
        };
        let impact = services_impact_at(&pool, &query, at(today, 12)).await.unwrap();

        let labels: Vec<&str> = impact.trends.iter().map(|point| point.label.as_str()).collect();
        assert_eq!(labels, vec!["Jan 2026", "Feb 2026", "Mar 2026"]);
        let counts: Vec<(i64, i64)> = impact
            .trends
            .iter()
            .map(|point| (point.requested, point.provided))
            .collect();
        assert_eq!(counts, vec![(0, 0), (4, 3), (2, 0)]);
        assert_eq!(impact.trends[1].completion_rate, 75.0);

        assert_eq!(impact.summary.total_requested, 6);
        assert_eq!(impact.summary.total_provided, 3);
    }

    #[tokio::test]
    async fn custom_range_covers_both_end_days() {
        let pool = test_pool().await;
        for (when, category) in [
            (at(day(2026, 1, 1), 23), ServiceCategory::Food),
            (at(day(2026, 1, 2), 0), ServiceCategory::Housing),
            (at(day(2026, 1, 4), 23), ServiceCategory::Legal),
            (at(day(2026, 1, 5), 0), ServiceCategory::Food),
        ] {
            insert_contact(&pool, &NewContact::visit(when, "Bea Moss", "Dana", single(category, 1, 1)))
                .await
                .unwrap();
        }

        let query = ImpactQuery {
            period: Some("Custom Date Range".to_string()),
            start_date: Some("2026-01-02".to_string()),
            end_date: Some("2026-01-04".to_string()),
            ..ImpactQuery::default()
        };
        let impact = services_impact_at(&pool, &query, at(day(2026, 3, 18), 12)).await.unwrap();

        assert_eq!(impact.period, "Custom Date Range");
        assert_eq!(impact.window.start, midnight(day(2026, 1, 2)));
        assert_eq!(impact.window.end, midnight(day(2026, 1, 5)));

        let mut names: Vec<&str> = impact.services.iter().map(|service| service.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["Housing", "Legal"]);
        assert_eq!(impact.summary.total_requested, 2);
        assert_eq!(impact.trends.last().map(|point| point.label.as_str()), Some("Jan 2026"));
    }

    #[tokio::test]
    async fn last_calendar_day_is_out_of_range() {
        let pool = test_pool().await;
        let now = at(day(2026, 3, 18), 8);

        let specific = ImpactQuery {
            period: Some("Specific Date".to_string()),
            start_date: Some("+262142-12-31".to_string()),
            ..ImpactQuery::default()
        };
        let err = services_impact_at(&pool, &specific, now).await.unwrap_err();
        assert_eq!(err.code, "VALIDATION_ERROR");
        assert_eq!(err.message, "Date out of range");

        let custom = ImpactQuery {
            period: Some("Custom Date Range".to_string()),
            start_date: Some("2026-01-01".to_string()),
            end_date: Some("+262142-12-31".to_string()),
            ..ImpactQuery::default()
        };
        let err = services_impact_at(&pool, &custom, now).await.unwrap_err();
        assert_eq!(err.details.unwrap()["field"], "endDate");
    }
}
