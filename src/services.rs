//! Service categories tracked per contact, and the derived completion
//! metrics used by analytics and the client record.

use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row};
use std::collections::BTreeMap;
use strum_macros::{Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumString,
)]
pub enum ServiceCategory {
    #[strum(serialize = "Food")]
    #[serde(rename = "Food")]
    Food,
    #[strum(serialize = "Housing")]
    #[serde(rename = "Housing")]
    Housing,
    #[strum(serialize = "Healthcare")]
    #[serde(rename = "Healthcare")]
    Healthcare,
    #[strum(serialize = "Case Management")]
    #[serde(rename = "Case Management")]
    CaseManagement,
    #[strum(serialize = "Benefits")]
    #[serde(rename = "Benefits")]
    Benefits,
    #[strum(serialize = "Employment")]
    #[serde(rename = "Employment")]
    Employment,
    #[strum(serialize = "Legal")]
    #[serde(rename = "Legal")]
    Legal,
    #[strum(serialize = "Transportation")]
    #[serde(rename = "Transportation")]
    Transportation,
    #[strum(serialize = "Mental Health")]
    #[serde(rename = "Mental Health")]
    MentalHealth,
    #[strum(serialize = "Education")]
    #[serde(rename = "Education")]
    Education,
    #[strum(to_string = "Occupational Therapy", serialize = "Occupational")]
    #[serde(rename = "Occupational Therapy", alias = "Occupational")]
    OccupationalTherapy,
}

impl ServiceCategory {
    pub const ALL: [ServiceCategory; 11] = [
        ServiceCategory::Food,
        ServiceCategory::Housing,
        ServiceCategory::Healthcare,
        ServiceCategory::CaseManagement,
        ServiceCategory::Benefits,
        ServiceCategory::Employment,
        ServiceCategory::Legal,
        ServiceCategory::Transportation,
        ServiceCategory::MentalHealth,
        ServiceCategory::Education,
        ServiceCategory::OccupationalTherapy,
    ];

    /// Stem of the `<stem>_requested` / `<stem>_provided` columns and the
    /// key used by the contact-log service filter.
    pub fn key(self) -> &'static str {
        match self {
            ServiceCategory::Food => "food",
            ServiceCategory::Housing => "housing",
            ServiceCategory::Healthcare => "healthcare",
            ServiceCategory::CaseManagement => "case_management",
            ServiceCategory::Benefits => "benefits",
            ServiceCategory::Employment => "employment",
            ServiceCategory::Legal => "legal",
            ServiceCategory::Transportation => "transportation",
            ServiceCategory::MentalHealth => "mental_health",
            ServiceCategory::Education => "education",
            ServiceCategory::OccupationalTherapy => "occupational_therapy",
        }
    }

    pub fn requested_column(self) -> String {
        format!("{}_requested", self.key())
    }

    pub fn provided_column(self) -> String {
        format!("{}_provided", self.key())
    }

    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.trim().to_ascii_lowercase();
        match key.as_str() {
            "cm" => Some(ServiceCategory::CaseManagement),
            "ot" => Some(ServiceCategory::OccupationalTherapy),
            _ => Self::ALL.into_iter().find(|category| category.key() == key),
        }
    }

    /// Accepts display labels ("Mental Health") as well as filter keys.
    pub fn from_label(label: &str) -> Option<Self> {
        label
            .trim()
            .parse::<ServiceCategory>()
            .ok()
            .or_else(|| Self::from_key(label))
    }
}

/// A service marked as delivered during a visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvidedService {
    pub service: String,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    pub requested: i64,
    pub provided: i64,
}

impl Counts {
    pub fn gap(&self) -> i64 {
        self.requested - self.provided
    }

    pub fn is_active(&self) -> bool {
        self.requested > 0 || self.provided > 0
    }
}

/// Requested/provided counters for every category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServiceCounters(pub BTreeMap<ServiceCategory, Counts>);

impl ServiceCounters {
    pub fn from_lists(requested: &[String], provided: &[ProvidedService]) -> Self {
        let mut counters = Self::default();
        for category in requested.iter().filter_map(|label| ServiceCategory::from_label(label)) {
            counters.entry(category).requested = 1;
        }
        for category in provided
            .iter()
            .filter_map(|service| ServiceCategory::from_label(&service.service))
        {
            counters.entry(category).provided = 1;
        }
        counters
    }

    /// Reads the `<stem>_requested` / `<stem>_provided` columns of a row,
    /// keeping only categories with activity.
    pub fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let mut counters = Self::default();
        for category in ServiceCategory::ALL {
            let counts = Counts {
                requested: row.try_get(category.requested_column().as_str())?,
                provided: row.try_get(category.provided_column().as_str())?,
            };
            if counts.is_active() {
                counters.add(category, counts);
            }
        }
        Ok(counters)
    }

    pub fn get(&self, category: ServiceCategory) -> Counts {
        self.0.get(&category).copied().unwrap_or_default()
    }

    pub fn entry(&mut self, category: ServiceCategory) -> &mut Counts {
        self.0.entry(category).or_default()
    }

    pub fn add(&mut self, category: ServiceCategory, counts: Counts) {
        let entry = self.entry(category);
        entry.requested = entry.requested.saturating_add(counts.requested);
        entry.provided = entry.provided.saturating_add(counts.provided);
    }

    pub fn total(&self) -> Counts {
        self.0.values().fold(Counts::default(), |acc, counts| Counts {
            requested: acc.requested + counts.requested,
            provided: acc.provided + counts.provided,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Impact {
    High,
    Medium,
    Low,
}

impl Impact {
    pub fn from_rate(rate: f64) -> Self {
        if rate >= 80.0 {
            Impact::High
        } else if rate >= 60.0 {
            Impact::Medium
        } else {
            Impact::Low
        }
    }
}

/// Select list summing every counter column under its own name.
pub fn sum_columns() -> String {
    ServiceCategory::ALL
        .iter()
        .flat_map(|category| [category.requested_column(), category.provided_column()])
        .map(|column| format!("COALESCE(SUM({column}), 0) AS {column}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// provided / requested as a percentage rounded to one decimal; 0 when
/// nothing was requested.
pub fn completion_rate(requested: i64, provided: i64) -> f64 {
    if requested <= 0 {
        return 0.0;
    }
    round1(provided as f64 / requested as f64 * 100.0)
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
