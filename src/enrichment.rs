/// Enrichment scoring for contacts
///
/// This module provides the pure calculations behind the enrichment queue:
/// 1. Completeness score from populated fields and tag count
/// 2. Priority from score deficit, staleness and recency
/// 3. Human-readable reason for the priority
/// 4. Highest-value missing fields to suggest
///
/// Every function here is total and side-effect free. `now` is always passed
/// in so callers control the clock.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::models::Contact;

/// Milliseconds in one day; day counts are floor(elapsed ms / DAY_MS).
const DAY_MS: i64 = 86_400_000;

/// Upper bound for both the completeness score and the priority.
pub const MAX_SCORE: u8 = 100;

/// Points granted when the contact has at least one tag.
pub const TAG_POINTS: u8 = 5;

/// Maximum number of entries returned by [`suggest_missing_fields`].
pub const MAX_SUGGESTIONS: usize = 3;

/// Contact fields that take part in scoring, reasons or suggestions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ContactField {
    FirstName,
    LastName,
    PrimaryEmail,
    SecondaryEmail,
    PrimaryPhone,
    SecondaryPhone,
    Title,
    Company,
    Location,
    LinkedinUrl,
    HowWeMet,
    WhyNow,
    Notes,
    Expertise,
    Interests,
}

impl ContactField {
    /// Borrow the value of this field from a contact.
    pub fn value<'a>(&self, contact: &'a Contact) -> Option<&'a str> {
        let value = match self {
            ContactField::FirstName => &contact.first_name,
            ContactField::LastName => &contact.last_name,
            ContactField::PrimaryEmail => &contact.primary_email,
            ContactField::SecondaryEmail => &contact.secondary_email,
            ContactField::PrimaryPhone => &contact.primary_phone,
            ContactField::SecondaryPhone => &contact.secondary_phone,
            ContactField::Title => &contact.title,
            ContactField::Company => &contact.company,
            ContactField::Location => &contact.location,
            ContactField::LinkedinUrl => &contact.linkedin_url,
            ContactField::HowWeMet => &contact.how_we_met,
            ContactField::WhyNow => &contact.why_now,
            ContactField::Notes => &contact.notes,
            ContactField::Expertise => &contact.expertise,
            ContactField::Interests => &contact.interests,
        };
        value.as_deref()
    }

    /// A field counts as present when it holds non-blank text.
    pub fn is_present(&self, contact: &Contact) -> bool {
        self.value(contact).is_some_and(|v| !v.trim().is_empty())
    }
}

/// Points each populated field contributes to the completeness score.
///
/// Relative order matters: why now > how we met > title/company > email >
/// location/link/notes > phone > name.
pub const SCORE_WEIGHTS: [(ContactField, u8); 13] = [
    (ContactField::FirstName, 7),
    (ContactField::LastName, 3),
    (ContactField::PrimaryEmail, 8),
    (ContactField::SecondaryEmail, 2),
    (ContactField::PrimaryPhone, 4),
    (ContactField::SecondaryPhone, 1),
    (ContactField::Title, 10),
    (ContactField::Company, 10),
    (ContactField::Location, 5),
    (ContactField::LinkedinUrl, 5),
    (ContactField::HowWeMet, 15),
    (ContactField::WhyNow, 20),
    (ContactField::Notes, 5),
];

/// Fields checked by [`explain_reason`], in the order they are reported.
const REASON_FIELDS: [(ContactField, &str); 4] = [
    (ContactField::WhyNow, "why now"),
    (ContactField::HowWeMet, "how we met"),
    (ContactField::Notes, "notes"),
    (ContactField::Expertise, "expertise"),
];

/// Candidates for [`suggest_missing_fields`]. Kept separate from
/// [`SCORE_WEIGHTS`]; equal points keep this order.
const SUGGESTION_CANDIDATES: [(ContactField, &str, u8); 11] = [
    (ContactField::WhyNow, "Why now", 20),
    (ContactField::HowWeMet, "How we met", 15),
    (ContactField::Title, "Title", 10),
    (ContactField::Company, "Company", 10),
    (ContactField::PrimaryEmail, "Email", 8),
    (ContactField::FirstName, "First name", 7),
    (ContactField::Location, "Location", 5),
    (ContactField::LinkedinUrl, "LinkedIn", 5),
    (ContactField::Notes, "Notes", 5),
    (ContactField::PrimaryPhone, "Phone", 4),
    (ContactField::LastName, "Last name", 3),
];

/// Compute the 0-100 completeness score of a contact.
pub fn compute_score(contact: &Contact, tag_count: usize) -> u8 {
    let fields: u32 = SCORE_WEIGHTS
        .iter()
        .filter(|(field, _)| field.is_present(contact))
        .map(|(_, points)| u32::from(*points))
        .sum();
    let tags = if tag_count > 0 {
        u32::from(TAG_POINTS)
    } else {
        0
    };

    (fields + tags).min(u32::from(MAX_SCORE)) as u8
}

/// Time since the last enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    /// The contact has never been enriched.
    Never,
    /// Whole days since the last enrichment.
    Days(i64),
}

impl Staleness {
    /// Staleness sub-score of the priority.
    pub fn points(&self) -> u8 {
        match *self {
            Staleness::Never => 30,
            Staleness::Days(d) if d > 90 => 25,
            Staleness::Days(d) if d > 30 => 15,
            Staleness::Days(d) if d > 7 => 5,
            Staleness::Days(_) => 0,
        }
    }
}

/// Whole days elapsed between `since` and `now`, flooring toward negative infinity.
pub fn days_between(since: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - since).num_milliseconds().div_euclid(DAY_MS)
}

pub fn staleness(last_enriched_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Staleness {
    match last_enriched_at {
        Some(at) => Staleness::Days(days_between(at, now)),
        None => Staleness::Never,
    }
}

/// Score deficit sub-score: round((100 - score) / 2), halves rounding up.
fn deficit_points(score: u8) -> u8 {
    let missing = MAX_SCORE - score.min(MAX_SCORE);
    (missing + 1) / 2
}

/// Recency sub-score from the contact's age in whole days.
fn recency_points(age_days: i64) -> u8 {
    match age_days {
        d if d <= 1 => 20,
        d if d <= 7 => 10,
        _ => 0,
    }
}

/// Compute the 0-100 enrichment priority.
///
/// `score` is expected to come from [`compute_score`]; values above 100 are
/// treated as 100.
pub fn compute_priority(
    score: u8,
    last_enriched_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> u8 {
    let total = deficit_points(score)
        + staleness(last_enriched_at, now).points()
        + recency_points(days_between(created_at, now));

    total.min(MAX_SCORE)
}

/// Coarse priority bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PriorityTier {
    High,
    Medium,
    Low,
}

impl PriorityTier {
    pub fn from_priority(priority: u8) -> Self {
        match priority {
            p if p >= 60 => PriorityTier::High,
            p if p >= 30 => PriorityTier::Medium,
            _ => PriorityTier::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityTier::High => "high",
            PriorityTier::Medium => "medium",
            PriorityTier::Low => "low",
        }
    }
}

impl fmt::Display for PriorityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriorityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(PriorityTier::High),
            "medium" => Ok(PriorityTier::Medium),
            "low" => Ok(PriorityTier::Low),
            other => Err(format!(
                "Invalid priority '{}': expected high, medium or low",
                other
            )),
        }
    }
}

/// Explain why a contact is in the enrichment queue.
///
/// Display text only; the wording is not meant to be parsed.
pub fn explain_reason(contact: &Contact, now: DateTime<Utc>) -> String {
    let missing: Vec<&str> = REASON_FIELDS
        .iter()
        .filter(|(field, _)| !field.is_present(contact))
        .map(|(_, label)| *label)
        .take(2)
        .collect();

    match staleness(contact.last_enriched_at, now) {
        Staleness::Never if !missing.is_empty() => {
            format!("Never enriched — missing {}", missing.join(", "))
        }
        Staleness::Never => "Never enriched — add context".to_string(),
        Staleness::Days(days) if days > 30 => {
            format!("Last enriched {} days ago — refresh context", days)
        }
        Staleness::Days(_) if !missing.is_empty() => {
            format!("Missing {}", missing.join(" and "))
        }
        Staleness::Days(_) => "Could use more context".to_string(),
    }
}

/// A missing field worth asking the user about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FieldSuggestion {
    pub field: ContactField,
    pub label: String,
    pub points: u8,
}

/// Up to three absent fields, most valuable first.
pub fn suggest_missing_fields(contact: &Contact) -> Vec<FieldSuggestion> {
    let mut suggestions: Vec<FieldSuggestion> = SUGGESTION_CANDIDATES
        .iter()
        .filter(|(field, _, _)| !field.is_present(contact))
        .map(|(field, label, points)| FieldSuggestion {
            field: *field,
            label: (*label).to_string(),
            points: *points,
        })
        .collect();

    // sort_by is stable, ties keep candidate order
    suggestions.sort_by(|a, b| b.points.cmp(&a.points));
    suggestions.truncate(MAX_SUGGESTIONS);
    suggestions
}
