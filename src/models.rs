use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::enrichment::{FieldSuggestion, PriorityTier};
use crate::queue::{QueueEntry, QueueStats};

/// Source assigned to contacts created through the API.
pub const DEFAULT_SOURCE: &str = "manual";

/// Source assigned to contacts created by an import without an explicit source.
pub const IMPORT_SOURCE: &str = "import";

// ============ Database Models ============

/// A contact owned by exactly one user account.
#[derive(Debug, Clone, Default, PartialEq, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Contact {
    /// Unique identifier for the contact.
    pub id: Uuid,
    /// Owning user account.
    pub user_id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub primary_email: Option<String>,
    pub secondary_email: Option<String>,
    pub primary_phone: Option<String>,
    pub secondary_phone: Option<String>,
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    /// Professional network profile URL.
    pub linkedin_url: Option<String>,
    /// How the user met this contact.
    pub how_we_met: Option<String>,
    /// Why this contact matters right now.
    pub why_now: Option<String>,
    pub notes: Option<String>,
    pub expertise: Option<String>,
    pub interests: Option<String>,
    /// Where the record came from (e.g. "manual", "import").
    pub source: String,
    /// Persisted completeness score, 0-100.
    pub enrichment_score: i32,
    /// Last time the contact was enriched. `None` means never.
    pub last_enriched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contact {
    /// Persisted score narrowed to the 0-100 range.
    pub fn score(&self) -> u8 {
        // clamp first, the cast cannot truncate afterwards
        self.enrichment_score.clamp(0, 100) as u8
    }

    /// Human-readable name, falling back to the primary email.
    pub fn display_name(&self) -> String {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        if name.is_empty() {
            self.primary_email.clone().unwrap_or_default()
        } else {
            name
        }
    }
}

/// Category a tag belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TagCategory {
    Relationship,
    Opportunity,
    Expertise,
    Interest,
}

impl TagCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagCategory::Relationship => "relationship",
            TagCategory::Opportunity => "opportunity",
            TagCategory::Expertise => "expertise",
            TagCategory::Interest => "interest",
        }
    }
}

impl fmt::Display for TagCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TagCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "relationship" => Ok(TagCategory::Relationship),
            "opportunity" => Ok(TagCategory::Opportunity),
            "expertise" => Ok(TagCategory::Expertise),
            "interest" => Ok(TagCategory::Interest),
            other => Err(format!("Unknown tag category: {}", other)),
        }
    }
}

/// Raw tag row as stored in `contact_tags`.
#[derive(Debug, Clone, FromRow)]
pub struct TagRow {
    pub id: Uuid,
    pub contact_id: Uuid,
    pub category: String,
    pub value: String,
}

/// A categorized label attached to a contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Tag {
    pub id: Uuid,
    pub contact_id: Uuid,
    pub category: TagCategory,
    pub value: String,
}

impl TryFrom<TagRow> for Tag {
    type Error = String;

    fn try_from(row: TagRow) -> Result<Self, Self::Error> {
        Ok(Tag {
            id: row.id,
            contact_id: row.contact_id,
            category: row.category.parse()?,
            value: row.value,
        })
    }
}

// ============ API Request/Response Models ============

/// Tag as supplied by clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct TagInput {
    pub category: TagCategory,
    pub value: String,
}

/// Contact fields accepted on create, update, enrich and import.
///
/// Every field is optional; on update `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ContactFields {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub primary_email: Option<String>,
    pub secondary_email: Option<String>,
    pub primary_phone: Option<String>,
    pub secondary_phone: Option<String>,
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub linkedin_url: Option<String>,
    pub how_we_met: Option<String>,
    pub why_now: Option<String>,
    pub notes: Option<String>,
    pub expertise: Option<String>,
    pub interests: Option<String>,
}

impl ContactFields {
    /// Overwrite every field of `contact` for which `self` carries a value.
    /// A blank value clears the field.
    pub fn apply_to(&self, contact: &mut Contact) {
        macro_rules! overwrite {
            ($($field:ident),*) => {
                $(if let Some(value) = &self.$field {
                    contact.$field = if value.trim().is_empty() {
                        None
                    } else {
                        Some(value.clone())
                    };
                })*
            };
        }
        overwrite!(
            first_name,
            last_name,
            primary_email,
            secondary_email,
            primary_phone,
            secondary_phone,
            title,
            company,
            location,
            linkedin_url,
            how_we_met,
            why_now,
            notes,
            expertise,
            interests
        );
    }
}

/// Request payload for creating a contact.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CreateContactRequest {
    #[serde(flatten)]
    pub fields: ContactFields,
    pub source: Option<String>,
    #[serde(default)]
    pub tags: Vec<TagInput>,
}

/// Request payload for replacing a contact's tags.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ReplaceTagsRequest {
    pub tags: Vec<TagInput>,
}

/// One record in an import batch.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ImportRecord {
    #[serde(flatten)]
    pub fields: ContactFields,
    pub source: Option<String>,
    #[serde(default)]
    pub tags: Vec<TagInput>,
}

/// Request payload for a batch import.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ImportRequest {
    pub contacts: Vec<ImportRecord>,
}

/// Outcome of a batch import.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct ImportResponse {
    pub created: usize,
    pub merged: usize,
    pub skipped: usize,
    /// One message per skipped record.
    pub errors: Vec<String>,
}

/// Contact plus everything the detail view needs.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ContactDetail {
    pub contact: Contact,
    pub tags: Vec<Tag>,
    pub priority: u8,
    pub tier: PriorityTier,
    pub reason: String,
    pub suggestions: Vec<FieldSuggestion>,
}

/// Query parameters for the enrichment queue.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct QueueQueryParams {
    /// Priority tier filter: high, medium or low.
    pub priority: Option<String>,
    /// Contact source filter.
    pub source: Option<String>,
    /// Page size.
    pub limit: Option<usize>,
}

/// Response payload for the enrichment queue.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QueueResponse {
    pub items: Vec<QueueEntry>,
    pub stats: QueueStats,
}
