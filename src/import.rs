//! Import-merge of incoming contact records.
//!
//! Records are matched to existing contacts by primary email. On a match the
//! stored values win: only absent fields are filled, and tags are unioned.

use crate::models::{Contact, ContactFields, Tag, TagInput};

/// Key used to match an import record against stored contacts.
pub fn match_key(fields: &ContactFields) -> Option<String> {
    fields
        .primary_email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(str::to_lowercase)
}

fn has_text(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

/// A record needs at least a name or an email to be imported.
pub fn is_importable(fields: &ContactFields) -> bool {
    has_text(&fields.first_name) || has_text(&fields.last_name) || has_text(&fields.primary_email)
}

/// Copy incoming values into fields that are absent on `existing`.
///
/// Returns the number of fields filled.
pub fn fill_missing(existing: &mut Contact, incoming: &ContactFields) -> usize {
    let mut filled = 0;

    macro_rules! fill {
        ($($field:ident),*) => {
            $(if !has_text(&existing.$field) && has_text(&incoming.$field) {
                existing.$field = incoming.$field.clone();
                filled += 1;
            })*
        };
    }
    fill!(
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

    filled
}

/// Incoming tags not already attached, compared case-insensitively per category.
pub fn new_tags(existing: &[Tag], incoming: &[TagInput]) -> Vec<TagInput> {
    incoming
        .iter()
        .filter(|tag| {
            !existing.iter().any(|e| {
                e.category == tag.category && e.value.to_lowercase() == tag.value.to_lowercase()
            })
        })
        .cloned()
        .collect()
}
