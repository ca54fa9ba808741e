//! Enrichment queue: annotate candidate contacts with priority, tier and
//! reason, then order them for presentation.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::enrichment::{compute_priority, explain_reason, PriorityTier, MAX_SCORE};
use crate::models::Contact;

/// Optional filters and page size applied by [`build_queue`].
#[derive(Debug, Clone, Default)]
pub struct QueueFilter<'a> {
    pub priority: Option<PriorityTier>,
    pub source: Option<&'a str>,
    pub limit: usize,
}

/// A contact annotated for the enrichment queue.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QueueEntry {
    pub contact: Contact,
    pub priority: u8,
    pub tier: PriorityTier,
    pub reason: String,
}

impl QueueEntry {
    pub fn new(contact: &Contact, now: DateTime<Utc>) -> Self {
        let priority = compute_priority(
            contact.score(),
            contact.last_enriched_at,
            contact.created_at,
            now,
        );

        Self {
            contact: contact.clone(),
            priority,
            tier: PriorityTier::from_priority(priority),
            reason: explain_reason(contact, now),
        }
    }
}

/// Tier counts over the queue candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct QueueStats {
    pub total: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

fn is_candidate(contact: &Contact, source: Option<&str>) -> bool {
    contact.score() < MAX_SCORE && source.map_or(true, |s| contact.source == s)
}

/// Build the ordered enrichment queue.
///
/// Keeps contacts scoring below 100 (and matching `source` when given), sorts
/// by descending priority, applies the tier filter, then truncates to
/// `limit`. Contacts with equal priority keep their input order.
pub fn build_queue(
    contacts: &[Contact],
    filter: &QueueFilter<'_>,
    now: DateTime<Utc>,
) -> Vec<QueueEntry> {
    let mut entries: Vec<QueueEntry> = contacts
        .iter()
        .filter(|c| is_candidate(c, filter.source))
        .map(|c| QueueEntry::new(c, now))
        .collect();

    entries.sort_by(|a, b| b.priority.cmp(&a.priority));

    if let Some(tier) = filter.priority {
        entries.retain(|e| e.tier == tier);
    }
    entries.truncate(filter.limit);

    tracing::debug!(
        candidates = contacts.len(),
        returned = entries.len(),
        "Built enrichment queue"
    );

    entries
}

/// Count candidates per tier, ignoring the tier filter and page size.
pub fn queue_stats(contacts: &[Contact], source: Option<&str>, now: DateTime<Utc>) -> QueueStats {
    contacts
        .iter()
        .filter(|c| is_candidate(c, source))
        .map(|c| {
            let priority =
                compute_priority(c.score(), c.last_enriched_at, c.created_at, now);
            PriorityTier::from_priority(priority)
        })
        .fold(QueueStats::default(), |mut stats, tier| {
            stats.total += 1;
            match tier {
                PriorityTier::High => stats.high += 1,
                PriorityTier::Medium => stats.medium += 1,
                PriorityTier::Low => stats.low += 1,
            }
            stats
        })
}
