/// Property-based tests using proptest
/// Tests invariants of the scoring, priority, suggestion and queue functions
use better_contacts::enrichment::{
    compute_priority, compute_score, explain_reason, staleness, suggest_missing_fields,
    ContactField, PriorityTier, Staleness, MAX_SUGGESTIONS, SCORE_WEIGHTS, TAG_POINTS,
};
use better_contacts::models::Contact;
use better_contacts::queue::{build_queue, QueueFilter};
use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

const FIELDS: [ContactField; 13] = [
    ContactField::FirstName,
    ContactField::LastName,
    ContactField::PrimaryEmail,
    ContactField::SecondaryEmail,
    ContactField::PrimaryPhone,
    ContactField::SecondaryPhone,
    ContactField::Title,
    ContactField::Company,
    ContactField::Location,
    ContactField::LinkedinUrl,
    ContactField::HowWeMet,
    ContactField::WhyNow,
    ContactField::Notes,
];

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

fn slot(contact: &mut Contact, field: ContactField) -> &mut Option<String> {
    match field {
        ContactField::FirstName => &mut contact.first_name,
        ContactField::LastName => &mut contact.last_name,
        ContactField::PrimaryEmail => &mut contact.primary_email,
        ContactField::SecondaryEmail => &mut contact.secondary_email,
        ContactField::PrimaryPhone => &mut contact.primary_phone,
        ContactField::SecondaryPhone => &mut contact.secondary_phone,
        ContactField::Title => &mut contact.title,
        ContactField::Company => &mut contact.company,
        ContactField::Location => &mut contact.location,
        ContactField::LinkedinUrl => &mut contact.linkedin_url,
        ContactField::HowWeMet => &mut contact.how_we_met,
        ContactField::WhyNow => &mut contact.why_now,
        ContactField::Notes => &mut contact.notes,
        ContactField::Expertise => &mut contact.expertise,
        ContactField::Interests => &mut contact.interests,
    }
}

/// 0 = absent, 1 = whitespace only, 2 = populated
fn contact_from(states: &[u8]) -> Contact {
    let mut contact = Contact::default();
    for (field, state) in FIELDS.iter().zip(states) {
        *slot(&mut contact, *field) = match state {
            0 => None,
            1 => Some("   ".to_string()),
            _ => Some("value".to_string()),
        };
    }
    contact
}

fn field_states() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(0u8..3, FIELDS.len())
}

fn timestamp() -> impl Strategy<Value = DateTime<Utc>> {
    // roughly two years either side of now(), in minutes
    (-1_051_200i64..1_051_200i64).prop_map(|m| now() + Duration::minutes(m))
}

// Property: the completeness score is a capped sum of field weights
proptest! {
    #[test]
    fn score_matches_weight_sum(states in field_states(), tag_count in 0usize..10) {
        let contact = contact_from(&states);
        let expected: u32 = SCORE_WEIGHTS
            .iter()
            .filter(|(field, _)| field.is_present(&contact))
            .map(|(_, points)| u32::from(*points))
            .sum::<u32>()
            + if tag_count > 0 { u32::from(TAG_POINTS) } else { 0 };

        let score = compute_score(&contact, tag_count);
        prop_assert!(score <= 100);
        prop_assert_eq!(u32::from(score), expected.min(100));
    }

    #[test]
    fn filling_a_field_never_lowers_score(states in field_states(), idx in 0usize..13, tag_count in 0usize..3) {
        let before = contact_from(&states);
        let mut after = before.clone();
        *slot(&mut after, FIELDS[idx]) = Some("filled".to_string());

        prop_assert!(compute_score(&after, tag_count) >= compute_score(&before, tag_count));
    }

    #[test]
    fn blank_fields_score_like_absent_ones(states in field_states()) {
        let blanks_removed: Vec<u8> = states.iter().map(|s| if *s == 1 { 0 } else { *s }).collect();
        prop_assert_eq!(
            compute_score(&contact_from(&states), 0),
            compute_score(&contact_from(&blanks_removed), 0)
        );
    }
}

// Property: priority stays in range and orders as documented
proptest! {
    #[test]
    fn priority_is_bounded(
        score in 0u8..=255,
        enriched in proptest::option::of(timestamp()),
        created in timestamp()
    ) {
        let priority = compute_priority(score, enriched, created, now());
        prop_assert!(priority <= 100);
    }

    #[test]
    fn never_enriched_ranks_at_least_as_high(score in 0u8..=100, enriched in timestamp(), created in timestamp()) {
        prop_assert!(
            compute_priority(score, None, created, now())
                >= compute_priority(score, Some(enriched), created, now())
        );
    }

    #[test]
    fn lower_score_ranks_at_least_as_high(
        a in 0u8..=100,
        b in 0u8..=100,
        enriched in proptest::option::of(timestamp()),
        created in timestamp()
    ) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(
            compute_priority(low, enriched, created, now())
                >= compute_priority(high, enriched, created, now())
        );
    }

    #[test]
    fn tier_matches_thresholds(priority in 0u8..=100) {
        let tier = PriorityTier::from_priority(priority);
        let expected = if priority >= 60 {
            PriorityTier::High
        } else if priority >= 30 {
            PriorityTier::Medium
        } else {
            PriorityTier::Low
        };
        prop_assert_eq!(tier, expected);
    }

    #[test]
    fn never_enriched_staleness_is_thirty_points(_seed in 0u8..1) {
        prop_assert_eq!(staleness(None, now()), Staleness::Never);
        prop_assert_eq!(Staleness::Never.points(), 30);
    }
}

// Property: suggestions and reasons are well-formed for every contact
proptest! {
    #[test]
    fn suggestions_are_missing_and_ordered(states in field_states()) {
        let contact = contact_from(&states);
        let suggestions = suggest_missing_fields(&contact);

        prop_assert!(suggestions.len() <= MAX_SUGGESTIONS);
        for s in &suggestions {
            prop_assert!(!s.field.is_present(&contact));
        }
        for pair in suggestions.windows(2) {
            prop_assert!(pair[0].points >= pair[1].points);
        }
    }

    #[test]
    fn reason_is_never_empty(states in field_states(), enriched in proptest::option::of(timestamp())) {
        let mut contact = contact_from(&states);
        contact.last_enriched_at = enriched;
        prop_assert!(!explain_reason(&contact, now()).is_empty());
    }
}

// Property: the queue is ordered, bounded and excludes complete contacts
proptest! {
    #[test]
    fn queue_is_sorted_and_bounded(
        scores in prop::collection::vec(0i32..=100, 0..30),
        limit in 1usize..40
    ) {
        let contacts: Vec<Contact> = scores
            .iter()
            .map(|score| Contact {
                id: uuid::Uuid::new_v4(),
                enrichment_score: *score,
                created_at: now() - Duration::days(3),
                source: "manual".to_string(),
                ..Default::default()
            })
            .collect();

        let filter = QueueFilter { limit, ..Default::default() };
        let queue = build_queue(&contacts, &filter, now());

        prop_assert!(queue.len() <= limit);
        prop_assert!(queue.iter().all(|e| e.contact.enrichment_score < 100));
        for pair in queue.windows(2) {
            prop_assert!(pair[0].priority >= pair[1].priority);
        }

        let candidates = scores.iter().filter(|s| **s < 100).count();
        prop_assert_eq!(queue.len(), candidates.min(limit));
    }
}
