use std::env;
use uuid::Uuid;

use better_contacts::data::db::Database;
use better_contacts::data::db_storage::{ContactStorage, MergeOutcome};
use better_contacts::import::match_key;
use better_contacts::models::{ContactFields, TagCategory, TagInput};
use chrono::Utc;

async fn storage() -> anyhow::Result<ContactStorage> {
    Ok(ContactStorage::new(database().await?.pool))
}

async fn database() -> anyhow::Result<Database> {
    let db_url = env::var("TEST_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL or DATABASE_URL to run this test"))?;

    Database::new(&db_url)
        .await
        .map_err(|e| anyhow::anyhow!(e))
}

fn tag(category: TagCategory, value: &str) -> TagInput {
    TagInput {
        category,
        value: value.to_string(),
    }
}

/// Integration smoke test for the contact lifecycle.
/// Marked ignored so it only runs against a disposable database; set TEST_DATABASE_URL to run.
#[tokio::test]
#[ignore]
async fn contact_lifecycle_smoke_test() -> anyhow::Result<()> {
    let storage = storage().await?;
    // Fresh user id keeps repeated runs isolated.
    let user_id = Uuid::new_v4();
    let now = Utc::now();
    let err = |e: better_contacts::errors::AppError| anyhow::anyhow!(e.to_string());

    let fields = ContactFields {
        first_name: Some("Ana".to_string()),
        primary_email: Some("ana@example.com".to_string()),
        ..Default::default()
    };
    let (contact, tags) = storage
        .create_contact(user_id, &fields, "manual", &[], now)
        .await
        .map_err(err)?;
    assert_eq!(contact.enrichment_score, 15);
    assert!(tags.is_empty());

    let (contact, tags) = storage
        .replace_tags(
            user_id,
            contact.id,
            &[tag(TagCategory::Relationship, "Investor")],
            now,
        )
        .await
        .map_err(err)?;
    assert_eq!(contact.enrichment_score, 20);
    assert_eq!(tags.len(), 1);

    let enriched = storage
        .mark_enriched(
            user_id,
            contact.id,
            &ContactFields {
                why_now: Some("Raising a fund".to_string()),
                ..Default::default()
            },
            now,
        )
        .await
        .map_err(err)?;
    assert_eq!(enriched.enrichment_score, 40);
    assert!(enriched.last_enriched_at.is_some());

    let queue = storage.queue_candidates(user_id).await.map_err(err)?;
    assert_eq!(queue.len(), 1);

    // Another user cannot see the contact
    assert!(storage
        .get_contact(Uuid::new_v4(), contact.id)
        .await
        .map_err(err)?
        .is_none());

    assert!(storage.delete_contact(user_id, contact.id).await.map_err(err)?);
    assert!(storage
        .get_contact(user_id, contact.id)
        .await
        .map_err(err)?
        .is_none());

    Ok(())
}

#[tokio::test]
#[ignore]
async fn import_merges_by_primary_email() -> anyhow::Result<()> {
    let storage = storage().await?;
    let user_id = Uuid::new_v4();
    let now = Utc::now();
    let err = |e: better_contacts::errors::AppError| anyhow::anyhow!(e.to_string());

    let first = ContactFields {
        first_name: Some("Ana".to_string()),
        primary_email: Some("ana@example.com".to_string()),
        title: Some("Partner".to_string()),
        ..Default::default()
    };
    let outcome = storage
        .merge_or_create(user_id, match_key(&first).as_deref(), &first, "import", &[], now)
        .await
        .map_err(err)?;
    assert_eq!(outcome, MergeOutcome::Created);

    let second = ContactFields {
        primary_email: Some("ANA@example.com".to_string()),
        title: Some("Analyst".to_string()),
        company: Some("Acme".to_string()),
        ..Default::default()
    };
    let outcome = storage
        .merge_or_create(
            user_id,
            match_key(&second).as_deref(),
            &second,
            "import",
            &[tag(TagCategory::Interest, "Sailing")],
            now,
        )
        .await
        .map_err(err)?;
    assert_eq!(outcome, MergeOutcome::Merged);

    let contacts = storage.queue_candidates(user_id).await.map_err(err)?;
    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0].title.as_deref(), Some("Partner"));
    assert_eq!(contacts[0].company.as_deref(), Some("Acme"));
    // 7 + 8 + 10 + 10 + tag 5
    assert_eq!(contacts[0].enrichment_score, 40);

    Ok(())
}

#[tokio::test]
#[ignore]
async fn concurrent_imports_of_one_email_create_one_contact() -> anyhow::Result<()> {
    let storage = storage().await?;
    let user_id = Uuid::new_v4();
    let now = Utc::now();
    let err = |e: better_contacts::errors::AppError| anyhow::anyhow!(e.to_string());

    let fields = ContactFields {
        first_name: Some("Ana".to_string()),
        primary_email: Some("ana@example.com".to_string()),
        ..Default::default()
    };
    let key = match_key(&fields);

    let (a, b) = tokio::join!(
        storage.merge_or_create(user_id, key.as_deref(), &fields, "import", &[], now),
        storage.merge_or_create(user_id, key.as_deref(), &fields, "import", &[], now),
    );
    let mut outcomes = vec![a.map_err(err)?, b.map_err(err)?];
    outcomes.sort_by_key(|o| *o == MergeOutcome::Merged);
    assert_eq!(outcomes, vec![MergeOutcome::Created, MergeOutcome::Merged]);

    let contacts = storage.queue_candidates(user_id).await.map_err(err)?;
    assert_eq!(contacts.len(), 1);

    Ok(())
}

#[tokio::test]
#[ignore]
async fn rescore_repairs_stale_scores_without_touching_fresh_ones() -> anyhow::Result<()> {
    let db = database().await?;
    let storage = ContactStorage::new(db.pool.clone());
    let user_id = Uuid::new_v4();
    let now = Utc::now();
    let err = |e: better_contacts::errors::AppError| anyhow::anyhow!(e.to_string());

    let fields = ContactFields {
        first_name: Some("Ana".to_string()),
        why_now: Some("Raising a fund".to_string()),
        ..Default::default()
    };
    let (stale, _) = storage
        .create_contact(user_id, &fields, "manual", &[], now)
        .await
        .map_err(err)?;
    let (fresh, _) = storage
        .create_contact(user_id, &fields, "manual", &[], now)
        .await
        .map_err(err)?;
    assert_eq!(fresh.enrichment_score, 27);

    sqlx::query("UPDATE contacts SET enrichment_score = 3 WHERE id = $1")
        .bind(stale.id)
        .execute(&db.pool)
        .await?;

    // Other contacts may exist in a shared database; only ours are checked
    let changed = storage.rescore_all().await.map_err(err)?;
    assert!(changed >= 1);

    let repaired = storage
        .get_contact(user_id, stale.id)
        .await
        .map_err(err)?
        .ok_or_else(|| anyhow::anyhow!("contact vanished"))?;
    assert_eq!(repaired.enrichment_score, 27);

    let untouched = storage
        .get_contact(user_id, fresh.id)
        .await
        .map_err(err)?
        .ok_or_else(|| anyhow::anyhow!("contact vanished"))?;
    assert_eq!(untouched.enrichment_score, 27);

    Ok(())
}
