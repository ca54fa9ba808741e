use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::enrichment::compute_score;
use crate::errors::{AppError, ResultExt};
use crate::import::{fill_missing, match_key, new_tags};
use crate::models::{Contact, ContactFields, Tag, TagInput, TagRow};

/// Result of merging one import record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Created,
    Merged,
}

/// Contacts rescored per page by [`ContactStorage::rescore_all`].
const RESCORE_PAGE_SIZE: i64 = 500;

/// Database storage service for contacts and their tags.
///
/// Every write recomputes `enrichment_score` from the stored fields and the
/// current tag count inside the same transaction. All reads and writes are
/// scoped to the owning user.
pub struct ContactStorage {
    pool: PgPool,
}

impl ContactStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new contact with its tags.
    pub async fn create_contact(
        &self,
        user_id: Uuid,
        fields: &ContactFields,
        source: &str,
        tags: &[TagInput],
        now: DateTime<Utc>,
    ) -> Result<(Contact, Vec<Tag>), AppError> {
        let mut tx = self.pool.begin().await.context("Starting create transaction")?;

        if let Some(key) = match_key(fields) {
            lock_email(&mut tx, user_id, &key).await?;
        }
        let contact = insert_new(&mut tx, user_id, fields, source, tags, now).await?;
        let tags = fetch_tags(&mut tx, contact.id).await?;

        tx.commit().await.context("Committing new contact")?;

        tracing::info!(
            "✓ Created contact {} for user {} (score: {})",
            contact.id,
            user_id,
            contact.enrichment_score
        );
        Ok((contact, tags))
    }

    pub async fn get_contact(&self, user_id: Uuid, id: Uuid) -> Result<Option<Contact>, AppError> {
        sqlx::query_as::<_, Contact>("SELECT * FROM contacts WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .context("Fetching contact")
    }

    pub async fn list_tags(&self, contact_id: Uuid) -> Result<Vec<Tag>, AppError> {
        let mut conn = self.pool.acquire().await.context("Acquiring connection")?;
        fetch_tags(&mut conn, contact_id).await
    }

    /// Apply a partial update and rescore.
    pub async fn update_contact(
        &self,
        user_id: Uuid,
        id: Uuid,
        fields: &ContactFields,
        now: DateTime<Utc>,
    ) -> Result<Contact, AppError> {
        self.modify(user_id, id, fields, now, |contact| fields.apply_to(contact))
            .await
    }

    /// Apply captured fields, stamp `last_enriched_at = now`, and rescore.
    pub async fn mark_enriched(
        &self,
        user_id: Uuid,
        id: Uuid,
        fields: &ContactFields,
        now: DateTime<Utc>,
    ) -> Result<Contact, AppError> {
        self.modify(user_id, id, fields, now, |contact| {
            fields.apply_to(contact);
            contact.last_enriched_at = Some(now);
        })
        .await
    }

    /// Replace every tag of a contact and rescore.
    pub async fn replace_tags(
        &self,
        user_id: Uuid,
        id: Uuid,
        tags: &[TagInput],
        now: DateTime<Utc>,
    ) -> Result<(Contact, Vec<Tag>), AppError> {
        let mut tx = self.pool.begin().await.context("Starting tag transaction")?;

        let mut contact = lock_contact(&mut tx, user_id, id).await?;

        sqlx::query("DELETE FROM contact_tags WHERE contact_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Deleting tags")?;
        insert_tags(&mut tx, id, tags).await?;

        contact.updated_at = now;
        rescore_and_save(&mut tx, &mut contact).await?;
        let tags = fetch_tags(&mut tx, id).await?;

        tx.commit().await.context("Committing tags")?;
        Ok((contact, tags))
    }

    /// Returns false when the contact does not exist for this user.
    pub async fn delete_contact(&self, user_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM contacts WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("Deleting contact")?;

        Ok(result.rows_affected() > 0)
    }

    /// Contacts eligible for the enrichment queue (score below 100).
    ///
    /// Newest first; the queue keeps this order for equal priorities.
    pub async fn queue_candidates(&self, user_id: Uuid) -> Result<Vec<Contact>, AppError> {
        sqlx::query_as::<_, Contact>(
            r#"
            SELECT * FROM contacts
            WHERE user_id = $1 AND enrichment_score < 100
            ORDER BY created_at DESC, id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Fetching queue candidates")
    }

    /// Merge an import record into the contact with the same primary email,
    /// or create it when there is none.
    pub async fn merge_or_create(
        &self,
        user_id: Uuid,
        match_key: Option<&str>,
        fields: &ContactFields,
        source: &str,
        tags: &[TagInput],
        now: DateTime<Utc>,
    ) -> Result<MergeOutcome, AppError> {
        let mut tx = self.pool.begin().await.context("Starting import transaction")?;

        if let Some(email) = match_key {
            lock_email(&mut tx, user_id, email).await?;
        }

        let existing = match match_key {
            Some(email) => sqlx::query_as::<_, Contact>(
                r#"
                SELECT * FROM contacts
                WHERE user_id = $1 AND lower(primary_email) = $2
                ORDER BY created_at
                LIMIT 1
                FOR UPDATE
                "#,
            )
            .bind(user_id)
            .bind(email)
            .fetch_optional(&mut *tx)
            .await
            .context("Matching import record")?,
            None => None,
        };

        let outcome = match existing {
            Some(mut contact) => {
                let filled = fill_missing(&mut contact, fields);
                let current_tags = fetch_tags(&mut tx, contact.id).await?;
                let added = new_tags(&current_tags, tags);
                insert_tags(&mut tx, contact.id, &added).await?;

                contact.updated_at = now;
                rescore_and_save(&mut tx, &mut contact).await?;
                tracing::debug!(
                    "Merged import into contact {}: {} field(s), {} tag(s)",
                    contact.id,
                    filled,
                    added.len()
                );
                MergeOutcome::Merged
            }
            None => {
                let contact = insert_new(&mut tx, user_id, fields, source, tags, now).await?;
                tracing::debug!("Import created contact {}", contact.id);
                MergeOutcome::Created
            }
        };

        tx.commit().await.context("Committing import record")?;
        Ok(outcome)
    }

    /// Recompute the persisted score of every contact. Returns how many changed.
    ///
    /// Walks the table by id one page at a time. Each contact is locked and
    /// rescored in its own transaction, so a concurrent edit is either seen
    /// or waited for.
    pub async fn rescore_all(&self) -> Result<u64, AppError> {
        let mut changed = 0;
        let mut after = Uuid::nil();

        loop {
            let ids: Vec<Uuid> = sqlx::query_scalar(
                "SELECT id FROM contacts WHERE id > $1 ORDER BY id LIMIT $2",
            )
            .bind(after)
            .bind(RESCORE_PAGE_SIZE)
            .fetch_all(&self.pool)
            .await
            .context("Listing contacts for rescoring")?;

            let Some(last) = ids.last() else { break };
            after = *last;

            for id in ids {
                if self.rescore_one(id).await? {
                    changed += 1;
                }
            }
        }

        Ok(changed)
    }

    /// Returns true when the stored score was out of date.
    async fn rescore_one(&self, id: Uuid) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await.context("Starting rescore transaction")?;

        let contact = sqlx::query_as::<_, Contact>("SELECT * FROM contacts WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .context("Locking contact for rescoring")?;
        // deleted since the page was listed
        let Some(contact) = contact else {
            return Ok(false);
        };

        let score = current_score(&mut tx, &contact).await?;
        if score == contact.enrichment_score {
            return Ok(false);
        }

        sqlx::query("UPDATE contacts SET enrichment_score = $1 WHERE id = $2")
            .bind(score)
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Updating score")?;
        tx.commit().await.context("Committing rescore")?;

        tracing::debug!(
            "Rescored contact {}: {} → {}",
            id,
            contact.enrichment_score,
            score
        );
        Ok(true)
    }

    async fn modify<F>(
        &self,
        user_id: Uuid,
        id: Uuid,
        fields: &ContactFields,
        now: DateTime<Utc>,
        change: F,
    ) -> Result<Contact, AppError>
    where
        F: FnOnce(&mut Contact),
    {
        let mut tx = self.pool.begin().await.context("Starting update transaction")?;

        if let Some(key) = match_key(fields) {
            lock_email(&mut tx, user_id, &key).await?;
        }
        let mut contact = lock_contact(&mut tx, user_id, id).await?;
        change(&mut contact);
        contact.updated_at = now;
        rescore_and_save(&mut tx, &mut contact).await?;

        tx.commit().await.context("Committing contact update")?;
        Ok(contact)
    }
}

async fn insert_new(
    conn: &mut PgConnection,
    user_id: Uuid,
    fields: &ContactFields,
    source: &str,
    tags: &[TagInput],
    now: DateTime<Utc>,
) -> Result<Contact, AppError> {
    let mut contact = Contact {
        id: Uuid::new_v4(),
        user_id,
        source: source.to_string(),
        created_at: now,
        updated_at: now,
        ..Default::default()
    };
    fields.apply_to(&mut contact);
    contact.enrichment_score = i32::from(compute_score(&contact, tags.len()));

    sqlx::query(
        r#"
        INSERT INTO contacts (
            id, user_id, first_name, last_name, primary_email, secondary_email,
            primary_phone, secondary_phone, title, company, location, linkedin_url,
            how_we_met, why_now, notes, expertise, interests, source,
            enrichment_score, last_enriched_at, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                $13, $14, $15, $16, $17, $18, $19, $20, $21, $22)
        "#,
    )
    .bind(contact.id)
    .bind(contact.user_id)
    .bind(&contact.first_name)
    .bind(&contact.last_name)
    .bind(&contact.primary_email)
    .bind(&contact.secondary_email)
    .bind(&contact.primary_phone)
    .bind(&contact.secondary_phone)
    .bind(&contact.title)
    .bind(&contact.company)
    .bind(&contact.location)
    .bind(&contact.linkedin_url)
    .bind(&contact.how_we_met)
    .bind(&contact.why_now)
    .bind(&contact.notes)
    .bind(&contact.expertise)
    .bind(&contact.interests)
    .bind(&contact.source)
    .bind(contact.enrichment_score)
    .bind(contact.last_enriched_at)
    .bind(contact.created_at)
    .bind(contact.updated_at)
    .execute(&mut *conn)
    .await
    .context("Inserting contact")?;

    insert_tags(conn, contact.id, tags).await?;

    Ok(contact)
}

/// Advisory-lock key for one user's primary email.
fn email_lock_key(user_id: Uuid, email: &str) -> String {
    format!("contact-email:{}:{}", user_id, email.to_lowercase())
}

/// Hold a transaction-scoped lock on `(user_id, email)`.
///
/// Taken by every write that can set a primary email, before any row lock,
/// so two writers cannot both miss the match and insert twice.
async fn lock_email(conn: &mut PgConnection, user_id: Uuid, email: &str) -> Result<(), AppError> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(email_lock_key(user_id, email))
        .execute(&mut *conn)
        .await
        .context("Locking primary email")?;
    Ok(())
}

async fn lock_contact(
    conn: &mut PgConnection,
    user_id: Uuid,
    id: Uuid,
) -> Result<Contact, AppError> {
    sqlx::query_as::<_, Contact>(
        "SELECT * FROM contacts WHERE id = $1 AND user_id = $2 FOR UPDATE",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await
    .context("Locking contact")?
    .ok_or_else(|| AppError::NotFound(format!("Contact with id {} not found", id)))
}

async fn insert_tags(
    conn: &mut PgConnection,
    contact_id: Uuid,
    tags: &[TagInput],
) -> Result<(), AppError> {
    for tag in tags {
        sqlx::query(
            "INSERT INTO contact_tags (id, contact_id, category, value) VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(contact_id)
        .bind(tag.category.as_str())
        .bind(&tag.value)
        .execute(&mut *conn)
        .await
        .context("Inserting tag")?;
    }
    Ok(())
}

async fn fetch_tags(conn: &mut PgConnection, contact_id: Uuid) -> Result<Vec<Tag>, AppError> {
    let rows = sqlx::query_as::<_, TagRow>(
        "SELECT id, contact_id, category, value FROM contact_tags WHERE contact_id = $1 ORDER BY category, value",
    )
    .bind(contact_id)
    .fetch_all(&mut *conn)
    .await
    .context("Fetching tags")?;

    rows.into_iter()
        .map(|row| Tag::try_from(row).map_err(AppError::InternalError))
        .collect()
}

/// Score of `contact`'s fields together with its stored tag count.
async fn current_score(conn: &mut PgConnection, contact: &Contact) -> Result<i32, AppError> {
    let tag_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM contact_tags WHERE contact_id = $1")
            .bind(contact.id)
            .fetch_one(&mut *conn)
            .await
            .context("Counting tags")?;

    Ok(i32::from(compute_score(
        contact,
        usize::try_from(tag_count).unwrap_or(0),
    )))
}

/// Recompute the score from the stored tag count and write every column back.
async fn rescore_and_save(conn: &mut PgConnection, contact: &mut Contact) -> Result<(), AppError> {
    contact.enrichment_score = current_score(conn, contact).await?;

    sqlx::query(
        r#"
        UPDATE contacts SET
            first_name = $2, last_name = $3, primary_email = $4, secondary_email = $5,
            primary_phone = $6, secondary_phone = $7, title = $8, company = $9,
            location = $10, linkedin_url = $11, how_we_met = $12, why_now = $13,
            notes = $14, expertise = $15, interests = $16, source = $17,
            enrichment_score = $18, last_enriched_at = $19, updated_at = $20
        WHERE id = $1
        "#,
    )
    .bind(contact.id)
    .bind(&contact.first_name)
    .bind(&contact.last_name)
    .bind(&contact.primary_email)
    .bind(&contact.secondary_email)
    .bind(&contact.primary_phone)
    .bind(&contact.secondary_phone)
    .bind(&contact.title)
    .bind(&contact.company)
    .bind(&contact.location)
    .bind(&contact.linkedin_url)
    .bind(&contact.how_we_met)
    .bind(&contact.why_now)
    .bind(&contact.notes)
    .bind(&contact.expertise)
    .bind(&contact.interests)
    .bind(&contact.source)
    .bind(contact.enrichment_score)
    .bind(contact.last_enriched_at)
    .bind(contact.updated_at)
    .execute(&mut *conn)
    .await
    .context("Saving contact")?;

    tracing::debug!(
        "Saved contact {} (score: {})",
        contact.id,
        contact.enrichment_score
    );
    Ok(())
}
