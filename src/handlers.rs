use crate::auth::AuthenticatedUser;
use crate::clock::Clock;
use crate::config::Config;
use crate::db_storage::{ContactStorage, MergeOutcome};
use crate::enrichment::{compute_priority, explain_reason, suggest_missing_fields, FieldSuggestion, PriorityTier};
use crate::errors::AppError;
use crate::import::{is_importable, match_key};
use crate::models::*;
use crate::queue::{build_queue, queue_stats, QueueFilter};
use crate::queue_cache::QueueCache;
use crate::validation::{normalize_fields, normalize_source, normalize_tags};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Largest batch accepted by the import endpoint.
pub const MAX_IMPORT_BATCH: usize = 1_000;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: PgPool,
    /// Application configuration.
    pub config: Config,
    /// Memoized enrichment-queue candidates per user.
    pub queue_cache: QueueCache,
    /// Time source for priority calculations.
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    fn storage(&self) -> ContactStorage {
        ContactStorage::new(self.db.clone())
    }
}

fn contact_detail(contact: Contact, tags: Vec<Tag>, now: DateTime<Utc>) -> ContactDetail {
    let priority = compute_priority(
        contact.score(),
        contact.last_enriched_at,
        contact.created_at,
        now,
    );

    ContactDetail {
        tier: PriorityTier::from_priority(priority),
        reason: explain_reason(&contact, now),
        suggestions: suggest_missing_fields(&contact),
        priority,
        contact,
        tags,
    }
}

/// Health check endpoint.
///
/// Returns the service status and version.
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses((status = 200, description = "Service is healthy"))
)]
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "better-contacts",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// POST /api/v1/contacts
///
/// Validates the payload, stores the contact with its tags, and returns the
/// scored detail view.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `user` - The authenticated account.
/// * `request` - Contact fields, optional source and tags.
///
/// # Returns
///
/// * `Result<(StatusCode, Json<ContactDetail>), AppError>` - 201 with the new contact, or an error.
#[utoipa::path(
    post,
    path = "/api/v1/contacts",
    tag = "contacts",
    params(("x-user-id" = Uuid, Header, description = "Authenticated account id")),
    request_body = CreateContactRequest,
    responses(
        (status = 201, description = "Contact created", body = ContactDetail),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Missing or invalid X-User-Id")
    )
)]
pub async fn create_contact(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Json(request): Json<CreateContactRequest>,
) -> Result<(StatusCode, Json<ContactDetail>), AppError> {
    tracing::info!("POST /contacts - user: {}", user_id);

    let fields = normalize_fields(request.fields)?;
    if !is_importable(&fields) {
        return Err(AppError::BadRequest(
            "A contact needs a first name, last name or primary email".to_string(),
        ));
    }
    let source = normalize_source(request.source.as_deref(), DEFAULT_SOURCE)?;
    let tags = normalize_tags(request.tags)?;

    let now = state.clock.now();
    let (contact, tags) = state
        .storage()
        .create_contact(user_id, &fields, &source, &tags, now)
        .await?;
    state.queue_cache.invalidate(user_id).await;

    Ok((StatusCode::CREATED, Json(contact_detail(contact, tags, now))))
}

/// GET /api/v1/contacts/:id
///
/// Contact with its tags, current priority, reason and suggestions.
#[utoipa::path(
    get,
    path = "/api/v1/contacts/{id}",
    tag = "contacts",
    params(
        ("id" = Uuid, Path, description = "Contact id"),
        ("x-user-id" = Uuid, Header, description = "Authenticated account id")
    ),
    responses(
        (status = 200, description = "Contact detail", body = ContactDetail),
        (status = 404, description = "Contact not found")
    )
)]
pub async fn get_contact(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ContactDetail>, AppError> {
    tracing::info!("GET /contacts/{}", id);

    let storage = state.storage();
    let contact = storage
        .get_contact(user_id, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Contact with id {} not found", id)))?;
    let tags = storage.list_tags(id).await?;

    Ok(Json(contact_detail(contact, tags, state.clock.now())))
}

/// PATCH /api/v1/contacts/:id
///
/// Partial update. Omitted fields are kept, blank strings clear a field.
#[utoipa::path(
    patch,
    path = "/api/v1/contacts/{id}",
    tag = "contacts",
    params(
        ("id" = Uuid, Path, description = "Contact id"),
        ("x-user-id" = Uuid, Header, description = "Authenticated account id")
    ),
    request_body = ContactFields,
    responses(
        (status = 200, description = "Updated contact", body = ContactDetail),
        (status = 400, description = "Invalid payload"),
        (status = 404, description = "Contact not found")
    )
)]
pub async fn update_contact(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(fields): Json<ContactFields>,
) -> Result<Json<ContactDetail>, AppError> {
    tracing::info!("PATCH /contacts/{}", id);

    let fields = normalize_fields(fields)?;
    let now = state.clock.now();
    let storage = state.storage();
    let contact = storage.update_contact(user_id, id, &fields, now).await?;
    let tags = storage.list_tags(id).await?;
    state.queue_cache.invalidate(user_id).await;

    Ok(Json(contact_detail(contact, tags, now)))
}

/// DELETE /api/v1/contacts/:id
#[utoipa::path(
    delete,
    path = "/api/v1/contacts/{id}",
    tag = "contacts",
    params(
        ("id" = Uuid, Path, description = "Contact id"),
        ("x-user-id" = Uuid, Header, description = "Authenticated account id")
    ),
    responses(
        (status = 204, description = "Contact deleted"),
        (status = 404, description = "Contact not found")
    )
)]
pub async fn delete_contact(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    tracing::info!("DELETE /contacts/{}", id);

    if !state.storage().delete_contact(user_id, id).await? {
        return Err(AppError::NotFound(format!(
            "Contact with id {} not found",
            id
        )));
    }
    state.queue_cache.invalidate(user_id).await;

    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/contacts/:id/tags
///
/// Replaces the full tag set; the score changes when the set becomes empty
/// or stops being empty.
#[utoipa::path(
    put,
    path = "/api/v1/contacts/{id}/tags",
    tag = "contacts",
    params(
        ("id" = Uuid, Path, description = "Contact id"),
        ("x-user-id" = Uuid, Header, description = "Authenticated account id")
    ),
    request_body = ReplaceTagsRequest,
    responses(
        (status = 200, description = "Updated contact", body = ContactDetail),
        (status = 404, description = "Contact not found")
    )
)]
pub async fn replace_tags(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<ReplaceTagsRequest>,
) -> Result<Json<ContactDetail>, AppError> {
    tracing::info!("PUT /contacts/{}/tags - {} tag(s)", id, request.tags.len());

    let tags = normalize_tags(request.tags)?;
    let now = state.clock.now();
    let (contact, tags) = state
        .storage()
        .replace_tags(user_id, id, &tags, now)
        .await?;
    state.queue_cache.invalidate(user_id).await;

    Ok(Json(contact_detail(contact, tags, now)))
}

/// POST /api/v1/contacts/:id/enrich
///
/// Records an enrichment session: applies the captured fields and stamps
/// `last_enriched_at`, which resets the staleness part of the priority.
#[utoipa::path(
    post,
    path = "/api/v1/contacts/{id}/enrich",
    tag = "enrichment",
    params(
        ("id" = Uuid, Path, description = "Contact id"),
        ("x-user-id" = Uuid, Header, description = "Authenticated account id")
    ),
    request_body = ContactFields,
    responses(
        (status = 200, description = "Enriched contact", body = ContactDetail),
        (status = 404, description = "Contact not found")
    )
)]
pub async fn enrich_contact(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(fields): Json<ContactFields>,
) -> Result<Json<ContactDetail>, AppError> {
    tracing::info!("POST /contacts/{}/enrich", id);

    let fields = normalize_fields(fields)?;
    let now = state.clock.now();
    let storage = state.storage();
    let contact = storage.mark_enriched(user_id, id, &fields, now).await?;
    let tags = storage.list_tags(id).await?;
    state.queue_cache.invalidate(user_id).await;

    tracing::info!(
        "✓ Enriched contact {} (score: {})",
        id,
        contact.enrichment_score
    );
    Ok(Json(contact_detail(contact, tags, now)))
}

/// GET /api/v1/contacts/:id/suggestions
///
/// Up to three missing fields worth filling next.
#[utoipa::path(
    get,
    path = "/api/v1/contacts/{id}/suggestions",
    tag = "enrichment",
    params(
        ("id" = Uuid, Path, description = "Contact id"),
        ("x-user-id" = Uuid, Header, description = "Authenticated account id")
    ),
    responses(
        (status = 200, description = "Missing-field suggestions", body = [FieldSuggestion]),
        (status = 404, description = "Contact not found")
    )
)]
pub async fn get_suggestions(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<FieldSuggestion>>, AppError> {
    tracing::info!("GET /contacts/{}/suggestions", id);

    let contact = state
        .storage()
        .get_contact(user_id, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Contact with id {} not found", id)))?;

    Ok(Json(suggest_missing_fields(&contact)))
}

/// POST /api/v1/contacts/import
///
/// Merges each record into the contact with the same primary email, or
/// creates it. Invalid records are skipped and reported; they do not fail
/// the batch.
#[utoipa::path(
    post,
    path = "/api/v1/contacts/import",
    tag = "contacts",
    params(("x-user-id" = Uuid, Header, description = "Authenticated account id")),
    request_body = ImportRequest,
    responses(
        (status = 200, description = "Import summary", body = ImportResponse),
        (status = 400, description = "Batch too large")
    )
)]
pub async fn import_contacts(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Json(request): Json<ImportRequest>,
) -> Result<Json<ImportResponse>, AppError> {
    let total = request.contacts.len();
    tracing::info!("POST /contacts/import - {} record(s)", total);

    if total > MAX_IMPORT_BATCH {
        return Err(AppError::BadRequest(format!(
            "Import batch of {} exceeds the limit of {}",
            total, MAX_IMPORT_BATCH
        )));
    }

    let storage = state.storage();
    let now = state.clock.now();
    let mut response = ImportResponse::default();

    for (idx, record) in request.contacts.into_iter().enumerate() {
        let prepared = normalize_fields(record.fields).and_then(|fields| {
            if !is_importable(&fields) {
                return Err(AppError::BadRequest(
                    "needs a first name, last name or primary email".to_string(),
                ));
            }
            let source = normalize_source(record.source.as_deref(), IMPORT_SOURCE)?;
            let tags = normalize_tags(record.tags)?;
            Ok((fields, source, tags))
        });

        let (fields, source, tags) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                tracing::warn!("Skipping import record {}: {}", idx, e);
                response.skipped += 1;
                response.errors.push(format!("record {}: {}", idx, e));
                continue;
            }
        };

        let key = match_key(&fields);
        match storage
            .merge_or_create(user_id, key.as_deref(), &fields, &source, &tags, now)
            .await
        {
            Ok(MergeOutcome::Created) => response.created += 1,
            Ok(MergeOutcome::Merged) => response.merged += 1,
            Err(e) => {
                tracing::error!("✗ Failed to import record {}: {}", idx, e);
                response.skipped += 1;
                response.errors.push(format!("record {}: storage failure", idx));
            }
        }
    }

    state.queue_cache.invalidate(user_id).await;

    tracing::info!(
        "Import complete: {} created, {} merged, {} skipped",
        response.created,
        response.merged,
        response.skipped
    );
    Ok(Json(response))
}

/// Validated queue parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueParams {
    pub priority: Option<PriorityTier>,
    pub source: Option<String>,
    pub limit: usize,
}

/// Parse the queue query string against the configured page-size bounds.
pub fn parse_queue_params(params: QueueQueryParams, config: &Config) -> Result<QueueParams, AppError> {
    let priority = params
        .priority
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .map(str::parse::<PriorityTier>)
        .transpose()
        .map_err(AppError::BadRequest)?;

    let source = params
        .source
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_ascii_lowercase);

    let limit = match params.limit {
        Some(0) => {
            return Err(AppError::BadRequest(
                "limit must be at least 1".to_string(),
            ))
        }
        Some(limit) => limit.min(config.queue_max_limit),
        None => config.queue_default_limit,
    };

    Ok(QueueParams {
        priority,
        source,
        limit,
    })
}

/// GET /api/v1/enrichment/queue
///
/// Contacts most in need of enrichment, highest priority first, plus tier
/// counts over the whole candidate set.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `user` - The authenticated account.
/// * `params` - Optional `priority` tier, `source` and `limit`.
///
/// # Returns
///
/// * `Result<Json<QueueResponse>, AppError>` - The ordered queue and its stats.
#[utoipa::path(
    get,
    path = "/api/v1/enrichment/queue",
    tag = "enrichment",
    params(
        QueueQueryParams,
        ("x-user-id" = Uuid, Header, description = "Authenticated account id")
    ),
    responses(
        (status = 200, description = "Enrichment queue", body = QueueResponse),
        (status = 400, description = "Invalid filter or limit")
    )
)]
pub async fn enrichment_queue(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Query(params): Query<QueueQueryParams>,
) -> Result<Json<QueueResponse>, AppError> {
    tracing::info!("GET /enrichment/queue - params: {:?}", params);

    let params = parse_queue_params(params, &state.config)?;

    let storage = state.storage();
    let candidates = state
        .queue_cache
        .get_or_load(user_id, || async move { storage.queue_candidates(user_id).await })
        .await?;

    let now = state.clock.now();
    let filter = QueueFilter {
        priority: params.priority,
        source: params.source.as_deref(),
        limit: params.limit,
    };
    let items = build_queue(&candidates, &filter, now);
    let stats = queue_stats(&candidates, filter.source, now);

    tracing::info!(
        "Queue for user {}: {} of {} candidate(s)",
        user_id,
        items.len(),
        stats.total
    );

    Ok(Json(QueueResponse { items, stats }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn config() -> Config {
        Config {
            queue_default_limit: 20,
            queue_max_limit: 50,
            ..Default::default()
        }
    }

    #[test]
    fn test_queue_params_defaults() {
        let params = parse_queue_params(QueueQueryParams::default(), &config()).unwrap();
        assert_eq!(
            params,
            QueueParams {
                priority: None,
                source: None,
                limit: 20
            }
        );
    }

    #[test]
    fn test_queue_params_caps_limit() {
        let query = QueueQueryParams {
            limit: Some(500),
            ..Default::default()
        };
        assert_eq!(parse_queue_params(query, &config()).unwrap().limit, 50);
    }

    #[test]
    fn test_queue_params_rejects_zero_limit() {
        let query = QueueQueryParams {
            limit: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            parse_queue_params(query, &config()),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_queue_params_parses_filters() {
        let query = QueueQueryParams {
            priority: Some("Medium".to_string()),
            source: Some(" Import ".to_string()),
            limit: Some(5),
        };
        let params = parse_queue_params(query, &config()).unwrap();
        assert_eq!(params.priority, Some(PriorityTier::Medium));
        assert_eq!(params.source.as_deref(), Some("import"));
        assert_eq!(params.limit, 5);
    }

    #[test]
    fn test_queue_params_rejects_unknown_tier() {
        let query = QueueQueryParams {
            priority: Some("urgent".to_string()),
            ..Default::default()
        };
        assert!(parse_queue_params(query, &config()).is_err());
    }

    #[test]
    fn test_contact_detail_annotations() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let contact = Contact {
            first_name: Some("Ana".to_string()),
            primary_email: Some("a@x.com".to_string()),
            title: Some("VC".to_string()),
            company: Some("Acme".to_string()),
            why_now: Some("raising soon".to_string()),
            enrichment_score: 55,
            created_at: now,
            updated_at: now,
            ..Default::default()
        };

        let detail = contact_detail(contact, Vec::new(), now);
        assert_eq!(detail.priority, 73);
        assert_eq!(detail.tier, PriorityTier::High);
        assert_eq!(detail.reason, "Never enriched — missing how we met, notes");
        assert_eq!(detail.suggestions.len(), 3);
        assert_eq!(detail.suggestions[0].label, "How we met");
    }
}
