//! Process-wide memo of each user's enrichment-queue candidates.
//!
//! Contract:
//! - build once at startup with [`QueueCache::new`] and share it via `AppState`
//! - read through [`QueueCache::get_or_load`]
//! - every write that touches a user's contacts or tags calls
//!   [`QueueCache::invalidate`] for that user before responding
//!
//! Each user has a generation counter that `invalidate` bumps. A load that
//! overlaps an invalidation still answers its caller but is not kept, so the
//! next read goes back to the database.
//!
//! Entries are checksummed (see `cache_validator`) and also expire after the
//! configured TTL.

use moka::future::Cache;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::cache_validator::ValidatedCacheEntry;
use crate::errors::AppError;
use crate::models::Contact;

#[derive(Clone)]
pub struct QueueCache {
    inner: Cache<Uuid, String>,
    generations: Cache<Uuid, Arc<AtomicU64>>,
}

/// Generation observed when a load started.
struct Snapshot {
    counter: Arc<AtomicU64>,
    value: u64,
}

impl QueueCache {
    pub fn new(ttl: Duration, capacity: u64) -> Self {
        let inner = Cache::builder()
            .time_to_live(ttl)
            .max_capacity(capacity)
            .build();
        // Outlives the entries it guards; an evicted counter is replaced by a
        // fresh Arc, which snapshots detect by pointer.
        let generations = Cache::builder().max_capacity(capacity).build();
        Self { inner, generations }
    }

    async fn counter(&self, user_id: Uuid) -> Arc<AtomicU64> {
        self.generations
            .get_with(user_id, async { Arc::new(AtomicU64::new(0)) })
            .await
    }

    async fn snapshot(&self, user_id: Uuid) -> Snapshot {
        let counter = self.counter(user_id).await;
        let value = counter.load(Ordering::SeqCst);
        Snapshot { counter, value }
    }

    async fn is_current(&self, user_id: Uuid, snapshot: &Snapshot) -> bool {
        let counter = self.counter(user_id).await;
        Arc::ptr_eq(&counter, &snapshot.counter) && counter.load(Ordering::SeqCst) == snapshot.value
    }

    /// Cached candidates for `user_id`, or the result of `load` (which is then cached).
    pub async fn get_or_load<F, Fut>(&self, user_id: Uuid, load: F) -> Result<Vec<Contact>, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Contact>, AppError>>,
    {
        if let Some(cached) = self.inner.get(&user_id).await {
            if let Some(contacts) = ValidatedCacheEntry::decode::<Vec<Contact>>(&cached) {
                tracing::debug!("Queue cache HIT for user {}", user_id);
                return Ok(contacts);
            }
            tracing::warn!("Queue cache entry for user {} failed validation, reloading", user_id);
        }

        tracing::debug!("Queue cache MISS for user {}", user_id);
        let snapshot = self.snapshot(user_id).await;
        let contacts = load().await?;

        if !self.is_current(user_id, &snapshot).await {
            tracing::debug!("Queue cache for user {} invalidated during load, not storing", user_id);
            return Ok(contacts);
        }

        self.inner
            .insert(user_id, ValidatedCacheEntry::encode(&contacts)?)
            .await;
        // An invalidation between the check and the insert must not leave the entry behind
        if !self.is_current(user_id, &snapshot).await {
            self.inner.invalidate(&user_id).await;
        }

        Ok(contacts)
    }

    /// Drop the memoized candidates of one user and discard any load in flight.
    pub async fn invalidate(&self, user_id: Uuid) {
        self.counter(user_id).await.fetch_add(1, Ordering::SeqCst);
        self.inner.invalidate(&user_id).await;
        tracing::debug!("Queue cache invalidated for user {}", user_id);
    }
}
