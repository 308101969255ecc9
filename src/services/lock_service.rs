use crate::api::middleware::error::{ApiError, ApiResult};
use crate::database::Database;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// A held distributed lock.
///
/// The owner token ties the lease to this acquisition; the renewal task keeps
/// the row's expiry moving while the holder is alive. If the process dies
/// without unlocking, the row expires and the next contender takes it over.
#[derive(Debug)]
pub struct Lease {
    key: String,
    owner: String,
    renewer: JoinHandle<()>,
}

impl Lease {
    pub(crate) fn new(key: String, owner: String, renewer: JoinHandle<()>) -> Self {
        Self { key, owner, renewer }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        // Stop renewing; the row's expiry becomes the backstop.
        self.renewer.abort();
    }
}

/// Cluster-wide mutual exclusion, zero-wait.
///
/// `try_lock` never queues: `Ok(None)` means another holder has the key,
/// `Err` means the backend itself failed. The distinction matters to the
/// caller — busy is a normal admission outcome, backend failure feeds the
/// circuit breaker.
#[async_trait]
pub trait LockService: Send + Sync {
    async fn try_lock(&self, key: &str) -> ApiResult<Option<Lease>>;

    async fn unlock(&self, lease: &Lease) -> ApiResult<()>;

    async fn is_held_by_caller(&self, lease: &Lease) -> ApiResult<bool>;
}

/// Lock service over the shared relational store.
///
/// A lease is a row in `distributed_locks`; acquisition is an upsert that
/// only succeeds when the key is absent or its previous lease has expired.
/// ISO 8601 text timestamps compare lexicographically, so expiry checks run
/// as string comparisons in SQL.
#[derive(Clone)]
pub struct DatabaseLockService {
    db: Database,
    ttl: Duration,
}

impl DatabaseLockService {
    pub fn new(db: Database, ttl: Duration) -> Self {
        Self { db, ttl }
    }

    fn spawn_renewer(&self, key: String, owner: String) -> JoinHandle<()> {
        let db = self.db.clone();
        let ttl = self.ttl;
        // Renew at a third of the TTL so a single missed tick cannot lose
        // the lease.
        let cadence = ttl / 3;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cadence.max(Duration::from_millis(100)));
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let expires_at = (Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_default())
                    .to_rfc3339();
                let renewed = sqlx::query(
                    "UPDATE distributed_locks SET expires_at = ? WHERE key = ? AND owner = ?",
                )
                .bind(&expires_at)
                .bind(&key)
                .bind(&owner)
                .execute(db.pool())
                .await;

                match renewed {
                    Ok(result) if result.rows_affected() == 0 => {
                        // Lease gone (expired and taken over, or released).
                        tracing::debug!("lease renewal stopped, no row for {}", key);
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("lease renewal failed for {}: {}", key, e);
                    }
                }
            }
        })
    }
}

#[async_trait]
impl LockService for DatabaseLockService {
    async fn try_lock(&self, key: &str) -> ApiResult<Option<Lease>> {
        let owner = Uuid::new_v4().to_string();
        let now = Utc::now();
        let expires_at = now + chrono::Duration::from_std(self.ttl).unwrap_or_default();

        let result = sqlx::query(
            "INSERT INTO distributed_locks (key, owner, expires_at, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET
                 owner = excluded.owner,
                 expires_at = excluded.expires_at,
                 created_at = excluded.created_at
             WHERE distributed_locks.expires_at < ?",
        )
        .bind(key)
        .bind(&owner)
        .bind(expires_at.to_rfc3339())
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(self.db.pool())
        .await
        .map_err(|e| ApiError::Internal(format!("failed to acquire lock: {}", e)))?;

        if result.rows_affected() == 0 {
            // Someone else holds a live lease.
            return Ok(None);
        }

        let renewer = self.spawn_renewer(key.to_string(), owner.clone());
        Ok(Some(Lease {
            key: key.to_string(),
            owner,
            renewer,
        }))
    }

    async fn unlock(&self, lease: &Lease) -> ApiResult<()> {
        lease.renewer.abort();
        sqlx::query("DELETE FROM distributed_locks WHERE key = ? AND owner = ?")
            .bind(&lease.key)
            .bind(&lease.owner)
            .execute(self.db.pool())
            .await
            .map_err(|e| ApiError::Internal(format!("failed to release lock: {}", e)))?;
        Ok(())
    }

    async fn is_held_by_caller(&self, lease: &Lease) -> ApiResult<bool> {
        let row = sqlx::query("SELECT owner FROM distributed_locks WHERE key = ?")
            .bind(&lease.key)
            .fetch_optional(self.db.pool())
            .await
            .map_err(|e| ApiError::Internal(format!("failed to inspect lock: {}", e)))?;

        match row {
            Some(row) => {
                let owner: String = row.try_get("owner")?;
                Ok(owner == lease.owner)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use dashmap::DashMap;

    /// Grants every distinct key once, in process memory.
    #[derive(Default)]
    pub struct InMemoryLockService {
        held: DashMap<String, String>,
    }

    impl InMemoryLockService {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn held_count(&self) -> usize {
            self.held.len()
        }
    }

    #[async_trait]
    impl LockService for InMemoryLockService {
        async fn try_lock(&self, key: &str) -> ApiResult<Option<Lease>> {
            let owner = Uuid::new_v4().to_string();
            match self.held.entry(key.to_string()) {
                dashmap::mapref::entry::Entry::Occupied(_) => Ok(None),
                dashmap::mapref::entry::Entry::Vacant(slot) => {
                    slot.insert(owner.clone());
                    Ok(Some(Lease::new(
                        key.to_string(),
                        owner,
                        tokio::spawn(async {}),
                    )))
                }
            }
        }

        async fn unlock(&self, lease: &Lease) -> ApiResult<()> {
            self.held
                .remove_if(lease.key(), |_, owner| owner == lease.owner());
            Ok(())
        }

        async fn is_held_by_caller(&self, lease: &Lease) -> ApiResult<bool> {
            Ok(self
                .held
                .get(lease.key())
                .map(|owner| *owner == lease.owner())
                .unwrap_or(false))
        }
    }

    /// Backend that always errors, for exercising the degraded path.
    pub struct FailingLockService;

    #[async_trait]
    impl LockService for FailingLockService {
        async fn try_lock(&self, _key: &str) -> ApiResult<Option<Lease>> {
            Err(ApiError::Internal("lock backend unreachable".to_string()))
        }

        async fn unlock(&self, _lease: &Lease) -> ApiResult<()> {
            Err(ApiError::Internal("lock backend unreachable".to_string()))
        }

        async fn is_held_by_caller(&self, _lease: &Lease) -> ApiResult<bool> {
            Err(ApiError::Internal("lock backend unreachable".to_string()))
        }
    }

    /// Backend that reports every key as busy.
    pub struct BusyLockService;

    #[async_trait]
    impl LockService for BusyLockService {
        async fn try_lock(&self, _key: &str) -> ApiResult<Option<Lease>> {
            Ok(None)
        }

        async fn unlock(&self, _lease: &Lease) -> ApiResult<()> {
            Ok(())
        }

        async fn is_held_by_caller(&self, _lease: &Lease) -> ApiResult<bool> {
            Ok(false)
        }
    }
}
