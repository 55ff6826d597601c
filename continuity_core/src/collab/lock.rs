//! Advisory per-beat edit locks.
//!
//! Locks only inform cooperating editors. The tree store never checks them,
//! so a writer that skips [`EditLockManager::acquire_lock`] can still write.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{SharedClock, SystemClock};
use crate::config::EngineConfig;
use crate::error::CollabError;
use crate::tree::{BeatId, ProjectId, UserId};

/// Default lock lifetime in seconds.
pub const DEFAULT_LOCK_TTL_SECS: i64 = 300;

/// An edit lock held on one beat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditLock {
    pub holder_id: UserId,
    pub holder_name: Option<String>,
    pub acquired_at: DateTime<Utc>,
}

impl EditLock {
    fn is_live(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.acquired_at < ttl
    }
}

/// What an editor sees before opening a beat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LockStatus {
    Unlocked,
    Locked {
        holder_id: UserId,
        holder_name: Option<String>,
        acquired_at: DateTime<Utc>,
    },
}

impl LockStatus {
    pub fn is_locked(&self) -> bool {
        matches!(self, LockStatus::Locked { .. })
    }
}

type LockKey = (ProjectId, BeatId);

/// Arbitrates edit locks for every beat of every project.
///
/// Clones share the same lock table.
#[derive(Debug, Clone)]
pub struct EditLockManager {
    locks: Arc<Mutex<HashMap<LockKey, EditLock>>>,
    clock: SharedClock,
    ttl: Duration,
}

impl Default for EditLockManager {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_LOCK_TTL_SECS))
    }
}

impl EditLockManager {
    pub fn new(ttl: Duration) -> Self {
        Self {
            locks: Arc::new(Mutex::new(HashMap::new())),
            clock: Arc::new(SystemClock),
            ttl,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.lock_ttl())
    }

    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Take the lock on a beat.
    ///
    /// Fails if another user holds a lock younger than the TTL. Expired locks
    /// are taken over silently; re-acquiring your own lock refreshes it.
    pub async fn acquire_lock(
        &self,
        project: &ProjectId,
        beat: BeatId,
        user_id: &UserId,
        user_name: Option<&str>,
    ) -> Result<EditLock, CollabError> {
        let now = self.clock.now();
        let mut locks = self.locks.lock().await;
        let key = (project.clone(), beat);

        if let Some(existing) = locks.get(&key) {
            if existing.holder_id != *user_id && existing.is_live(now, self.ttl) {
                debug!(%project, %beat, holder = %existing.holder_id, requester = %user_id, "lock conflict");
                return Err(CollabError::Conflict {
                    holder_id: existing.holder_id.clone(),
                    holder_name: existing.holder_name.clone(),
                    acquired_at: existing.acquired_at,
                });
            }
            if existing.holder_id != *user_id {
                info!(%project, %beat, previous = %existing.holder_id, holder = %user_id, "reclaimed expired lock");
            }
        }

        let lock = EditLock {
            holder_id: user_id.clone(),
            holder_name: user_name.map(str::to_string),
            acquired_at: now,
        };
        locks.insert(key, lock.clone());
        debug!(%project, %beat, holder = %user_id, "lock acquired");
        Ok(lock)
    }

    /// Release a lock. Only the holder can release; for anyone else this is
    /// a no-op. Returns whether a lock was removed.
    pub async fn release_lock(&self, project: &ProjectId, beat: BeatId, user_id: &UserId) -> bool {
        let mut locks = self.locks.lock().await;
        let key = (project.clone(), beat);

        match locks.get(&key) {
            Some(lock) if lock.holder_id == *user_id => {
                locks.remove(&key);
                debug!(%project, %beat, holder = %user_id, "lock released");
                true
            }
            _ => false,
        }
    }

    /// Current lock state of a beat. An expired lock found here is dropped.
    pub async fn lock_status(&self, project: &ProjectId, beat: BeatId) -> LockStatus {
        let now = self.clock.now();
        let mut locks = self.locks.lock().await;
        let key = (project.clone(), beat);

        match locks.get(&key) {
            Some(lock) if lock.is_live(now, self.ttl) => LockStatus::Locked {
                holder_id: lock.holder_id.clone(),
                holder_name: lock.holder_name.clone(),
                acquired_at: lock.acquired_at,
            },
            Some(_) => {
                locks.remove(&key);
                debug!(%project, %beat, "dropped expired lock");
                LockStatus::Unlocked
            }
            None => LockStatus::Unlocked,
        }
    }

    /// Drop every expired lock. Returns how many were removed.
    pub async fn prune_expired(&self) -> usize {
        let now = self.clock.now();
        let mut locks = self.locks.lock().await;
        let before = locks.len();
        locks.retain(|_, lock| lock.is_live(now, self.ttl));

        let pruned = before - locks.len();
        if pruned > 0 {
            debug!(pruned, "pruned expired locks");
        }
        pruned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::ManualClock;

    fn setup() -> (EditLockManager, ManualClock, ProjectId, BeatId) {
        let clock = ManualClock::starting_now();
        let manager = EditLockManager::default().with_clock(Arc::new(clock.clone()));
        (manager, clock, ProjectId::from("p1"), BeatId::new())
    }

    #[tokio::test]
    async fn test_conflict_while_live() {
        let (manager, clock, project, beat) = setup();
        let (u1, u2) = (UserId::from("u1"), UserId::from("u2"));

        manager
            .acquire_lock(&project, beat, &u1, Some("Ada"))
            .await
            .unwrap();
        clock.advance(Duration::minutes(4));

        let err = manager
            .acquire_lock(&project, beat, &u2, Some("Grace"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "This beat is being edited by Ada");
    }

    #[tokio::test]
    async fn test_expired_lock_is_reclaimed() {
        let (manager, clock, project, beat) = setup();
        let (u1, u2) = (UserId::from("u1"), UserId::from("u2"));

        manager.acquire_lock(&project, beat, &u1, None).await.unwrap();
        clock.advance(Duration::minutes(6));

        assert_eq!(manager.lock_status(&project, beat).await, LockStatus::Unlocked);
        let lock = manager.acquire_lock(&project, beat, &u2, None).await.unwrap();
        assert_eq!(lock.holder_id, u2);
    }

    #[tokio::test]
    async fn test_expired_locks_leave_the_table() {
        let (manager, clock, project, beat) = setup();
        let (other, held) = (BeatId::new(), BeatId::new());
        let u1 = UserId::from("u1");

        manager.acquire_lock(&project, beat, &u1, None).await.unwrap();
        manager.acquire_lock(&project, other, &u1, None).await.unwrap();
        clock.advance(Duration::minutes(6));
        manager.acquire_lock(&project, held, &u1, None).await.unwrap();

        assert_eq!(manager.lock_status(&project, beat).await, LockStatus::Unlocked);
        assert_eq!(manager.locks.lock().await.len(), 2);

        assert_eq!(manager.prune_expired().await, 1);
        assert_eq!(manager.locks.lock().await.len(), 1);
        assert!(manager.lock_status(&project, held).await.is_locked());
        assert_eq!(manager.prune_expired().await, 0);
    }

    #[tokio::test]
    async fn test_reacquire_refreshes() {
        let (manager, clock, project, beat) = setup();
        let (u1, u2) = (UserId::from("u1"), UserId::from("u2"));

        manager.acquire_lock(&project, beat, &u1, None).await.unwrap();
        clock.advance(Duration::minutes(4));
        manager.acquire_lock(&project, beat, &u1, None).await.unwrap();
        clock.advance(Duration::minutes(4));

        // Eight minutes since first acquire, four since refresh.
        assert!(manager.acquire_lock(&project, beat, &u2, None).await.is_err());
    }

    #[tokio::test]
    async fn test_release_only_by_holder() {
        let (manager, _, project, beat) = setup();
        let (u1, u2) = (UserId::from("u1"), UserId::from("u2"));

        manager.acquire_lock(&project, beat, &u1, None).await.unwrap();
        assert!(!manager.release_lock(&project, beat, &u2).await);
        assert!(manager.lock_status(&project, beat).await.is_locked());

        assert!(manager.release_lock(&project, beat, &u1).await);
        assert_eq!(manager.lock_status(&project, beat).await, LockStatus::Unlocked);
        assert!(!manager.release_lock(&project, beat, &u1).await);
    }

    #[tokio::test]
    async fn test_locks_are_per_project_and_beat() {
        let (manager, _, project, beat) = setup();
        let (u1, u2) = (UserId::from("u1"), UserId::from("u2"));

        manager.acquire_lock(&project, beat, &u1, None).await.unwrap();
        assert!(manager
            .acquire_lock(&project, BeatId::new(), &u2, None)
            .await
            .is_ok());
        assert!(manager
            .acquire_lock(&ProjectId::from("p2"), beat, &u2, None)
            .await
            .is_ok());
    }
}
