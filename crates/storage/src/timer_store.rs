use std::sync::Arc;

use chrono::{DateTime, Utc};
use quiz_core::TimerSnapshot;
use quiz_core::model::SessionKey;

use crate::repository::{KeyValueStore, StorageError};

fn remaining_key(key: SessionKey) -> String {
    format!("quizTimer-{}-{}", key.course_id, key.module_id)
}

fn last_active_key(key: SessionKey) -> String {
    format!("quizLastActiveTime-{}-{}", key.course_id, key.module_id)
}

fn ser<E: core::fmt::Display>(field: &'static str, e: E) -> StorageError {
    StorageError::Serialization(format!("invalid {field}: {e}"))
}

/// Persists the countdown of a quiz session, namespaced per (course, module).
///
/// Remaining seconds and the last-active instant (epoch milliseconds) live under
/// two keys, so a record is only considered present when both are.
#[derive(Clone)]
pub struct TimerStore {
    kv: Arc<dyn KeyValueStore>,
}

impl TimerStore {
    #[must_use]
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Overwrite the stored countdown for `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if either write fails.
    pub async fn save(
        &self,
        key: SessionKey,
        remaining_secs: u32,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.kv
            .set(&remaining_key(key), &remaining_secs.to_string())
            .await?;
        self.kv
            .set(&last_active_key(key), &now.timestamp_millis().to_string())
            .await?;
        tracing::trace!(%key, remaining_secs, "saved quiz timer");
        Ok(())
    }

    /// Read the stored countdown for `key`; `None` if no complete record exists.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if a stored field cannot be parsed,
    /// or the backend error if reading fails.
    pub async fn load(&self, key: SessionKey) -> Result<Option<TimerSnapshot>, StorageError> {
        let remaining = self.kv.get(&remaining_key(key)).await?;
        let last_active = self.kv.get(&last_active_key(key)).await?;
        let (Some(remaining), Some(last_active)) = (remaining, last_active) else {
            return Ok(None);
        };

        let remaining_secs: u32 = remaining
            .trim()
            .parse()
            .map_err(|e| ser("remaining seconds", e))?;
        let millis: i64 = last_active
            .trim()
            .parse()
            .map_err(|e| ser("last active timestamp", e))?;
        let last_active_at = DateTime::<Utc>::from_timestamp_millis(millis)
            .ok_or_else(|| ser("last active timestamp", millis))?;

        Ok(Some(TimerSnapshot::new(remaining_secs, last_active_at)))
    }

    /// Load and rehydrate: seconds left at `now`, clamped to `limit_secs`.
    ///
    /// # Errors
    ///
    /// Same as [`TimerStore::load`].
    pub async fn rehydrate(
        &self,
        key: SessionKey,
        now: DateTime<Utc>,
        limit_secs: u32,
    ) -> Result<Option<u32>, StorageError> {
        Ok(self
            .load(key)
            .await?
            .map(|snapshot| snapshot.effective_remaining(now, limit_secs)))
    }

    /// Remove the stored countdown for `key`. Clearing an absent record succeeds.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if either delete fails.
    pub async fn clear(&self, key: SessionKey) -> Result<(), StorageError> {
        self.kv.delete(&remaining_key(key)).await?;
        self.kv.delete(&last_active_key(key)).await?;
        tracing::debug!(%key, "cleared quiz timer");
        Ok(())
    }
}
