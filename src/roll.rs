use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use parking_lot::Mutex;
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    error::RollError,
    store::{AppendOutcome, MAX_RESULT, RecordStore, RollEvent},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollResult {
    pub result: u8,
}

/// Hands out one uniform roll in `0..=MAX_RESULT` per user per civil day.
/// Daily uniqueness is decided by the store's conditional insert, so the
/// service keeps no roll state of its own.
#[derive(Clone)]
pub struct RollService {
    store: Arc<dyn RecordStore>,
    offset: FixedOffset,
    rng: Arc<Mutex<StdRng>>,
}

impl RollService {
    pub fn new(store: Arc<dyn RecordStore>, offset: FixedOffset) -> Self {
        Self::with_rng(store, offset, StdRng::from_entropy())
    }

    /// Seeded construction for deterministic tests.
    pub fn with_rng(store: Arc<dyn RecordStore>, offset: FixedOffset, rng: StdRng) -> Self {
        Self {
            store,
            offset,
            rng: Arc::new(Mutex::new(rng)),
        }
    }

    /// Roll for `user_id` at instant `now`. The event is durable before this
    /// returns `Ok`; on any error nothing was recorded.
    pub async fn roll(
        &self,
        user_id: &str,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<RollResult, RollError> {
        let local = now.with_timezone(&self.offset);
        let result = self.draw();
        let event = RollEvent {
            user_id: user_id.to_string(),
            username: username.to_string(),
            date: local.date_naive(),
            timestamp: local,
            result,
        };
        match self.store.append_unique(event).await? {
            AppendOutcome::Appended => Ok(RollResult { result }),
            AppendOutcome::DuplicateDay => Err(RollError::AlreadyRolledToday),
        }
    }

    fn draw(&self) -> u8 {
        self.rng.lock().gen_range(0..=MAX_RESULT)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::FixedOffset;

    use crate::{
        error::StoreError,
        store::{BackupHandle, MemoryStore},
    };

    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn service(store: Arc<dyn RecordStore>) -> RollService {
        RollService::with_rng(
            store,
            FixedOffset::east_opt(0).unwrap(),
            StdRng::seed_from_u64(0xD1CE),
        )
    }

    #[tokio::test]
    async fn second_roll_same_day_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let rolls = service(store.clone());

        rolls
            .roll("u1", "alice", utc("2026-08-23T08:00:00Z"))
            .await
            .unwrap();
        let err = rolls
            .roll("u1", "alice", utc("2026-08-23T21:30:00Z"))
            .await
            .unwrap_err();

        assert!(matches!(err, RollError::AlreadyRolledToday));
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn next_civil_day_allows_a_new_roll() {
        let store = Arc::new(MemoryStore::new());
        let rolls = service(store.clone());

        rolls
            .roll("u1", "alice", utc("2026-08-23T23:50:00Z"))
            .await
            .unwrap();
        rolls
            .roll("u1", "alice", utc("2026-08-24T00:10:00Z"))
            .await
            .unwrap();

        assert_eq!(store.list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn civil_date_follows_the_configured_offset() {
        let store = Arc::new(MemoryStore::new());
        let rolls = RollService::with_rng(
            store.clone(),
            FixedOffset::east_opt(10 * 3600).unwrap(),
            StdRng::seed_from_u64(7),
        );

        // 20:00 UTC is already past midnight at UTC+10.
        rolls
            .roll("u1", "alice", utc("2026-08-23T20:00:00Z"))
            .await
            .unwrap();

        let events = store.list_all().await.unwrap();
        assert_eq!(events[0].date, "2026-08-24".parse().unwrap());
        assert_eq!(events[0].timestamp.date_naive(), events[0].date);
    }

    #[tokio::test]
    async fn draws_are_within_range() {
        let rolls = service(Arc::new(MemoryStore::new()));
        for _ in 0..10_000 {
            assert!(rolls.draw() <= MAX_RESULT);
        }
    }

    #[tokio::test]
    async fn draws_are_roughly_uniform() {
        let rolls = service(Arc::new(MemoryStore::new()));
        let buckets = usize::from(MAX_RESULT) + 1;
        let per_bucket = 200u32;
        let samples = buckets as u32 * per_bucket;

        let mut counts = vec![0u32; buckets];
        for _ in 0..samples {
            counts[usize::from(rolls.draw())] += 1;
        }

        let expected = f64::from(per_bucket);
        let chi_square: f64 = counts
            .iter()
            .map(|&observed| {
                let delta = f64::from(observed) - expected;
                delta * delta / expected
            })
            .sum();

        // 100 degrees of freedom; the 0.001 critical value is ~149.
        assert!(
            chi_square < 170.0,
            "chi-square {chi_square:.1} suggests non-uniform rolls"
        );
    }

    struct RefusingStore;

    #[async_trait]
    impl RecordStore for RefusingStore {
        async fn append(&self, _event: RollEvent) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("offline".into()))
        }

        async fn append_unique(&self, _event: RollEvent) -> Result<AppendOutcome, StoreError> {
            Err(StoreError::Unavailable("offline".into()))
        }

        async fn list_all(&self) -> Result<Vec<RollEvent>, StoreError> {
            Err(StoreError::Unavailable("offline".into()))
        }

        async fn backup(&self, _name: &str) -> Result<BackupHandle, StoreError> {
            Err(StoreError::Unavailable("offline".into()))
        }
    }

    #[tokio::test]
    async fn store_failure_means_the_roll_did_not_happen() {
        let rolls = service(Arc::new(RefusingStore));
        let err = rolls
            .roll("u1", "alice", utc("2026-08-23T08:00:00Z"))
            .await
            .unwrap_err();
        assert!(matches!(err, RollError::PersistenceFailed(_)));
    }
}
