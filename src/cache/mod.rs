//! In-memory inference cache with per-key single-flight protection.
//!
//! The cache enforces the gateway's central concurrency contract: under
//! concurrent requests bearing the same [`FeatureKey`], the model is
//! invoked at most once, exactly one caller observes a miss (and owns the
//! ledger write), and distinct keys never block one another.
//!
//! Each key owns a [`tokio::sync::OnceCell`]; the map of cells is guarded
//! by a plain mutex that is only held for the map lookup, never across the
//! model invocation. A failed invocation leaves the cell empty so a later
//! request can retry — the per-key exclusion is released on every exit
//! path, including panics inside the model.
//!
//! Entries live for the process lifetime. There is no eviction; a capacity
//! bound would be a production hardening step outside the current contract.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OnceCell;

use crate::model::{Classifier, FeatureVector, ModelError};

/// Canonical cache key for a feature vector: the four IEEE-754 bit
/// patterns, in field order.
///
/// Two vectors map to the same key iff all four fields are bit-for-bit
/// equal — no rounding or normalization, so `0.0` and `-0.0` are distinct
/// keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeatureKey([u64; 4]);

impl From<&FeatureVector> for FeatureKey {
    fn from(features: &FeatureVector) -> Self {
        Self([
            features.sepal_length.to_bits(),
            features.sepal_width.to_bits(),
            features.petal_length.to_bits(),
            features.petal_width.to_bits(),
        ])
    }
}

/// Outcome of a cache resolution.
///
/// `hit` is `false` for exactly one caller per first resolution of a key —
/// that caller is responsible for appending the ledger record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub class: i64,
    pub hit: bool,
}

/// Concurrency-safe map from [`FeatureKey`] to predicted class.
#[derive(Default)]
pub struct SingleFlightCache {
    cells: Mutex<HashMap<FeatureKey, Arc<OnceCell<i64>>>>,
}

impl SingleFlightCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with a settled value. Pending invocations don't count.
    pub fn len(&self) -> usize {
        self.lock_cells()
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Looks up the class for `features`, invoking `model` on a miss.
    ///
    /// Concurrent callers with the same key share one in-flight invocation:
    /// the caller whose closure actually ran observes `hit == false`, all
    /// others wait for the settled value and observe `hit == true`. The
    /// cache is populated before this returns, so the ledger write happens
    /// outside the per-key critical section.
    ///
    /// # Errors
    ///
    /// Propagates [`ModelError`] from the model. The key is left unsettled,
    /// so the next request for it retries the invocation.
    pub async fn resolve(
        &self,
        features: &FeatureVector,
        model: &dyn Classifier,
    ) -> Result<Resolution, ModelError> {
        let key = FeatureKey::from(features);

        let cell = {
            let mut cells = self.lock_cells();
            Arc::clone(cells.entry(key).or_default())
        };

        if let Some(&class) = cell.get() {
            return Ok(Resolution { class, hit: true });
        }

        let mut invoked = false;
        let class = *cell
            .get_or_try_init(|| {
                invoked = true;
                model.classify(features)
            })
            .await?;

        Ok(Resolution {
            class,
            hit: !invoked,
        })
    }

    fn lock_cells(&self) -> std::sync::MutexGuard<'_, HashMap<FeatureKey, Arc<OnceCell<i64>>>> {
        // Held only for map operations; a poisoned lock means a panic
        // during one of those, which is unrecoverable anyway.
        self.cells.lock().expect("cache map lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    struct CountingClassifier {
        invocations: AtomicUsize,
        delay: Duration,
    }

    impl CountingClassifier {
        fn new(delay: Duration) -> Self {
            Self {
                invocations: AtomicUsize::new(0),
                delay,
            }
        }

        fn count(&self) -> usize {
            self.invocations.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Classifier for CountingClassifier {
        async fn classify(&self, features: &FeatureVector) -> Result<i64, ModelError> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(features.petal_length as i64)
        }
    }

    struct FailingClassifier;

    #[async_trait]
    impl Classifier for FailingClassifier {
        async fn classify(&self, _features: &FeatureVector) -> Result<i64, ModelError> {
            Err(ModelError::Inference("backend offline".to_owned()))
        }
    }

    fn vector(petal_length: f64) -> FeatureVector {
        FeatureVector::new(5.0, 3.0, petal_length, 1.0)
    }

    #[test]
    fn key_is_bit_exact() {
        assert_eq!(
            FeatureKey::from(&vector(1.0)),
            FeatureKey::from(&vector(1.0))
        );
        assert_ne!(
            FeatureKey::from(&vector(1.0)),
            FeatureKey::from(&vector(1.0 + f64::EPSILON))
        );
        // Sign of zero matters: equality is on bit patterns, not values.
        assert_ne!(
            FeatureKey::from(&vector(0.0)),
            FeatureKey::from(&vector(-0.0))
        );
    }

    #[tokio::test]
    async fn miss_then_hit() {
        let cache = SingleFlightCache::new();
        let model = CountingClassifier::new(Duration::ZERO);

        let first = cache.resolve(&vector(3.0), &model).await.unwrap();
        assert_eq!(first, Resolution { class: 3, hit: false });

        let second = cache.resolve(&vector(3.0), &model).await.unwrap();
        assert_eq!(second, Resolution { class: 3, hit: true });

        assert_eq!(model.count(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_same_key_invokes_model_once() {
        let cache = Arc::new(SingleFlightCache::new());
        let model = Arc::new(CountingClassifier::new(Duration::from_millis(20)));

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let cache = Arc::clone(&cache);
            let model = Arc::clone(&model);
            tasks.push(tokio::spawn(async move {
                cache.resolve(&vector(4.0), model.as_ref()).await.unwrap()
            }));
        }

        let mut misses = 0;
        for task in tasks {
            let resolution = task.await.unwrap();
            assert_eq!(resolution.class, 4);
            if !resolution.hit {
                misses += 1;
            }
        }

        assert_eq!(model.count(), 1);
        assert_eq!(misses, 1, "exactly one caller owns the first resolution");
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn distinct_keys_do_not_serialize() {
        let cache = Arc::new(SingleFlightCache::new());
        let model = Arc::new(CountingClassifier::new(Duration::from_millis(100)));

        let (first_vector, second_vector) = (vector(1.0), vector(2.0));
        let start = tokio::time::Instant::now();
        let (a, b) = tokio::join!(
            cache.resolve(&first_vector, model.as_ref()),
            cache.resolve(&second_vector, model.as_ref()),
        );
        let elapsed = start.elapsed();

        assert_eq!(a.unwrap().class, 1);
        assert_eq!(b.unwrap().class, 2);
        assert_eq!(model.count(), 2);
        // Paused-clock run: serialized invocations would take 200ms.
        assert!(elapsed < Duration::from_millis(150), "keys blocked each other: {elapsed:?}");
    }

    #[tokio::test]
    async fn model_failure_leaves_key_retryable() {
        let cache = SingleFlightCache::new();

        let err = cache.resolve(&vector(5.0), &FailingClassifier).await;
        assert!(err.is_err());
        assert!(cache.is_empty());

        // The exclusion was released; a healthy model can now settle the key.
        let model = CountingClassifier::new(Duration::ZERO);
        let resolution = cache.resolve(&vector(5.0), &model).await.unwrap();
        assert_eq!(resolution, Resolution { class: 5, hit: false });
        assert_eq!(cache.len(), 1);
    }
}
