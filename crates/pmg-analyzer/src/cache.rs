//! A per-run analysis cache keyed by fingerprint (§4.5, "Caching"). Guarantees
//! at-most-one analysis call per `(ecosystem, name, version)` per run regardless of how
//! many call sites (guard aggregation, proxy interceptors) see that artifact — this is
//! testable property P3.

use pmg_common::{AnalysisVerdict, Fingerprint};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

enum Slot {
    Ready(AnalysisVerdict),
    InFlight(Arc<Notify>),
}

#[derive(Clone, Default)]
pub struct VerdictCache {
    inner: Arc<Mutex<HashMap<Fingerprint, Slot>>>,
}

/// The result of [`VerdictCache::get_or_reserve`]: either the fingerprint was already
/// resolved, or the caller now holds the sole right to compute it.
pub enum CacheLookup {
    Hit(AnalysisVerdict),
    Reserved(VerdictReservation),
}

/// Holds the right to compute a fingerprint's verdict. Must be resolved with
/// [`VerdictReservation::fulfill`] or [`VerdictReservation::abandon`] so callers racing
/// on the same fingerprint (who are parked in `get_or_reserve`) get woken either way.
pub struct VerdictReservation {
    cache: VerdictCache,
    fingerprint: Fingerprint,
    notify: Arc<Notify>,
}

impl VerdictReservation {
    pub async fn fulfill(self, verdict: AnalysisVerdict) {
        self.cache.inner.lock().await.insert(self.fingerprint.clone(), Slot::Ready(verdict));
        self.notify.notify_waiters();
    }

    /// The analysis call failed; release the reservation so the next waiter retries
    /// rather than being stuck waiting on a slot that will never resolve.
    pub async fn abandon(self) {
        self.cache.inner.lock().await.remove(&self.fingerprint);
        self.notify.notify_waiters();
    }
}

impl VerdictCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically check the cache and, on a miss, reserve the fingerprint for the
    /// caller so no other concurrent caller can also miss and issue a redundant
    /// analysis call (P3: at most one analyzer call per fingerprint per run).
    pub async fn get_or_reserve(&self, fingerprint: &Fingerprint) -> CacheLookup {
        loop {
            let wait_on = {
                let mut guard = self.inner.lock().await;
                match guard.get(fingerprint) {
                    Some(Slot::Ready(verdict)) => return CacheLookup::Hit(verdict.clone()),
                    Some(Slot::InFlight(notify)) => Some(Arc::clone(notify)),
                    None => {
                        let notify = Arc::new(Notify::new());
                        guard.insert(fingerprint.clone(), Slot::InFlight(Arc::clone(&notify)));
                        return CacheLookup::Reserved(VerdictReservation {
                            cache: self.clone(),
                            fingerprint: fingerprint.clone(),
                            notify,
                        });
                    }
                }
            };
            // Someone else is already computing this fingerprint; wait for them to
            // fulfill or abandon it, then re-check the slot.
            if let Some(notify) = wait_on {
                notify.notified().await;
            }
        }
    }

    pub async fn get(&self, fingerprint: &Fingerprint) -> Option<AnalysisVerdict> {
        match self.inner.lock().await.get(fingerprint) {
            Some(Slot::Ready(verdict)) => Some(verdict.clone()),
            _ => None,
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.values().filter(|slot| matches!(slot, Slot::Ready(_))).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmg_common::{Ecosystem, PackageVersion, VerdictKind};

    fn make_verdict(pkg: &PackageVersion) -> AnalysisVerdict {
        AnalysisVerdict {
            pkg_version: pkg.clone(),
            kind: VerdictKind::Safe,
            summary: None,
            reference_url: None,
        }
    }

    #[tokio::test]
    async fn reserve_then_fulfill_round_trips() {
        let cache = VerdictCache::new();
        let pkg = PackageVersion::new(Ecosystem::Npm, "lodash", "4.17.21");
        let fp = pkg.fingerprint();

        assert!(cache.get(&fp).await.is_none());
        let reservation = match cache.get_or_reserve(&fp).await {
            CacheLookup::Reserved(r) => r,
            CacheLookup::Hit(_) => panic!("expected a miss on an empty cache"),
        };
        reservation.fulfill(make_verdict(&pkg)).await;
        assert_eq!(cache.get(&fp).await.unwrap().kind, VerdictKind::Safe);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn concurrent_misses_on_the_same_fingerprint_dedup_to_one_reservation() {
        let cache = VerdictCache::new();
        let pkg = PackageVersion::new(Ecosystem::Npm, "left-pad", "1.3.0");
        let fp = pkg.fingerprint();

        let first = cache.get_or_reserve(&fp).await;
        assert!(matches!(first, CacheLookup::Reserved(_)));

        let cache_clone = cache.clone();
        let fp_clone = fp.clone();
        let waiter = tokio::spawn(async move { cache_clone.get_or_reserve(&fp_clone).await });

        // Give the waiter a chance to park on the in-flight slot before fulfilling it.
        tokio::task::yield_now().await;
        if let CacheLookup::Reserved(reservation) = first {
            reservation.fulfill(make_verdict(&pkg)).await;
        }

        match waiter.await.unwrap() {
            CacheLookup::Hit(verdict) => assert_eq!(verdict.kind, VerdictKind::Safe),
            CacheLookup::Reserved(_) => panic!("second caller should have observed the fulfilled slot"),
        }
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn abandoned_reservation_lets_the_next_caller_retry() {
        let cache = VerdictCache::new();
        let pkg = PackageVersion::new(Ecosystem::Npm, "left-pad", "1.3.0");
        let fp = pkg.fingerprint();

        let reservation = match cache.get_or_reserve(&fp).await {
            CacheLookup::Reserved(r) => r,
            CacheLookup::Hit(_) => panic!("expected a miss on an empty cache"),
        };
        reservation.abandon().await;

        match cache.get_or_reserve(&fp).await {
            CacheLookup::Reserved(_) => {}
            CacheLookup::Hit(_) => panic!("abandoned reservation should not leave a cached hit"),
        }
    }
}
