use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::domain::{Unit, UnitId};

/// Read cache fronting unit lookups. An optimization only: the lifecycle
/// manager treats a miss and a hit identically, so implementations are free
/// to drop entries at any time.
pub trait UnitCache: Send + Sync {
    fn get(&self, id: &UnitId) -> Option<Unit>;
    fn put(&self, unit: Unit);
    fn invalidate(&self, id: &UnitId);
}

/// In-process map cache with a fixed time-to-live per entry. Entries are
/// invalidated explicitly on unit mutation and otherwise expire passively;
/// there is no cross-process coherence.
pub struct TtlUnitCache {
    ttl: Duration,
    entries: Mutex<HashMap<UnitId, (Unit, Instant)>>,
}

impl TtlUnitCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl UnitCache for TtlUnitCache {
    fn get(&self, id: &UnitId) -> Option<Unit> {
        let mut guard = self.entries.lock().expect("unit cache mutex poisoned");
        match guard.get(id) {
            Some((unit, stored_at)) if stored_at.elapsed() < self.ttl => Some(unit.clone()),
            Some(_) => {
                guard.remove(id);
                None
            }
            None => None,
        }
    }

    fn put(&self, unit: Unit) {
        let mut guard = self.entries.lock().expect("unit cache mutex poisoned");
        guard.insert(unit.id.clone(), (unit, Instant::now()));
    }

    fn invalidate(&self, id: &UnitId) {
        let mut guard = self.entries.lock().expect("unit cache mutex poisoned");
        guard.remove(id);
    }
}

/// Cache that stores nothing, for deployments where stale unit reads are
/// unacceptable.
pub struct NoopUnitCache;

impl UnitCache for NoopUnitCache {
    fn get(&self, _id: &UnitId) -> Option<Unit> {
        None
    }

    fn put(&self, _unit: Unit) {}

    fn invalidate(&self, _id: &UnitId) {}
}
