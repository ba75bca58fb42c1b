//! Short-lived cache of computed group analyses.
//!
//! Entries expire after a TTL and are dropped whenever a group changes. A
//! per-group generation counter keeps a slow reader from storing an analysis
//! computed on a snapshot that a concurrent write already made stale.

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
    time::{Duration, Instant},
};

use crate::GroupAnalysis;

#[derive(Debug)]
struct Entry {
    analysis: GroupAnalysis,
    generation: u64,
    stored_at: Instant,
}

#[derive(Debug, Default)]
struct State {
    entries: HashMap<i64, Entry>,
    generations: HashMap<i64, u64>,
}

#[derive(Debug)]
pub struct AnalysisCache {
    ttl: Duration,
    state: Mutex<State>,
}

impl AnalysisCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: Mutex::new(State::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current generation of `group_id`. Read it before loading the snapshot
    /// and pass it back to [`AnalysisCache::insert`].
    pub fn generation(&self, group_id: i64) -> u64 {
        self.lock()
            .generations
            .get(&group_id)
            .copied()
            .unwrap_or_default()
    }

    pub fn get(&self, group_id: i64) -> Option<GroupAnalysis> {
        if self.ttl.is_zero() {
            return None;
        }
        let mut state = self.lock();
        let current = state.generations.get(&group_id).copied().unwrap_or_default();
        let fresh = state
            .entries
            .get(&group_id)
            .is_some_and(|e| e.generation == current && e.stored_at.elapsed() < self.ttl);
        if fresh {
            return state.entries.get(&group_id).map(|e| e.analysis.clone());
        }
        state.entries.remove(&group_id);
        None
    }

    /// Stores `analysis` unless the group changed since `generation` was read.
    pub fn insert(&self, group_id: i64, generation: u64, analysis: GroupAnalysis) -> bool {
        if self.ttl.is_zero() {
            return false;
        }
        let mut state = self.lock();
        let current = state.generations.get(&group_id).copied().unwrap_or_default();
        if current != generation {
            return false;
        }
        state.entries.insert(
            group_id,
            Entry {
                analysis,
                generation,
                stored_at: Instant::now(),
            },
        );
        true
    }

    /// Call after every committed change to `group_id`.
    pub fn invalidate(&self, group_id: i64) {
        let mut state = self.lock();
        state.entries.remove(&group_id);
        let generation = state.generations.entry(group_id).or_default();
        *generation = generation.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::{Currency, Money};

    fn analysis(group_id: i64) -> GroupAnalysis {
        GroupAnalysis {
            group_id,
            currency: Currency::Inr,
            min_floor: Money::zero(Currency::Inr),
            members: Vec::new(),
            settlements: Vec::new(),
            total_spent: Money::zero(Currency::Inr),
            category_totals: Vec::new(),
            computed_at: Utc::now(),
        }
    }

    #[test]
    fn hit_until_invalidated() {
        let cache = AnalysisCache::new(Duration::from_secs(60));
        let generation = cache.generation(1);
        assert!(cache.insert(1, generation, analysis(1)));
        assert!(cache.get(1).is_some());
        cache.invalidate(1);
        assert!(cache.get(1).is_none());
    }

    #[test]
    fn stale_generation_is_not_stored() {
        let cache = AnalysisCache::new(Duration::from_secs(60));
        let generation = cache.generation(1);
        cache.invalidate(1);
        assert!(!cache.insert(1, generation, analysis(1)));
        assert!(cache.get(1).is_none());
    }

    #[test]
    fn zero_ttl_disables_caching() {
        let cache = AnalysisCache::new(Duration::ZERO);
        assert!(!cache.insert(1, 0, analysis(1)));
        assert!(cache.get(1).is_none());
    }

    #[test]
    fn groups_are_independent() {
        let cache = AnalysisCache::new(Duration::from_secs(60));
        cache.insert(1, 0, analysis(1));
        cache.insert(2, 0, analysis(2));
        cache.invalidate(2);
        assert!(cache.get(1).is_some());
        assert!(cache.get(2).is_none());
    }
}
