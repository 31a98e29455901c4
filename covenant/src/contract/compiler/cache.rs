// Copyright Judica, Inc 2021
//
// This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Caches for compiled contracts, derived scripts, and guards
use crate::contract::{CompilationError, Fields, GuardFn};
use covenant_base::Clause;
use log::{debug, trace};
use once_cell::sync::OnceCell;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, ThreadId};

const LOG_TARGET: &str = "covenant::cache";

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Which thread is filling each cell, and which cell each blocked thread is
/// waiting on.
struct Waits<K> {
    filling: HashMap<K, ThreadId>,
    waiting: HashMap<ThreadId, K>,
}

impl<K: Eq + Hash> Waits<K> {
    /// Would `me` waiting on `k` close a cycle? Follows filler to the cell
    /// it waits on until the chain ends or comes back to `me`. Each thread
    /// waits on at most one cell, so a longer chain than there are waiters
    /// has looped without `me`.
    fn closes_cycle(&self, me: ThreadId, k: &K) -> bool {
        let mut key = k;
        for _ in 0..=self.waiting.len() {
            match self.filling.get(key) {
                Some(t) if *t == me => return true,
                Some(t) => match self.waiting.get(t) {
                    Some(next) => key = next,
                    None => return false,
                },
                None => return false,
            }
        }
        false
    }
}

/// A read-through map that computes each value at most once, even when many
/// threads ask for the same key at the same time. The map lock is only held
/// long enough to fetch the key's cell; waiters block on the cell itself and
/// all receive the value the first successful initializer stored. A failed
/// initialization leaves the cell empty, so errors are never cached.
///
/// Values may depend on other keys of the same map. Before blocking on a
/// cell another thread is filling, the waits are checked for a cycle, so two
/// threads filling cells that need each other fail with `on_cycle` instead
/// of blocking forever. A thread asking for a cell it is filling itself is
/// the same cycle with one member.
pub(crate) struct OnceMap<K, V> {
    name: &'static str,
    cells: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
    waits: Mutex<Waits<K>>,
}

impl<K: Eq + Hash + Clone, V: Clone> OnceMap<K, V> {
    pub(crate) fn new(name: &'static str) -> Self {
        OnceMap {
            name,
            cells: Mutex::new(HashMap::new()),
            waits: Mutex::new(Waits {
                filling: HashMap::new(),
                waiting: HashMap::new(),
            }),
        }
    }

    pub(crate) fn get_or_try_init<C, F>(
        &self,
        k: &K,
        on_cycle: C,
        f: F,
    ) -> Result<V, CompilationError>
    where
        C: FnOnce() -> CompilationError,
        F: FnOnce() -> Result<V, CompilationError>,
    {
        let cell = lock(&self.cells)
            .entry(k.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();
        if let Some(v) = cell.get() {
            trace!(target: LOG_TARGET, "{} cache hit", self.name);
            return Ok(v.clone());
        }
        let me = thread::current().id();
        {
            let mut waits = lock(&self.waits);
            if waits.closes_cycle(me, k) {
                debug!(target: LOG_TARGET, "{} cache wait would deadlock", self.name);
                return Err(on_cycle());
            }
            waits.waiting.insert(me, k.clone());
        }
        let r = cell
            .get_or_try_init(|| {
                {
                    let mut waits = lock(&self.waits);
                    waits.waiting.remove(&me);
                    waits.filling.insert(k.clone(), me);
                }
                let r = f();
                lock(&self.waits).filling.remove(k);
                r
            })
            .map(Clone::clone);
        lock(&self.waits).waiting.remove(&me);
        r
    }

    pub(crate) fn len(&self) -> usize {
        lock(&self.cells)
            .values()
            .filter(|c| c.get().is_some())
            .count()
    }
}

/// GuardCache evaluates each guard function at most once per contract
/// compile, so paths sharing a guard share its clause.
pub(crate) struct GuardCache {
    cache: BTreeMap<usize, Clause>,
}

impl GuardCache {
    pub(crate) fn new() -> Self {
        GuardCache {
            cache: BTreeMap::new(),
        }
    }

    pub(crate) fn get(&mut self, fields: &Fields, g: GuardFn) -> Result<Clause, CompilationError> {
        match self.cache.entry(g as usize) {
            Entry::Vacant(v) => Ok(v.insert(g(fields)?.reduce()).clone()),
            Entry::Occupied(o) => Ok(o.get().clone()),
        }
    }
}
