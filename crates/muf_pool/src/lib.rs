// Copyright (c) 2026, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

//! Recyclable free-list pools. Two distinct shapes are needed:
//!
//! - [`CappedPool`] keeps up to a configured count of recycled items and
//!   frees the rest on `purge` — the frame free-list's behavior.
//! - [`GenerationalPool`] frees nothing on the purge that immediately
//!   follows a release, only on the *next* one, giving every released item
//!   one grace period before it is actually dropped — the for-node and
//!   try-node pools' behavior.

/// A pool that keeps at most `keep` recycled items; `purge` drops the
/// overflow.
pub struct CappedPool<T> {
    items: Vec<T>,
    keep: usize,
}

impl<T> CappedPool<T> {
    pub fn new(keep: usize) -> Self {
        CappedPool {
            items: Vec::new(),
            keep,
        }
    }

    pub fn release(&mut self, item: T) {
        self.items.push(item);
    }

    pub fn acquire(&mut self) -> Option<T> {
        self.items.pop()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drops items past the configured keep-count. Returns how many were
    /// dropped.
    pub fn purge(&mut self) -> usize {
        let len = self.items.len();
        if len > self.keep {
            let drop_count = len - self.keep;
            self.items.drain(0..drop_count);
            drop_count
        } else {
            0
        }
    }

    /// Drains the pool completely. Returns how many were dropped.
    pub fn purge_all(&mut self) -> usize {
        let n = self.items.len();
        self.items.clear();
        n
    }
}

/// A pool with a one-purge grace period: an item released just before a
/// `purge()` call survives that call and is only actually dropped on the
/// *following* `purge()`.
pub struct GenerationalPool<T> {
    recent: Vec<T>,
    old: Vec<T>,
}

impl<T> GenerationalPool<T> {
    pub fn new() -> Self {
        GenerationalPool {
            recent: Vec::new(),
            old: Vec::new(),
        }
    }

    pub fn release(&mut self, item: T) {
        self.recent.push(item);
    }

    pub fn acquire(&mut self) -> Option<T> {
        self.recent.pop().or_else(|| self.old.pop())
    }

    pub fn len(&self) -> usize {
        self.recent.len() + self.old.len()
    }

    /// Drops whatever survived the previous purge, then rolls everything
    /// released since into the "old" generation. Returns how many were
    /// dropped.
    pub fn purge(&mut self) -> usize {
        let freed = self.old.len();
        self.old.clear();
        self.old = std::mem::take(&mut self.recent);
        freed
    }
}

impl<T> Default for GenerationalPool<T> {
    fn default() -> Self {
        Self::new()
    }
}
