// Copyright (c) 2026, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

//! The process-wide recyclable pools (spec.md §4.6): frames use a capped
//! free list, for-nodes and try-nodes use the two-phase generational pool.
//! Grounded in `purge_free_frames`/`purge_for_pool`/`purge_try_pool`
//! (`examples/original_source/fbmuck/src/interp.c:379,404,424`).

use muf_pool::{CappedPool, GenerationalPool};
use muf_stack::{ForNode, Frame, TryNode};

/// The three process-wide pools a running engine keeps. Only one frame
/// executes at a time (spec.md §5), so no synchronization is needed.
pub struct Pools {
    pub free_frames: CappedPool<Box<Frame>>,
    pub for_nodes: GenerationalPool<ForNode>,
    pub try_nodes: GenerationalPool<TryNode>,
}

impl Pools {
    pub fn new(keep_frames: usize) -> Self {
        Pools {
            free_frames: CappedPool::new(keep_frames),
            for_nodes: GenerationalPool::new(),
            try_nodes: GenerationalPool::new(),
        }
    }

    /// `purge_free_frames`: drop frames past the configured keep-count.
    pub fn purge_frames(&mut self) -> usize {
        self.free_frames.purge()
    }

    /// `purge_all_free_frames`: drain the frame pool completely, e.g. on
    /// shutdown.
    pub fn purge_all_frames(&mut self) -> usize {
        self.free_frames.purge_all()
    }

    /// `purge_for_pool`/`purge_try_pool`: a single call only reclaims nodes
    /// already one purge old; callers wanting a full drain call this twice.
    pub fn purge_for_nodes(&mut self) -> usize {
        self.for_nodes.purge()
    }

    pub fn purge_try_nodes(&mut self) -> usize {
        self.try_nodes.purge()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_and_try_pools_purge_independently_with_grace_period() {
        let mut pools = Pools::new(4);
        pools.for_nodes.release(ForNode { current: 0, end: 1, step: 1, did_first: false });
        assert_eq!(pools.purge_for_nodes(), 0);
        pools.for_nodes.release(ForNode { current: 0, end: 1, step: 1, did_first: false });
        assert_eq!(pools.purge_for_nodes(), 1);
    }
}
