// Copyright (c) 2026, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

//! An in-memory `Scheduler`: a virtual clock plus three parking spots
//! (timers, read-waits, event-waits) a single-threaded driver loop polls,
//! standing in for a MUCK's real event queue and descriptor table.

use std::collections::HashMap;

use muf_host::Scheduler;
use muf_stack::Frame;
use muf_types::{ObjRef, Pid, ProgramId};

struct TimerEntry {
    fire_at: i64,
    pid: Pid,
}

struct ReadEntry {
    descr: i32,
    pid: Pid,
}

/// In-memory scheduler. Frames handed to [`Scheduler::delay`]/`read_wait`/
/// `park` live in `parked`, keyed by pid, until the demo driver (or a test)
/// pulls them back out via [`InMemoryScheduler::take_ready`] /
/// [`InMemoryScheduler::take_for_descr`] for re-entry through
/// `muf_engine::Dispatcher::run`.
#[derive(Default)]
pub struct InMemoryScheduler {
    pub clock: i64,
    parked: HashMap<Pid, Box<Frame>>,
    timers: Vec<TimerEntry>,
    reads: Vec<ReadEntry>,
}

impl InMemoryScheduler {
    pub fn new() -> Self {
        InMemoryScheduler::default()
    }

    /// Advances the virtual clock and returns every frame whose delay has
    /// now elapsed, in the order their timers were queued.
    pub fn advance(&mut self, seconds: i64) -> Vec<Box<Frame>> {
        self.clock += seconds;
        self.take_ready()
    }

    /// Pulls out every frame whose timer has already elapsed without
    /// advancing the clock further.
    pub fn take_ready(&mut self) -> Vec<Box<Frame>> {
        let clock = self.clock;
        let mut due = Vec::new();
        self.timers.retain(|t| {
            if t.fire_at <= clock {
                due.push(t.pid);
                false
            } else {
                true
            }
        });
        due.into_iter().filter_map(|pid| self.parked.remove(&pid)).collect()
    }

    /// Delivers a line of input to whichever frame is blocked reading on
    /// `descr`, if any.
    pub fn take_for_descr(&mut self, descr: i32) -> Option<Box<Frame>> {
        let idx = self.reads.iter().position(|r| r.descr == descr)?;
        let entry = self.reads.remove(idx);
        self.parked.remove(&entry.pid)
    }

    pub fn parked_len(&self) -> usize {
        self.parked.len()
    }
}

impl Scheduler for InMemoryScheduler {
    fn delay(&mut self, delay_secs: i64, _descriptor: i32, _player: ObjRef, _program: ProgramId, frame: Box<Frame>, _label: &str) {
        let pid = frame.pid;
        self.timers.push(TimerEntry { fire_at: self.clock + delay_secs, pid });
        self.parked.insert(pid, frame);
    }

    fn read_wait(&mut self, descriptor: i32, _player: ObjRef, _program: ProgramId, frame: Box<Frame>) {
        let pid = frame.pid;
        self.reads.push(ReadEntry { descr: descriptor, pid });
        self.parked.insert(pid, frame);
    }

    fn dequeue_timers(&mut self, pid: Pid) {
        self.timers.retain(|t| t.pid != pid);
        self.reads.retain(|r| r.pid != pid);
    }

    fn frame_by_pid(&mut self, pid: Pid) -> Option<&mut Frame> {
        self.parked.get_mut(&pid).map(|f| f.as_mut())
    }

    fn park(&mut self, pid: Pid, frame: Box<Frame>) {
        self.parked.insert(pid, frame);
    }
}
