// Copyright (c) 2026, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

//! Inter-frame wait/notify (spec.md §4.7): `wait-for-pid` semantics,
//! grounded in `watchpid_process`
//! (`examples/original_source/fbmuck/src/interp.c:711`).

use muf_host::{EventBus, Scheduler};
use muf_types::{Pid, Value};

/// Runs on frame termination (normal or aborted): for every frame `pid` was
/// waiting on, removes `pid` from that frame's waiter list; for every frame
/// waiting on `pid`, posts `"PROC.EXIT.<pid>"` carrying `pid` and removes
/// `pid` from that frame's waitee list.
///
/// (P1): a waiter only ever receives the event if it registered before
/// `pid` terminated — by construction, since the waiter list is only
/// populated by prior registration and this function runs exactly once,
/// at termination.
pub fn watchpid_process(pid: Pid, waitees: &[Pid], waiters: &[Pid], scheduler: &mut impl Scheduler, events: &mut impl EventBus) {
    for &waitee_pid in waitees {
        if let Some(frame) = scheduler.frame_by_pid(waitee_pid) {
            frame.waiters.retain(|&p| p != pid);
        }
    }
    for &waiter_pid in waiters {
        let event_name = format!("PROC.EXIT.{}", pid);
        events.post(waiter_pid, &event_name, Value::Integer(pid));
        if let Some(frame) = scheduler.frame_by_pid(waiter_pid) {
            frame.waitees.retain(|&p| p != pid);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use muf_host::HostError;
    use muf_stack::Frame;
    use muf_types::ProgramId;
    use std::collections::HashMap;

    struct FakeScheduler {
        frames: HashMap<Pid, Frame>,
    }

    impl Scheduler for FakeScheduler {
        fn delay(&mut self, _delay_secs: i64, _descr: i32, _player: muf_types::ObjRef, _program: ProgramId, _frame: Box<Frame>, _label: &str) {}
        fn read_wait(&mut self, _descr: i32, _player: muf_types::ObjRef, _program: ProgramId, _frame: Box<Frame>) {}
        fn dequeue_timers(&mut self, _pid: Pid) {}
        fn frame_by_pid(&mut self, pid: Pid) -> Option<&mut Frame> {
            self.frames.get_mut(&pid)
        }
        fn park(&mut self, _pid: Pid, _frame: Box<Frame>) {}
    }

    #[derive(Default)]
    struct FakeEvents {
        posted: Vec<(Pid, String, i64)>,
    }

    impl EventBus for FakeEvents {
        fn register(&mut self, _player: muf_types::ObjRef, _program: ProgramId, _pid: Pid, _names: &[String]) {}
        fn post(&mut self, pid: Pid, name: &str, value: muf_types::Value) {
            let n = match value {
                muf_types::Value::Integer(n) => n,
                _ => -1,
            };
            self.posted.push((pid, name.to_string(), n));
        }
        fn purge(&mut self, _pid: Pid) {}
    }

    fn unused(_: HostError) {}

    #[test]
    fn terminating_frame_notifies_waiters_and_unregisters_from_waitees() {
        let mut waiter_frame = Frame::new(2, 0, 1, 3, 1);
        waiter_frame.waitees.push(1);
        let mut waitee_frame = Frame::new(3, 0, 1, 3, 1);
        waitee_frame.waiters.push(1);

        let mut scheduler = FakeScheduler {
            frames: HashMap::from([(2, waiter_frame), (3, waitee_frame)]),
        };
        let mut events = FakeEvents::default();

        watchpid_process(1, &[3], &[2], &mut scheduler, &mut events);

        assert_eq!(events.posted, vec![(2, "PROC.EXIT.1".to_string(), 1)]);
        assert!(scheduler.frames[&2].waitees.is_empty());
        assert!(scheduler.frames[&3].waiters.is_empty());
        let _ = unused;
    }
}
