// Copyright (c) 2026, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

//! Suspension-point handoff for `SLEEP`/`READ`/`EVENT_WAITFOR` (spec.md
//! §4.3's cooperative-scheduling notes), grounded in the `IN_SLEEP`/
//! `IN_READ`/`IN_EVENT_WAITFOR` cases of `interp_loop`
//! (`examples/original_source/fbmuck/src/interp.c:1667-1701`).
//!
//! Validation (stack argument, permission, `write_only`) and `pc`
//! advancement happen in `crate::dispatcher` while it still only holds a
//! `&mut Frame`; these functions run only once that has already succeeded,
//! and do the one thing that needs full ownership of the boxed frame:
//! handing it to the scheduler (or event bus, via `park`) so it survives
//! until re-entry.

use muf_host::{Io, Scheduler};
use muf_stack::Frame;
use muf_types::ObjRef;

/// `SLEEP`: hands the frame to the scheduler's timer queue for re-entry
/// after `delay` seconds.
pub fn sleep(frame: Box<Frame>, delay: i64, player: ObjRef, scheduler: &mut impl Scheduler) {
    let descr = frame.descriptor;
    let program = frame.pc.program;
    scheduler.delay(delay, descr, player, program, frame, "SLEEP");
}

/// `READ`: blocks the player's descriptor for further input and hands the
/// frame to the scheduler's read queue.
pub fn read(frame: Box<Frame>, player: ObjRef, io: &mut impl Io, scheduler: &mut impl Scheduler) {
    io.set_block(player, true);
    let descr = frame.descriptor;
    let program = frame.pc.program;
    scheduler.read_wait(descr, player, program, frame);
}

/// `EVENT_WAITFOR`: the frame already registered itself with the event bus
/// by pid (`crate::control::event_waitfor`); parks it with the scheduler so
/// `Scheduler::frame_by_pid` can still find it (spec.md §4.7's waiter-list
/// bookkeeping) until a matching event re-enters it.
pub fn event_wait(frame: Box<Frame>, scheduler: &mut impl Scheduler) {
    let pid = frame.pid;
    scheduler.park(pid, frame);
}
