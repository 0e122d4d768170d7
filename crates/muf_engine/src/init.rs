// Copyright (c) 2026, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

//! Frame initialization and cleanup (spec.md §4.4, §4.5), grounded in
//! `interp()` (`examples/original_source/fbmuck/src/interp.c:444`) and
//! `prog_clean()` (`examples/original_source/fbmuck/src/interp.c:769`).

use muf_host::{Database, EventBus, Io, ObjType, Scheduler};
use muf_stack::{Frame, MultitaskMode, ProgramCounter};
use muf_types::{ObjRef, Pid, ProgramId, Value, NOTHING};

use crate::error::EngineError;
use crate::permissions::PermMode;
use crate::pools::Pools;
use crate::watch::watchpid_process;

/// Everything the caller supplies to start a new program invocation
/// (spec.md §4.4's parameter list to `interp(...)`).
pub struct InterpRequest {
    pub descr: i32,
    pub player: ObjRef,
    pub location: ObjRef,
    pub program: ProgramId,
    pub source: ObjRef,
    pub multitask_mode: MultitaskMode,
    pub perm_mode: PermMode,
    pub forced_pid: Option<Pid>,
    pub match_cmdname: Option<String>,
    pub match_args: Option<String>,
    pub rng_seed: u64,
}

/// Monotonic pid allocator, one per running engine (spec.md §9's
/// `top_pid`).
#[derive(Default)]
pub struct PidSource {
    next: Pid,
}

impl PidSource {
    pub fn new(start: Pid) -> Self {
        PidSource { next: start }
    }

    pub fn alloc(&mut self) -> Pid {
        let pid = self.next;
        self.next += 1;
        pid
    }
}

/// Allocates or recycles a frame and populates it per spec.md §4.4.
/// Permission is checked up front: the program and its owner must have a
/// nonzero permission level, and if a source is supplied, its owner must
/// either be a true wizard or authorized to link to the program.
pub fn interp(
    req: InterpRequest,
    db: &mut impl Database,
    io: &mut impl Io,
    pools: &mut Pools,
    pids: &mut PidSource,
) -> Result<Box<Frame>, EngineError> {
    if db.mlevel(req.program) == 0
        || db.mlevel(db.owner(req.program)) == 0
        || (req.source != NOTHING
            && !db.is_true_wizard(db.owner(req.source))
            && !db.can_link_to(db.owner(req.source), req.program))
    {
        io.notify(req.player, "Program call: Permission denied.");
        return Err(EngineError::PermissionDenied);
    }

    let pid = req.forced_pid.unwrap_or_else(|| pids.alloc());
    let mut frame = pools
        .free_frames
        .acquire()
        .unwrap_or_else(|| Box::new(Frame::new(pid, req.descr, req.program, 0, req.rng_seed)));
    *frame = Frame::new(pid, req.descr, req.program, db.mlevel(req.program), req.rng_seed);

    frame.multitask_mode = req.multitask_mode;
    frame.caller_chain.push(req.source);
    frame.caller_chain.push(req.program);
    frame
        .system_stack
        .push(ProgramCounter { program: 0, offset: 0 })
        .expect("fresh system stack has room for the sentinel entry");

    frame.globals.set(0, Value::ObjectRef(req.player), db);
    frame.globals.set(1, Value::ObjectRef(req.location), db);
    frame.globals.set(2, Value::ObjectRef(req.source), db);
    let cmdname = req.match_cmdname.filter(|s| !s.is_empty());
    frame.globals.set(
        3,
        match cmdname {
            Some(s) => Value::Str(std::rc::Rc::from(s.as_str())),
            None => Value::Str(std::rc::Rc::from("")),
        },
        db,
    );

    let args = req.match_args.unwrap_or_default();
    frame
        .operand_stack
        .push(Value::Str(std::rc::Rc::from(args.as_str())))
        .expect("fresh operand stack has room for the seed argument");

    frame.write_only = req.source == NOTHING
        || db.typeof_obj(req.source) == ObjType::Room
        || (db.typeof_obj(req.source) == ObjType::Player && !io.is_online(req.source))
        || db.flags(req.player).readmode;

    db.instance_inc(req.program);

    Ok(frame)
}

/// Idempotent frame teardown (spec.md §4.5): notifies waiters, clears every
/// owned value, decrements instance counts along the caller chain, returns
/// for-/try-nodes to their pools, and pushes the frame onto the free list.
/// A frame already on the free list is left untouched (double-free guard).
pub fn prog_clean(mut frame: Box<Frame>, db: &mut impl Database, scheduler: &mut impl Scheduler, events: &mut impl EventBus, pools: &mut Pools) {
    watchpid_process(frame.pid, &frame.waitees, &frame.waiters, scheduler, events);
    frame.waitees.clear();
    frame.waiters.clear();

    frame.operand_stack.clear_all(db);
    // Caller chain's entry 0 is the source (a room/player/exit, never a
    // program whose instance count the engine tracks); only entries from
    // index 1 on are programs.
    for &program in frame.caller_chain.iter().skip(1) {
        db.instance_dec(program);
    }
    frame.globals.clear_all(db);
    frame.locals.clear_all(db);
    while frame.scoped.pop(db).is_some() {}

    while let Some(node) = frame.for_stack.pop() {
        pools.for_nodes.release(node);
    }
    while let Some(node) = frame.try_stack.pop() {
        pools.try_nodes.release(node);
    }

    events.purge(frame.pid);
    scheduler.dequeue_timers(frame.pid);

    pools.free_frames.release(frame);
}

#[cfg(test)]
mod tests {
    use super::*;
    use muf_host::{CompiledProgram, HostError, ObjectFlags};
    use std::collections::HashMap;
    use std::time::Duration;

    struct FakeDb {
        mlevel: HashMap<ObjRef, u8>,
        owner: HashMap<ObjRef, ObjRef>,
        flags: HashMap<ObjRef, ObjectFlags>,
        instances: HashMap<ProgramId, u32>,
    }

    impl Database for FakeDb {
        fn flags(&self, obj: ObjRef) -> ObjectFlags {
            self.flags.get(&obj).copied().unwrap_or_default()
        }
        fn owner(&self, obj: ObjRef) -> ObjRef {
            *self.owner.get(&obj).unwrap_or(&obj)
        }
        fn mlevel(&self, obj: ObjRef) -> u8 {
            *self.mlevel.get(&obj).unwrap_or(&3)
        }
        fn is_true_wizard(&self, _obj: ObjRef) -> bool {
            true
        }
        fn controls(&self, _player: ObjRef, _program: ProgramId) -> bool {
            true
        }
        fn can_link_to(&self, _owner: ObjRef, _program: ProgramId) -> bool {
            true
        }
        fn valid(&self, _obj: ObjRef) -> bool {
            true
        }
        fn typeof_obj(&self, _obj: ObjRef) -> ObjType {
            ObjType::Player
        }
        fn code(&self, _program: ProgramId) -> Option<std::rc::Rc<CompiledProgram>> {
            None
        }
        fn instance_count(&self, program: ProgramId) -> u32 {
            *self.instances.get(&program).unwrap_or(&0)
        }
        fn instance_inc(&mut self, program: ProgramId) {
            *self.instances.entry(program).or_insert(0) += 1;
        }
        fn instance_dec(&mut self, program: ProgramId) {
            *self.instances.entry(program).or_insert(0) -= 1;
        }
        fn profile_add(&mut self, _program: ProgramId, _duration: Duration) {}
        fn bump_crash_log(&mut self, _program: ProgramId, _message: &str, _now_unix: i64) {}
    }

    #[derive(Default)]
    struct FakeIo {
        notified: Vec<(ObjRef, String)>,
    }

    impl Io for FakeIo {
        fn notify(&mut self, player: ObjRef, text: &str) {
            self.notified.push((player, text.to_string()));
        }
        fn set_block(&mut self, _player: ObjRef, _block: bool) {}
        fn set_current_program(&mut self, _player: ObjRef, _program: ObjRef) {}
        fn is_online(&self, _player: ObjRef) -> bool {
            true
        }
    }

    fn unused(_: HostError) {}

    #[test]
    fn interp_rejects_when_program_has_no_permission_level() {
        let mut db = FakeDb {
            mlevel: HashMap::from([(10, 0)]),
            owner: HashMap::new(),
            flags: HashMap::new(),
            instances: HashMap::new(),
        };
        let mut io = FakeIo::default();
        let mut pools = Pools::new(4);
        let mut pids = PidSource::new(1);

        let req = InterpRequest {
            descr: 0,
            player: 1,
            location: 2,
            program: 10,
            source: NOTHING,
            multitask_mode: MultitaskMode::Foreground,
            perm_mode: PermMode::Std,
            forced_pid: None,
            match_cmdname: None,
            match_args: None,
            rng_seed: 1,
        };
        let result = interp(req, &mut db, &mut io, &mut pools, &mut pids);
        assert!(matches!(result, Err(EngineError::PermissionDenied)));
        assert_eq!(io.notified.len(), 1);
        let _ = unused;
    }

    #[test]
    fn interp_seeds_globals_and_argument_stack() {
        let mut db = FakeDb {
            mlevel: HashMap::new(),
            owner: HashMap::new(),
            flags: HashMap::new(),
            instances: HashMap::new(),
        };
        let mut io = FakeIo::default();
        let mut pools = Pools::new(4);
        let mut pids = PidSource::new(1);

        let req = InterpRequest {
            descr: 5,
            player: 1,
            location: 2,
            program: 10,
            source: NOTHING,
            multitask_mode: MultitaskMode::Foreground,
            perm_mode: PermMode::Std,
            forced_pid: None,
            match_cmdname: Some("look".to_string()),
            match_args: Some("north".to_string()),
            rng_seed: 1,
        };
        let frame = interp(req, &mut db, &mut io, &mut pools, &mut pids).unwrap();
        assert!(matches!(frame.globals.get(0), Value::ObjectRef(1)));
        assert!(matches!(frame.operand_stack.peek(), Some(Value::Str(s)) if &**s == "north"));
        assert_eq!(frame.system_stack.height(), 1);
        assert_eq!(frame.caller_chain.depth(), 2);
    }
}
