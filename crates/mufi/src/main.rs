// Copyright (c) 2026, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

//! Demo driver: assembles two small programs by hand, runs one through the
//! engine to completion, and prints what a player would have seen. Exercises
//! lazy compilation on first `CALL` (spec.md §8 scenario 3) against the
//! real `muf_engine::Dispatcher`, not a unit-test double.

use muf_engine::{interp, prog_clean, Dispatcher, InterpRequest, PermMode, Pools, RunOutcome};
use muf_host::program::ConstValue;
use muf_host::{EngineSettings, ObjType, Op, Primitive};
use muf_stack::MultitaskMode;
use muf_types::{Value, NOTHING};
use mufi::{InMemoryDatabase, InMemoryEvents, InMemoryIo, InMemoryPrimitives, InMemoryScheduler, ObjectRecord, ProgramBuilder, SharedDatabase};

const PLAYER: i32 = 1;
const CALLER_PROGRAM: i32 = 100;
const ADDER_PROGRAM: i32 = 200;

fn main() {
    let mut db = InMemoryDatabase::new();
    db.put_object(PLAYER, ObjectRecord { owner: PLAYER, typ: ObjType::Player, ..ObjectRecord::default() });
    db.put_object(CALLER_PROGRAM, ObjectRecord { owner: PLAYER, typ: ObjType::Program, ..ObjectRecord::default() });
    db.put_object(ADDER_PROGRAM, ObjectRecord { owner: PLAYER, typ: ObjType::Program, ..ObjectRecord::default() });

    // `adder` exposes a public "sum" entry point that adds two constants.
    // `caller` is the top-level program; it never has its own code for
    // "sum", so the first time it CALLs #200 the engine must compile it.
    let adder = ProgramBuilder::new("adder")
        .public("sum", 0, 0)
        .push_int(2, 1)
        .push_int(3, 1)
        .primitive(Primitive::Library(mufi::primitives::ADD), 1)
        .primitive(Primitive::Ret, 2)
        .build();
    db.put_source(ADDER_PROGRAM, adder);

    let caller = ProgramBuilder::new("caller")
        .op(Op::Push(ConstValue::ObjectRef(ADDER_PROGRAM)), 1)
        .push_str("sum", 1)
        .primitive(Primitive::Call, 1)
        .primitive(Primitive::Ret, 2)
        .build();
    db.put_source(CALLER_PROGRAM, caller);

    let shared = SharedDatabase::new(db);
    let mut database = shared.clone();
    let mut compiler = shared.compiler();
    let mut scheduler = InMemoryScheduler::new();
    let mut events = InMemoryEvents::new();
    let mut io = InMemoryIo::new();
    let mut primitives = InMemoryPrimitives::new();
    let mut pools = Pools::new(16);
    let mut pids = muf_engine::PidSource::new(1);

    let req = InterpRequest {
        descr: 1,
        player: PLAYER,
        location: PLAYER,
        program: CALLER_PROGRAM,
        source: NOTHING,
        multitask_mode: MultitaskMode::Foreground,
        perm_mode: PermMode::Std,
        forced_pid: None,
        match_cmdname: None,
        match_args: None,
        rng_seed: 1,
    };

    let frame = match interp(req, &mut database, &mut io, &mut pools, &mut pids) {
        Ok(frame) => frame,
        Err(e) => {
            eprintln!("interp failed: {}", e);
            return;
        }
    };

    let dispatcher = Dispatcher::new(EngineSettings::default());
    let mut next = frame;
    loop {
        let mut handles = muf_engine::HostHandles {
            compiler: &mut compiler,
            database: &mut database,
            scheduler: &mut scheduler,
            events: &mut events,
            io: &mut io,
            primitives: &mut primitives,
        };
        match dispatcher.run(next, &mut handles) {
            RunOutcome::Completed(mut frame) => {
                if let Some(&Value::Integer(n)) = frame.operand_stack.peek() {
                    io.notify(PLAYER, &format!("sum = {}", n));
                }
                prog_clean(frame, &mut database, &mut scheduler, &mut events, &mut pools);
                break;
            }
            RunOutcome::Suspended => {
                println!("frame suspended");
                break;
            }
            // A preempted frame is still live; a real driver re-enqueues it
            // with a zero-delay timer. Here we just feed it straight back
            // into the dispatcher for its next slice.
            RunOutcome::Preempted(frame) => {
                next = frame;
                continue;
            }
            RunOutcome::Crashed(frame, err) => {
                eprintln!("program crashed: {} / {}", err.message1, err.message2);
                prog_clean(frame, &mut database, &mut scheduler, &mut events, &mut pools);
                break;
            }
        }
    }

    for line in &io.notified {
        println!("{}", line.1);
    }
}
