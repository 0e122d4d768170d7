// Copyright (c) 2026, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

//! End-to-end coverage of spec.md §8's concrete scenarios against the real
//! `Dispatcher`, as opposed to the per-function unit-test doubles already
//! living alongside `control`/`dispatcher`: truthiness (scenario 1), a
//! stack protection fault caught by its enclosing TRY (scenario 2),
//! cooperative yield and resumption (scenario 4), and a hard abort that
//! bypasses an active TRY (scenario 6). Lazy compilation on CALL (scenario
//! 3) and PROC.EXIT delivery (scenario 5) are covered in `mufi`'s
//! integration tests, where a real `Compiler`/`EventBus` pair is available.

use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use muf_engine::{Dispatcher, HostHandles, RunOutcome};
use muf_host::program::ConstValue;
use muf_host::{
    CompiledProgram, Compiler, Database, EngineSettings, EventBus, HostError, Instruction, Io, ObjType, ObjectFlags, Op, Primitive, PrimitiveAbort,
    PrimitiveContext, PrimitiveLibrary, Scheduler,
};
use muf_stack::{Frame, ProgramCounter};
use muf_types::{ObjRef, Pid, ProgramId, Value};

const PROGRAM: ProgramId = 50;

struct TestDb {
    programs: HashMap<ProgramId, Rc<CompiledProgram>>,
}

impl TestDb {
    fn with_program(code: Vec<Instruction>) -> Self {
        let mut programs = HashMap::new();
        programs.insert(PROGRAM, Rc::new(CompiledProgram { program: PROGRAM, name: "t".into(), code, start: 0, publics: vec![] }));
        TestDb { programs }
    }
}

impl Database for TestDb {
    fn flags(&self, _obj: ObjRef) -> ObjectFlags {
        ObjectFlags::default()
    }
    fn owner(&self, _obj: ObjRef) -> ObjRef {
        1
    }
    fn mlevel(&self, _obj: ObjRef) -> u8 {
        4
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
        ObjType::Program
    }
    fn code(&self, program: ProgramId) -> Option<Rc<CompiledProgram>> {
        self.programs.get(&program).cloned()
    }
    fn instance_count(&self, _program: ProgramId) -> u32 {
        0
    }
    fn instance_inc(&mut self, _program: ProgramId) {}
    fn instance_dec(&mut self, _program: ProgramId) {}
    fn profile_add(&mut self, _program: ProgramId, _duration: Duration) {}
    fn bump_crash_log(&mut self, _program: ProgramId, _message: &str, _now_unix: i64) {}
}

struct NullCompiler;
impl Compiler for NullCompiler {
    fn ensure_compiled(&mut self, program: ProgramId) -> Result<(), HostError> {
        Err(HostError::NoSuchProgram(program))
    }
}

struct NullScheduler;
impl Scheduler for NullScheduler {
    fn delay(&mut self, _delay_secs: i64, _descriptor: i32, _player: ObjRef, _program: ProgramId, _frame: Box<Frame>, _label: &str) {}
    fn read_wait(&mut self, _descriptor: i32, _player: ObjRef, _program: ProgramId, _frame: Box<Frame>) {}
    fn dequeue_timers(&mut self, _pid: Pid) {}
    fn frame_by_pid(&mut self, _pid: Pid) -> Option<&mut Frame> {
        None
    }
    fn park(&mut self, _pid: Pid, _frame: Box<Frame>) {}
}

struct NullEvents;
impl EventBus for NullEvents {
    fn register(&mut self, _player: ObjRef, _program: ProgramId, _pid: Pid, _names: &[String]) {}
    fn post(&mut self, _pid: Pid, _name: &str, _value: Value) {}
    fn purge(&mut self, _pid: Pid) {}
}

struct NullIo;
impl Io for NullIo {
    fn notify(&mut self, _player: ObjRef, _text: &str) {}
    fn set_block(&mut self, _player: ObjRef, _block: bool) {}
    fn set_current_program(&mut self, _player: ObjRef, _program: ObjRef) {}
    fn is_online(&self, _player: ObjRef) -> bool {
        true
    }
}

const POP: u32 = 0;

/// Just enough of a primitive library for these scenarios: POP discards
/// the top value, matching `mufi::primitives::POP`'s number but kept local
/// so this crate's tests don't depend on the demo host crate.
struct TestPrimitives;
impl PrimitiveLibrary for TestPrimitives {
    fn call(&mut self, number: u32, ctx: &mut PrimitiveContext) -> Result<(), PrimitiveAbort> {
        match number {
            POP => {
                let protected = ctx.frame.try_stack.innermost_depth();
                ctx.frame.operand_stack.pop(protected).map(|_| ()).map_err(|_| PrimitiveAbort::Catchable("Stack Underflow".to_string()))
            }
            other => Err(PrimitiveAbort::Hard(format!("unexpected primitive #{}", other))),
        }
    }
}

/// A frame entering `PROGRAM` at offset 0 with the system-stack sentinel
/// `interp()` would have pushed, so a `RET` at depth 0 completes the run
/// the same way it would for a real top-level invocation.
fn fresh_frame() -> Box<Frame> {
    let mut frame = Box::new(Frame::new(1, 0, PROGRAM, 4, 7));
    frame.system_stack.push(ProgramCounter { program: 0, offset: 0 }).unwrap();
    frame
}

fn run(db: &mut TestDb, frame: Box<Frame>, settings: EngineSettings) -> RunOutcome {
    let mut compiler = NullCompiler;
    let mut scheduler = NullScheduler;
    let mut events = NullEvents;
    let mut io = NullIo;
    let mut primitives = TestPrimitives;
    let dispatcher = Dispatcher::new(settings);
    let mut handles = HostHandles {
        compiler: &mut compiler,
        database: db,
        scheduler: &mut scheduler,
        events: &mut events,
        io: &mut io,
        primitives: &mut primitives,
    };
    dispatcher.run(frame, &mut handles)
}

fn default_settings() -> EngineSettings {
    EngineSettings { max_instr_count: 1_000_000, max_ml4_preempt_count: 0, instr_slice: 10_000, free_frames_pool: 16 }
}

/// Scenario 1: `INT 0 IF` jumps past the fallthrough push; `INT 1 IF` falls
/// through and runs it.
#[test]
fn truthiness_zero_jumps_one_falls_through() {
    let jumping = vec![
        Instruction { op: Op::Push(ConstValue::Integer(0)), line: 1 },
        Instruction { op: Op::If { target: 3 }, line: 1 },
        Instruction { op: Op::Push(ConstValue::Integer(111)), line: 2 },
        Instruction { op: Op::Primitive(Primitive::Ret), line: 3 },
    ];
    let mut db = TestDb::with_program(jumping);
    let outcome = run(&mut db, fresh_frame(), default_settings());
    match outcome {
        RunOutcome::Completed(frame) => assert_eq!(frame.operand_stack.height(), 0, "IF on a falsy 0 must skip the PUSH 111"),
        other => panic!("expected completion, got a different outcome"),
    }

    let falling_through = vec![
        Instruction { op: Op::Push(ConstValue::Integer(1)), line: 1 },
        Instruction { op: Op::If { target: 3 }, line: 1 },
        Instruction { op: Op::Push(ConstValue::Integer(111)), line: 2 },
        Instruction { op: Op::Primitive(Primitive::Ret), line: 3 },
    ];
    let mut db = TestDb::with_program(falling_through);
    let outcome = run(&mut db, fresh_frame(), default_settings());
    match outcome {
        RunOutcome::Completed(mut frame) => {
            assert_eq!(frame.operand_stack.pop(None), Ok(Value::Integer(111)), "IF on a truthy 1 must fall through to the PUSH 111");
        }
        other => panic!("expected completion, got a different outcome"),
    }
}

/// Scenario 2: a TRY protecting everything already on the stack lets one
/// POP through, then faults on the next one; CATCH reports "Stack
/// protection fault" and the operand beneath the try is left untouched
/// (S1/S3).
#[test]
fn stack_protection_fault_is_caught_with_base_value_preserved() {
    let code = vec![
        /* 0 */ Instruction { op: Op::Push(ConstValue::Integer(1)), line: 1 }, // the value TRY will protect
        /* 1 */ Instruction { op: Op::Push(ConstValue::Integer(0)), line: 1 }, // n = 0: protect everything currently on the stack
        /* 2 */ Instruction { op: Op::Try { handler: 7 }, line: 1 },
        /* 3 */ Instruction { op: Op::Push(ConstValue::Integer(2)), line: 2 },
        /* 4 */ Instruction { op: Op::Primitive(Primitive::Library(POP)), line: 2 }, // pops the 2; allowed
        /* 5 */ Instruction { op: Op::Primitive(Primitive::Library(POP)), line: 2 }, // would pop the protected 1; faults
        /* 6 */ Instruction { op: Op::Primitive(Primitive::Ret), line: 2 },          // unreachable
        /* 7 */ Instruction { op: Op::Primitive(Primitive::Catch), line: 3 },
        /* 8 */ Instruction { op: Op::Primitive(Primitive::Ret), line: 3 },
    ];
    let mut db = TestDb::with_program(code);
    let outcome = run(&mut db, fresh_frame(), default_settings());
    match outcome {
        RunOutcome::Completed(mut frame) => {
            assert_eq!(frame.operand_stack.height(), 2, "CATCH pushes the caught string above the untouched protected value");
            assert_eq!(frame.operand_stack.pop(None), Ok(Value::Str(Rc::from("Stack protection fault"))));
            assert_eq!(frame.operand_stack.pop(None), Ok(Value::Integer(1)), "the value TRY protected must survive the fault");
        }
        other => panic!("expected the fault to be caught and the frame to complete, got a different outcome"),
    }
}

/// Scenario 4: a tight JMP-to-self loop preempts once its slice and
/// lifetime counters both cross the configured thresholds, and resumes
/// with identical stack tops and the same pc on re-entry.
#[test]
fn cooperative_yield_resumes_with_unchanged_state() {
    let code = vec![Instruction { op: Op::Jmp { target: 0 }, line: 1 }];
    let mut db = TestDb::with_program(code);
    let settings = EngineSettings { max_instr_count: 1_000_000, max_ml4_preempt_count: 0, instr_slice: 100, free_frames_pool: 16 };

    let frame = fresh_frame();
    let outcome = run(&mut db, frame, settings);
    let frame = match outcome {
        RunOutcome::Preempted(frame) => frame,
        _ => panic!("expected the loop to preempt once its slice filled"),
    };
    assert_eq!(frame.instr_count, 400, "yields once lifetime count crosses 4x the slice size with a full slice run");
    assert_eq!(frame.slice_count, 0, "reset_slice clears the per-slice counter on preemption");
    assert_eq!(frame.pc, ProgramCounter { program: PROGRAM, offset: 0 });
    assert_eq!(frame.operand_stack.height(), 0);
    assert_eq!(frame.system_stack.height(), 1);

    let outcome = run(&mut db, frame, settings);
    match outcome {
        RunOutcome::Preempted(frame) => {
            assert_eq!(frame.instr_count, 500, "instruction count keeps accumulating across resumes");
            assert_eq!(frame.pc, ProgramCounter { program: PROGRAM, offset: 0 });
            assert_eq!(frame.operand_stack.height(), 0);
            assert_eq!(frame.system_stack.height(), 1);
        }
        _ => panic!("expected the resumed loop to preempt again"),
    }
}

/// Scenario 6: a hard abort (here, executing a CLEARED slot) never diverts
/// to an enclosing TRY's handler, even though one is active; the frame
/// crashes with the try-frame still unpopped.
#[test]
fn hard_abort_bypasses_active_try() {
    let code = vec![
        /* 0 */ Instruction { op: Op::Push(ConstValue::Integer(0)), line: 1 }, // n = 0
        /* 1 */ Instruction { op: Op::Try { handler: 3 }, line: 1 },
        /* 2 */ Instruction { op: Op::Cleared, line: 2 },
        /* 3 */ Instruction { op: Op::Primitive(Primitive::Ret), line: 3 }, // the handler; must never run
    ];
    let mut db = TestDb::with_program(code);
    let outcome = run(&mut db, fresh_frame(), default_settings());
    match outcome {
        RunOutcome::Crashed(frame, err) => {
            assert!(err.message2.contains("cleared instruction"));
            assert!(frame.try_stack.innermost().is_some(), "the try-frame must still be there: it was never unwound to");
            assert_eq!(frame.pc, ProgramCounter { program: PROGRAM, offset: 2 }, "pc must not have jumped to the handler");
        }
        _ => panic!("expected a hard abort to crash the frame instead of diverting to CATCH"),
    }
}
