// Copyright (c) 2026, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

//! The trait surface toward everything the engine assumes but does not
//! own: the compiler, the object database, the scheduler/timer queue, the
//! event bus, I/O, and the primitive operator library.

pub mod program;

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use muf_stack::Frame;
use muf_types::{ObjRef, Pid, ProgramId, Value};

pub use program::{CompiledProgram, Instruction, Op, Primitive, PublicEntry};

/// Flags an object (almost always a program) carries in the database.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObjectFlags {
    pub linkable: bool,
    pub sticky: bool,
    pub haven: bool,
    pub zombie: bool,
    pub dark: bool,
    pub builder: bool,
    pub readmode: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjType {
    Player,
    Room,
    Thing,
    Exit,
    Program,
}

#[derive(Debug)]
pub enum HostError {
    CompileFailed { program: ProgramId, message: String },
    NoSuchProgram(ProgramId),
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::CompileFailed { program, message } => {
                write!(f, "failed to compile program #{}: {}", program, message)
            }
            HostError::NoSuchProgram(program) => write!(f, "no such program: #{}", program),
        }
    }
}

impl std::error::Error for HostError {}

/// Lazily compiles a program's source into a [`CompiledProgram`] the first
/// time it is called with no code installed yet.
pub trait Compiler {
    fn ensure_compiled(&mut self, program: ProgramId) -> Result<(), HostError>;
}

/// The object database: program metadata, permissions, instance counts,
/// profiling, and the crash-log properties.
pub trait Database {
    fn flags(&self, obj: ObjRef) -> ObjectFlags;
    fn owner(&self, obj: ObjRef) -> ObjRef;
    fn mlevel(&self, obj: ObjRef) -> u8;
    fn is_true_wizard(&self, obj: ObjRef) -> bool;
    fn controls(&self, player: ObjRef, program: ProgramId) -> bool;
    fn can_link_to(&self, owner: ObjRef, program: ProgramId) -> bool;
    fn valid(&self, obj: ObjRef) -> bool;
    fn typeof_obj(&self, obj: ObjRef) -> ObjType;

    /// Returns an owned handle to the compiled code rather than a borrow:
    /// `Database` implementations that share their compiled-code cache
    /// with a separate `Compiler` handle (the common case of one host
    /// object implementing both, split into two thin wrappers so the
    /// dispatcher can hold both mutably at once) can't return a reference
    /// tied to `&self`'s lifetime. `Rc` keeps this cheap.
    fn code(&self, program: ProgramId) -> Option<Rc<CompiledProgram>>;

    fn instance_count(&self, program: ProgramId) -> u32;
    fn instance_inc(&mut self, program: ProgramId);
    fn instance_dec(&mut self, program: ProgramId);

    fn profile_add(&mut self, program: ProgramId, duration: Duration);

    /// Bumps `.debug/errcount`, `.debug/lasterr`, `.debug/lastcrash` and
    /// `.debug/lastcrashtime` on `program`, mirroring the original's
    /// dual-program update: the crashing program and the program the
    /// player originally invoked both get stamped when they differ.
    fn bump_crash_log(&mut self, program: ProgramId, message: &str, now_unix: i64);
}

impl<T: Database + ?Sized> muf_types::InstanceCounter for T {
    fn instance_inc(&mut self, program: ProgramId) {
        Database::instance_inc(self, program);
    }
    fn instance_dec(&mut self, program: ProgramId) {
        Database::instance_dec(self, program);
    }
}

/// The timer/scheduler queue that re-enters paused frames.
pub trait Scheduler {
    fn delay(&mut self, delay_secs: i64, descriptor: i32, player: ObjRef, program: ProgramId, frame: Box<Frame>, label: &str);
    fn read_wait(&mut self, descriptor: i32, player: ObjRef, program: ProgramId, frame: Box<Frame>);
    fn dequeue_timers(&mut self, pid: Pid);
    fn frame_by_pid(&mut self, pid: Pid) -> Option<&mut Frame>;
    /// Parks a frame under its own pid with no associated timer or read
    /// wait, keyed for later lookup via `frame_by_pid`. `EVENT_WAITFOR`
    /// suspends this way: the frame is already registered with the event
    /// bus by pid, and re-entry is driven by an event post rather than a
    /// timer or input line.
    fn park(&mut self, pid: Pid, frame: Box<Frame>);
}

/// The inter-program event bus used by EVENT_WAITFOR and PROC.EXIT
/// delivery.
pub trait EventBus {
    fn register(&mut self, player: ObjRef, program: ProgramId, pid: Pid, names: &[String]);
    fn post(&mut self, pid: Pid, name: &str, value: Value);
    fn purge(&mut self, pid: Pid);
}

/// Delivers output to and routes input from human users.
pub trait Io {
    fn notify(&mut self, player: ObjRef, text: &str);
    fn set_block(&mut self, player: ObjRef, block: bool);
    fn set_current_program(&mut self, player: ObjRef, program: ObjRef);
    /// Whether `player` has a live connection. Frame init (spec.md §4.4)
    /// needs this to decide `writeonly` for an offline-player source.
    fn is_online(&self, player: ObjRef) -> bool;
}

/// How a library primitive signals failure: catchable by the nearest TRY,
/// or a hard abort that bypasses it.
#[derive(Debug, Clone)]
pub enum PrimitiveAbort {
    Catchable(String),
    Hard(String),
}

/// Everything a library primitive needs: identity of the running
/// player/program/permission level, and the frame (for its stacks and
/// variable stores). Primitives consume and produce operand-stack values
/// and do not manage `pc`.
pub struct PrimitiveContext<'a> {
    pub player: ObjRef,
    pub program: ProgramId,
    pub mlev: u8,
    pub frame: &'a mut Frame,
}

/// The library of primitive operators (math, strings, arrays, properties,
/// I/O, …), invoked through a uniform signature.
pub trait PrimitiveLibrary {
    fn call(&mut self, number: u32, ctx: &mut PrimitiveContext) -> Result<(), PrimitiveAbort>;
}

/// Engine-wide tunables (spec's "recognized options").
#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    /// Per-frame lifetime instruction cap for lower-permission programs.
    pub max_instr_count: u64,
    /// When nonzero, caps preempt-mode instructions for permission-4
    /// programs; zero means unlimited.
    pub max_ml4_preempt_count: u64,
    /// Cooperative yield slice size.
    pub instr_slice: u64,
    /// How many frames to keep pooled; excess purged.
    pub free_frames_pool: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            max_instr_count: 100_000,
            max_ml4_preempt_count: 0,
            instr_slice: 10_000,
            free_frames_pool: 16,
        }
    }
}
