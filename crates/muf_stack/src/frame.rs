// Copyright (c) 2026, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use muf_types::{ObjRef, Pid, ProgramId};
use muf_vars::{GlobalVars, ProgramLocals, ScopedVars};

use crate::stacks::{CallerChain, ForStack, OperandStack, ProgramCounter, SystemStack, TryStack};

/// How a frame is scheduled relative to the slice/budget accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultitaskMode {
    Foreground,
    Background,
    Preempt,
}

/// Error state captured by the abort protocol, read by CATCH/CATCH_DETAILED
/// and by the uncaught-error reporting path.
#[derive(Debug, Clone)]
pub struct PendingError {
    pub message: String,
    pub instr_text: String,
    pub line: u32,
    pub program: ProgramId,
}

/// One breakpoint predicate. Every `Some` clause must match for the
/// breakpoint to fire; `None` clauses are vacuously satisfied.
#[derive(Debug, Clone, Default)]
pub struct Breakpoint {
    pub pc: Option<usize>,
    pub line: Option<u32>,
    pub stop_depth: Option<usize>,
    pub program: Option<ProgramId>,
    pub line_count: Option<u32>,
    pub pc_count: Option<u32>,
}

/// Debugger state carried on the frame: whether stepping is armed, the
/// configured breakpoints, and the "bypass" latch that lets one matching
/// opportunity be consumed without actually stopping.
#[derive(Debug, Clone, Default)]
pub struct DebuggerState {
    pub armed: bool,
    pub force_debugging: bool,
    pub bypass: bool,
    pub last_line: Option<u32>,
    pub breakpoints: Vec<Breakpoint>,
}

/// One in-flight program invocation with all of its stacks and variable
/// stores.
pub struct Frame {
    pub pid: Pid,
    pub descriptor: i32,
    pub start_time: Instant,
    pub instr_count: u64,
    pub slice_count: u64,
    pub pc: ProgramCounter,

    pub operand_stack: OperandStack,
    pub system_stack: SystemStack,
    pub caller_chain: CallerChain,
    pub for_stack: ForStack,
    pub try_stack: TryStack,

    pub globals: GlobalVars,
    pub locals: ProgramLocals,
    pub scoped: ScopedVars,

    pub pending_error: Option<PendingError>,

    pub waitees: Vec<Pid>,
    pub waiters: Vec<Pid>,

    pub multitask_mode: MultitaskMode,
    pub perm_level: u8,

    pub profile_started: Option<Instant>,
    pub profile_total: Duration,

    pub debugger: DebuggerState,

    rng: StdRng,

    pub dialog_ids: Vec<i32>,

    /// Output cannot be delivered to the invoking source (room, offline
    /// player, a player in READMODE): interactive READ must be rejected.
    pub write_only: bool,

    /// Set by the JMP-into-function protocol: the next FUNCTION header
    /// must not push a fresh scoped frame because the caller already
    /// prepared one.
    pub skip_declare: bool,
}

impl Frame {
    pub fn new(pid: Pid, descriptor: i32, entry_program: ProgramId, perm_level: u8, seed: u64) -> Self {
        Frame {
            pid,
            descriptor,
            start_time: Instant::now(),
            instr_count: 0,
            slice_count: 0,
            pc: ProgramCounter { program: entry_program, offset: 0 },
            operand_stack: OperandStack::new(),
            system_stack: SystemStack::new(),
            caller_chain: CallerChain::new(),
            for_stack: ForStack::new(),
            try_stack: TryStack::new(),
            globals: GlobalVars::new(),
            locals: ProgramLocals::new(),
            scoped: ScopedVars::new(),
            pending_error: None,
            waitees: Vec::new(),
            waiters: Vec::new(),
            multitask_mode: MultitaskMode::Foreground,
            perm_level,
            profile_started: None,
            profile_total: Duration::ZERO,
            debugger: DebuggerState::default(),
            rng: StdRng::seed_from_u64(seed),
            dialog_ids: Vec::new(),
            write_only: false,
            skip_declare: false,
        }
    }

    pub fn next_random(&mut self) -> u32 {
        self.rng.next_u32()
    }

    pub fn start_profile_timer(&mut self) {
        self.profile_started = Some(Instant::now());
    }

    pub fn stop_profile_timer(&mut self) {
        if let Some(started) = self.profile_started.take() {
            self.profile_total += started.elapsed();
        }
    }

    /// (B1) the lifetime instruction counter only ever increases.
    pub fn charge_instruction(&mut self) {
        self.instr_count += 1;
        self.slice_count += 1;
    }

    pub fn reset_slice(&mut self) {
        self.slice_count = 0;
    }
}

/// NOTHING-equivalent default entry when no caller/source object is known
/// yet (used only by tests/demo wiring; the engine always supplies a real
/// object-ref from the host database).
pub const NO_OBJECT: ObjRef = muf_types::NOTHING;
