// Copyright (c) 2026, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

//! The main interpreter loop (spec.md §4.3), grounded in `interp_loop`
//! (`examples/original_source/fbmuck/src/interp.c:1023-1945`): per-instruction
//! budget/preemption accounting, the live single-step debugger hook, the
//! instruction-tag dispatch, and the unwind-to-TRY-or-report-uncaught error
//! path.

use muf_debugger::{is_armed, should_break};
use muf_host::{Compiler, Database, EngineSettings, EventBus, Io, ObjType, Op, Primitive, PrimitiveAbort, PrimitiveContext, PrimitiveLibrary, Scheduler};
use muf_stack::{Frame, MultitaskMode, PendingError, ProgramCounter};
use muf_types::{ObjRef, ProgramId, Value, NOTHING};

use crate::control;
use crate::control::{pop_checked, push_checked};
use crate::error::{AbortKind, UncaughtError};
use crate::host::HostHandles;
use crate::permissions::find_mlev;

/// What happened to a frame over the course of one [`Dispatcher::run`] call.
pub enum RunOutcome {
    /// The frame's call stack emptied out: the top-level program returned.
    /// The caller is responsible for [`crate::init::prog_clean`].
    Completed(Box<Frame>),
    /// The frame suspended on `SLEEP`/`READ`/`EVENT_WAITFOR`, which have
    /// already handed it to the scheduler or event bus; nothing further to
    /// do.
    Suspended,
    /// The frame used its whole instruction slice without finishing or
    /// suspending and cooperatively yielded; the caller should re-enqueue it
    /// (typically via a zero-delay `Scheduler::delay` call).
    Preempted(Box<Frame>),
    /// A hard or uncaught-recoverable error terminated the frame; the
    /// caller should report `err` to the player and then clean the frame.
    Crashed(Box<Frame>, UncaughtError),
}

/// Engine-wide tunables the loop consults every instruction.
pub struct Dispatcher {
    pub settings: EngineSettings,
}

impl Dispatcher {
    pub fn new(settings: EngineSettings) -> Self {
        Dispatcher { settings }
    }

    /// The lifetime instruction ceiling for a lower-trust frame (mlev < 3;
    /// spec.md §4.3 step 5 / §6), matching the original's
    /// `if (mlev < 3) if (fr->instcnt > tp_max_instr_count * (mlev==2?4:1)) abort`
    /// (`examples/original_source/fbmuck/src/interp.c:1218-1220`): mlev 0/1
    /// gets the plain `max_instr_count`; mlev 2 gets four times that. This
    /// cap applies only to mlev < 3 — callers must check that separately,
    /// since a wizard-level frame (mlev >= 3) is never total-capped.
    fn instr_ceiling(&self, mlev: u8) -> u64 {
        if mlev == 2 {
            self.settings.max_instr_count.saturating_mul(4)
        } else {
            self.settings.max_instr_count
        }
    }

    /// Runs `frame` until it completes, suspends, is preempted, or crashes.
    pub fn run<C, D, S, E, I, P>(&self, mut frame: Box<Frame>, handles: &mut HostHandles<C, D, S, E, I, P>) -> RunOutcome
    where
        C: Compiler,
        D: Database,
        S: Scheduler,
        E: EventBus,
        I: Io,
        P: PrimitiveLibrary,
    {
        let player = match frame.globals.get(0) {
            Value::ObjectRef(p) => *p,
            _ => NOTHING,
        };

        loop {
            let caller_chain: Vec<ProgramId> = frame.caller_chain.iter().copied().collect();
            let mlev = find_mlev(handles.database, &caller_chain, frame.pc.program, caller_chain.len());

            if mlev < 3 && frame.instr_count >= self.instr_ceiling(mlev) {
                let origin_program = caller_chain.first().copied().unwrap_or(frame.pc.program);
                let err = UncaughtError {
                    program: frame.pc.program,
                    origin_program,
                    line: current_line(&frame, handles.database) as i32,
                    message1: "Maximum total instruction count exceeded.".to_string(),
                    message2: "program aborted".to_string(),
                };
                return RunOutcome::Crashed(frame, err);
            }

            if self.should_yield(&frame, mlev) {
                frame.reset_slice();
                return RunOutcome::Preempted(frame);
            }

            let backgrounded = frame.multitask_mode == MultitaskMode::Background;
            let armed = is_armed(handles.database, player, frame.pc.program, frame.debugger.force_debugging, backgrounded);
            frame.debugger.armed = armed;
            if armed {
                let line = current_line(&frame, handles.database);
                if should_break(&mut frame.debugger, frame.pc, line, caller_chain.len()) {
                    muf_debugger::notify_step(handles.io, player, frame.pid, line, "breakpoint");
                    crate::suspend::read(frame, player, handles.io, handles.scheduler);
                    return RunOutcome::Suspended;
                }
            }

            frame.charge_instruction();

            match self.step(&mut frame, player, mlev, handles) {
                Ok(StepResult::Continue) => continue,
                Ok(StepResult::Completed) => return RunOutcome::Completed(frame),
                Ok(StepResult::Suspend(susp)) => {
                    match susp {
                        Suspension::Sleep(delay) => crate::suspend::sleep(frame, delay, player, handles.scheduler),
                        Suspension::Read => crate::suspend::read(frame, player, handles.io, handles.scheduler),
                        Suspension::Event => crate::suspend::event_wait(frame, handles.scheduler),
                    }
                    return RunOutcome::Suspended;
                }
                Err(abort) => {
                    if abort.is_catchable() && frame.try_stack.innermost().is_some() {
                        self.unwind_to_try(&mut frame, abort, handles.database);
                        continue;
                    }
                    let line = current_line(&frame, handles.database);
                    let origin_program = caller_chain.first().copied().unwrap_or(frame.pc.program);
                    let err = UncaughtError {
                        program: frame.pc.program,
                        origin_program,
                        line: line as i32,
                        message1: "Program aborted".to_string(),
                        message2: abort.message().unwrap_or("").to_string(),
                    };
                    return RunOutcome::Crashed(frame, err);
                }
            }
        }
    }

    /// Cooperative yield: foreground/background frames give up their slice
    /// once the current slice is full *and* the frame has run at least four
    /// slices' worth of instructions total, matching the original's guard
    /// that keeps short scripts from ever yielding at all. PREEMPT-mode
    /// frames instead obey the ml4-preempt instruction cap (spec.md §4.3
    /// step 2), with 0 meaning unlimited.
    fn should_yield(&self, frame: &Frame, mlev: u8) -> bool {
        if frame.multitask_mode == MultitaskMode::Preempt {
            return mlev < 4 && self.settings.max_ml4_preempt_count != 0 && frame.instr_count >= self.settings.max_ml4_preempt_count;
        }
        frame.slice_count >= self.settings.instr_slice && frame.instr_count >= self.settings.instr_slice * 4
    }

    fn unwind_to_try(&self, frame: &mut Frame, abort: AbortKind, db: &mut impl Database) {
        let try_node = *frame.try_stack.innermost().expect("checked by caller");
        frame.operand_stack.unwind_to(try_node.depth, db);
        frame.for_stack.unwind_to(try_node.for_count);
        frame.system_stack.unwind_to(try_node.call_level);
        let line = current_line(frame, db);
        frame.pending_error = Some(PendingError {
            message: abort.message().unwrap_or("").to_string(),
            instr_text: String::new(),
            line,
            program: frame.pc.program,
        });
        frame.pc = try_node.handler;
    }

    /// Decodes and executes exactly one instruction, advancing `frame.pc`
    /// (except where the instruction itself changes control flow, e.g.
    /// `If`/`Exec`/`Jmp`/`CALL`).
    fn step<C, D, S, E, I, P>(&self, frame: &mut Frame, player: ObjRef, mlev: u8, handles: &mut HostHandles<C, D, S, E, I, P>) -> Result<StepResult, AbortKind>
    where
        C: Compiler,
        D: Database,
        S: Scheduler,
        E: EventBus,
        I: Io,
        P: PrimitiveLibrary,
    {
        let program = frame.pc.program;
        let offset = frame.pc.offset;
        let op = {
            let compiled = handles
                .database
                .code(program)
                .ok_or_else(|| AbortKind::Hard("Internal error. Invalid program address.".to_string()))?;
            let instr = compiled
                .instruction(offset)
                .ok_or_else(|| AbortKind::Hard("Internal error. Invalid instruction address.".to_string()))?;
            instr.op.clone()
        };

        match op {
            Op::Push(cv) => {
                let value = cv.to_value(handles.database);
                push_checked(frame, value)?;
                frame.pc.offset += 1;
            }
            Op::LVarAt { n, clear } => {
                let copied = frame.locals.get(program, n as usize).copy(handles.database);
                push_checked(frame, copied)?;
                if clear {
                    frame.locals.set(program, n as usize, Value::Integer(0), handles.database);
                }
                frame.pc.offset += 1;
            }
            Op::LVarBang { n } => {
                let value = pop_checked(frame, "Stack Underflow. Missing value for !.")?;
                frame.locals.set(program, n as usize, value, handles.database);
                frame.pc.offset += 1;
            }
            Op::SVarAt { n, clear } => {
                let copied = frame
                    .scoped
                    .get(0, n as usize)
                    .ok_or_else(|| AbortKind::Hard("Internal error. SVAR used outside of a function.".to_string()))?
                    .copy(handles.database);
                push_checked(frame, copied)?;
                if clear {
                    if let Some(slot) = frame.scoped.get_mut(0, n as usize) {
                        slot.clear(handles.database);
                        *slot = Value::Integer(0);
                    }
                }
                frame.pc.offset += 1;
            }
            Op::SVarBang { n } => {
                let value = pop_checked(frame, "Stack Underflow. Missing value for !.")?;
                let slot = frame
                    .scoped
                    .get_mut(0, n as usize)
                    .ok_or_else(|| AbortKind::Hard("Internal error. SVAR used outside of a function.".to_string()))?;
                slot.clear(handles.database);
                *slot = value;
                frame.pc.offset += 1;
            }
            Op::Function { arg_count, var_count, var_names } => {
                if frame.skip_declare {
                    frame.skip_declare = false;
                } else {
                    frame.scoped.push(var_count, var_names);
                    for i in (0..arg_count).rev() {
                        let value = pop_checked(frame, "Stack Underflow. Missing function argument.")?;
                        if let Some(slot) = frame.scoped.get_mut(0, i as usize) {
                            *slot = value;
                        }
                    }
                }
                frame.pc.offset += 1;
            }
            Op::If { target } => {
                let mut cond = pop_checked(frame, "Stack Underflow. IF needs a condition.")?;
                let truthy = cond.truthiness();
                cond.clear(handles.database);
                frame.pc.offset = if truthy { offset + 1 } else { target };
            }
            Op::Exec { target } => {
                control::exec(frame, program, target, handles.database)?;
            }
            Op::Jmp { target } => {
                let target_is_function = match handles.database.code(program) {
                    Some(compiled) => compiled.instruction(target).map(|i| matches!(i.op, Op::Function { .. })).unwrap_or(false),
                    None => false,
                };
                control::jmp(frame, target, target_is_function);
            }
            Op::Try { handler } => {
                control::try_push(frame, ProgramCounter { program, offset: handler })?;
                frame.pc.offset += 1;
            }
            Op::Cleared => {
                return Err(AbortKind::Hard("Program tried to execute a cleared instruction.".to_string()));
            }
            Op::Primitive(prim) => return self.dispatch_primitive(frame, player, mlev, prim, handles),
        }
        Ok(StepResult::Continue)
    }

    fn dispatch_primitive<C, D, S, E, I, P>(
        &self,
        frame: &mut Frame,
        player: ObjRef,
        mlev: u8,
        prim: Primitive,
        handles: &mut HostHandles<C, D, S, E, I, P>,
    ) -> Result<StepResult, AbortKind>
    where
        C: Compiler,
        D: Database,
        S: Scheduler,
        E: EventBus,
        I: Io,
        P: PrimitiveLibrary,
    {
        match prim {
            Primitive::Call => {
                let caller_uid = handles.database.owner(frame.pc.program);
                control::call(frame, mlev, caller_uid, handles.database, handles.compiler)?;
                Ok(StepResult::Continue)
            }
            Primitive::Ret => {
                control::ret(frame, handles.database)?;
                if frame.system_stack.is_empty() {
                    Ok(StepResult::Completed)
                } else {
                    Ok(StepResult::Continue)
                }
            }
            Primitive::Catch => {
                control::catch(frame, false, handles.database)?;
                frame.pc.offset += 1;
                Ok(StepResult::Continue)
            }
            Primitive::CatchDetailed => {
                control::catch(frame, true, handles.database)?;
                frame.pc.offset += 1;
                Ok(StepResult::Continue)
            }
            Primitive::EventWaitfor => {
                let program = frame.pc.program;
                control::event_waitfor(frame, player, program, handles.database, handles.events)?;
                frame.pc.offset += 1;
                Ok(StepResult::Suspend(Suspension::Event))
            }
            Primitive::Sleep => {
                let n = pop_checked(frame, "Stack Underflow. Missing delay argument.")?;
                match n {
                    Value::Integer(secs) if secs >= 0 => {
                        frame.pending_error = None;
                        frame.pc.offset += 1;
                        frame.dialog_ids.clear();
                        Ok(StepResult::Suspend(Suspension::Sleep(secs)))
                    }
                    Value::Integer(_) => Err(AbortKind::Recoverable("Negative sleep time.".to_string())),
                    _ => Err(AbortKind::Recoverable("Integer argument required.".to_string())),
                }
            }
            Primitive::Read => {
                if frame.write_only || handles.database.typeof_obj(player) != ObjType::Player {
                    return Err(AbortKind::Recoverable("Can't read from a non-interactive source.".to_string()));
                }
                frame.pc.offset += 1;
                Ok(StepResult::Suspend(Suspension::Read))
            }
            Primitive::Library(number) => {
                let mut ctx = PrimitiveContext {
                    player,
                    program: frame.pc.program,
                    mlev,
                    frame,
                };
                handles.primitives.call(number, &mut ctx).map_err(|e| match e {
                    PrimitiveAbort::Catchable(m) => AbortKind::Recoverable(m),
                    PrimitiveAbort::Hard(m) => AbortKind::Hard(m),
                })?;
                frame.pc.offset += 1;
                Ok(StepResult::Continue)
            }
        }
    }
}

enum StepResult {
    Continue,
    Completed,
    /// A suspension point has already validated its arguments and advanced
    /// `pc` (using `&mut Frame`, while `step` still only borrows it); the
    /// caller (`Dispatcher::run`, which owns the boxed frame) performs the
    /// actual hand-off to the scheduler via `crate::suspend`.
    Suspend(Suspension),
}

/// Which suspension point fired, and whatever `step` already computed from
/// the operand stack that the hand-off in `crate::suspend` needs.
enum Suspension {
    Sleep(i64),
    Read,
    Event,
}

fn current_line(frame: &Frame, db: &impl Database) -> u32 {
    match db.code(frame.pc.program) {
        Some(compiled) => compiled.instruction(frame.pc.offset).map(|i| i.line).unwrap_or(0),
        None => 0,
    }
}
