// Copyright (c) 2026, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

//! Control-flow primitive semantics (spec.md §4.3's `CALL`/`RET`/`TRY`/
//! `CATCH`/`CATCH_DETAILED`/`EVENT_WAITFOR`/`SLEEP`/`READ`), grounded in the
//! `PROG_PRIMITIVE` sub-dispatch of `interp_loop`
//! (`examples/original_source/fbmuck/src/interp.c:1414-1701`).

use std::rc::Rc;

use muf_host::{Compiler, Database, EventBus, ObjType};
use muf_stack::{Frame, ProgramCounter, StackError, TryNode};
use muf_types::{ArrayKey, MufArray, ObjRef, ProgramId, Value};

use crate::error::AbortKind;

/// What the caller of a control-flow primitive must do next.
pub enum ControlOutcome {
    /// Keep running; `pc` has already been updated.
    Continue,
    /// EVENT_WAITFOR/SLEEP/READ: hand the frame back to the scheduler.
    Suspend,
}

pub(crate) fn pop_checked(frame: &mut Frame, underflow_msg: &str) -> Result<Value, AbortKind> {
    let protected = frame.try_stack.innermost_depth();
    frame.operand_stack.pop(protected).map_err(|e| match e {
        StackError::ProtectionFault => AbortKind::Recoverable("Stack protection fault".to_string()),
        StackError::Underflow => AbortKind::Recoverable(underflow_msg.to_string()),
        StackError::Overflow => unreachable!("pop never overflows"),
    })
}

pub(crate) fn push_checked(frame: &mut Frame, value: Value) -> Result<(), AbortKind> {
    frame
        .operand_stack
        .push(value)
        .map_err(|_| AbortKind::Recoverable("Stack Overflow".to_string()))
}

/// `JMP`: jump to `target` within the current program. If the target
/// instruction is a `Function` header, sets `skip_declare` so that header
/// does not push a second scoped frame.
pub fn jmp(frame: &mut Frame, target: usize, target_is_function: bool) {
    frame.pc.offset = target;
    if target_is_function {
        frame.skip_declare = true;
    }
}

/// `EXEC`: push a return address at the instruction following this one,
/// then jump to `target`, possibly in another program.
pub fn exec(frame: &mut Frame, target_program: ProgramId, target_offset: usize, db: &mut impl Database) -> Result<(), AbortKind> {
    let return_pc = ProgramCounter { program: frame.pc.program, offset: frame.pc.offset + 1 };
    frame
        .system_stack
        .push(return_pc)
        .map_err(|_| AbortKind::Recoverable("System Stack Overflow".to_string()))?;
    if target_program != frame.pc.program {
        db.instance_inc(target_program);
        frame.caller_chain.push(target_program);
    }
    frame.pc = ProgramCounter { program: target_program, offset: target_offset };
    Ok(())
}

/// `CALL`: pops either `[program-ref]` or `[name-string program-ref]`,
/// looks up the entry point, charges permission, and enters the target.
/// Performs lazy-compile via [`Compiler::ensure_compiled`] when the target
/// has no code yet.
pub fn call(
    frame: &mut Frame,
    mlev: u8,
    caller_uid: ObjRef,
    db: &mut impl Database,
    compiler: &mut impl Compiler,
) -> Result<(), AbortKind> {
    let top = pop_checked(frame, "Stack Underflow. Missing dbref argument.")?;
    let (program_ref, public_name) = match top {
        Value::ObjectRef(p) => (p, None),
        other => {
            let program_val = pop_checked(frame, "Stack Underflow. Missing dbref of func.")?;
            let name = match &other {
                Value::Str(s) if !s.is_empty() => s.to_string(),
                _ => return Err(AbortKind::Recoverable("Public Func. name string required. (2)".to_string())),
            };
            let program_ref = match program_val {
                Value::ObjectRef(p) => p,
                _ => return Err(AbortKind::Recoverable("Dbref required. (1)".to_string())),
            };
            (program_ref, Some(name))
        }
    };

    if !db.valid(program_ref) || db.typeof_obj(program_ref) != ObjType::Program {
        return Err(AbortKind::Recoverable("Invalid object.".to_string()));
    }
    if db.code(program_ref).is_none() {
        compiler
            .ensure_compiled(program_ref)
            .map_err(|e| AbortKind::Recoverable(format!("Program not compilable: {}", e)))?;
    }
    if db.mlevel(program_ref) == 0 {
        return Err(AbortKind::Recoverable("Permission denied".to_string()));
    }
    if mlev < 4 && db.owner(program_ref) != caller_uid && !db.flags(program_ref).linkable {
        return Err(AbortKind::Recoverable("Permission denied".to_string()));
    }

    let entry_offset = match &public_name {
        None => db.code(program_ref).map(|p| p.start).unwrap_or(0),
        Some(name) => {
            let entry = db
                .code(program_ref)
                .and_then(|p| p.find_public(name))
                .ok_or_else(|| AbortKind::Recoverable("PUBLIC or WIZCALL function not found. (2)".to_string()))?;
            if mlev < entry.mlev {
                return Err(AbortKind::Recoverable(
                    "Insufficient permissions to call WIZCALL function. (2)".to_string(),
                ));
            }
            entry.addr
        }
    };

    let return_pc = ProgramCounter { program: frame.pc.program, offset: frame.pc.offset + 1 };
    frame
        .system_stack
        .push(return_pc)
        .map_err(|_| AbortKind::Recoverable("System Stack Overflow".to_string()))?;

    if program_ref != frame.pc.program {
        frame.stop_profile_timer();
        db.instance_inc(program_ref);
        frame.caller_chain.push(program_ref);
        frame.start_profile_timer();
    }
    frame.pc = ProgramCounter { program: program_ref, offset: entry_offset };
    Ok(())
}

/// `RET`: pops the innermost scoped-variable frame; if returning across a
/// program boundary, decrements the departing program's instance count and
/// restarts the profile timer for the resumed one.
pub fn ret(frame: &mut Frame, db: &mut impl Database) -> Result<(), AbortKind> {
    frame.scoped.pop(db);
    let return_pc = frame
        .system_stack
        .pop()
        .ok_or_else(|| AbortKind::Hard("Internal error.  System stack underflow.".to_string()))?;
    if return_pc.program != frame.pc.program {
        frame.stop_profile_timer();
        db.instance_dec(frame.pc.program);
        frame.caller_chain.pop();
        frame.start_profile_timer();
    }
    frame.pc = return_pc;
    Ok(())
}

/// `TRY`: pops the protected-slot count `n`, pushes a try-frame recording
/// the operand/system/for-stack heights to unwind to on `CATCH` and the
/// handler address.
pub fn try_push(frame: &mut Frame, handler: ProgramCounter) -> Result<(), AbortKind> {
    let n = pop_checked(frame, "Stack Underflow.")?;
    let n = match n {
        Value::Integer(n) if n >= 0 => n as usize,
        Value::Integer(_) => return Err(AbortKind::Recoverable("Negative argument to TRY.".to_string())),
        _ => return Err(AbortKind::Recoverable("Integer argument to TRY required.".to_string())),
    };
    let atop = frame.operand_stack.height();
    if n > atop {
        return Err(AbortKind::Recoverable("TRY protects more than the current stack depth.".to_string()));
    }
    let for_count = frame.for_stack.depth();
    frame
        .try_stack
        .push(TryNode {
            depth: atop - n,
            call_level: frame.system_stack.height(),
            for_count,
            handler,
        });
    Ok(())
}

/// `CATCH`/`CATCH_DETAILED`: unwinds the operand stack to the try-frame's
/// protected depth, unwinds its recorded for-loop count, pops the
/// try-frame, then pushes the caught error (a bare string, or a detailed
/// dictionary).
pub fn catch(frame: &mut Frame, detailed: bool, db: &mut impl Database) -> Result<(), AbortKind> {
    let try_node = frame
        .try_stack
        .pop()
        .ok_or_else(|| AbortKind::Hard("Internal error.  TRY stack underflow.".to_string()))?;

    frame.operand_stack.unwind_to(try_node.depth, db);
    frame.for_stack.unwind_to(try_node.for_count);

    let pending = frame.pending_error.take();
    let value = if detailed {
        let mut dict = std::collections::BTreeMap::new();
        if let Some(err) = &pending {
            dict.insert(ArrayKey::Str("error".to_string()), Value::Str(Rc::from(err.message.as_str())));
            dict.insert(ArrayKey::Str("instr".to_string()), Value::Str(Rc::from(err.instr_text.as_str())));
        }
        dict.insert(ArrayKey::Str("line".to_string()), Value::Integer(pending.as_ref().map_or(0, |e| e.line as i64)));
        dict.insert(
            ArrayKey::Str("program".to_string()),
            Value::ObjectRef(pending.as_ref().map_or(muf_types::NOTHING, |e| e.program)),
        );
        Value::Array(Rc::new(std::cell::RefCell::new(MufArray::Dict(dict))))
    } else {
        match pending {
            Some(err) => Value::Str(Rc::from(err.message.as_str())),
            None => Value::Str(Rc::from("")),
        }
    };
    push_checked(frame, value)
}

/// `EVENT_WAITFOR`: pops a list of event-id strings, deduplicates, and
/// registers the frame as a listener for each.
pub fn event_waitfor(frame: &mut Frame, player: ObjRef, program: ProgramId, db: &mut impl Database, events: &mut impl EventBus) -> Result<(), AbortKind> {
    let arg = pop_checked(frame, "Stack Underflow. Missing eventID list array argument.")?;
    let mut names: Vec<String> = Vec::new();
    match arg {
        Value::Array(a) => {
            let arr = a.borrow();
            if let MufArray::List(items) = &*arr {
                for item in items {
                    if let Value::Str(s) = item {
                        if !names.iter().any(|n| n == &**s) {
                            names.push(s.to_string());
                        }
                    }
                }
            } else {
                return Err(AbortKind::Recoverable(
                    "Argument must be a list array of eventid strings.".to_string(),
                ));
            }
        }
        mut other => {
            other.clear(db);
            return Err(AbortKind::Recoverable("EventID string list array expected.".to_string()));
        }
    }
    events.register(player, program, frame.pid, &names);
    Ok(())
}
