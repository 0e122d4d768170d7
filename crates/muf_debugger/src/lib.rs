// Copyright (c) 2026, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

//! Live single-step debugger: the breakpoint predicate evaluator and a
//! source-line listing helper, grounded in the breakpoint-matching block of
//! `interp_loop` (`examples/original_source/fbmuck/src/interp.c:1132-1172`).

use muf_host::{Database, Io};
use muf_stack::{Breakpoint, DebuggerState, ProgramCounter};
use muf_types::{ObjRef, ProgramId};

/// Whether the debugger should suspend execution at the current
/// instruction (spec.md §4.3 step 4). Each breakpoint is a conjunction of
/// its `Some` clauses; a `None` clause is vacuously satisfied. Matching
/// the countdown clauses (`line_count`/`pc_count`) only advances when the
/// source line (or instruction) actually changed since the last tick,
/// mirroring the original's `lastline`/`lastpc` guards. `bypass` consumes
/// one matching opportunity without actually stopping, used by single-step
/// continuation so the just-hit breakpoint doesn't refire immediately.
pub fn should_break(debugger: &mut DebuggerState, pc: ProgramCounter, line: u32, stop_depth: usize) -> bool {
    if !debugger.armed {
        return false;
    }
    let last_line = debugger.last_line;
    let line_changed = last_line != Some(line);
    let bypass = debugger.bypass;

    let mut fired = false;
    for bp in &mut debugger.breakpoints {
        if !breakpoint_matches(bp, pc, line, stop_depth, line_changed) {
            continue;
        }
        if bypass {
            // Consume the opportunity: countdowns that were armed-but-idle
            // (at 0, ready to fire) get nudged so the *next* tick fires
            // instead of this one.
            if let Some(n) = bp.pc_count {
                if n == 0 {
                    bp.pc_count = Some(0);
                }
            }
            if let Some(n) = bp.line_count {
                if n == 0 {
                    bp.line_count = Some(0);
                }
            }
        } else {
            fired = true;
            break;
        }
    }
    debugger.last_line = Some(line);
    debugger.bypass = false;
    fired
}

fn breakpoint_matches(bp: &mut Breakpoint, pc: ProgramCounter, line: u32, stop_depth: usize, line_changed: bool) -> bool {
    let pc_match = bp.pc.map_or(true, |p| p == pc.offset);
    let line_match = bp.line.map_or(true, |l| line_changed && l == line);
    let depth_match = bp.stop_depth.map_or(true, |lvl| stop_depth <= lvl);
    let prog_match = bp.program.map_or(true, |p| p == pc.program);

    let line_count_match = match bp.line_count {
        None => true,
        Some(n) => {
            if line_changed {
                let fire = n == 0;
                bp.line_count = Some(n.saturating_sub(1));
                fire
            } else {
                false
            }
        }
    };
    let pc_count_match = match bp.pc_count {
        None => true,
        Some(n) => {
            let fire = n == 0;
            bp.pc_count = Some(n.saturating_sub(1));
            fire
        }
    };

    pc_match && line_match && depth_match && prog_match && line_count_match && pc_count_match
}

/// Whether the debugger should even be ticked this instruction (spec.md
/// §4.3 step 4's guard before evaluating breakpoints): the program is a
/// ZOMBIE or debugging was forced, the frame isn't backgrounded, and the
/// invoking player controls the program.
pub fn is_armed(db: &impl Database, player: ObjRef, program: ProgramId, force_debugging: bool, backgrounded: bool) -> bool {
    (db.flags(program).zombie || force_debugging) && !backgrounded && db.controls(player, program)
}

/// Renders one line of the single-step trace the debugger prints before
/// executing an instruction, when output isn't suppressed.
pub fn notify_step(io: &mut impl Io, player: ObjRef, pid: i64, line: u32, text: &str) {
    io.notify(player, &format!("#{} {}: {}", pid, line, text));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pc(offset: usize) -> ProgramCounter {
        ProgramCounter { program: 1, offset }
    }

    #[test]
    fn disarmed_debugger_never_breaks() {
        let mut debugger = DebuggerState::default();
        assert!(!should_break(&mut debugger, pc(0), 1, 1));
    }

    #[test]
    fn pc_breakpoint_fires_on_matching_offset_only() {
        let mut debugger = DebuggerState { armed: true, ..Default::default() };
        debugger.breakpoints.push(Breakpoint { pc: Some(5), ..Default::default() });
        assert!(!should_break(&mut debugger, pc(4), 1, 1));
        assert!(should_break(&mut debugger, pc(5), 2, 1));
    }

    #[test]
    fn line_breakpoint_only_fires_once_per_line_change() {
        let mut debugger = DebuggerState { armed: true, ..Default::default() };
        debugger.breakpoints.push(Breakpoint { line: Some(10), ..Default::default() });
        assert!(should_break(&mut debugger, pc(0), 10, 1));
        // Same line again: lastline == line, so it must not refire.
        assert!(!should_break(&mut debugger, pc(1), 10, 1));
    }

    #[test]
    fn bypass_consumes_one_opportunity_without_stopping() {
        let mut debugger = DebuggerState { armed: true, bypass: true, ..Default::default() };
        debugger.breakpoints.push(Breakpoint { pc: Some(0), ..Default::default() });
        assert!(!should_break(&mut debugger, pc(0), 1, 1));
        assert!(should_break(&mut debugger, pc(0), 2, 1));
    }

    #[test]
    fn stop_depth_matches_at_or_below_configured_level() {
        let mut debugger = DebuggerState { armed: true, ..Default::default() };
        debugger.breakpoints.push(Breakpoint { stop_depth: Some(2), ..Default::default() });
        assert!(should_break(&mut debugger, pc(0), 1, 2));
        assert!(should_break(&mut debugger, pc(0), 5, 1));
    }
}
