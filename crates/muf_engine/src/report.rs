// Copyright (c) 2026, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

//! Renders the uncaught-error notification and crash-log bookkeeping
//! (spec.md §7, grounded in `interp_err`, `examples/original_source/fbmuck/src/interp.c:1795`).

use muf_host::Database;
use muf_types::ObjRef;

use crate::error::UncaughtError;

/// Strips ANSI escapes the way the original's `strip_ansi` does, since the
/// property store only ever stores the plain-text form of `.debug/lasterr`.
fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' {
            if chars.peek() == Some(&'[') {
                chars.next();
                while let Some(&next) = chars.peek() {
                    chars.next();
                    if next.is_ascii_alphabetic() {
                        break;
                    }
                }
            }
            continue;
        }
        out.push(c);
    }
    out
}

/// Two user-visible lines: who gets told, and the formatted error itself.
/// Owner-of-origin == owner-of-player gets the plain "Program Error"
/// notice; anyone else gets pointed at the program's owner.
pub fn format_uncaught(err: &UncaughtError, origin_owner: ObjRef, player_owner: ObjRef, owner_name: &str) -> [String; 2] {
    let banner = if origin_owner == player_owner {
        "\x1b[1;31;40mProgram Error.  Your program just got the following error.\x1b[0m".to_string()
    } else {
        format!(
            "\x1b[1;31;40mProgrammer Error.  Please tell {} what you typed, and the following message.\x1b[0m",
            owner_name
        )
    };
    let detail = format!(
        "\x1b[1m{}(#{}), line {}; {}: {}\x1b[0m",
        program_name_placeholder(err.program),
        err.program,
        err.line,
        err.message1,
        err.message2
    );
    [banner, detail]
}

/// The database owns program names; callers that have a real `Database`
/// handy should format the name themselves. This placeholder only appears
/// if a caller renders a message without the program's real name resolved
/// first.
fn program_name_placeholder(program: ObjRef) -> String {
    format!("#{}", program)
}

/// Bumps the crash-log properties on both the crashing program and, if
/// different, the program the player originally invoked (spec.md §4.5,
/// §6). `now_unix` is supplied by the caller since the engine does not
/// read the wall clock itself (keeps the dispatcher deterministic for
/// tests).
pub fn bump_crash_log(db: &mut impl Database, err: &UncaughtError, now_unix: i64) {
    let [_, detail] = format_uncaught(err, db.owner(err.origin_program), db.owner(err.origin_program), "");
    let stripped = strip_ansi(&detail);
    db.bump_crash_log(err.origin_program, &stripped, now_unix);
    if err.origin_program != err.program {
        db.bump_crash_log(err.program, &stripped, now_unix);
    }
}
