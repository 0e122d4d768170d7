// Copyright (c) 2026, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

//! Permission computation (spec.md §4.8), grounded directly in
//! `find_mlev`/`find_uid` (`examples/original_source/fbmuck/src/interp.c:1905-1933`).

use muf_host::Database;
use muf_types::{ObjRef, ProgramId};

/// `SETUID`/`HARDUID` permission modes a frame can run under (spec.md §4.8's
/// `fr->perms`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermMode {
    Std,
    SetUid,
    HardUid,
}

/// `find_mlev`: the effective permission level a program runs at. If the
/// program is both STICKY and HAVEN and its caller (`caller_chain[stop-1]`)
/// is owned by a true wizard, recurse into the caller instead; otherwise
/// `min(prog-level, owner-level)`.
pub fn find_mlev(db: &impl Database, caller_chain: &[ProgramId], prog: ProgramId, stop: usize) -> u8 {
    let flags = db.flags(prog);
    if flags.sticky && flags.haven && stop > 1 && db.is_true_wizard(db.owner(prog)) {
        return find_mlev(db, caller_chain, caller_chain[stop - 1], stop - 1);
    }
    db.mlevel(prog).min(db.mlevel(db.owner(prog)))
}

/// `find_uid`: the effective owner a program's primitives act as.
pub fn find_uid(
    db: &impl Database,
    caller_chain: &[ProgramId],
    player: ObjRef,
    stop: usize,
    program: ProgramId,
    perm_mode: PermMode,
    trigger: ObjRef,
) -> ObjRef {
    let flags = db.flags(program);
    if flags.sticky || perm_mode == PermMode::SetUid {
        if flags.haven {
            if stop > 1 && db.is_true_wizard(db.owner(program)) {
                return find_uid(db, caller_chain, player, stop - 1, caller_chain[stop - 1], perm_mode, trigger);
            }
            return db.owner(program);
        }
        return db.owner(program);
    }
    if db.mlevel(program) < 2 {
        return db.owner(program);
    }
    if flags.haven || perm_mode == PermMode::HardUid {
        if trigger == muf_types::NOTHING {
            return db.owner(program);
        }
        return db.owner(trigger);
    }
    db.owner(player)
}
