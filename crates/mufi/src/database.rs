// Copyright (c) 2026, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

//! An in-memory stand-in for the object database and compiler (spec.md §6),
//! shaped the way the teacher's `InMemoryProgramResource` stands in for a
//! real module loader: programs are pre-registered as [`ProgramSource`]
//! and only turned into [`CompiledProgram`]s on first `CALL`/`interp`, the
//! same lazy-compile contract `muf_engine::control::call` assumes.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use muf_host::{CompiledProgram, Compiler, Database, HostError, Instruction, ObjType, ObjectFlags, Op, PublicEntry};
use muf_types::{ObjRef, ProgramId};

/// Everything the in-memory database tracks about one object (a program,
/// player, room, exit or thing — spec.md only distinguishes by
/// [`ObjType`]).
#[derive(Debug, Clone)]
pub struct ObjectRecord {
    pub owner: ObjRef,
    pub mlevel: u8,
    pub flags: ObjectFlags,
    pub typ: ObjType,
    pub valid: bool,
    pub true_wizard: bool,
}

impl Default for ObjectRecord {
    fn default() -> Self {
        ObjectRecord {
            owner: 1,
            mlevel: 3,
            flags: ObjectFlags::default(),
            typ: ObjType::Thing,
            valid: true,
            true_wizard: false,
        }
    }
}

/// Uncompiled source for one program: its entry point, public entries, and
/// instruction list in the order [`crate::database::InMemoryDatabase::ensure_compiled`]
/// installs them.
#[derive(Debug, Clone)]
pub struct ProgramSource {
    pub name: String,
    pub start: usize,
    pub publics: Vec<PublicEntry>,
    pub ops: Vec<(Op, u32)>,
}

#[derive(Debug, Clone, Default)]
struct CrashLogEntry {
    errcount: u32,
    lasterr: String,
    lastcrash: String,
    lastcrashtime: i64,
}

/// In-memory `Database` + `Compiler`: backs `mufi`'s demo binary and
/// integration tests the way a real MUCK's `db.c`/`interp.c` compile cache
/// backs the original.
#[derive(Default)]
pub struct InMemoryDatabase {
    pub objects: HashMap<ObjRef, ObjectRecord>,
    pub sources: HashMap<ProgramId, ProgramSource>,
    pub programs: HashMap<ProgramId, Rc<CompiledProgram>>,
    pub instances: HashMap<ProgramId, u32>,
    pub compile_count: HashMap<ProgramId, u32>,
    crash_log: HashMap<ProgramId, CrashLogEntry>,
    pub profiled: HashMap<ProgramId, Duration>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        InMemoryDatabase::default()
    }

    pub fn put_object(&mut self, obj: ObjRef, record: ObjectRecord) {
        self.objects.insert(obj, record);
    }

    /// Registers source for `program`; it is compiled lazily on first
    /// `CALL`/`interp`, never here.
    pub fn put_source(&mut self, program: ProgramId, source: ProgramSource) {
        self.sources.insert(program, source);
    }

    fn record(&self, obj: ObjRef) -> ObjectRecord {
        self.objects.get(&obj).cloned().unwrap_or_default()
    }
}

impl Database for InMemoryDatabase {
    fn flags(&self, obj: ObjRef) -> ObjectFlags {
        self.record(obj).flags
    }

    fn owner(&self, obj: ObjRef) -> ObjRef {
        self.record(obj).owner
    }

    fn mlevel(&self, obj: ObjRef) -> u8 {
        self.record(obj).mlevel
    }

    fn is_true_wizard(&self, obj: ObjRef) -> bool {
        self.record(obj).true_wizard
    }

    fn controls(&self, player: ObjRef, program: ProgramId) -> bool {
        player == self.owner(program) || self.is_true_wizard(player)
    }

    fn can_link_to(&self, owner: ObjRef, program: ProgramId) -> bool {
        owner == self.owner(program) || self.is_true_wizard(owner) || self.flags(program).linkable
    }

    fn valid(&self, obj: ObjRef) -> bool {
        self.record(obj).valid
    }

    fn typeof_obj(&self, obj: ObjRef) -> ObjType {
        self.record(obj).typ
    }

    fn code(&self, program: ProgramId) -> Option<Rc<CompiledProgram>> {
        self.programs.get(&program).cloned()
    }

    fn instance_count(&self, program: ProgramId) -> u32 {
        *self.instances.get(&program).unwrap_or(&0)
    }

    fn instance_inc(&mut self, program: ProgramId) {
        *self.instances.entry(program).or_insert(0) += 1;
    }

    fn instance_dec(&mut self, program: ProgramId) {
        let count = self.instances.entry(program).or_insert(0);
        *count = count.saturating_sub(1);
    }

    fn profile_add(&mut self, program: ProgramId, duration: Duration) {
        *self.profiled.entry(program).or_insert(Duration::ZERO) += duration;
    }

    fn bump_crash_log(&mut self, program: ProgramId, message: &str, now_unix: i64) {
        let entry = self.crash_log.entry(program).or_default();
        entry.errcount += 1;
        entry.lasterr = message.to_string();
        entry.lastcrash = message.to_string();
        entry.lastcrashtime = now_unix;
    }
}

impl Compiler for InMemoryDatabase {
    /// Installs `self.sources[program]` as a [`CompiledProgram`] the first
    /// time it's called for a program with no code yet (spec.md §8
    /// scenario 3: the second call must be a no-op).
    fn ensure_compiled(&mut self, program: ProgramId) -> Result<(), HostError> {
        if self.programs.contains_key(&program) {
            return Ok(());
        }
        let source = self.sources.get(&program).ok_or(HostError::NoSuchProgram(program))?;
        let code = source
            .ops
            .iter()
            .map(|(op, line)| Instruction { op: op.clone(), line: *line })
            .collect();
        self.programs.insert(
            program,
            Rc::new(CompiledProgram {
                program,
                name: source.name.clone(),
                code,
                start: source.start,
                publics: source.publics.clone(),
            }),
        );
        *self.compile_count.entry(program).or_insert(0) += 1;
        Ok(())
    }
}

/// A cloneable, shared handle onto an [`InMemoryDatabase`], used to satisfy
/// `muf_engine`'s `Database` side of [`muf_engine::HostHandles`]. Split from
/// [`DatabaseCompiler`] so the dispatcher can hold both a `&mut Database`
/// and a `&mut Compiler` at once even though they drive the same
/// underlying state — one `InMemoryDatabase` behind an `Rc<RefCell<_>>`,
/// borrowed separately by each handle at the point of use.
#[derive(Clone)]
pub struct SharedDatabase(pub Rc<RefCell<InMemoryDatabase>>);

impl SharedDatabase {
    pub fn new(db: InMemoryDatabase) -> Self {
        SharedDatabase(Rc::new(RefCell::new(db)))
    }

    /// Borrows the database to run a closure against it directly, for setup
    /// code (`put_object`/`put_source`) that runs before any `HostHandles`
    /// are constructed.
    pub fn with<R>(&self, f: impl FnOnce(&mut InMemoryDatabase) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }

    /// The `Compiler` half of this same shared database.
    pub fn compiler(&self) -> DatabaseCompiler {
        DatabaseCompiler(Rc::clone(&self.0))
    }
}

impl Database for SharedDatabase {
    fn flags(&self, obj: ObjRef) -> ObjectFlags {
        self.0.borrow().flags(obj)
    }
    fn owner(&self, obj: ObjRef) -> ObjRef {
        self.0.borrow().owner(obj)
    }
    fn mlevel(&self, obj: ObjRef) -> u8 {
        self.0.borrow().mlevel(obj)
    }
    fn is_true_wizard(&self, obj: ObjRef) -> bool {
        self.0.borrow().is_true_wizard(obj)
    }
    fn controls(&self, player: ObjRef, program: ProgramId) -> bool {
        self.0.borrow().controls(player, program)
    }
    fn can_link_to(&self, owner: ObjRef, program: ProgramId) -> bool {
        self.0.borrow().can_link_to(owner, program)
    }
    fn valid(&self, obj: ObjRef) -> bool {
        self.0.borrow().valid(obj)
    }
    fn typeof_obj(&self, obj: ObjRef) -> ObjType {
        self.0.borrow().typeof_obj(obj)
    }
    fn code(&self, program: ProgramId) -> Option<Rc<CompiledProgram>> {
        self.0.borrow().code(program)
    }
    fn instance_count(&self, program: ProgramId) -> u32 {
        self.0.borrow().instance_count(program)
    }
    fn instance_inc(&mut self, program: ProgramId) {
        self.0.borrow_mut().instance_inc(program)
    }
    fn instance_dec(&mut self, program: ProgramId) {
        self.0.borrow_mut().instance_dec(program)
    }
    fn profile_add(&mut self, program: ProgramId, duration: Duration) {
        self.0.borrow_mut().profile_add(program, duration)
    }
    fn bump_crash_log(&mut self, program: ProgramId, message: &str, now_unix: i64) {
        self.0.borrow_mut().bump_crash_log(program, message, now_unix)
    }
}

/// The `Compiler` half of a [`SharedDatabase`], cloned off it so both sides
/// of `muf_host`'s trait split can be live at once.
pub struct DatabaseCompiler(Rc<RefCell<InMemoryDatabase>>);

impl Compiler for DatabaseCompiler {
    fn ensure_compiled(&mut self, program: ProgramId) -> Result<(), HostError> {
        self.0.borrow_mut().ensure_compiled(program)
    }
}
