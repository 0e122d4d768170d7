// Copyright (c) 2026, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

//! Compiled-program representation. The compiler itself is out of scope
//! (spec.md §1); this module only defines the shape `Compiler::ensure_compiled`
//! installs on a program and the dispatcher reads from — the Rust stand-in for
//! the original's flat `struct inst *code` array plus its `PROGRAM_PUBS` list.

use std::rc::Rc;

use muf_types::{Address, AddressTarget, LockExpr, MufArray, ObjRef, ProcMeta, ProgramId, Value};
use muf_types::InstanceCounter;

/// A constant literal an instruction pushes a fresh copy of. Mirrors
/// `Value::copy`'s tag-by-tag rules (spec.md §4.1) but lives in the
/// compiled program rather than on a live frame, since the same constant
/// is pushed anew on every execution of the instruction.
#[derive(Debug, Clone)]
pub enum ConstValue {
    Integer(i64),
    Float(f64),
    ObjectRef(ObjRef),
    Str(Rc<str>),
    Array(Rc<std::cell::RefCell<MufArray>>),
    Address(Address),
    Lock(Rc<LockExpr>),
    Mark,
    Var(u16),
    LVar(u16),
    SVar(u16),
    Function(Rc<ProcMeta>),
    Primitive(u32),
}

impl ConstValue {
    /// Produces the `Value` an instruction pushes, applying the same
    /// ownership rules as `Value::copy`.
    pub fn to_value(&self, counter: &mut impl InstanceCounter) -> Value {
        match self {
            ConstValue::Integer(n) => Value::Integer(*n),
            ConstValue::Float(f) => Value::Float(*f),
            ConstValue::ObjectRef(o) => Value::ObjectRef(*o),
            ConstValue::Str(s) => Value::Str(Rc::clone(s)),
            ConstValue::Array(a) => Value::Array(Rc::clone(a)),
            ConstValue::Address(addr) => {
                counter.instance_inc(addr.program);
                Value::Address(Rc::clone(addr))
            }
            ConstValue::Lock(l) => Value::Lock(Rc::clone(l)),
            ConstValue::Mark => Value::Mark,
            ConstValue::Var(n) => Value::Var(*n),
            ConstValue::LVar(n) => Value::LVar(*n),
            ConstValue::SVar(n) => Value::SVar(*n),
            ConstValue::Function(meta) => Value::Function(Box::new((**meta).clone())),
            ConstValue::Primitive(n) => Value::Primitive(*n),
        }
    }
}

/// One of the non-library control-flow primitives, sub-dispatched from a
/// `PRIMITIVE` instruction (spec.md §4.3 instruction table). Everything not
/// listed here is a library call, dispatched by number through
/// [`crate::PrimitiveLibrary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Call,
    Ret,
    Catch,
    CatchDetailed,
    EventWaitfor,
    Read,
    Sleep,
    /// Anything not one of the above: a library primitive, by number.
    Library(u32),
}

/// The decoded instruction tag (spec.md §4.3's table). `EXEC`/`JMP`/`TRY`
/// are their own tags, matching the original's switch on `pc->type` before
/// it ever reaches the `PROG_PRIMITIVE` sub-dispatch.
#[derive(Debug, Clone)]
pub enum Op {
    /// Push a copy of the instruction's constant onto the operand stack.
    Push(ConstValue),
    LVarAt { n: u16, clear: bool },
    LVarBang { n: u16 },
    SVarAt { n: u16, clear: bool },
    SVarBang { n: u16 },
    /// Procedure-entry header: pushes a scoped-variable frame (unless
    /// `skip_declare` is set) sized for `var_count`, then pops `arg_count`
    /// operands into its first slots.
    Function {
        arg_count: u16,
        var_count: u16,
        var_names: Rc<[String]>,
    },
    /// Pop; jump to `target` (an offset within the same program) if false,
    /// otherwise fall through.
    If { target: usize },
    /// Push a return address at the instruction following this one onto
    /// the system stack, then jump to `target` (which may be in another
    /// program; a cross-program jump bumps its instance count).
    Exec { target: usize },
    /// Jump to `target` within the current program, with no system-stack
    /// push. If the target is a `Function` header, sets `skip_declare`.
    Jmp { target: usize },
    /// Pop the protected-slot count, push a try-frame recording the
    /// current stack heights, and remember `handler` (compiled to the
    /// matching CATCH's address) as where `CATCH`/an unwinding abort jumps
    /// to. Falls through to the protected body on the normal path; only an
    /// abort actually uses the jump.
    Try { handler: usize },
    Primitive(Primitive),
    /// A slot some earlier instruction clobbered (e.g. by a buggy patch);
    /// executing one is always a hard, non-catchable error.
    Cleared,
}

/// One compiled instruction: its tag plus the source line it came from, for
/// error reporting and the debugger's line-based breakpoints.
#[derive(Debug)]
pub struct Instruction {
    pub op: Op,
    pub line: u32,
}

/// A PUBLIC or WIZCALL entry point a foreign program may `CALL` by name.
#[derive(Debug, Clone)]
pub struct PublicEntry {
    pub name: String,
    /// Minimum caller permission level required (WIZCALL); 0 for PUBLIC.
    pub mlev: u8,
    pub addr: usize,
}

/// A program's compiled code: a flat instruction array plus its entry
/// point and name-addressable public entries. Installed by
/// [`crate::Compiler::ensure_compiled`].
#[derive(Debug)]
pub struct CompiledProgram {
    pub program: ProgramId,
    pub name: String,
    pub code: Vec<Instruction>,
    pub start: usize,
    pub publics: Vec<PublicEntry>,
}

impl CompiledProgram {
    /// Returns a clone of the matching entry rather than a borrow: callers
    /// (notably [`crate::Database::code`] implementations backed by a
    /// shared cache) hold the `CompiledProgram` itself only as an `Rc` with
    /// no lifetime tying it to `&self`'s caller.
    pub fn find_public(&self, name: &str) -> Option<PublicEntry> {
        self.publics.iter().find(|p| p.name.eq_ignore_ascii_case(name)).cloned()
    }

    pub fn instruction(&self, offset: usize) -> Option<&Instruction> {
        self.code.get(offset)
    }
}

/// Builds an [`AddressTarget`] for use in a [`ConstValue::Address`] literal.
pub fn address_target(program: ProgramId, offset: usize) -> Address {
    Rc::new(AddressTarget { program, offset })
}
