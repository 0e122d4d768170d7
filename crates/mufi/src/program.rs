// Copyright (c) 2026, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

//! Small builder for hand-assembled [`ProgramSource`]s, so the demo binary
//! and tests can write MUF-like instruction sequences without spelling out
//! `(Op, u32)` tuples by hand.

use muf_host::program::ConstValue;
use muf_host::{Op, Primitive, PublicEntry};

use crate::database::ProgramSource;

#[derive(Default)]
pub struct ProgramBuilder {
    name: String,
    publics: Vec<PublicEntry>,
    ops: Vec<(Op, u32)>,
}

impl ProgramBuilder {
    pub fn new(name: &str) -> Self {
        ProgramBuilder { name: name.to_string(), publics: Vec::new(), ops: Vec::new() }
    }

    pub fn op(mut self, op: Op, line: u32) -> Self {
        self.ops.push((op, line));
        self
    }

    pub fn push_int(self, n: i64, line: u32) -> Self {
        self.op(Op::Push(ConstValue::Integer(n)), line)
    }

    pub fn push_str(self, s: &str, line: u32) -> Self {
        self.op(Op::Push(ConstValue::Str(std::rc::Rc::from(s))), line)
    }

    pub fn primitive(self, prim: Primitive, line: u32) -> Self {
        self.op(Op::Primitive(prim), line)
    }

    pub fn public(mut self, name: &str, mlev: u8, addr: usize) -> Self {
        self.publics.push(PublicEntry { name: name.to_string(), mlev, addr });
        self
    }

    /// Finishes the program, entering execution at instruction 0.
    pub fn build(self) -> ProgramSource {
        ProgramSource { name: self.name, start: 0, publics: self.publics, ops: self.ops }
    }
}
