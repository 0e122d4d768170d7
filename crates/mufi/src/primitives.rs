// Copyright (c) 2026, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

//! A minimal in-memory `PrimitiveLibrary`: just enough arithmetic and
//! string/stack operators (spec.md §6 calls the real library "out of
//! scope, provided as a trait") to drive the demo program and the
//! integration tests. Numbered the way the original's `prim_*` table is,
//! starting from 0 since these don't need to coexist with a real MUCK's
//! primitive numbering.

use muf_host::{PrimitiveAbort, PrimitiveContext, PrimitiveLibrary};
use muf_types::{NullCounter, Value};

pub const ADD: u32 = 0;
pub const SUB: u32 = 1;
pub const STRCAT: u32 = 2;
pub const POP: u32 = 3;
pub const DUP: u32 = 4;

fn pop(ctx: &mut PrimitiveContext, underflow_msg: &str) -> Result<Value, PrimitiveAbort> {
    let protected = ctx.frame.try_stack.innermost_depth();
    ctx.frame.operand_stack.pop(protected).map_err(|_| PrimitiveAbort::Catchable(underflow_msg.to_string()))
}

fn push(ctx: &mut PrimitiveContext, value: Value) -> Result<(), PrimitiveAbort> {
    ctx.frame.operand_stack.push(value).map_err(|_| PrimitiveAbort::Catchable("Stack Overflow".to_string()))
}

/// In-memory primitive table: `ADD`/`SUB` take two integers, `STRCAT`
/// takes two strings, `POP` discards the top value, `DUP` copies it.
#[derive(Default)]
pub struct InMemoryPrimitives;

impl InMemoryPrimitives {
    pub fn new() -> Self {
        InMemoryPrimitives
    }
}

impl PrimitiveLibrary for InMemoryPrimitives {
    fn call(&mut self, number: u32, ctx: &mut PrimitiveContext) -> Result<(), PrimitiveAbort> {
        match number {
            ADD => {
                let b = pop(ctx, "Stack Underflow. Missing argument for ADD.")?;
                let a = pop(ctx, "Stack Underflow. Missing argument for ADD.")?;
                match (a, b) {
                    (Value::Integer(x), Value::Integer(y)) => push(ctx, Value::Integer(x + y)),
                    _ => Err(PrimitiveAbort::Catchable("Integer arguments required for ADD.".to_string())),
                }
            }
            SUB => {
                let b = pop(ctx, "Stack Underflow. Missing argument for SUB.")?;
                let a = pop(ctx, "Stack Underflow. Missing argument for SUB.")?;
                match (a, b) {
                    (Value::Integer(x), Value::Integer(y)) => push(ctx, Value::Integer(x - y)),
                    _ => Err(PrimitiveAbort::Catchable("Integer arguments required for SUB.".to_string())),
                }
            }
            STRCAT => {
                let b = pop(ctx, "Stack Underflow. Missing argument for STRCAT.")?;
                let a = pop(ctx, "Stack Underflow. Missing argument for STRCAT.")?;
                match (a, b) {
                    (Value::Str(x), Value::Str(y)) => push(ctx, Value::Str(std::rc::Rc::from(format!("{}{}", x, y)))),
                    _ => Err(PrimitiveAbort::Catchable("String arguments required for STRCAT.".to_string())),
                }
            }
            POP => {
                let mut v = pop(ctx, "Stack Underflow. Missing argument for POP.")?;
                v.clear(&mut NullCounter);
                Ok(())
            }
            DUP => {
                let top = ctx.frame.operand_stack.peek().ok_or_else(|| PrimitiveAbort::Catchable("Stack Underflow. Missing argument for DUP.".to_string()))?;
                let copy = top.copy(&mut NullCounter);
                push(ctx, copy)
            }
            _ => Err(PrimitiveAbort::Hard(format!("Internal error. Unknown primitive #{}.", number))),
        }
    }
}
