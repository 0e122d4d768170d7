// Copyright (c) 2026, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

//! Frame state and the five per-frame stacks (operand, system, caller
//! chain, for, try).

pub mod frame;
pub mod stacks;

pub use frame::{Breakpoint, DebuggerState, Frame, MultitaskMode, PendingError};
pub use stacks::{
    CallerChain, ForNode, ForStack, OperandStack, ProgramCounter, StackError, SystemStack,
    TryNode, TryStack, STACK_SIZE,
};
