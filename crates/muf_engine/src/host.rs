// Copyright (c) 2026, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

//! Bundles the five external collaborators (spec.md §6) the dispatcher
//! needs for the duration of one `run()` call. Generic rather than
//! trait-object-based: the dispatcher's hot loop calls through these on
//! every instruction, so monomorphized static dispatch is worth the extra
//! type parameters (the teacher's own `anc-processor` dispatch loop makes
//! the same call for its handler table).

use muf_host::{Compiler, Database, EventBus, Io, PrimitiveLibrary, Scheduler};

/// Borrowed handles to everything out of scope the dispatcher calls
/// through. Built fresh by the caller for each [`crate::Dispatcher::run`]
/// invocation — the dispatcher itself owns none of these.
pub struct HostHandles<'a, C, D, S, E, I, P>
where
    C: Compiler,
    D: Database,
    S: Scheduler,
    E: EventBus,
    I: Io,
    P: PrimitiveLibrary,
{
    pub compiler: &'a mut C,
    pub database: &'a mut D,
    pub scheduler: &'a mut S,
    pub events: &'a mut E,
    pub io: &'a mut I,
    pub primitives: &'a mut P,
}
