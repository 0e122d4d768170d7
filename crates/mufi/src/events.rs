// Copyright (c) 2026, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

//! An in-memory `EventBus` (spec.md §4.7/§6): tracks which pids are
//! listening for which named events and logs what gets posted, for the
//! demo driver and tests to inspect. Values posted through here carry no
//! Address payloads in this harness, so clearing them with `NullCounter`
//! (rather than wiring a `Database` handle through `EventBus::post`) costs
//! nothing in practice.

use std::collections::HashMap;

use muf_host::EventBus;
use muf_types::{NullCounter, ObjRef, Pid, ProgramId, Value};

/// A posted event, captured as a loggable summary (the payload is almost
/// always `PROC.EXIT.<pid>`'s integer pid).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedEvent {
    pub pid: Pid,
    pub name: String,
    pub integer_payload: Option<i64>,
}

#[derive(Default)]
pub struct InMemoryEvents {
    listeners: HashMap<String, Vec<Pid>>,
    registrations: HashMap<Pid, (ObjRef, ProgramId, Vec<String>)>,
    pub posted: Vec<PostedEvent>,
}

impl InMemoryEvents {
    pub fn new() -> Self {
        InMemoryEvents::default()
    }

    pub fn listeners_for(&self, name: &str) -> &[Pid] {
        self.listeners.get(name).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

impl EventBus for InMemoryEvents {
    fn register(&mut self, player: ObjRef, program: ProgramId, pid: Pid, names: &[String]) {
        for name in names {
            self.listeners.entry(name.clone()).or_default().push(pid);
        }
        self.registrations.insert(pid, (player, program, names.to_vec()));
    }

    fn post(&mut self, pid: Pid, name: &str, mut value: Value) {
        let integer_payload = match &value {
            Value::Integer(n) => Some(*n),
            _ => None,
        };
        value.clear(&mut NullCounter);
        self.posted.push(PostedEvent { pid, name: name.to_string(), integer_payload });
        if let Some(pids) = self.listeners.get_mut(name) {
            pids.retain(|&p| p != pid);
        }
    }

    fn purge(&mut self, pid: Pid) {
        if let Some((_, _, names)) = self.registrations.remove(&pid) {
            for name in names {
                if let Some(pids) = self.listeners.get_mut(&name) {
                    pids.retain(|&p| p != pid);
                }
            }
        }
    }
}
