// Copyright (c) 2026, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

//! An in-memory `Io`: buffers everything notified to a player instead of
//! writing to a real descriptor, so tests and the demo binary can assert
//! on exactly what a player would have seen.

use std::collections::HashMap;

use muf_host::Io;
use muf_types::ObjRef;

#[derive(Default)]
pub struct InMemoryIo {
    pub notified: Vec<(ObjRef, String)>,
    blocked: HashMap<ObjRef, bool>,
    online: HashMap<ObjRef, bool>,
    current_program: HashMap<ObjRef, ObjRef>,
}

impl InMemoryIo {
    pub fn new() -> Self {
        InMemoryIo::default()
    }

    pub fn set_online(&mut self, player: ObjRef, online: bool) {
        self.online.insert(player, online);
    }

    pub fn is_blocked(&self, player: ObjRef) -> bool {
        *self.blocked.get(&player).unwrap_or(&false)
    }

    /// Every line notified to `player`, in order, for test assertions.
    pub fn transcript_for(&self, player: ObjRef) -> Vec<&str> {
        self.notified.iter().filter(|(p, _)| *p == player).map(|(_, s)| s.as_str()).collect()
    }
}

impl Io for InMemoryIo {
    fn notify(&mut self, player: ObjRef, text: &str) {
        self.notified.push((player, text.to_string()));
    }

    fn set_block(&mut self, player: ObjRef, block: bool) {
        self.blocked.insert(player, block);
    }

    fn set_current_program(&mut self, player: ObjRef, program: ObjRef) {
        self.current_program.insert(player, program);
    }

    fn is_online(&self, player: ObjRef) -> bool {
        *self.online.get(&player).unwrap_or(&true)
    }
}
