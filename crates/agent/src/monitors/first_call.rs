// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! First-call and to-java-call observations.
//!
//! Multiple threads may race to report different "first-called" names on
//! the to-java path; a single compare-and-set accepts the first observed
//! name and the rest are ignored.

use std::sync::Arc;

use parking_lot::Mutex;

use crs_core::{Clock, EventPayload, VmEvent};

use crate::services::events::EventService;

pub struct FirstCallMonitor<C: Clock> {
    events: Arc<EventService>,
    vm_id: String,
    clock: C,
    main_name: Mutex<Option<String>>,
}

impl<C: Clock> FirstCallMonitor<C> {
    pub fn new(events: Arc<EventService>, vm_id: impl Into<String>, clock: C) -> Self {
        Self { events, vm_id: vm_id.into(), clock, main_name: Mutex::new(None) }
    }

    /// Host callback for the first invocation of a method.
    pub fn on_first_call(&self, class_name: &str, method_name: &str) {
        self.events.add(VmEvent::new(
            self.vm_id.clone(),
            self.clock.epoch_ms(),
            EventPayload::MethodFirstCalled {
                class_name: class_name.to_string(),
                method_name: method_name.to_string(),
            },
        ));
    }

    /// Host callback for a native-to-java entry. Only the winning name
    /// produces an event.
    pub fn on_to_java_call(&self, name: &str) {
        let won = {
            let mut main_name = self.main_name.lock();
            if main_name.is_none() {
                *main_name = Some(name.to_string());
                true
            } else {
                false
            }
        };
        if won {
            self.events.add(VmEvent::new(
                self.vm_id.clone(),
                self.clock.epoch_ms(),
                EventPayload::ToJavaCall { name: name.to_string() },
            ));
        }
    }

    /// The accepted first-called name, once one was observed.
    pub fn main_name(&self) -> Option<String> {
        self.main_name.lock().clone()
    }
}

#[cfg(test)]
#[path = "first_call_tests.rs"]
mod tests;
