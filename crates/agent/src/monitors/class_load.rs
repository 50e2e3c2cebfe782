// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Class-load observations.

use std::sync::Arc;

use crs_core::{Clock, EventPayload, VmEvent};

use super::{ClassSource, ClassSourceObserver};
use crate::services::events::EventService;

pub struct ClassLoadMonitor<C: Clock> {
    events: Arc<EventService>,
    observer: Arc<dyn ClassSourceObserver>,
    vm_id: String,
    clock: C,
}

impl<C: Clock> ClassLoadMonitor<C> {
    pub fn new(
        events: Arc<EventService>,
        observer: Arc<dyn ClassSourceObserver>,
        vm_id: impl Into<String>,
        clock: C,
    ) -> Self {
        Self { events, observer, vm_id: vm_id.into(), clock }
    }

    /// Host callback for one loaded class.
    pub fn on_class_load(
        &self,
        class_name: &str,
        loader_name: Option<&str>,
        source_url: Option<&str>,
    ) {
        self.events.add(VmEvent::new(
            self.vm_id.clone(),
            self.clock.epoch_ms(),
            EventPayload::ClassLoaded {
                class_name: class_name.to_string(),
                loader_name: loader_name.map(str::to_string),
                source_url: source_url.map(str::to_string),
            },
        ));

        if let Some(url) = source_url {
            if url.ends_with(".jar") || url.ends_with(".war") {
                self.observer.observed(&ClassSource {
                    url: url.to_string(),
                    loader_class: loader_name.map(str::to_string),
                });
            }
        }
    }
}

#[cfg(test)]
#[path = "class_load_tests.rs"]
mod tests;
