// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Size-bounded request framing.
//!
//! Events serialize one by one into JSON array fragments of at most
//! `MAX_REQUEST_BYTES`. An event whose serialized form alone exceeds the
//! limit is dropped, keeping a 100-character prefix for diagnosis.

use crs_core::{EventType, VmEvent};

/// Upper bound for one serialized request body.
pub const MAX_REQUEST_BYTES: usize = 2 * 1024 * 1024;

/// Characters of a dropped event kept for the log line.
const DROP_PREFIX_CHARS: usize = 100;

/// One JSON-array fragment and the number of events inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub body: String,
    pub count: usize,
}

/// The framing outcome for one batch.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FragmentPlan {
    pub fragments: Vec<Fragment>,
    /// Oversized events: their type and a serialized prefix.
    pub dropped: Vec<(EventType, String)>,
}

/// Frame `events` into fragments.
pub fn fragment_events(events: &[VmEvent]) -> FragmentPlan {
    let mut plan = FragmentPlan::default();
    let mut body = String::from("[");
    let mut count = 0usize;

    for event in events {
        let serialized = match serde_json::to_string(event) {
            Ok(s) => s,
            // Payloads are plain data; serialization cannot practically
            // fail, but a failure must never sink the batch.
            Err(_) => continue,
        };
        if serialized.len() + 2 > MAX_REQUEST_BYTES {
            let prefix: String = serialized.chars().take(DROP_PREFIX_CHARS).collect();
            plan.dropped.push((event.event_type(), prefix));
            continue;
        }

        let separator = usize::from(count > 0);
        if body.len() + separator + serialized.len() + 1 > MAX_REQUEST_BYTES {
            body.push(']');
            plan.fragments.push(Fragment { body, count });
            body = String::from("[");
            count = 0;
        }
        if count > 0 {
            body.push(',');
        }
        body.push_str(&serialized);
        count += 1;
    }

    if count > 0 {
        body.push(']');
        plan.fragments.push(Fragment { body, count });
    }
    plan
}

#[cfg(test)]
#[path = "batch_tests.rs"]
mod tests;
