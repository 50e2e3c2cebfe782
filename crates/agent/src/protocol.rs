// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sections embedded in event-batch response bodies.
//!
//! A response body may carry line-oriented sections:
//!
//! ```text
//! #requests
//! <N>
//! <encoded-request-1>
//! …
//! ```
//!
//! Unknown section names are skipped by reading their declared line
//! count, so new server sections never desynchronize the parser.

use tracing::warn;

/// One `<kind>|<base64 payload>` line from a `#requests` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedRequest {
    pub kind: String,
    pub payload: String,
}

/// Parsed sections of one response body.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ResponseSections {
    pub requests: Vec<EncodedRequest>,
}

/// Parse the sections out of a response body. Lines before the first
/// section marker are ignored (plain-text acknowledgements).
pub fn parse_response_sections(body: &str) -> ResponseSections {
    let mut sections = ResponseSections::default();
    let mut lines = body.lines();

    while let Some(line) = lines.next() {
        let Some(name) = line.strip_prefix('#') else {
            continue;
        };
        let Some(count) = lines.next().and_then(|l| l.trim().parse::<usize>().ok()) else {
            warn!(section = name, "section without a line count, stopping parse");
            break;
        };

        if name == "requests" {
            for _ in 0..count {
                let Some(line) = lines.next() else { break };
                match line.split_once('|') {
                    Some((kind, payload)) if !kind.is_empty() => {
                        sections.requests.push(EncodedRequest {
                            kind: kind.to_string(),
                            payload: payload.to_string(),
                        });
                    }
                    _ => warn!(line, "malformed request line"),
                }
            }
        } else {
            // Unknown section: consume its declared lines.
            for _ in 0..count {
                if lines.next().is_none() {
                    break;
                }
            }
        }
    }
    sections
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
