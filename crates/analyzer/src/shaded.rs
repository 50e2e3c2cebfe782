// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shading-invariant class hash.
//!
//! Hashes only what a shading transform preserves: version, access
//! flags, simple (post-slash) type names, field names, and normalized
//! method bodies. Constant-pool order, package prefixes, jump offsets,
//! and `max_locals` all wash out.

use std::collections::BTreeSet;

use sha2::{Digest, Sha256};

use crate::bytecode::normalize_code;
use crate::classfile::ClassFile;
use crate::error::AnalyzerError;
use crate::pool::ConstantPoolMapper;

/// Compute the shaded hash of one class file.
pub fn shaded_class_hash(bytes: &[u8]) -> Result<[u8; 32], AnalyzerError> {
    let class = ClassFile::parse(bytes)?;
    let pool = &class.constant_pool;
    let mut hasher = Sha256::new();

    hasher.update(class.minor.to_be_bytes());
    hasher.update(class.major.to_be_bytes());
    hasher.update(class.access_flags.to_be_bytes());

    hasher.update(short_name(class.this_class_name()?).as_bytes());
    hasher.update([b'|']);
    hasher.update(class.super_class_name()?.map(short_name).unwrap_or("").as_bytes());
    hasher.update([b'|']);

    let mut interfaces = Vec::with_capacity(class.interfaces.len());
    for &index in &class.interfaces {
        interfaces.push(short_name(pool.class_name(index)?));
    }
    interfaces.sort_unstable();
    for name in interfaces {
        hasher.update(name.as_bytes());
        hasher.update([b'|']);
    }

    // Fields as (name, access) tuples, ordered by their concatenation.
    let mut fields = Vec::with_capacity(class.fields.len());
    for field in &class.fields {
        let name = pool.utf8(field.name_index)?;
        fields.push(format!("{name}|{:04x}", field.access_flags));
    }
    fields.sort_unstable();
    for field in fields {
        hasher.update(field.as_bytes());
        hasher.update([b'|']);
    }

    // Per-method digests, order-independent via a sorted set.
    let mut method_digests = BTreeSet::new();
    for method in &class.methods {
        let mut mh = Sha256::new();
        mh.update(method.access_flags.to_be_bytes());
        mh.update(pool.utf8(method.name_index)?.as_bytes());
        mh.update([b'|']);
        if let Some(code) = &method.code {
            // max_stack survives shading; max_locals may be rewritten.
            mh.update(code.max_stack.to_be_bytes());
            let mut mapper = ConstantPoolMapper::new(pool);
            let mut normalized = Vec::new();
            normalize_code(&code.code, &mut mapper, &mut normalized)?;
            mh.update(&normalized);
        }
        method_digests.insert(crate::jar::hex(&mh.finalize()));
    }
    for digest in method_digests {
        hasher.update(digest.as_bytes());
    }

    // Class attributes are deliberately not hashed.
    Ok(hasher.finalize().into())
}

/// Text after the last `/` of an internal name.
fn short_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

#[cfg(test)]
#[path = "shaded_tests.rs"]
mod tests;
