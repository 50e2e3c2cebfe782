// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Constant-pool index normalization.
//!
//! Shading reorders the constant pool freely, so raw indexes cannot be
//! hashed. The mapper renumbers indexes sequentially in order of first
//! appearance in the normalized stream, after collapsing entries that are
//! structurally identical. Structural keys carry a per-kind marker
//! character so equal content of different kinds never collides.

use std::collections::HashMap;

use crate::classfile::{ConstantPool, CpEntry};
use crate::error::AnalyzerError;

/// Recursion guard for pathological self-referencing pools.
const MAX_KEY_DEPTH: u32 = 8;

/// Renumbers constant-pool references for one normalized stream.
pub struct ConstantPoolMapper<'a> {
    pool: &'a ConstantPool,
    assigned: HashMap<String, u16>,
    next: u16,
}

impl<'a> ConstantPoolMapper<'a> {
    pub fn new(pool: &'a ConstantPool) -> Self {
        Self { pool, assigned: HashMap::new(), next: 0 }
    }

    /// Sequential number for a raw index; entries with identical
    /// structural content share a number.
    pub fn map(&mut self, index: u16) -> Result<u16, AnalyzerError> {
        let key = structural_key(self.pool, index, 0)?;
        if let Some(&n) = self.assigned.get(&key) {
            return Ok(n);
        }
        let n = self.next;
        self.next = self.next.wrapping_add(1);
        self.assigned.insert(key, n);
        Ok(n)
    }
}

fn structural_key(
    pool: &ConstantPool,
    index: u16,
    depth: u32,
) -> Result<String, AnalyzerError> {
    if depth > MAX_KEY_DEPTH {
        return Err(AnalyzerError::BadClassFile("constant pool reference cycle".into()));
    }
    let key = match pool.get(index)? {
        CpEntry::Utf8(s) => format!("U({s})"),
        CpEntry::Integer(v) => format!("I({v})"),
        CpEntry::Float(bits) => format!("F({bits})"),
        CpEntry::Long(v) => format!("J({v})"),
        CpEntry::Double(bits) => format!("D({bits})"),
        CpEntry::Class(name) => format!("C({})", structural_key(pool, *name, depth + 1)?),
        CpEntry::Str(utf8) => format!("S({})", structural_key(pool, *utf8, depth + 1)?),
        CpEntry::FieldRef(class, nat) => format!(
            "R({},{})",
            structural_key(pool, *class, depth + 1)?,
            structural_key(pool, *nat, depth + 1)?
        ),
        CpEntry::MethodRef(class, nat) => format!(
            "M({},{})",
            structural_key(pool, *class, depth + 1)?,
            structural_key(pool, *nat, depth + 1)?
        ),
        CpEntry::InterfaceMethodRef(class, nat) => format!(
            "O({},{})",
            structural_key(pool, *class, depth + 1)?,
            structural_key(pool, *nat, depth + 1)?
        ),
        CpEntry::NameAndType(name, desc) => format!(
            "N({},{})",
            structural_key(pool, *name, depth + 1)?,
            structural_key(pool, *desc, depth + 1)?
        ),
        CpEntry::MethodHandle(kind, reference) => {
            format!("H({kind},{})", structural_key(pool, *reference, depth + 1)?)
        }
        CpEntry::MethodType(desc) => {
            format!("T({})", structural_key(pool, *desc, depth + 1)?)
        }
        CpEntry::Dynamic(bsm, nat) => {
            format!("Y({bsm},{})", structural_key(pool, *nat, depth + 1)?)
        }
        CpEntry::InvokeDynamic(bsm, nat) => {
            format!("K({bsm},{})", structural_key(pool, *nat, depth + 1)?)
        }
        CpEntry::Module(name) => format!("W({})", structural_key(pool, *name, depth + 1)?),
        CpEntry::Package(name) => format!("P({})", structural_key(pool, *name, depth + 1)?),
        CpEntry::Unused => {
            return Err(AnalyzerError::BadClassFile(format!("reference to unused slot {index}")))
        }
    };
    Ok(key)
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
