// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hand-rolled zip and class-file fixtures for analyzer tests.
//!
//! Building archives byte-by-byte keeps the tests independent of the
//! reader under test.

use std::io::Write;

use flate2::write::DeflateEncoder;
use flate2::Compression;

const METHOD_STORED: u16 = 0;
const METHOD_DEFLATE: u16 = 8;

struct PendingEntry {
    name: String,
    data: Vec<u8>,
    method: u16,
}

/// Minimal zip writer: stored or deflated entries, optional comment,
/// optional leading prefix (self-executing archives), optional ZIP64
/// end records.
pub struct ZipBuilder {
    entries: Vec<PendingEntry>,
    comment: Vec<u8>,
    prefix: Vec<u8>,
    zip64: bool,
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self { entries: Vec::new(), comment: Vec::new(), prefix: Vec::new(), zip64: false }
    }

    pub fn entry(mut self, name: &str, data: &[u8]) -> Self {
        self.entries.push(PendingEntry {
            name: name.to_string(),
            data: data.to_vec(),
            method: METHOD_STORED,
        });
        self
    }

    pub fn deflate_entry(mut self, name: &str, data: &[u8]) -> Self {
        self.entries.push(PendingEntry {
            name: name.to_string(),
            data: data.to_vec(),
            method: METHOD_DEFLATE,
        });
        self
    }

    pub fn comment(mut self, text: &str) -> Self {
        self.comment = text.as_bytes().to_vec();
        self
    }

    pub fn prefix(mut self, bytes: &[u8]) -> Self {
        self.prefix = bytes.to_vec();
        self
    }

    pub fn zip64(mut self) -> Self {
        self.zip64 = true;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = self.prefix.clone();
        let base = self.prefix.len() as u32;
        let mut cen_records: Vec<Vec<u8>> = Vec::new();

        for entry in &self.entries {
            let crc = crc32fast::hash(&entry.data);
            let payload = match entry.method {
                METHOD_DEFLATE => {
                    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
                    encoder.write_all(&entry.data).unwrap();
                    encoder.finish().unwrap()
                }
                _ => entry.data.clone(),
            };
            let local_offset = out.len() as u32 - base;

            // LOC record
            out.extend_from_slice(&0x0403_4b50u32.to_le_bytes());
            out.extend_from_slice(&20u16.to_le_bytes()); // version needed
            out.extend_from_slice(&0u16.to_le_bytes()); // flags
            out.extend_from_slice(&entry.method.to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes()); // time
            out.extend_from_slice(&0u16.to_le_bytes()); // date
            out.extend_from_slice(&crc.to_le_bytes());
            out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            out.extend_from_slice(&(entry.data.len() as u32).to_le_bytes());
            out.extend_from_slice(&(entry.name.len() as u16).to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes()); // extra len
            out.extend_from_slice(entry.name.as_bytes());
            out.extend_from_slice(&payload);

            // Matching CEN record
            let mut cen = Vec::new();
            cen.extend_from_slice(&0x0201_4b50u32.to_le_bytes());
            cen.extend_from_slice(&20u16.to_le_bytes()); // version made by
            cen.extend_from_slice(&20u16.to_le_bytes()); // version needed
            cen.extend_from_slice(&0u16.to_le_bytes()); // flags
            cen.extend_from_slice(&entry.method.to_le_bytes());
            cen.extend_from_slice(&0u16.to_le_bytes()); // time
            cen.extend_from_slice(&0u16.to_le_bytes()); // date
            cen.extend_from_slice(&crc.to_le_bytes());
            cen.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            cen.extend_from_slice(&(entry.data.len() as u32).to_le_bytes());
            cen.extend_from_slice(&(entry.name.len() as u16).to_le_bytes());
            cen.extend_from_slice(&0u16.to_le_bytes()); // extra len
            cen.extend_from_slice(&0u16.to_le_bytes()); // comment len
            cen.extend_from_slice(&0u16.to_le_bytes()); // disk
            cen.extend_from_slice(&0u16.to_le_bytes()); // internal attrs
            cen.extend_from_slice(&0u32.to_le_bytes()); // external attrs
            cen.extend_from_slice(&local_offset.to_le_bytes());
            cen.extend_from_slice(entry.name.as_bytes());
            cen_records.push(cen);
        }

        let cen_start = out.len() as u64 - base as u64;
        for cen in &cen_records {
            out.extend_from_slice(cen);
        }
        let cen_size: u64 = cen_records.iter().map(|c| c.len() as u64).sum();
        let count = self.entries.len() as u64;

        if self.zip64 {
            let z64_pos = out.len() as u64;
            // ZIP64 EOCD
            out.extend_from_slice(&0x0606_4b50u32.to_le_bytes());
            out.extend_from_slice(&44u64.to_le_bytes()); // size of remainder
            out.extend_from_slice(&45u16.to_le_bytes()); // version made by
            out.extend_from_slice(&45u16.to_le_bytes()); // version needed
            out.extend_from_slice(&0u32.to_le_bytes()); // disk
            out.extend_from_slice(&0u32.to_le_bytes()); // cd start disk
            out.extend_from_slice(&count.to_le_bytes());
            out.extend_from_slice(&count.to_le_bytes());
            out.extend_from_slice(&cen_size.to_le_bytes());
            out.extend_from_slice(&cen_start.to_le_bytes());
            // ZIP64 locator
            out.extend_from_slice(&0x0706_4b50u32.to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes());
            out.extend_from_slice(&z64_pos.to_le_bytes());
            out.extend_from_slice(&1u32.to_le_bytes());
            // EOCD with sentinels
            out.extend_from_slice(&0x0605_4b50u32.to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(&0xFFFFu16.to_le_bytes());
            out.extend_from_slice(&0xFFFFu16.to_le_bytes());
            out.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
            out.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
            out.extend_from_slice(&(self.comment.len() as u16).to_le_bytes());
            out.extend_from_slice(&self.comment);
        } else {
            out.extend_from_slice(&0x0605_4b50u32.to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes()); // disk
            out.extend_from_slice(&0u16.to_le_bytes()); // cd start disk
            out.extend_from_slice(&(count as u16).to_le_bytes());
            out.extend_from_slice(&(count as u16).to_le_bytes());
            out.extend_from_slice(&(cen_size as u32).to_le_bytes());
            out.extend_from_slice(&(cen_start as u32).to_le_bytes());
            out.extend_from_slice(&(self.comment.len() as u16).to_le_bytes());
            out.extend_from_slice(&self.comment);
        }
        out
    }
}

/// Build a minimal but valid class file for shaded-hash tests.
///
/// The caller controls the constant pool layout explicitly; indexes into
/// it are raw, so tests can express reordered pools.
pub struct ClassBuilder {
    pub minor: u16,
    pub major: u16,
    pub pool: Vec<RawCp>,
    pub access_flags: u16,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<(u16, u16, u16)>, // access, name idx, descriptor idx
    pub methods: Vec<RawMethod>,
}

/// Raw constant-pool entries in tag order.
#[derive(Clone)]
pub enum RawCp {
    Utf8(String),
    Integer(i32),
    Class(u16),
    StringRef(u16),
    NameAndType(u16, u16),
    FieldRef(u16, u16),
    MethodRef(u16, u16),
}

pub struct RawMethod {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    /// (max_stack, max_locals, code)
    pub code: Option<(u16, u16, Vec<u8>)>,
    /// Index of the "Code" Utf8 entry in the pool.
    pub code_attr_name: u16,
}

impl ClassBuilder {
    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
        out.extend_from_slice(&self.minor.to_be_bytes());
        out.extend_from_slice(&self.major.to_be_bytes());
        out.extend_from_slice(&((self.pool.len() + 1) as u16).to_be_bytes());
        for entry in &self.pool {
            match entry {
                RawCp::Utf8(s) => {
                    out.push(1);
                    out.extend_from_slice(&(s.len() as u16).to_be_bytes());
                    out.extend_from_slice(s.as_bytes());
                }
                RawCp::Integer(v) => {
                    out.push(3);
                    out.extend_from_slice(&v.to_be_bytes());
                }
                RawCp::Class(idx) => {
                    out.push(7);
                    out.extend_from_slice(&idx.to_be_bytes());
                }
                RawCp::StringRef(idx) => {
                    out.push(8);
                    out.extend_from_slice(&idx.to_be_bytes());
                }
                RawCp::FieldRef(class, nat) => {
                    out.push(9);
                    out.extend_from_slice(&class.to_be_bytes());
                    out.extend_from_slice(&nat.to_be_bytes());
                }
                RawCp::MethodRef(class, nat) => {
                    out.push(10);
                    out.extend_from_slice(&class.to_be_bytes());
                    out.extend_from_slice(&nat.to_be_bytes());
                }
                RawCp::NameAndType(name, desc) => {
                    out.push(12);
                    out.extend_from_slice(&name.to_be_bytes());
                    out.extend_from_slice(&desc.to_be_bytes());
                }
            }
        }
        out.extend_from_slice(&self.access_flags.to_be_bytes());
        out.extend_from_slice(&self.this_class.to_be_bytes());
        out.extend_from_slice(&self.super_class.to_be_bytes());
        out.extend_from_slice(&(self.interfaces.len() as u16).to_be_bytes());
        for iface in &self.interfaces {
            out.extend_from_slice(&iface.to_be_bytes());
        }
        out.extend_from_slice(&(self.fields.len() as u16).to_be_bytes());
        for (access, name, desc) in &self.fields {
            out.extend_from_slice(&access.to_be_bytes());
            out.extend_from_slice(&name.to_be_bytes());
            out.extend_from_slice(&desc.to_be_bytes());
            out.extend_from_slice(&0u16.to_be_bytes()); // no attributes
        }
        out.extend_from_slice(&(self.methods.len() as u16).to_be_bytes());
        for method in &self.methods {
            out.extend_from_slice(&method.access_flags.to_be_bytes());
            out.extend_from_slice(&method.name_index.to_be_bytes());
            out.extend_from_slice(&method.descriptor_index.to_be_bytes());
            match &method.code {
                Some((max_stack, max_locals, code)) => {
                    out.extend_from_slice(&1u16.to_be_bytes());
                    out.extend_from_slice(&method.code_attr_name.to_be_bytes());
                    let attr_len = 2 + 2 + 4 + code.len() + 2 + 2;
                    out.extend_from_slice(&(attr_len as u32).to_be_bytes());
                    out.extend_from_slice(&max_stack.to_be_bytes());
                    out.extend_from_slice(&max_locals.to_be_bytes());
                    out.extend_from_slice(&(code.len() as u32).to_be_bytes());
                    out.extend_from_slice(code);
                    out.extend_from_slice(&0u16.to_be_bytes()); // exception table
                    out.extend_from_slice(&0u16.to_be_bytes()); // code attributes
                }
                None => out.extend_from_slice(&0u16.to_be_bytes()),
            }
        }
        out.extend_from_slice(&0u16.to_be_bytes()); // class attributes
        out
    }
}
