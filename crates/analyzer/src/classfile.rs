// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Class-file parser.
//!
//! Parses just enough structure for the shaded hash: constant pool,
//! class/interface references, fields, and method Code attributes. All
//! multi-byte values are big-endian per the class-file format.

use crate::error::AnalyzerError;

/// A constant-pool entry. Float/Double keep raw bits for exactness.
#[derive(Debug, Clone, PartialEq)]
pub enum CpEntry {
    Utf8(String),
    Integer(i32),
    Float(u32),
    Long(i64),
    Double(u64),
    Class(u16),
    Str(u16),
    FieldRef(u16, u16),
    MethodRef(u16, u16),
    InterfaceMethodRef(u16, u16),
    NameAndType(u16, u16),
    MethodHandle(u8, u16),
    MethodType(u16),
    Dynamic(u16, u16),
    InvokeDynamic(u16, u16),
    Module(u16),
    Package(u16),
    /// Second slot of a Long/Double, and index zero.
    Unused,
}

/// Indexed constant pool; slot 0 is unused per the format.
#[derive(Debug, Clone)]
pub struct ConstantPool {
    entries: Vec<CpEntry>,
}

impl ConstantPool {
    pub fn get(&self, index: u16) -> Result<&CpEntry, AnalyzerError> {
        self.entries
            .get(index as usize)
            .filter(|e| !matches!(e, CpEntry::Unused))
            .ok_or_else(|| AnalyzerError::BadClassFile(format!("constant pool index {index}")))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn utf8(&self, index: u16) -> Result<&str, AnalyzerError> {
        match self.get(index)? {
            CpEntry::Utf8(s) => Ok(s),
            other => Err(AnalyzerError::BadClassFile(format!(
                "expected Utf8 at {index}, found {other:?}"
            ))),
        }
    }

    /// The internal name behind a Class entry.
    pub fn class_name(&self, index: u16) -> Result<&str, AnalyzerError> {
        match self.get(index)? {
            CpEntry::Class(name) => self.utf8(*name),
            other => Err(AnalyzerError::BadClassFile(format!(
                "expected Class at {index}, found {other:?}"
            ))),
        }
    }
}

/// A field or method.
#[derive(Debug, Clone)]
pub struct MemberInfo {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub code: Option<CodeAttribute>,
}

/// The Code attribute of a method, exception table and nested
/// attributes dropped.
#[derive(Debug, Clone)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
}

/// Parsed class file.
#[derive(Debug, Clone)]
pub struct ClassFile {
    pub minor: u16,
    pub major: u16,
    pub constant_pool: ConstantPool,
    pub access_flags: u16,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<MemberInfo>,
    pub methods: Vec<MemberInfo>,
}

impl ClassFile {
    pub fn parse(bytes: &[u8]) -> Result<Self, AnalyzerError> {
        let mut r = Reader { bytes, pos: 0 };
        if r.u32()? != 0xCAFE_BABE {
            return Err(AnalyzerError::BadClassFile("bad magic".into()));
        }
        let minor = r.u16()?;
        let major = r.u16()?;
        let constant_pool = parse_pool(&mut r)?;

        let access_flags = r.u16()?;
        let this_class = r.u16()?;
        let super_class = r.u16()?;

        let interface_count = r.u16()?;
        let mut interfaces = Vec::with_capacity(interface_count as usize);
        for _ in 0..interface_count {
            interfaces.push(r.u16()?);
        }

        let fields = parse_members(&mut r, &constant_pool)?;
        let methods = parse_members(&mut r, &constant_pool)?;

        Ok(Self {
            minor,
            major,
            constant_pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
        })
    }

    /// Internal name of this class.
    pub fn this_class_name(&self) -> Result<&str, AnalyzerError> {
        self.constant_pool.class_name(self.this_class)
    }

    /// Internal name of the superclass; `None` for java/lang/Object.
    pub fn super_class_name(&self) -> Result<Option<&str>, AnalyzerError> {
        if self.super_class == 0 {
            Ok(None)
        } else {
            self.constant_pool.class_name(self.super_class).map(Some)
        }
    }
}

fn parse_pool(r: &mut Reader<'_>) -> Result<ConstantPool, AnalyzerError> {
    let count = r.u16()?;
    let mut entries = vec![CpEntry::Unused];
    let mut index = 1u16;
    while index < count {
        let tag = r.u8()?;
        let entry = match tag {
            1 => {
                let len = r.u16()? as usize;
                let raw = r.take(len)?;
                // Modified UTF-8 in practice decodes as UTF-8 for the
                // names we hash; fall back lossily rather than skip.
                CpEntry::Utf8(String::from_utf8_lossy(raw).into_owned())
            }
            3 => CpEntry::Integer(r.u32()? as i32),
            4 => CpEntry::Float(r.u32()?),
            5 => CpEntry::Long(((r.u32()? as u64) << 32 | r.u32()? as u64) as i64),
            6 => CpEntry::Double((r.u32()? as u64) << 32 | r.u32()? as u64),
            7 => CpEntry::Class(r.u16()?),
            8 => CpEntry::Str(r.u16()?),
            9 => CpEntry::FieldRef(r.u16()?, r.u16()?),
            10 => CpEntry::MethodRef(r.u16()?, r.u16()?),
            11 => CpEntry::InterfaceMethodRef(r.u16()?, r.u16()?),
            12 => CpEntry::NameAndType(r.u16()?, r.u16()?),
            15 => CpEntry::MethodHandle(r.u8()?, r.u16()?),
            16 => CpEntry::MethodType(r.u16()?),
            17 => CpEntry::Dynamic(r.u16()?, r.u16()?),
            18 => CpEntry::InvokeDynamic(r.u16()?, r.u16()?),
            19 => CpEntry::Module(r.u16()?),
            20 => CpEntry::Package(r.u16()?),
            tag => {
                return Err(AnalyzerError::BadClassFile(format!("constant pool tag {tag}")))
            }
        };
        let double_slot = matches!(entry, CpEntry::Long(_) | CpEntry::Double(_));
        entries.push(entry);
        index += 1;
        if double_slot {
            entries.push(CpEntry::Unused);
            index += 1;
        }
    }
    Ok(ConstantPool { entries })
}

fn parse_members(
    r: &mut Reader<'_>,
    pool: &ConstantPool,
) -> Result<Vec<MemberInfo>, AnalyzerError> {
    let count = r.u16()?;
    let mut members = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let access_flags = r.u16()?;
        let name_index = r.u16()?;
        let descriptor_index = r.u16()?;
        let attr_count = r.u16()?;
        let mut code = None;
        for _ in 0..attr_count {
            let attr_name = r.u16()?;
            let attr_len = r.u32()? as usize;
            let data = r.take(attr_len)?;
            if pool.utf8(attr_name).ok() == Some("Code") {
                code = Some(parse_code(data)?);
            }
        }
        members.push(MemberInfo { access_flags, name_index, descriptor_index, code });
    }
    Ok(members)
}

fn parse_code(data: &[u8]) -> Result<CodeAttribute, AnalyzerError> {
    let mut r = Reader { bytes: data, pos: 0 };
    let max_stack = r.u16()?;
    let max_locals = r.u16()?;
    let code_len = r.u32()? as usize;
    let code = r.take(code_len)?.to_vec();
    Ok(CodeAttribute { max_stack, max_locals, code })
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn u8(&mut self) -> Result<u8, AnalyzerError> {
        let b = *self
            .bytes
            .get(self.pos)
            .ok_or_else(|| AnalyzerError::BadClassFile("truncated".into()))?;
        self.pos += 1;
        Ok(b)
    }

    fn u16(&mut self) -> Result<u16, AnalyzerError> {
        Ok((self.u8()? as u16) << 8 | self.u8()? as u16)
    }

    fn u32(&mut self) -> Result<u32, AnalyzerError> {
        Ok((self.u16()? as u32) << 16 | self.u16()? as u32)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], AnalyzerError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| AnalyzerError::BadClassFile("truncated".into()))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }
}

#[cfg(test)]
#[path = "classfile_tests.rs"]
mod tests;
