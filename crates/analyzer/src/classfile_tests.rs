// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::testutil::{ClassBuilder, RawCp, RawMethod};

fn tiny_class() -> ClassBuilder {
    ClassBuilder {
        minor: 0,
        major: 52,
        pool: vec![
            RawCp::Utf8("com/example/App".into()), // 1
            RawCp::Class(1),                       // 2
            RawCp::Utf8("java/lang/Object".into()), // 3
            RawCp::Class(3),                       // 4
            RawCp::Utf8("main".into()),            // 5
            RawCp::Utf8("()V".into()),             // 6
            RawCp::Utf8("Code".into()),            // 7
        ],
        access_flags: 0x0021, // public super
        this_class: 2,
        super_class: 4,
        interfaces: vec![],
        fields: vec![],
        methods: vec![RawMethod {
            access_flags: 0x0009, // public static
            name_index: 5,
            descriptor_index: 6,
            code: Some((1, 1, vec![0xb1])), // return
            code_attr_name: 7,
        }],
    }
}

#[test]
fn parses_header_and_names() {
    let class = ClassFile::parse(&tiny_class().build()).unwrap();
    assert_eq!(class.major, 52);
    assert_eq!(class.access_flags, 0x0021);
    assert_eq!(class.this_class_name().unwrap(), "com/example/App");
    assert_eq!(class.super_class_name().unwrap(), Some("java/lang/Object"));
}

#[test]
fn parses_method_code_attribute() {
    let class = ClassFile::parse(&tiny_class().build()).unwrap();
    assert_eq!(class.methods.len(), 1);
    let method = &class.methods[0];
    assert_eq!(class.constant_pool.utf8(method.name_index).unwrap(), "main");
    let code = method.code.as_ref().unwrap();
    assert_eq!(code.max_stack, 1);
    assert_eq!(code.max_locals, 1);
    assert_eq!(code.code, vec![0xb1]);
}

#[test]
fn rejects_bad_magic() {
    let mut bytes = tiny_class().build();
    bytes[0] = 0xDE;
    assert!(matches!(
        ClassFile::parse(&bytes),
        Err(AnalyzerError::BadClassFile(_))
    ));
}

#[test]
fn rejects_truncated_file() {
    let bytes = tiny_class().build();
    assert!(ClassFile::parse(&bytes[..bytes.len() - 6]).is_err());
}

#[test]
fn long_and_double_occupy_two_slots() {
    // Raw pool with a Long at 1-2 and a Utf8 at 3.
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
    bytes.extend_from_slice(&0u16.to_be_bytes());
    bytes.extend_from_slice(&52u16.to_be_bytes());
    bytes.extend_from_slice(&4u16.to_be_bytes()); // pool count = entries + 1
    bytes.push(5); // Long
    bytes.extend_from_slice(&42i64.to_be_bytes());
    bytes.push(1); // Utf8
    bytes.extend_from_slice(&1u16.to_be_bytes());
    bytes.push(b'x');
    bytes.extend_from_slice(&0u16.to_be_bytes()); // access
    bytes.extend_from_slice(&0u16.to_be_bytes()); // this (invalid but unchecked)
    bytes.extend_from_slice(&0u16.to_be_bytes()); // super
    bytes.extend_from_slice(&0u16.to_be_bytes()); // interfaces
    bytes.extend_from_slice(&0u16.to_be_bytes()); // fields
    bytes.extend_from_slice(&0u16.to_be_bytes()); // methods
    bytes.extend_from_slice(&0u16.to_be_bytes()); // attributes

    let class = ClassFile::parse(&bytes).unwrap();
    assert_eq!(class.constant_pool.get(1).unwrap(), &CpEntry::Long(42));
    assert!(class.constant_pool.get(2).is_err()); // second slot unused
    assert_eq!(class.constant_pool.utf8(3).unwrap(), "x");
}

#[test]
fn utf8_lookup_rejects_wrong_kind() {
    let class = ClassFile::parse(&tiny_class().build()).unwrap();
    assert!(class.constant_pool.utf8(2).is_err()); // Class, not Utf8
    assert!(class.constant_pool.class_name(1).is_err()); // Utf8, not Class
}
