// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shaded-hash equivalence: a class and its shaded copy (renamed
//! packages, reordered constant pool, LDC widened to LDC_W, rewritten
//! max_locals) hash identically; semantic changes do not.

use super::*;
use crate::testutil::{ClassBuilder, RawCp, RawMethod};

/// Original: package a/b, compact constant pool, narrow ldc.
fn original() -> ClassBuilder {
    ClassBuilder {
        minor: 0,
        major: 52,
        pool: vec![
            RawCp::Utf8("a/b/C".into()),            // 1
            RawCp::Class(1),                        // 2
            RawCp::Utf8("java/lang/Object".into()), // 3
            RawCp::Class(3),                        // 4
            RawCp::Utf8("main".into()),             // 5
            RawCp::Utf8("()V".into()),              // 6
            RawCp::Utf8("Code".into()),             // 7
            RawCp::Utf8("greeting".into()),         // 8
            RawCp::StringRef(8),                    // 9
            RawCp::Utf8("a/b/Util".into()),         // 10
            RawCp::Class(10),                       // 11
            RawCp::Utf8("helper".into()),           // 12
            RawCp::NameAndType(12, 6),              // 13
            RawCp::MethodRef(11, 13),               // 14
            RawCp::Utf8("count".into()),            // 15
            RawCp::Utf8("I".into()),                // 16
            RawCp::Utf8("aux".into()),              // 17
        ],
        access_flags: 0x0021,
        this_class: 2,
        super_class: 4,
        interfaces: vec![],
        fields: vec![(0x0002, 15, 16)],
        methods: vec![
            RawMethod {
                access_flags: 0x0009,
                name_index: 5,
                descriptor_index: 6,
                // ldc "greeting"; invokestatic Util.helper; return
                code: Some((2, 1, vec![0x12, 9, 0xb8, 0, 14, 0xb1])),
                code_attr_name: 7,
            },
            RawMethod {
                access_flags: 0x0002,
                name_index: 17,
                descriptor_index: 6,
                code: Some((1, 1, vec![0xb1])),
                code_attr_name: 7,
            },
        ],
    }
}

/// Shaded copy: package x/y, pool padded past 255 so the string constant
/// needs LDC_W, methods reordered, max_locals rewritten.
fn shaded() -> ClassBuilder {
    let mut pool = vec![
        RawCp::Utf8("Code".into()),             // 1
        RawCp::Utf8("x/y/C".into()),            // 2
        RawCp::Class(2),                        // 3
        RawCp::Utf8("java/lang/Object".into()), // 4
        RawCp::Class(4),                        // 5
        RawCp::Utf8("main".into()),             // 6
        RawCp::Utf8("()V".into()),              // 7
    ];
    for i in 0..260 {
        pool.push(RawCp::Utf8(format!("pad{i}"))); // 8..=267
    }
    pool.push(RawCp::Utf8("greeting".into())); // 268
    pool.push(RawCp::StringRef(268)); // 269
    pool.push(RawCp::Utf8("x/y/Util".into())); // 270
    pool.push(RawCp::Class(270)); // 271
    pool.push(RawCp::Utf8("helper".into())); // 272
    pool.push(RawCp::NameAndType(272, 7)); // 273
    pool.push(RawCp::MethodRef(271, 273)); // 274
    pool.push(RawCp::Utf8("count".into())); // 275
    pool.push(RawCp::Utf8("I".into())); // 276
    pool.push(RawCp::Utf8("aux".into())); // 277

    ClassBuilder {
        minor: 0,
        major: 52,
        pool,
        access_flags: 0x0021,
        this_class: 3,
        super_class: 5,
        interfaces: vec![],
        fields: vec![(0x0002, 275, 276)],
        methods: vec![
            RawMethod {
                access_flags: 0x0002,
                name_index: 277,
                descriptor_index: 7,
                code: Some((1, 3, vec![0xb1])), // max_locals rewritten
                code_attr_name: 1,
            },
            RawMethod {
                access_flags: 0x0009,
                name_index: 6,
                descriptor_index: 7,
                // ldc_w (index 269 > 255); invokestatic; return
                code: Some((2, 4, vec![0x13, 0x01, 0x0d, 0xb8, 0x01, 0x12, 0xb1])),
                code_attr_name: 1,
            },
        ],
    }
}

#[test]
fn shaded_copy_hashes_identically() {
    let a = shaded_class_hash(&original().build()).unwrap();
    let b = shaded_class_hash(&shaded().build()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn changed_method_body_changes_the_hash() {
    let a = shaded_class_hash(&original().build()).unwrap();
    let mut modified = original();
    if let Some((_, _, code)) = &mut modified.methods[1].code {
        *code = vec![0x03, 0x57, 0xb1]; // iconst_0; pop; return
    }
    let b = shaded_class_hash(&modified.build()).unwrap();
    assert_ne!(a, b);
}

#[test]
fn changed_field_access_changes_the_hash() {
    let a = shaded_class_hash(&original().build()).unwrap();
    let mut modified = original();
    modified.fields[0].0 = 0x0001; // private → public
    let b = shaded_class_hash(&modified.build()).unwrap();
    assert_ne!(a, b);
}

#[test]
fn changed_simple_class_name_changes_the_hash() {
    let a = shaded_class_hash(&original().build()).unwrap();
    let mut modified = original();
    modified.pool[0] = RawCp::Utf8("a/b/Renamed".into());
    let b = shaded_class_hash(&modified.build()).unwrap();
    assert_ne!(a, b);
}

#[test]
fn max_stack_is_hashed_but_max_locals_is_not() {
    let base = shaded_class_hash(&original().build()).unwrap();

    let mut locals = original();
    if let Some((_, max_locals, _)) = &mut locals.methods[0].code {
        *max_locals = 9;
    }
    assert_eq!(base, shaded_class_hash(&locals.build()).unwrap());

    let mut stack = original();
    if let Some((max_stack, _, _)) = &mut stack.methods[0].code {
        *max_stack = 9;
    }
    assert_ne!(base, shaded_class_hash(&stack.build()).unwrap());
}

#[test]
fn method_order_does_not_matter() {
    let a = shaded_class_hash(&original().build()).unwrap();
    let mut reordered = original();
    reordered.methods.reverse();
    let b = shaded_class_hash(&reordered.build()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn bad_magic_fails() {
    let mut bytes = original().build();
    bytes[0] = 0;
    assert!(shaded_class_hash(&bytes).is_err());
}
