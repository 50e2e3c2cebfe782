// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::io::Cursor;

fn buffer_over(data: Vec<u8>) -> RandomAccessBuffer<Cursor<Vec<u8>>> {
    RandomAccessBuffer::new(Cursor::new(data)).unwrap()
}

#[test]
fn reads_unsigned_widths_little_endian() {
    let mut data = vec![0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09];
    data.resize(32, 0);
    let mut buf = buffer_over(data);

    assert_eq!(buf.u8_at(0).unwrap(), 0x01);
    assert_eq!(buf.u16_at(0).unwrap(), 0x0201);
    assert_eq!(buf.u32_at(1).unwrap(), 0x0504_0302);
    assert_eq!(buf.u64_at(1).unwrap(), 0x0908_0706_0504_0302);
}

#[test]
fn read_spanning_page_boundary() {
    let data: Vec<u8> = (0..=255u8).collect();
    let mut buf =
        RandomAccessBuffer::with_page_size(Cursor::new(data), 16, 4).unwrap();

    let mut out = [0u8; 8];
    buf.read_at(12, &mut out).unwrap(); // crosses 16-byte page edge
    assert_eq!(out, [12, 13, 14, 15, 16, 17, 18, 19]);
}

#[test]
fn out_of_bounds_read_is_an_error_not_a_short_read() {
    let mut buf = buffer_over(vec![0u8; 10]);
    assert!(matches!(buf.u32_at(8), Err(AnalyzerError::OutOfBounds { .. })));
    assert!(matches!(buf.u8_at(10), Err(AnalyzerError::OutOfBounds { .. })));
}

#[test]
fn ring_evicts_oldest_page_and_counts_faults() {
    let data: Vec<u8> = (0..=255u8).collect();
    let mut buf =
        RandomAccessBuffer::with_page_size(Cursor::new(data), 16, 2).unwrap();

    buf.u8_at(0).unwrap(); // page 0
    buf.u8_at(16).unwrap(); // page 1
    buf.u8_at(1).unwrap(); // page 0 cached
    assert_eq!(buf.faults(), 2);

    buf.u8_at(32).unwrap(); // page 2 evicts page 0
    buf.u8_at(2).unwrap(); // page 0 reloaded
    assert_eq!(buf.faults(), 4);
}

#[test]
fn len_reports_source_length() {
    let buf = buffer_over(vec![0u8; 1234]);
    assert_eq!(buf.len(), 1234);
    assert!(!buf.is_empty());
}
