// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Zip central directory reader.
//!
//! Scans backward from EOF for the End-of-Central-Directory record,
//! validates the optional ZIP64 locator, and exposes the raw central
//! directory bytes (whose SHA-256 is the archive fingerprint) plus the
//! decoded CEN entries.

use std::io::{Read, Seek};

use flate2::read::DeflateDecoder;

use crate::buffer::RandomAccessBuffer;
use crate::error::AnalyzerError;

const ENDSIG: u32 = 0x0605_4b50;
const CENSIG: u32 = 0x0201_4b50;
const LOCSIG: u32 = 0x0403_4b50;
const ZIP64_ENDSIG: u32 = 0x0606_4b50;
const ZIP64_LOCSIG: u32 = 0x0706_4b50;

/// Fixed part of the EOCD record.
pub const ENDHDR: u64 = 22;
/// Fixed part of a CEN record.
const CENHDR: u64 = 46;
/// Fixed part of a LOC record.
const LOCHDR: u64 = 30;
/// ZIP64 EOCD locator length.
const ZIP64_LOCHDR: u64 = 20;
/// Fixed part of the ZIP64 EOCD record.
const ZIP64_ENDHDR: u64 = 56;

const ZIP64_MAGIC_U32: u32 = 0xFFFF_FFFF;
const ZIP64_MAGIC_U16: u16 = 0xFFFF;

/// Longest possible EOCD comment.
const MAX_COMMENT: u64 = 0xFFFF;

/// Cap on a single decompressed entry, against hostile archives.
const MAX_ENTRY_BYTES: u64 = 256 * 1024 * 1024;

/// The located central directory of one archive.
pub struct CentralDirectory {
    /// Raw bytes `[cen_pos, end_pos + ENDHDR)`: CEN records through the
    /// fixed EOCD header, excluding the trailing comment.
    pub bytes: Vec<u8>,
    pub cen_pos: u64,
    pub end_pos: u64,
    /// Start of the first local header (non-zero for prefixed archives).
    pub loc_pos: u64,
    pub entry_count: u64,
}

/// One CEN record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CenEntry {
    pub name: String,
    pub flags: u16,
    pub method: u16,
    pub crc: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub local_header_offset: u64,
}

impl CenEntry {
    pub fn is_class(&self) -> bool {
        self.name.ends_with(".class")
    }

    pub fn is_nested_archive(&self) -> bool {
        self.name.ends_with(".jar") || self.name.ends_with(".war")
    }

    pub fn is_directory(&self) -> bool {
        self.name.ends_with('/')
    }
}

/// Locate and read the central directory.
pub fn read_central_directory<S: Read + Seek>(
    buf: &mut RandomAccessBuffer<S>,
) -> Result<CentralDirectory, AnalyzerError> {
    let len = buf.len();
    if len < ENDHDR {
        return Err(AnalyzerError::NotAnArchive(format!("{len} bytes, no room for EOCD")));
    }

    let end_pos = find_eocd(buf, len)?;

    let mut entry_count = buf.u16_at(end_pos + 10)? as u64;
    let mut cd_size = buf.u32_at(end_pos + 12)? as u64;
    let mut cd_off = buf.u32_at(end_pos + 16)? as u64;

    // ZIP64 sizes are taken only when the 32-bit fields hold sentinels.
    let needs_zip64 = cd_size == ZIP64_MAGIC_U32 as u64
        || cd_off == ZIP64_MAGIC_U32 as u64
        || entry_count == ZIP64_MAGIC_U16 as u64;

    let cd_end = if needs_zip64 {
        if end_pos < ZIP64_LOCHDR {
            return Err(AnalyzerError::BadCentralDirectory(
                "zip64 sentinels without room for locator".into(),
            ));
        }
        let loc = end_pos - ZIP64_LOCHDR;
        if buf.u32_at(loc)? != ZIP64_LOCSIG {
            return Err(AnalyzerError::BadCentralDirectory(
                "zip64 sentinels without locator signature".into(),
            ));
        }
        let z64_pos = buf.u64_at(loc + 8)?;
        let in_bounds = z64_pos.checked_add(ZIP64_ENDHDR).is_some_and(|end| end <= len);
        if !in_bounds || buf.u32_at(z64_pos)? != ZIP64_ENDSIG {
            return Err(AnalyzerError::BadCentralDirectory("bad zip64 EOCD offset".into()));
        }
        if entry_count == ZIP64_MAGIC_U16 as u64 {
            entry_count = buf.u64_at(z64_pos + 32)?;
        }
        if cd_size == ZIP64_MAGIC_U32 as u64 {
            cd_size = buf.u64_at(z64_pos + 40)?;
        }
        if cd_off == ZIP64_MAGIC_U32 as u64 {
            cd_off = buf.u64_at(z64_pos + 48)?;
        }
        z64_pos
    } else {
        end_pos
    };

    let cen_pos = cd_end
        .checked_sub(cd_size)
        .ok_or_else(|| AnalyzerError::BadCentralDirectory("cenpos before start".into()))?;
    let loc_pos = cen_pos
        .checked_sub(cd_off)
        .ok_or_else(|| AnalyzerError::BadCentralDirectory("locpos before start".into()))?;

    if entry_count > 0 && buf.u32_at(cen_pos)? != CENSIG {
        return Err(AnalyzerError::BadCentralDirectory("no CENSIG at cenpos".into()));
    }

    let mut bytes = vec![0u8; (end_pos + ENDHDR - cen_pos) as usize];
    buf.read_at(cen_pos, &mut bytes)?;

    Ok(CentralDirectory { bytes, cen_pos, end_pos, loc_pos, entry_count })
}

/// Backward scan for the EOCD signature, validating the comment length
/// against the stream end so an embedded signature cannot fool us.
fn find_eocd<S: Read + Seek>(
    buf: &mut RandomAccessBuffer<S>,
    len: u64,
) -> Result<u64, AnalyzerError> {
    let mut pos = len - ENDHDR;
    let floor = len.saturating_sub(ENDHDR + MAX_COMMENT);
    loop {
        if buf.u32_at(pos)? == ENDSIG {
            let comment_len = buf.u16_at(pos + 20)? as u64;
            if pos + ENDHDR + comment_len == len {
                return Ok(pos);
            }
        }
        if pos == floor {
            return Err(AnalyzerError::NotAnArchive("no EOCD record".into()));
        }
        pos -= 1;
    }
}

impl CentralDirectory {
    /// Decode the CEN records out of the raw bytes.
    pub fn entries(&self) -> Result<Vec<CenEntry>, AnalyzerError> {
        let cd = &self.bytes;
        let mut entries = Vec::with_capacity(self.entry_count as usize);
        let mut pos = 0usize;

        for _ in 0..self.entry_count {
            if pos + CENHDR as usize > cd.len() || read_u32(cd, pos) != CENSIG {
                return Err(AnalyzerError::BadCentralDirectory(format!(
                    "CEN record truncated at {pos}"
                )));
            }
            let flags = read_u16(cd, pos + 8);
            let method = read_u16(cd, pos + 10);
            let crc = read_u32(cd, pos + 16);
            let mut compressed_size = read_u32(cd, pos + 20) as u64;
            let mut uncompressed_size = read_u32(cd, pos + 24) as u64;
            let name_len = read_u16(cd, pos + 28) as usize;
            let extra_len = read_u16(cd, pos + 30) as usize;
            let comment_len = read_u16(cd, pos + 32) as usize;
            let mut local_header_offset = read_u32(cd, pos + 42) as u64;

            let name_start = pos + CENHDR as usize;
            let extra_start = name_start + name_len;
            let record_end = extra_start + extra_len + comment_len;
            if record_end > cd.len() {
                return Err(AnalyzerError::BadCentralDirectory(format!(
                    "CEN name/extra truncated at {pos}"
                )));
            }

            let name = String::from_utf8_lossy(&cd[name_start..extra_start]).into_owned();

            // ZIP64 extra field supplies whichever fixed fields are sentinels,
            // in uncompressed, compressed, offset order.
            if uncompressed_size == ZIP64_MAGIC_U32 as u64
                || compressed_size == ZIP64_MAGIC_U32 as u64
                || local_header_offset == ZIP64_MAGIC_U32 as u64
            {
                let extra = &cd[extra_start..extra_start + extra_len];
                let mut cursor = 0usize;
                while cursor + 4 <= extra.len() {
                    let id = read_u16(extra, cursor);
                    let size = read_u16(extra, cursor + 2) as usize;
                    let data_start = cursor + 4;
                    if data_start + size > extra.len() {
                        break;
                    }
                    if id == 0x0001 {
                        let mut field = data_start;
                        if uncompressed_size == ZIP64_MAGIC_U32 as u64 && field + 8 <= data_start + size {
                            uncompressed_size = read_u64(extra, field);
                            field += 8;
                        }
                        if compressed_size == ZIP64_MAGIC_U32 as u64 && field + 8 <= data_start + size {
                            compressed_size = read_u64(extra, field);
                            field += 8;
                        }
                        if local_header_offset == ZIP64_MAGIC_U32 as u64 && field + 8 <= data_start + size {
                            local_header_offset = read_u64(extra, field);
                        }
                        break;
                    }
                    cursor = data_start + size;
                }
            }

            entries.push(CenEntry {
                name,
                flags,
                method,
                crc,
                compressed_size,
                uncompressed_size,
                local_header_offset,
            });
            pos = record_end;
        }
        Ok(entries)
    }

    /// Read and decompress one entry's bytes through the local header.
    pub fn read_entry<S: Read + Seek>(
        &self,
        buf: &mut RandomAccessBuffer<S>,
        entry: &CenEntry,
    ) -> Result<Vec<u8>, AnalyzerError> {
        if entry.uncompressed_size > MAX_ENTRY_BYTES {
            return Err(AnalyzerError::BadCentralDirectory(format!(
                "entry {} too large: {} bytes",
                entry.name, entry.uncompressed_size
            )));
        }

        let loc = self.loc_pos + entry.local_header_offset;
        if buf.u32_at(loc)? != LOCSIG {
            return Err(AnalyzerError::BadCentralDirectory(format!(
                "no LOCSIG for entry {}",
                entry.name
            )));
        }
        // The local header's own name/extra lengths govern the data offset.
        let name_len = buf.u16_at(loc + 26)? as u64;
        let extra_len = buf.u16_at(loc + 28)? as u64;
        let data_start = loc + LOCHDR + name_len + extra_len;

        let mut compressed = vec![0u8; entry.compressed_size as usize];
        buf.read_at(data_start, &mut compressed)?;

        match entry.method {
            0 => Ok(compressed),
            8 => {
                let mut out = Vec::with_capacity(entry.uncompressed_size as usize);
                DeflateDecoder::new(compressed.as_slice())
                    .take(MAX_ENTRY_BYTES)
                    .read_to_end(&mut out)?;
                Ok(out)
            }
            method => Err(AnalyzerError::UnsupportedMethod { name: entry.name.clone(), method }),
        }
    }
}

fn read_u16(data: &[u8], pos: usize) -> u16 {
    u16::from_le_bytes([data[pos], data[pos + 1]])
}

fn read_u32(data: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
}

fn read_u64(data: &[u8], pos: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[pos..pos + 8]);
    u64::from_le_bytes(bytes)
}

#[cfg(test)]
#[path = "zip_tests.rs"]
mod tests;
