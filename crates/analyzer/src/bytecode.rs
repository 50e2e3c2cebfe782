// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bytecode normalization for the shaded hash.
//!
//! The normalized stream keeps what shading preserves and drops what it
//! rewrites: wide opcode variants fold to their regular replacement,
//! jump offsets are dropped, switch jump tables are discarded, and every
//! constant-pool operand is rewritten to its mapped sequential index.
//! Local-variable indexes are always written as two bytes so wide and
//! narrow encodings of the same instruction agree.

use crate::error::AnalyzerError;
use crate::pool::ConstantPoolMapper;

// Opcodes referenced by name.
const LDC: u8 = 0x12;
const LDC_W: u8 = 0x13;
const LDC2_W: u8 = 0x14;
const IINC: u8 = 0x84;
const RET: u8 = 0xa9;
const TABLESWITCH: u8 = 0xaa;
const LOOKUPSWITCH: u8 = 0xab;
const GOTO: u8 = 0xa7;
const JSR: u8 = 0xa8;
const GOTO_W: u8 = 0xc8;
const JSR_W: u8 = 0xc9;
const INVOKEINTERFACE: u8 = 0xb9;
const INVOKEDYNAMIC: u8 = 0xba;
const NEWARRAY: u8 = 0xbc;
const MULTIANEWARRAY: u8 = 0xc5;
const WIDE: u8 = 0xc4;

/// Fold wide variants onto the opcode they replace.
fn fold(opcode: u8) -> u8 {
    match opcode {
        LDC_W => LDC,
        GOTO_W => GOTO,
        JSR_W => JSR,
        other => other,
    }
}

/// Append the normalized form of `code` to `out`.
pub fn normalize_code(
    code: &[u8],
    mapper: &mut ConstantPoolMapper<'_>,
    out: &mut Vec<u8>,
) -> Result<(), AnalyzerError> {
    let mut pc = 0usize;
    while pc < code.len() {
        let op_pc = pc;
        let opcode = code[pc];
        pc += 1;
        out.push(fold(opcode));

        match opcode {
            // bipush
            0x10 => {
                out.push(read_u8(code, &mut pc)?);
            }
            // sipush
            0x11 => {
                out.extend_from_slice(&read_n::<2>(code, &mut pc)?);
            }
            // ldc: one-byte pool operand, widened to the mapped index
            LDC => {
                let index = read_u8(code, &mut pc)? as u16;
                push_mapped(mapper, index, out)?;
            }
            // ldc_w / ldc2_w: two-byte pool operand
            LDC_W | LDC2_W => {
                let index = read_u16(code, &mut pc)?;
                push_mapped(mapper, index, out)?;
            }
            // loads/stores with a local-variable operand
            0x15..=0x19 | 0x36..=0x3a | RET => {
                let local = read_u8(code, &mut pc)? as u16;
                out.extend_from_slice(&local.to_be_bytes());
            }
            // iinc: local + increment, widened
            IINC => {
                let local = read_u8(code, &mut pc)? as u16;
                let delta = read_u8(code, &mut pc)? as i8 as i16;
                out.extend_from_slice(&local.to_be_bytes());
                out.extend_from_slice(&delta.to_be_bytes());
            }
            // two-byte branches: offset dropped
            0x99..=0xa8 | 0xc6 | 0xc7 => {
                pc += 2;
                ensure(code, pc)?;
            }
            // four-byte branches: offset dropped, opcode already folded
            GOTO_W | JSR_W => {
                pc += 4;
                ensure(code, pc)?;
            }
            TABLESWITCH => {
                pc += switch_padding(op_pc);
                pc += 4; // default, dropped
                let low = read_n::<4>(code, &mut pc)?;
                let high = read_n::<4>(code, &mut pc)?;
                out.extend_from_slice(&low);
                out.extend_from_slice(&high);
                let count = i32::from_be_bytes(high)
                    .checked_sub(i32::from_be_bytes(low))
                    .and_then(|d| d.checked_add(1))
                    .filter(|&d| d >= 0)
                    .ok_or(AnalyzerError::BadClassFile("tableswitch bounds".into()))?;
                pc += count as usize * 4; // jump table, dropped
                ensure(code, pc)?;
            }
            LOOKUPSWITCH => {
                pc += switch_padding(op_pc);
                pc += 4; // default, dropped
                let npairs_bytes = read_n::<4>(code, &mut pc)?;
                out.extend_from_slice(&npairs_bytes);
                let npairs = i32::from_be_bytes(npairs_bytes);
                if npairs < 0 {
                    return Err(AnalyzerError::BadClassFile("lookupswitch npairs".into()));
                }
                pc += npairs as usize * 8; // pairs, dropped
                ensure(code, pc)?;
            }
            // field/method references and type operands
            0xb2..=0xb8 | 0xbb | 0xbd | 0xc0 | 0xc1 => {
                let index = read_u16(code, &mut pc)?;
                push_mapped(mapper, index, out)?;
            }
            INVOKEINTERFACE => {
                let index = read_u16(code, &mut pc)?;
                push_mapped(mapper, index, out)?;
                out.push(read_u8(code, &mut pc)?); // count
                pc += 1; // reserved zero, dropped
                ensure(code, pc)?;
            }
            INVOKEDYNAMIC => {
                let index = read_u16(code, &mut pc)?;
                push_mapped(mapper, index, out)?;
                pc += 2; // reserved zeros, dropped
                ensure(code, pc)?;
            }
            NEWARRAY => {
                out.push(read_u8(code, &mut pc)?);
            }
            MULTIANEWARRAY => {
                let index = read_u16(code, &mut pc)?;
                push_mapped(mapper, index, out)?;
                out.push(read_u8(code, &mut pc)?); // dimensions
            }
            WIDE => {
                // Replace the wide prefix with the widened base opcode.
                out.pop();
                let wide_op = read_u8(code, &mut pc)?;
                out.push(wide_op);
                match wide_op {
                    0x15..=0x19 | 0x36..=0x3a | RET => {
                        out.extend_from_slice(&read_n::<2>(code, &mut pc)?);
                    }
                    IINC => {
                        out.extend_from_slice(&read_n::<2>(code, &mut pc)?);
                        out.extend_from_slice(&read_n::<2>(code, &mut pc)?);
                    }
                    other => return Err(AnalyzerError::UnexpectedOpcode(other)),
                }
            }
            // no-operand opcodes
            0x00..=0x0f | 0x1a..=0x35 | 0x3b..=0x83 | 0x85..=0x98 | 0xac..=0xb1 | 0xbe | 0xbf
            | 0xc2 | 0xc3 => {}
            other => return Err(AnalyzerError::UnexpectedOpcode(other)),
        }
    }
    Ok(())
}

fn switch_padding(op_pc: usize) -> usize {
    (4 - ((op_pc + 1) % 4)) % 4
}

fn push_mapped(
    mapper: &mut ConstantPoolMapper<'_>,
    index: u16,
    out: &mut Vec<u8>,
) -> Result<(), AnalyzerError> {
    let mapped = mapper.map(index)?;
    out.extend_from_slice(&mapped.to_be_bytes());
    Ok(())
}

fn ensure(code: &[u8], pc: usize) -> Result<(), AnalyzerError> {
    if pc > code.len() {
        return Err(AnalyzerError::BadClassFile("truncated bytecode".into()));
    }
    Ok(())
}

fn read_u8(code: &[u8], pc: &mut usize) -> Result<u8, AnalyzerError> {
    let b = *code
        .get(*pc)
        .ok_or_else(|| AnalyzerError::BadClassFile("truncated bytecode".into()))?;
    *pc += 1;
    Ok(b)
}

fn read_u16(code: &[u8], pc: &mut usize) -> Result<u16, AnalyzerError> {
    let bytes = read_n::<2>(code, pc)?;
    Ok(u16::from_be_bytes(bytes))
}

fn read_n<const N: usize>(code: &[u8], pc: &mut usize) -> Result<[u8; N], AnalyzerError> {
    let end = pc
        .checked_add(N)
        .filter(|&end| end <= code.len())
        .ok_or_else(|| AnalyzerError::BadClassFile("truncated bytecode".into()))?;
    let mut bytes = [0u8; N];
    bytes.copy_from_slice(&code[*pc..end]);
    *pc = end;
    Ok(bytes)
}

#[cfg(test)]
#[path = "bytecode_tests.rs"]
mod tests;
