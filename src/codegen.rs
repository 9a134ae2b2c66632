// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Final byte emission.
//!
//! Runs after every mode is committed and every symbol bound. Range
//! problems found here are recorded as diagnostics; the caller discards
//! the image when any were recorded. `.org` moves the address counter
//! without padding the image, `.advance` pads with zeros.

use crate::env::Environment;
use crate::error::{AsmErrorKind, ErrorSink};
use crate::expr::{eval, fits_byte, fits_word, Expr};
use crate::ir::{DataWidth, Node, Program};
use crate::opcodes::{inverse_branch, AddressMode, OpcodeTable};

pub fn generate(
    prog: &Program,
    env: &Environment,
    table: &OpcodeTable,
    sink: &mut ErrorSink,
) -> Vec<u8> {
    let mut image = Vec::new();
    let mut pc: i64 = 0;
    let mut past_end = false;

    for node in &prog.nodes {
        let line = node.span().line;
        if !past_end && pc > 0xffff && matches!(node, Node::Instr(_) | Node::Data { .. }) {
            past_end = true;
            sink.record(
                line,
                AsmErrorKind::OperandRange,
                "Code emitted past $ffff",
                None,
            );
        }
        match node {
            Node::Label { .. } | Node::Alias { .. } | Node::MacroDef(_) => {}

            Node::MacroInvoke { name, span, .. } => {
                // Expansion leaves no invocations behind on a clean run.
                sink.record(
                    span.line,
                    AsmErrorKind::UndefinedSymbol,
                    "Undefined macro",
                    Some(name),
                );
            }

            Node::Org { expr, .. } => {
                let ctx = env.eval_ctx(Some(pc));
                match eval(expr, &ctx) {
                    Ok(value) => pc = value,
                    Err(err) => {
                        sink.record(line, err.kind, &err.message, err.param.as_deref())
                    }
                }
            }

            Node::Advance { expr, .. } => {
                let ctx = env.eval_ctx(Some(pc));
                match eval(expr, &ctx) {
                    Ok(target) if target < pc => sink.record(
                        line,
                        AsmErrorKind::OperandRange,
                        "Attempt to .advance backwards",
                        None,
                    ),
                    Ok(target) if target > 0xffff => sink.record(
                        line,
                        AsmErrorKind::OperandRange,
                        "Address does not fit in two bytes",
                        None,
                    ),
                    Ok(target) => {
                        image.resize(image.len() + (target - pc) as usize, 0);
                        pc = target;
                    }
                    Err(err) => {
                        sink.record(line, err.kind, &err.message, err.param.as_deref())
                    }
                }
            }

            Node::Data { width, exprs, .. } => {
                for expr in exprs {
                    if let (DataWidth::Byte, Expr::Str(bytes, _)) = (width, expr) {
                        image.extend_from_slice(bytes);
                        pc += bytes.len() as i64;
                        continue;
                    }
                    let ctx = env.eval_ctx(Some(pc));
                    let value = match eval(expr, &ctx) {
                        Ok(v) => v,
                        Err(err) => {
                            sink.record(line, err.kind, &err.message, err.param.as_deref());
                            continue;
                        }
                    };
                    match width {
                        DataWidth::Byte => {
                            if !(-128..=255).contains(&value) {
                                sink.record(
                                    line,
                                    AsmErrorKind::OperandRange,
                                    "Byte value out of range",
                                    None,
                                );
                            }
                            image.push((value & 0xff) as u8);
                            pc += 1;
                        }
                        DataWidth::Word => {
                            if !(-32768..=65535).contains(&value) {
                                sink.record(
                                    line,
                                    AsmErrorKind::OperandRange,
                                    "Word value out of range",
                                    None,
                                );
                            }
                            let word = (value & 0xffff) as u16;
                            image.extend_from_slice(&word.to_le_bytes());
                            pc += 2;
                        }
                    }
                }
            }

            Node::Instr(instr) => {
                let operand = match instr.shape.expr() {
                    Some(expr) => {
                        let ctx = env.eval_ctx(Some(pc));
                        match eval(expr, &ctx) {
                            Ok(v) => Some(v),
                            Err(err) => {
                                sink.record(
                                    line,
                                    err.kind,
                                    &err.message,
                                    err.param.as_deref(),
                                );
                                pc += i64::from(instr.current_size());
                                continue;
                            }
                        }
                    }
                    None => None,
                };

                if instr.extended {
                    emit_long_branch(instr, operand, table, &mut image, sink, line);
                } else {
                    emit_instr(instr, operand, pc, table, &mut image, sink, line);
                }
                pc += i64::from(instr.current_size());
            }
        }
    }

    image
}

fn emit_instr(
    instr: &crate::ir::Instr,
    operand: Option<i64>,
    addr: i64,
    table: &OpcodeTable,
    image: &mut Vec<u8>,
    sink: &mut ErrorSink,
    line: u32,
) {
    let Some(opcode) = table.opcode(&instr.mnemonic, instr.selected) else {
        sink.record(
            line,
            AsmErrorKind::UnknownOpcode,
            "Unknown opcode or addressing mode",
            Some(&instr.mnemonic),
        );
        return;
    };
    image.push(opcode);

    match instr.selected.operand_size() {
        0 => {}
        1 => {
            let value = operand.unwrap_or(0);
            if instr.selected == AddressMode::Relative {
                let offset = value - (addr + 2);
                if !(-128..=127).contains(&offset) {
                    sink.record(
                        line,
                        AsmErrorKind::OperandRange,
                        "Branch target out of range",
                        None,
                    );
                }
                image.push((offset & 0xff) as u8);
            } else {
                let in_range = if instr.selected == AddressMode::Immediate {
                    (-128..=255).contains(&value)
                } else {
                    fits_byte(value)
                };
                if !in_range {
                    sink.record(
                        line,
                        AsmErrorKind::OperandRange,
                        "Operand does not fit in one byte",
                        None,
                    );
                }
                image.push((value & 0xff) as u8);
            }
        }
        _ => {
            let value = operand.unwrap_or(0);
            if !fits_word(value) {
                sink.record(
                    line,
                    AsmErrorKind::OperandRange,
                    "Operand does not fit in two bytes",
                    None,
                );
            }
            let word = (value & 0xffff) as u16;
            image.extend_from_slice(&word.to_le_bytes());
        }
    }
}

/// Long form of an out-of-range branch: invert the condition to hop over
/// an absolute JMP to the real target. Branch-always needs no hop.
fn emit_long_branch(
    instr: &crate::ir::Instr,
    operand: Option<i64>,
    table: &OpcodeTable,
    image: &mut Vec<u8>,
    sink: &mut ErrorSink,
    line: u32,
) {
    let target = operand.unwrap_or(0);
    if !fits_word(target) {
        sink.record(
            line,
            AsmErrorKind::OperandRange,
            "Branch target does not fit in two bytes",
            None,
        );
    }
    let word = (target & 0xffff) as u16;
    let jmp = match table.opcode("JMP", AddressMode::Absolute) {
        Some(op) => op,
        None => {
            sink.record(
                line,
                AsmErrorKind::UnknownOpcode,
                "Unknown opcode or addressing mode",
                Some("JMP"),
            );
            return;
        }
    };

    if let Some(inverse) = inverse_branch(&instr.mnemonic) {
        match table.opcode(inverse, AddressMode::Relative) {
            Some(op) => {
                image.push(op);
                image.push(3); // skip the JMP that follows
            }
            None => {
                sink.record(
                    line,
                    AsmErrorKind::UnknownOpcode,
                    "Unknown opcode or addressing mode",
                    Some(inverse),
                );
                return;
            }
        }
    }
    image.push(jmp);
    image.extend_from_slice(&word.to_le_bytes());
}
