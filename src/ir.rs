// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Intermediate representation produced by the front end and transformed
//! by the resolution passes.

use std::collections::HashMap;

use crate::expr::{Expr, Span};
use crate::opcodes::{inverse_branch, AddressMode, OpcodeTable};

/// Syntactic operand shape, before an addressing mode is selected.
#[derive(Debug, Clone)]
pub enum OperandShape {
    /// No operand written.
    None,
    /// Explicit `A`.
    Accumulator,
    /// `#expr`
    Immediate(Expr),
    /// `expr` - zero page, absolute, or branch target.
    Direct(Expr),
    /// `expr,X`
    DirectX(Expr),
    /// `expr,Y`
    DirectY(Expr),
    /// `(expr)`
    Indirect(Expr),
    /// `(expr,X)`
    IndirectX(Expr),
    /// `(expr),Y`
    IndirectY(Expr),
}

impl OperandShape {
    pub fn expr(&self) -> Option<&Expr> {
        match self {
            OperandShape::None | OperandShape::Accumulator => None,
            OperandShape::Immediate(e)
            | OperandShape::Direct(e)
            | OperandShape::DirectX(e)
            | OperandShape::DirectY(e)
            | OperandShape::Indirect(e)
            | OperandShape::IndirectX(e)
            | OperandShape::IndirectY(e) => Some(e),
        }
    }

    /// Legal addressing modes for this shape under `table`, smallest first.
    pub fn candidates(&self, table: &OpcodeTable, mnemonic: &str) -> Vec<AddressMode> {
        use AddressMode::*;
        let modes: &[AddressMode] = match self {
            OperandShape::None => {
                // Bare shift/rotate mnemonics operate on the accumulator.
                if table.supports(mnemonic, Implied) {
                    &[Implied]
                } else {
                    &[Accumulator]
                }
            }
            OperandShape::Accumulator => &[Accumulator],
            OperandShape::Immediate(_) => &[Immediate],
            OperandShape::Direct(_) => {
                if table.is_branch(mnemonic) {
                    &[Relative]
                } else {
                    &[ZeroPage, Absolute]
                }
            }
            OperandShape::DirectX(_) => &[ZeroPageX, AbsoluteX],
            OperandShape::DirectY(_) => &[ZeroPageY, AbsoluteY],
            OperandShape::Indirect(_) => &[ZeroPageIndirect, Indirect],
            OperandShape::IndirectX(_) => &[IndexedIndirectX, AbsoluteIndexedIndirect],
            OperandShape::IndirectY(_) => &[IndirectIndexedY],
        };
        modes
            .iter()
            .copied()
            .filter(|mode| table.supports(mnemonic, *mode))
            .collect()
    }
}

/// An opcode node in the program.
///
/// `candidates` holds the legal encodings smallest first; `selected` is the
/// encoding currently assumed. Collapse may move the selection to a smaller
/// candidate, branch extension replaces the short relative form with the
/// long idiom; the two never oscillate on one node.
#[derive(Debug, Clone)]
pub struct Instr {
    pub mnemonic: String,
    pub shape: OperandShape,
    pub candidates: Vec<AddressMode>,
    pub selected: AddressMode,
    /// Addressing mode fixed; skipped by Collapse.
    pub committed: bool,
    /// Rewritten to the long-branch idiom; never undone within a run.
    pub extended: bool,
    pub size: u8,
    pub addr: u16,
    pub span: Span,
}

impl Instr {
    pub fn new(mnemonic: &str, shape: OperandShape, span: Span) -> Self {
        Self {
            mnemonic: mnemonic.to_ascii_uppercase(),
            shape,
            candidates: Vec::new(),
            selected: AddressMode::Implied,
            committed: false,
            extended: false,
            size: 0,
            addr: 0,
            span,
        }
    }

    /// Attach candidate encodings from the active table. Non-branch nodes
    /// start at the largest candidate and only ever collapse; relative
    /// branches start at the 2-byte short form and only ever extend.
    /// Returns false if the (mnemonic, shape) combination is not encodable.
    pub fn bind(&mut self, table: &OpcodeTable) -> bool {
        self.candidates = self.shape.candidates(table, &self.mnemonic);
        let Some(largest) = self.candidates.last() else {
            return false;
        };
        self.selected = if self.candidates[0] == AddressMode::Relative {
            AddressMode::Relative
        } else {
            *largest
        };
        self.size = self.selected.encoded_size();
        true
    }

    pub fn is_relative(&self) -> bool {
        self.candidates.first() == Some(&AddressMode::Relative)
    }

    /// Size of the long form: inverted branch over a JMP, or a bare JMP
    /// for branch-always.
    pub fn extended_size(&self) -> u8 {
        if inverse_branch(&self.mnemonic).is_some() {
            5
        } else {
            3
        }
    }

    /// Current encoded size, honoring a long-branch rewrite.
    pub fn current_size(&self) -> u8 {
        if self.extended {
            self.extended_size()
        } else {
            self.selected.encoded_size()
        }
    }
}

/// Data emission width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataWidth {
    Byte,
    Word,
}

/// A macro definition: name, positional parameters, body.
#[derive(Debug, Clone)]
pub struct MacroDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Node>,
    pub span: Span,
}

/// Top-level IR node.
#[derive(Debug, Clone)]
pub enum Node {
    Label {
        name: String,
        span: Span,
    },
    Instr(Instr),
    MacroDef(MacroDef),
    MacroInvoke {
        name: String,
        args: Vec<Expr>,
        span: Span,
    },
    /// `.org expr` - set the current address; emits nothing.
    Org {
        expr: Expr,
        span: Span,
    },
    /// `.advance expr` - zero-pad forward to an address.
    Advance {
        expr: Expr,
        /// Pad length under current addresses, recomputed by label passes.
        pad: u16,
        span: Span,
    },
    /// `.alias name expr`
    Alias {
        name: String,
        expr: Expr,
        span: Span,
    },
    Data {
        width: DataWidth,
        exprs: Vec<Expr>,
        span: Span,
    },
}

impl Node {
    pub fn span(&self) -> Span {
        match self {
            Node::Label { span, .. }
            | Node::MacroInvoke { span, .. }
            | Node::Org { span, .. }
            | Node::Advance { span, .. }
            | Node::Alias { span, .. }
            | Node::Data { span, .. } => *span,
            Node::Instr(instr) => instr.span,
            Node::MacroDef(def) => def.span,
        }
    }

    /// Bytes this node contributes to the image under current selections.
    pub fn size(&self) -> u32 {
        match self {
            Node::Instr(instr) => u32::from(instr.current_size()),
            Node::Advance { pad, .. } => u32::from(*pad),
            Node::Data { width, exprs, .. } => exprs
                .iter()
                .map(|e| match (width, e) {
                    (DataWidth::Byte, Expr::Str(bytes, _)) => bytes.len() as u32,
                    (DataWidth::Byte, _) => 1,
                    (DataWidth::Word, _) => 2,
                })
                .sum(),
            _ => 0,
        }
    }
}

/// Ordered sequence of top-level IR nodes plus the registered macros.
#[derive(Debug, Default)]
pub struct Program {
    pub nodes: Vec<Node>,
    pub macros: HashMap<String, MacroDef>,
}

impl Program {
    #[must_use]
    pub fn new(nodes: Vec<Node>) -> Self {
        Self {
            nodes,
            macros: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcodes::Extensions;

    fn direct(sym: &str) -> OperandShape {
        OperandShape::Direct(Expr::Symbol(sym.to_string(), Span::default()))
    }

    #[test]
    fn ambiguous_direct_binds_pessimistic() {
        let table = OpcodeTable::base();
        let mut instr = Instr::new("lda", direct("target"), Span::default());
        assert!(instr.bind(&table));
        assert_eq!(
            instr.candidates,
            vec![AddressMode::ZeroPage, AddressMode::Absolute]
        );
        assert_eq!(instr.selected, AddressMode::Absolute);
        assert_eq!(instr.size, 3);
    }

    #[test]
    fn branch_binds_short() {
        let table = OpcodeTable::base();
        let mut instr = Instr::new("BNE", direct("target"), Span::default());
        assert!(instr.bind(&table));
        assert_eq!(instr.candidates, vec![AddressMode::Relative]);
        assert_eq!(instr.size, 2);
        assert!(instr.is_relative());
        assert_eq!(instr.extended_size(), 5);
    }

    #[test]
    fn bra_long_form_is_a_plain_jmp() {
        let table = OpcodeTable::with_extensions(Extensions {
            undocumented: false,
            c02: true,
        });
        let mut instr = Instr::new("BRA", direct("target"), Span::default());
        assert!(instr.bind(&table));
        assert_eq!(instr.extended_size(), 3);
    }

    #[test]
    fn jmp_direct_has_no_zero_page_candidate() {
        let table = OpcodeTable::base();
        let mut instr = Instr::new("JMP", direct("target"), Span::default());
        assert!(instr.bind(&table));
        assert_eq!(instr.candidates, vec![AddressMode::Absolute]);
    }

    #[test]
    fn unknown_mnemonic_fails_to_bind() {
        let table = OpcodeTable::base();
        let mut instr = Instr::new("LAX", direct("target"), Span::default());
        assert!(!instr.bind(&table));
    }

    #[test]
    fn bare_shift_uses_accumulator_mode() {
        let table = OpcodeTable::base();
        let mut instr = Instr::new("ASL", OperandShape::None, Span::default());
        assert!(instr.bind(&table));
        assert_eq!(instr.selected, AddressMode::Accumulator);
        let mut nop = Instr::new("NOP", OperandShape::None, Span::default());
        assert!(nop.bind(&table));
        assert_eq!(nop.selected, AddressMode::Implied);
    }

    #[test]
    fn data_sizes() {
        let span = Span::default();
        let byte_node = Node::Data {
            width: DataWidth::Byte,
            exprs: vec![
                Expr::Number(1, span),
                Expr::Str(b"hello".to_vec(), span),
            ],
            span,
        };
        assert_eq!(byte_node.size(), 6);
        let word_node = Node::Data {
            width: DataWidth::Word,
            exprs: vec![Expr::Number(1, span), Expr::Number(2, span)],
            span,
        };
        assert_eq!(word_node.size(), 4);
    }
}
