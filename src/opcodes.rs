// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Instruction tables for the 6502 family.
//!
//! The base table covers the documented 6502 set. Two extension tables can
//! be merged in at startup: the 6510 undocumented opcodes and the 65C02
//! extensions. The merged table is immutable for the rest of the run and
//! is passed explicitly into the pipeline.

use std::collections::HashMap;

/// Addressing modes for the MOS 6502 family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AddressMode {
    /// No operand (NOP, RTS, BRK, etc.)
    Implied,
    /// Accumulator (ASL A, ROL A, etc.)
    Accumulator,
    /// #$nn - 8-bit immediate value
    Immediate,
    /// $nn - Zero page (8-bit address)
    ZeroPage,
    /// $nn,X
    ZeroPageX,
    /// $nn,Y
    ZeroPageY,
    /// $nnnn - Absolute (16-bit address)
    Absolute,
    /// $nnnn,X
    AbsoluteX,
    /// $nnnn,Y
    AbsoluteY,
    /// ($nnnn) - Indirect (JMP only on base 6502)
    Indirect,
    /// ($nn,X) - Indexed indirect (zero page)
    IndexedIndirectX,
    /// ($nn),Y - Indirect indexed (zero page)
    IndirectIndexedY,
    /// Relative branch offset (8-bit signed)
    Relative,
    /// ($nn) - Zero page indirect (65C02 only)
    ZeroPageIndirect,
    /// ($nnnn,X) - Absolute indexed indirect (65C02 only, JMP)
    AbsoluteIndexedIndirect,
}

impl AddressMode {
    /// Number of operand bytes for this mode.
    pub fn operand_size(&self) -> u8 {
        match self {
            AddressMode::Implied | AddressMode::Accumulator => 0,
            AddressMode::Immediate
            | AddressMode::ZeroPage
            | AddressMode::ZeroPageX
            | AddressMode::ZeroPageY
            | AddressMode::IndexedIndirectX
            | AddressMode::IndirectIndexedY
            | AddressMode::Relative
            | AddressMode::ZeroPageIndirect => 1,
            AddressMode::Absolute
            | AddressMode::AbsoluteX
            | AddressMode::AbsoluteY
            | AddressMode::Indirect
            | AddressMode::AbsoluteIndexedIndirect => 2,
        }
    }

    /// Total instruction size in bytes: opcode plus operand.
    pub fn encoded_size(&self) -> u8 {
        1 + self.operand_size()
    }
}

use AddressMode::*;

type Row = (&'static str, AddressMode, u8);

/// Documented base 6502 instructions.
static BASE_TABLE: &[Row] = &[
    ("ADC", Immediate, 0x69), ("ADC", ZeroPage, 0x65), ("ADC", ZeroPageX, 0x75),
    ("ADC", Absolute, 0x6D), ("ADC", AbsoluteX, 0x7D), ("ADC", AbsoluteY, 0x79),
    ("ADC", IndexedIndirectX, 0x61), ("ADC", IndirectIndexedY, 0x71),
    ("AND", Immediate, 0x29), ("AND", ZeroPage, 0x25), ("AND", ZeroPageX, 0x35),
    ("AND", Absolute, 0x2D), ("AND", AbsoluteX, 0x3D), ("AND", AbsoluteY, 0x39),
    ("AND", IndexedIndirectX, 0x21), ("AND", IndirectIndexedY, 0x31),
    ("ASL", Accumulator, 0x0A), ("ASL", ZeroPage, 0x06), ("ASL", ZeroPageX, 0x16),
    ("ASL", Absolute, 0x0E), ("ASL", AbsoluteX, 0x1E),
    ("BCC", Relative, 0x90), ("BCS", Relative, 0xB0), ("BEQ", Relative, 0xF0),
    ("BIT", ZeroPage, 0x24), ("BIT", Absolute, 0x2C),
    ("BMI", Relative, 0x30), ("BNE", Relative, 0xD0), ("BPL", Relative, 0x10),
    ("BRK", Implied, 0x00),
    ("BVC", Relative, 0x50), ("BVS", Relative, 0x70),
    ("CLC", Implied, 0x18), ("CLD", Implied, 0xD8), ("CLI", Implied, 0x58),
    ("CLV", Implied, 0xB8),
    ("CMP", Immediate, 0xC9), ("CMP", ZeroPage, 0xC5), ("CMP", ZeroPageX, 0xD5),
    ("CMP", Absolute, 0xCD), ("CMP", AbsoluteX, 0xDD), ("CMP", AbsoluteY, 0xD9),
    ("CMP", IndexedIndirectX, 0xC1), ("CMP", IndirectIndexedY, 0xD1),
    ("CPX", Immediate, 0xE0), ("CPX", ZeroPage, 0xE4), ("CPX", Absolute, 0xEC),
    ("CPY", Immediate, 0xC0), ("CPY", ZeroPage, 0xC4), ("CPY", Absolute, 0xCC),
    ("DEC", ZeroPage, 0xC6), ("DEC", ZeroPageX, 0xD6), ("DEC", Absolute, 0xCE),
    ("DEC", AbsoluteX, 0xDE),
    ("DEX", Implied, 0xCA), ("DEY", Implied, 0x88),
    ("EOR", Immediate, 0x49), ("EOR", ZeroPage, 0x45), ("EOR", ZeroPageX, 0x55),
    ("EOR", Absolute, 0x4D), ("EOR", AbsoluteX, 0x5D), ("EOR", AbsoluteY, 0x59),
    ("EOR", IndexedIndirectX, 0x41), ("EOR", IndirectIndexedY, 0x51),
    ("INC", ZeroPage, 0xE6), ("INC", ZeroPageX, 0xF6), ("INC", Absolute, 0xEE),
    ("INC", AbsoluteX, 0xFE),
    ("INX", Implied, 0xE8), ("INY", Implied, 0xC8),
    ("JMP", Absolute, 0x4C), ("JMP", Indirect, 0x6C),
    ("JSR", Absolute, 0x20),
    ("LDA", Immediate, 0xA9), ("LDA", ZeroPage, 0xA5), ("LDA", ZeroPageX, 0xB5),
    ("LDA", Absolute, 0xAD), ("LDA", AbsoluteX, 0xBD), ("LDA", AbsoluteY, 0xB9),
    ("LDA", IndexedIndirectX, 0xA1), ("LDA", IndirectIndexedY, 0xB1),
    ("LDX", Immediate, 0xA2), ("LDX", ZeroPage, 0xA6), ("LDX", ZeroPageY, 0xB6),
    ("LDX", Absolute, 0xAE), ("LDX", AbsoluteY, 0xBE),
    ("LDY", Immediate, 0xA0), ("LDY", ZeroPage, 0xA4), ("LDY", ZeroPageX, 0xB4),
    ("LDY", Absolute, 0xAC), ("LDY", AbsoluteX, 0xBC),
    ("LSR", Accumulator, 0x4A), ("LSR", ZeroPage, 0x46), ("LSR", ZeroPageX, 0x56),
    ("LSR", Absolute, 0x4E), ("LSR", AbsoluteX, 0x5E),
    ("NOP", Implied, 0xEA),
    ("ORA", Immediate, 0x09), ("ORA", ZeroPage, 0x05), ("ORA", ZeroPageX, 0x15),
    ("ORA", Absolute, 0x0D), ("ORA", AbsoluteX, 0x1D), ("ORA", AbsoluteY, 0x19),
    ("ORA", IndexedIndirectX, 0x01), ("ORA", IndirectIndexedY, 0x11),
    ("PHA", Implied, 0x48), ("PHP", Implied, 0x08), ("PLA", Implied, 0x68),
    ("PLP", Implied, 0x28),
    ("ROL", Accumulator, 0x2A), ("ROL", ZeroPage, 0x26), ("ROL", ZeroPageX, 0x36),
    ("ROL", Absolute, 0x2E), ("ROL", AbsoluteX, 0x3E),
    ("ROR", Accumulator, 0x6A), ("ROR", ZeroPage, 0x66), ("ROR", ZeroPageX, 0x76),
    ("ROR", Absolute, 0x6E), ("ROR", AbsoluteX, 0x7E),
    ("RTI", Implied, 0x40), ("RTS", Implied, 0x60),
    ("SBC", Immediate, 0xE9), ("SBC", ZeroPage, 0xE5), ("SBC", ZeroPageX, 0xF5),
    ("SBC", Absolute, 0xED), ("SBC", AbsoluteX, 0xFD), ("SBC", AbsoluteY, 0xF9),
    ("SBC", IndexedIndirectX, 0xE1), ("SBC", IndirectIndexedY, 0xF1),
    ("SEC", Implied, 0x38), ("SED", Implied, 0xF8), ("SEI", Implied, 0x78),
    ("STA", ZeroPage, 0x85), ("STA", ZeroPageX, 0x95), ("STA", Absolute, 0x8D),
    ("STA", AbsoluteX, 0x9D), ("STA", AbsoluteY, 0x99),
    ("STA", IndexedIndirectX, 0x81), ("STA", IndirectIndexedY, 0x91),
    ("STX", ZeroPage, 0x86), ("STX", ZeroPageY, 0x96), ("STX", Absolute, 0x8E),
    ("STY", ZeroPage, 0x84), ("STY", ZeroPageX, 0x94), ("STY", Absolute, 0x8C),
    ("TAX", Implied, 0xAA), ("TAY", Implied, 0xA8), ("TSX", Implied, 0xBA),
    ("TXA", Implied, 0x8A), ("TXS", Implied, 0x9A), ("TYA", Implied, 0x98),
];

/// 6510 undocumented opcodes (the stable subset).
static UNDOC_TABLE: &[Row] = &[
    ("SLO", ZeroPage, 0x07), ("SLO", ZeroPageX, 0x17), ("SLO", Absolute, 0x0F),
    ("SLO", AbsoluteX, 0x1F), ("SLO", AbsoluteY, 0x1B),
    ("SLO", IndexedIndirectX, 0x03), ("SLO", IndirectIndexedY, 0x13),
    ("RLA", ZeroPage, 0x27), ("RLA", ZeroPageX, 0x37), ("RLA", Absolute, 0x2F),
    ("RLA", AbsoluteX, 0x3F), ("RLA", AbsoluteY, 0x3B),
    ("RLA", IndexedIndirectX, 0x23), ("RLA", IndirectIndexedY, 0x33),
    ("SRE", ZeroPage, 0x47), ("SRE", ZeroPageX, 0x57), ("SRE", Absolute, 0x4F),
    ("SRE", AbsoluteX, 0x5F), ("SRE", AbsoluteY, 0x5B),
    ("SRE", IndexedIndirectX, 0x43), ("SRE", IndirectIndexedY, 0x53),
    ("RRA", ZeroPage, 0x67), ("RRA", ZeroPageX, 0x77), ("RRA", Absolute, 0x6F),
    ("RRA", AbsoluteX, 0x7F), ("RRA", AbsoluteY, 0x7B),
    ("RRA", IndexedIndirectX, 0x63), ("RRA", IndirectIndexedY, 0x73),
    ("SAX", ZeroPage, 0x87), ("SAX", ZeroPageY, 0x97), ("SAX", Absolute, 0x8F),
    ("SAX", IndexedIndirectX, 0x83),
    ("LAX", ZeroPage, 0xA7), ("LAX", ZeroPageY, 0xB7), ("LAX", Absolute, 0xAF),
    ("LAX", AbsoluteY, 0xBF),
    ("LAX", IndexedIndirectX, 0xA3), ("LAX", IndirectIndexedY, 0xB3),
    ("DCP", ZeroPage, 0xC7), ("DCP", ZeroPageX, 0xD7), ("DCP", Absolute, 0xCF),
    ("DCP", AbsoluteX, 0xDF), ("DCP", AbsoluteY, 0xDB),
    ("DCP", IndexedIndirectX, 0xC3), ("DCP", IndirectIndexedY, 0xD3),
    ("ISC", ZeroPage, 0xE7), ("ISC", ZeroPageX, 0xF7), ("ISC", Absolute, 0xEF),
    ("ISC", AbsoluteX, 0xFF), ("ISC", AbsoluteY, 0xFB),
    ("ISC", IndexedIndirectX, 0xE3), ("ISC", IndirectIndexedY, 0xF3),
    ("ANC", Immediate, 0x0B), ("ALR", Immediate, 0x4B), ("ARR", Immediate, 0x6B),
    ("AXS", Immediate, 0xCB),
    ("LAS", AbsoluteY, 0xBB), ("TAS", AbsoluteY, 0x9B),
    ("SHA", AbsoluteY, 0x9F), ("SHA", IndirectIndexedY, 0x93),
    ("SHX", AbsoluteY, 0x9E), ("SHY", AbsoluteX, 0x9C),
];

/// 65C02 extensions: new instructions plus new modes for base mnemonics.
static C02_TABLE: &[Row] = &[
    ("BRA", Relative, 0x80),
    ("DEC", Accumulator, 0x3A), ("INC", Accumulator, 0x1A),
    ("PHX", Implied, 0xDA), ("PHY", Implied, 0x5A),
    ("PLX", Implied, 0xFA), ("PLY", Implied, 0x7A),
    ("STP", Implied, 0xDB), ("WAI", Implied, 0xCB),
    ("STZ", ZeroPage, 0x64), ("STZ", ZeroPageX, 0x74),
    ("STZ", Absolute, 0x9C), ("STZ", AbsoluteX, 0x9E),
    ("TRB", ZeroPage, 0x14), ("TRB", Absolute, 0x1C),
    ("TSB", ZeroPage, 0x04), ("TSB", Absolute, 0x0C),
    ("BIT", Immediate, 0x89), ("BIT", ZeroPageX, 0x34), ("BIT", AbsoluteX, 0x3C),
    ("JMP", AbsoluteIndexedIndirect, 0x7C),
    ("ADC", ZeroPageIndirect, 0x72), ("AND", ZeroPageIndirect, 0x32),
    ("CMP", ZeroPageIndirect, 0xD2), ("EOR", ZeroPageIndirect, 0x52),
    ("LDA", ZeroPageIndirect, 0xB2), ("ORA", ZeroPageIndirect, 0x12),
    ("SBC", ZeroPageIndirect, 0xF2), ("STA", ZeroPageIndirect, 0x92),
    ("RMB0", ZeroPage, 0x07), ("RMB1", ZeroPage, 0x17), ("RMB2", ZeroPage, 0x27),
    ("RMB3", ZeroPage, 0x37), ("RMB4", ZeroPage, 0x47), ("RMB5", ZeroPage, 0x57),
    ("RMB6", ZeroPage, 0x67), ("RMB7", ZeroPage, 0x77),
    ("SMB0", ZeroPage, 0x87), ("SMB1", ZeroPage, 0x97), ("SMB2", ZeroPage, 0xA7),
    ("SMB3", ZeroPage, 0xB7), ("SMB4", ZeroPage, 0xC7), ("SMB5", ZeroPage, 0xD7),
    ("SMB6", ZeroPage, 0xE7), ("SMB7", ZeroPage, 0xF7),
];

/// Conditional branches and their inversions, for the long-branch idiom.
static BRANCH_INVERSES: &[(&str, &str)] = &[
    ("BCC", "BCS"),
    ("BCS", "BCC"),
    ("BEQ", "BNE"),
    ("BNE", "BEQ"),
    ("BMI", "BPL"),
    ("BPL", "BMI"),
    ("BVC", "BVS"),
    ("BVS", "BVC"),
];

/// Inverse of a conditional branch mnemonic, if it has one.
/// BRA has no inverse; its long form is a plain JMP.
pub fn inverse_branch(mnemonic: &str) -> Option<&'static str> {
    let upper = mnemonic.to_ascii_uppercase();
    BRANCH_INVERSES
        .iter()
        .find(|(m, _)| *m == upper)
        .map(|(_, inv)| *inv)
}

/// Which extension tables to merge into the base set.
#[derive(Debug, Clone, Copy, Default)]
pub struct Extensions {
    pub undocumented: bool,
    pub c02: bool,
}

/// Immutable merged opcode table, built once before the pipeline runs.
///
/// Keyed by (mnemonic, mode); the extensions are disjoint from each other
/// under that key, and a later merge wins on any overlap.
pub struct OpcodeTable {
    entries: HashMap<(String, AddressMode), u8>,
}

impl OpcodeTable {
    #[must_use]
    pub fn base() -> Self {
        Self::with_extensions(Extensions::default())
    }

    #[must_use]
    pub fn with_extensions(ext: Extensions) -> Self {
        let mut entries = HashMap::new();
        let mut merge = |rows: &[Row]| {
            for (mnemonic, mode, opcode) in rows {
                entries.insert((mnemonic.to_string(), *mode), *opcode);
            }
        };
        merge(BASE_TABLE);
        if ext.undocumented {
            merge(UNDOC_TABLE);
        }
        if ext.c02 {
            merge(C02_TABLE);
        }
        Self { entries }
    }

    /// Encoding byte for (mnemonic, mode), if the combination is legal.
    #[must_use]
    pub fn opcode(&self, mnemonic: &str, mode: AddressMode) -> Option<u8> {
        self.entries
            .get(&(mnemonic.to_ascii_uppercase(), mode))
            .copied()
    }

    #[must_use]
    pub fn supports(&self, mnemonic: &str, mode: AddressMode) -> bool {
        self.opcode(mnemonic, mode).is_some()
    }

    /// Check if a mnemonic exists in the table under any mode.
    #[must_use]
    pub fn has_mnemonic(&self, mnemonic: &str) -> bool {
        let upper = mnemonic.to_ascii_uppercase();
        self.entries.keys().any(|(m, _)| *m == upper)
    }

    /// True if the mnemonic encodes with a relative branch operand.
    #[must_use]
    pub fn is_branch(&self, mnemonic: &str) -> bool {
        self.supports(mnemonic, AddressMode::Relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_lookups() {
        let table = OpcodeTable::base();
        assert_eq!(table.opcode("LDA", Immediate), Some(0xA9));
        assert_eq!(table.opcode("lda", Immediate), Some(0xA9));
        assert_eq!(table.opcode("JMP", Indirect), Some(0x6C));
        assert_eq!(table.opcode("JMP", ZeroPage), None);
        assert!(!table.has_mnemonic("XXX"));
    }

    #[test]
    fn extensions_are_gated() {
        let base = OpcodeTable::base();
        assert!(!base.has_mnemonic("LAX"));
        assert!(!base.has_mnemonic("BRA"));

        let undoc = OpcodeTable::with_extensions(Extensions {
            undocumented: true,
            c02: false,
        });
        assert_eq!(undoc.opcode("LAX", ZeroPage), Some(0xA7));
        assert!(!undoc.has_mnemonic("BRA"));

        let c02 = OpcodeTable::with_extensions(Extensions {
            undocumented: false,
            c02: true,
        });
        assert_eq!(c02.opcode("BRA", Relative), Some(0x80));
        assert_eq!(c02.opcode("STA", ZeroPageIndirect), Some(0x92));
        assert!(!c02.has_mnemonic("LAX"));
    }

    #[test]
    fn both_extensions_compose() {
        let table = OpcodeTable::with_extensions(Extensions {
            undocumented: true,
            c02: true,
        });
        assert_eq!(table.opcode("LAX", ZeroPage), Some(0xA7));
        assert_eq!(table.opcode("BRA", Relative), Some(0x80));
        assert_eq!(table.opcode("LDA", Immediate), Some(0xA9));
    }

    #[test]
    fn branch_classification() {
        let table = OpcodeTable::with_extensions(Extensions {
            undocumented: false,
            c02: true,
        });
        assert!(table.is_branch("BEQ"));
        assert!(table.is_branch("BRA"));
        assert!(!table.is_branch("JMP"));
        assert_eq!(inverse_branch("BEQ"), Some("BNE"));
        assert_eq!(inverse_branch("bcc"), Some("BCS"));
        assert_eq!(inverse_branch("BRA"), None);
    }

    #[test]
    fn mode_sizes() {
        assert_eq!(Implied.encoded_size(), 1);
        assert_eq!(Immediate.encoded_size(), 2);
        assert_eq!(Relative.encoded_size(), 2);
        assert_eq!(Absolute.encoded_size(), 3);
    }
}
