// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// End-to-end assembly runs through the public pipeline API.

use asm6502::error::{AsmErrorKind, AsmRunError};
use asm6502::opcodes::Extensions;
use asm6502::pipeline::{assemble, Assembly, Options};

fn quiet() -> Options {
    Options {
        verbose: 0,
        ..Options::default()
    }
}

fn with_extensions(undocumented: bool, c02: bool) -> Options {
    Options {
        extensions: Extensions { undocumented, c02 },
        verbose: 0,
        ..Options::default()
    }
}

fn ok(src: &str) -> Assembly {
    assemble(src, &quiet()).expect("assembly succeeds")
}

fn fail(src: &str) -> AsmRunError {
    assemble(src, &quiet()).expect_err("assembly fails")
}

fn first_kind(err: &AsmRunError) -> AsmErrorKind {
    err.diagnostics()[0].error().kind()
}

#[test]
fn hello_loop_assembles() {
    let asm = ok(concat!(
        ".org $0600\n",
        ".alias screen $0200\n",
        "    ldx #0\n",
        "loop:\n",
        "    lda message,x\n",
        "    beq done\n",
        "    sta screen,x\n",
        "    inx\n",
        "    bne loop\n",
        "done:\n",
        "    rts\n",
        "message: .byte \"HI\", 0\n",
    ));
    assert_eq!(
        asm.image,
        vec![
            0xa2, 0x00, // LDX #0
            0xbd, 0x0e, 0x06, // LDA $060E,X (message)
            0xf0, 0x06, // BEQ done
            0x9d, 0x00, 0x02, // STA $0200,X
            0xe8, // INX
            0xd0, 0xf5, // BNE loop
            0x60, // RTS
            b'H', b'I', 0x00,
        ]
    );
    assert_eq!(asm.symbols.get("screen"), Some(0x0200));
    assert_eq!(asm.symbols.get("loop"), Some(0x0602));
}

#[test]
fn absolute_only_source_needs_one_selection_round() {
    let asm = ok(".org $0600\nlda $1234\nsta $1235\njmp $0600\n");
    assert_eq!(asm.selection_rounds, 1);
}

#[test]
fn forward_zero_page_reference_collapses() {
    // target sits below $100, so the operand shrinks to zero page even
    // though the label is only resolved provisionally at first.
    let asm = ok("lda target\nrts\ntarget: .byte 7\n");
    assert_eq!(asm.image, vec![0xa5, 0x03, 0x60, 0x07]);
}

#[test]
fn collapse_shrinks_following_addresses() {
    // The first operand collapsing pulls every later label down with it.
    let asm = ok(".alias ptr $20\nlda ptr\nafter: .word after\n");
    assert_eq!(asm.image, vec![0xa5, 0x20, 0x02, 0x00]);
}

#[test]
fn chained_aliases_follow_a_collapse() {
    // A collapse moves the label one alias link per relayout, so the
    // selection loop has to keep going until no binding changes.
    let asm = ok(concat!(
        ".alias ptr $10\n",
        ".alias a b+1\n",
        ".alias b c+1\n",
        "lda ptr\n",
        "c: nop\n",
        ".word a\n",
    ));
    assert_eq!(asm.symbols.get("c"), Some(2));
    assert_eq!(asm.symbols.get("b"), Some(3));
    assert_eq!(asm.symbols.get("a"), Some(4));
    assert_eq!(asm.image, vec![0xa5, 0x10, 0xea, 0x04, 0x00]);
}

#[test]
fn code_past_top_of_memory_is_rejected() {
    let err = fail(".org $fffe\nnop\nnop\nnop\n");
    assert_eq!(first_kind(&err), AsmErrorKind::OperandRange);
}

#[test]
fn near_branch_is_two_bytes() {
    let asm = ok("loop: dex\nbne loop\nrts\n");
    assert_eq!(asm.image, vec![0xca, 0xd0, 0xfd, 0x60]);
}

#[test]
fn far_branch_becomes_inverse_over_jmp() {
    let asm = ok("beq far\n.advance $200\nfar: rts\n");
    // BNE +3 ; JMP $0200 ; padding ; RTS
    assert_eq!(&asm.image[..5], &[0xd0, 0x03, 0x4c, 0x00, 0x02]);
    assert_eq!(asm.image.len(), 0x201);
    assert_eq!(asm.image[0x200], 0x60);
    assert!(asm.image[5..0x200].iter().all(|&b| b == 0));
}

#[test]
fn far_bra_becomes_plain_jmp() {
    let opts = with_extensions(false, true);
    let asm = assemble("bra far\n.advance $200\nfar: rts\n", &opts)
        .expect("assembly succeeds");
    assert_eq!(&asm.image[..3], &[0x4c, 0x00, 0x02]);
}

#[test]
fn org_does_not_pad_the_image() {
    let asm = ok(".byte 1\n.org $c000\n.byte 2\n");
    assert_eq!(asm.image, vec![1, 2]);
}

#[test]
fn advance_pads_and_rejects_going_backwards() {
    let asm = ok(".byte 1\n.advance 4\n.byte 2\n");
    assert_eq!(asm.image, vec![1, 0, 0, 0, 2]);

    let err = fail(".org $100\n.advance $80\n");
    assert_eq!(first_kind(&err), AsmErrorKind::OperandRange);
}

#[test]
fn word_data_is_little_endian() {
    let asm = ok(".word $1234, $5678\n");
    assert_eq!(asm.image, vec![0x34, 0x12, 0x78, 0x56]);
}

#[test]
fn here_tracks_the_current_address() {
    let asm = ok(".org $0600\n.word ^\njmp ^\n");
    assert_eq!(asm.image, vec![0x00, 0x06, 0x4c, 0x02, 0x06]);
}

#[test]
fn low_and_high_byte_operators() {
    let asm = ok(".alias target $1234\nlda #<target\nldx #>target\n");
    assert_eq!(asm.image, vec![0xa9, 0x34, 0xa2, 0x12]);
}

#[test]
fn macros_expand_with_private_labels() {
    let asm = ok(concat!(
        ".macro delay count\n",
        "    ldx #count\n",
        "spin: dex\n",
        "    bne spin\n",
        ".macend\n",
        "`delay 3\n",
        "`delay 5\n",
    ));
    assert_eq!(
        asm.image,
        vec![0xa2, 0x03, 0xca, 0xd0, 0xfd, 0xa2, 0x05, 0xca, 0xd0, 0xfd]
    );
}

#[test]
fn recursive_macro_is_a_recursion_error() {
    let err = fail(".macro m\nnop\n`m\n.macend\n`m\n");
    assert_eq!(err.error().kind(), AsmErrorKind::MacroRecursion);
}

#[test]
fn macro_argument_count_must_match() {
    let err = fail(".macro two a, b\n.byte a, b\n.macend\n`two 1\n");
    assert_eq!(first_kind(&err), AsmErrorKind::TypeMismatch);
}

#[test]
fn undefined_symbol_suppresses_output() {
    let err = fail("jmp nowhere\n");
    assert_eq!(first_kind(&err), AsmErrorKind::UndefinedSymbol);
}

#[test]
fn several_errors_are_reported_together() {
    let err = fail("lda one\nsta two\n");
    assert_eq!(err.diagnostics().len(), 2);
}

#[test]
fn duplicate_label_is_rejected() {
    let err = fail("a: nop\na: nop\n");
    assert_eq!(first_kind(&err), AsmErrorKind::DuplicateLabel);
}

#[test]
fn duplicate_macro_is_rejected() {
    let err = fail(".macro m\n.macend\n.macro m\n.macend\n");
    assert_eq!(first_kind(&err), AsmErrorKind::DuplicateMacro);
}

#[test]
fn circular_aliases_are_rejected() {
    let err = fail(".alias a b\n.alias b a\n");
    assert_eq!(first_kind(&err), AsmErrorKind::CircularDefinition);
}

#[test]
fn undocumented_opcodes_are_gated() {
    let err = fail("lax $10\n");
    assert_eq!(first_kind(&err), AsmErrorKind::UnknownOpcode);

    let asm = assemble("lax $10\n", &with_extensions(true, false))
        .expect("assembly succeeds");
    assert_eq!(asm.image, vec![0xa7, 0x10]);
}

#[test]
fn c02_opcodes_are_gated() {
    let err = fail("stz $10\n");
    assert_eq!(first_kind(&err), AsmErrorKind::UnknownOpcode);

    let asm = assemble("stz $10\nlda ($20)\n", &with_extensions(false, true))
        .expect("assembly succeeds");
    assert_eq!(asm.image, vec![0x64, 0x10, 0xb2, 0x20]);
}

#[test]
fn both_extensions_compose() {
    let asm = assemble("lax $10\nbra out\nout: stz $20\n", &with_extensions(true, true))
        .expect("assembly succeeds");
    assert_eq!(asm.image, vec![0xa7, 0x10, 0x80, 0x00, 0x64, 0x20]);
}

#[test]
fn immediate_out_of_range_is_reported() {
    let err = fail("lda #$1ff\n");
    assert_eq!(first_kind(&err), AsmErrorKind::OperandRange);
}

#[test]
fn assembly_is_deterministic() {
    let src = ".alias ptr $10\nstart: lda ptr\nbne start\n.byte \"end\"\n";
    let first = ok(src);
    let second = ok(src);
    assert_eq!(first.image, second.image);
    assert_eq!(first.selection_rounds, second.selection_rounds);
}
