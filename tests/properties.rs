// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// Property checks over the resolution pipeline.

use proptest::prelude::*;

use asm6502::pipeline::{assemble, Options};

fn quiet() -> Options {
    Options {
        verbose: 0,
        ..Options::default()
    }
}

proptest! {
    #[test]
    fn byte_data_round_trips(values in proptest::collection::vec(0u8..=255, 1..64)) {
        let items: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        let src = format!(".byte {}\n", items.join(", "));
        let asm = assemble(&src, &quiet()).expect("assembly succeeds");
        prop_assert_eq!(asm.image, values);
    }

    #[test]
    fn word_data_is_little_endian(values in proptest::collection::vec(0u16..=0xffff, 1..32)) {
        let items: Vec<String> = values.iter().map(|v| format!("${v:04x}")).collect();
        let src = format!(".word {}\n", items.join(", "));
        let asm = assemble(&src, &quiet()).expect("assembly succeeds");
        let expected: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        prop_assert_eq!(asm.image, expected);
    }

    // A branch over a run of NOPs stays short up to the relative range
    // and is rewritten to the 5-byte long form past it; the image length
    // follows directly from which form was chosen.
    #[test]
    fn branch_form_matches_distance(gap in 0usize..=200) {
        let mut src = String::from("bne far\n");
        for _ in 0..gap {
            src.push_str("nop\n");
        }
        src.push_str("far: rts\n");
        let asm = assemble(&src, &quiet()).expect("assembly succeeds");

        // Short form: target = 2 + gap, offset = gap.
        if gap <= 127 {
            prop_assert_eq!(asm.image[0], 0xd0);
            prop_assert_eq!(asm.image[1], gap as u8);
            prop_assert_eq!(asm.image.len(), 2 + gap + 1);
        } else {
            // BEQ +3 ; JMP target
            let target = 5 + gap;
            prop_assert_eq!(asm.image[0], 0xf0);
            prop_assert_eq!(asm.image[1], 0x03);
            prop_assert_eq!(asm.image[2], 0x4c);
            prop_assert_eq!(asm.image[3], (target & 0xff) as u8);
            prop_assert_eq!(asm.image[4], (target >> 8) as u8);
            prop_assert_eq!(asm.image.len(), 5 + gap + 1);
        }
    }

    // Straight-line code with no symbolic operands settles immediately.
    #[test]
    fn fixed_size_code_converges_in_one_round(count in 1usize..=40) {
        let mut src = String::new();
        for _ in 0..count {
            src.push_str("lda #1\nsta $1234\n");
        }
        let asm = assemble(&src, &quiet()).expect("assembly succeeds");
        prop_assert_eq!(asm.selection_rounds, 1);
        prop_assert_eq!(asm.image.len(), count * 5);
    }

    #[test]
    fn assembly_is_a_function_of_the_source(gap in 0usize..=150) {
        let mut src = String::from("start: beq far\n");
        for _ in 0..gap {
            src.push_str("nop\n");
        }
        src.push_str("far: bne start\n");
        let first = assemble(&src, &quiet()).expect("assembly succeeds");
        let second = assemble(&src, &quiet()).expect("assembly succeeds");
        prop_assert_eq!(first.image, second.image);
    }
}
