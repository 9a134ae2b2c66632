// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Assembly pipeline: parse, expand, resolve, select encodings, emit.
//!
//! Pass order matters. Macros expand before anything looks at labels, so
//! label passes see only plain nodes. Label initialization runs to a
//! fixpoint so aliases may reference later labels. Instruction selection
//! interleaves relayout with collapsing and branch extension until a
//! round moves nothing.

use crate::codegen;
use crate::env::Environment;
use crate::error::{AsmError, AsmErrorKind, AsmRunError, ErrorSink};
use crate::frontend;
use crate::opcodes::{Extensions, OpcodeTable};
use crate::passes::{
    run_fixpoint, BindOpcodes, CheckExprs, CircularityCheck, Collapse, DefineMacros,
    EasyModes, ExpandMacros, ExtendBranches, InitLabels, NormalizeModes, Pass,
    UpdateLabels,
};

/// Knobs for one assembly run.
#[derive(Debug, Clone, Copy)]
pub struct Options {
    pub extensions: Extensions,
    /// 0 quiet, 1 normal, 2 stage announcements, 3 round stats,
    /// 4 symbol dump.
    pub verbose: u8,
    /// Iteration cap shared by every fixpoint.
    pub cap: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            extensions: Extensions::default(),
            verbose: 1,
            cap: 64,
        }
    }
}

/// Result of a successful run.
#[derive(Debug)]
pub struct Assembly {
    pub image: Vec<u8>,
    /// Rounds the instruction-selection fixpoint took.
    pub selection_rounds: usize,
    pub symbols: Environment,
}

fn stage(opts: &Options, name: &str) {
    if opts.verbose >= 2 {
        eprintln!("{name}...");
    }
}

/// Assemble source text into a raw image.
pub fn assemble(source: &str, opts: &Options) -> Result<Assembly, AsmRunError> {
    let mut sink = ErrorSink::new();
    let table = OpcodeTable::with_extensions(opts.extensions);

    stage(opts, "Parsing");
    let mut prog = frontend::parse_source(source, &mut sink);
    let mut env = Environment::new();

    stage(opts, "Defining macros");
    let _ = DefineMacros.run(&mut prog, &mut env, &mut sink);

    stage(opts, "Expanding macros");
    let mut expand = ExpandMacros::default();
    if let Err(err) = run_fixpoint(
        "macro expansion",
        &mut [&mut expand],
        &|s| s.changed == 0,
        opts.cap,
        &mut prog,
        &mut env,
        &mut sink,
        opts.verbose,
    ) {
        // Expansion that never settles means a macro invokes itself.
        let err = match err.kind() {
            AsmErrorKind::NonConvergence => AsmError::new(
                AsmErrorKind::MacroRecursion,
                "Recursive macro expansion",
                None,
            ),
            _ => err,
        };
        return Err(AsmRunError::from_sink(err, sink));
    }

    stage(opts, "Binding opcodes");
    let _ = BindOpcodes { table: &table }.run(&mut prog, &mut env, &mut sink);

    stage(opts, "Initializing labels");
    let mut init = InitLabels::default();
    if let Err(err) = run_fixpoint(
        "label initialization",
        &mut [&mut init],
        &|s| s.changed == 0,
        opts.cap,
        &mut prog,
        &mut env,
        &mut sink,
        opts.verbose,
    ) {
        return Err(AsmRunError::from_sink(err, sink));
    }

    stage(opts, "Checking expressions");
    let _ = CircularityCheck.run(&mut prog, &mut env, &mut sink);
    let _ = CheckExprs.run(&mut prog, &mut env, &mut sink);
    let _ = EasyModes.run(&mut prog, &mut env, &mut sink);

    stage(opts, "Selecting instructions");
    let mut update = UpdateLabels;
    let mut collapse = Collapse;
    let mut extend = ExtendBranches;
    // Label quiescence is part of the stop condition: a collapse moves a
    // chained alias only one link per walk, so rounds must continue until
    // the relayout itself stops changing bindings.
    let selection_rounds = match run_fixpoint(
        "instruction selection",
        &mut [&mut update, &mut collapse, &mut extend],
        &|s| s.changed == 0 && s.collapsed == 0 && s.expanded == 0,
        opts.cap,
        &mut prog,
        &mut env,
        &mut sink,
        opts.verbose,
    ) {
        Ok(rounds) => rounds,
        Err(err) => return Err(AsmRunError::from_sink(err, sink)),
    };

    let _ = NormalizeModes.run(&mut prog, &mut env, &mut sink);
    if let Err(err) = run_fixpoint(
        "final label update",
        &mut [&mut update],
        &|s| s.changed == 0,
        opts.cap,
        &mut prog,
        &mut env,
        &mut sink,
        opts.verbose,
    ) {
        return Err(AsmRunError::from_sink(err, sink));
    }

    if !sink.is_empty() {
        return Err(failed(sink));
    }

    stage(opts, "Generating code");
    let image = codegen::generate(&prog, &env, &table, &mut sink);
    if !sink.is_empty() {
        return Err(failed(sink));
    }

    if opts.verbose >= 4 {
        let mut out = Vec::new();
        if env.dump(&mut out).is_ok() {
            eprint!("{}", String::from_utf8_lossy(&out));
        }
    }

    Ok(Assembly {
        image,
        selection_rounds,
        symbols: env,
    })
}

fn failed(sink: ErrorSink) -> AsmRunError {
    let count = sink.count();
    let summary = AsmError::new(
        sink.diagnostics()[0].error().kind(),
        &format!("Assembly failed with {count} error(s)"),
        None,
    );
    AsmRunError::from_sink(summary, sink)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(src: &str) -> Assembly {
        assemble(src, &Options { verbose: 0, ..Options::default() })
            .expect("assembly succeeds")
    }

    fn fail(src: &str) -> AsmRunError {
        assemble(src, &Options { verbose: 0, ..Options::default() })
            .expect_err("assembly fails")
    }

    #[test]
    fn absolute_only_program_converges_in_one_round() {
        let asm = ok(".org $0600\nlda $1234\nsta $1235\nrts\n");
        assert_eq!(asm.selection_rounds, 1);
        assert_eq!(
            asm.image,
            vec![0xad, 0x34, 0x12, 0x8d, 0x35, 0x12, 0x60]
        );
    }

    #[test]
    fn zero_page_operand_collapses() {
        let asm = ok(".alias ptr $10\nlda ptr\n");
        assert_eq!(asm.image, vec![0xa5, 0x10]);
    }

    #[test]
    fn undefined_symbol_yields_no_output() {
        let err = fail("lda missing\n");
        assert_eq!(err.diagnostics().len(), 1);
        assert_eq!(
            err.diagnostics()[0].error().kind(),
            AsmErrorKind::UndefinedSymbol
        );
    }

    #[test]
    fn recursive_macro_is_reported_as_such() {
        let err = fail(".macro m\n`m\n.macend\n`m\n");
        assert_eq!(err.error().kind(), AsmErrorKind::MacroRecursion);
    }

    #[test]
    fn unknown_mnemonic_is_a_diagnostic() {
        let err = fail("lax $10\n");
        assert_eq!(
            err.diagnostics()[0].error().kind(),
            AsmErrorKind::UnknownOpcode
        );
    }

    #[test]
    fn undocumented_opcodes_need_the_extension() {
        let opts = Options {
            extensions: Extensions {
                undocumented: true,
                c02: false,
            },
            verbose: 0,
            ..Options::default()
        };
        let asm = assemble("lax $10\n", &opts).expect("assembly succeeds");
        assert_eq!(asm.image, vec![0xa7, 0x10]);
    }
}
