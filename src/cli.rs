// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Command-line interface parsing and the top-level run entry.

use std::fs;
use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::error::{AsmError, AsmErrorKind, AsmRunError};
use crate::opcodes::Extensions;
use crate::pipeline::{self, Options};

pub const VERSION: &str = "1.0";

#[derive(Parser, Debug)]
#[command(
    name = "asm6502",
    version = VERSION,
    about = "6502-family cross-assembler with branch relaxation and basic macro support"
)]
pub struct Cli {
    /// Input assembly file.
    pub infile: PathBuf,
    /// Output binary image file.
    pub outfile: PathBuf,
    #[arg(
        long = "6510",
        action = ArgAction::SetTrue,
        long_help = "Enable the 6510 undocumented opcodes (SLO, LAX, DCP, ...)."
    )]
    pub undocumented: bool,
    #[arg(
        long = "65c02",
        action = ArgAction::SetTrue,
        long_help = "Enable the 65C02 extensions (BRA, STZ, PHX, zero-page indirect, ...). Composes with --6510."
    )]
    pub c02: bool,
    #[arg(
        short = 'v',
        long = "verbose",
        value_name = "N",
        default_value_t = 1,
        long_help = "Verbosity: 0 quiet, 1 normal, 2 pass stages, 3 fixpoint round stats, 4 symbol table dump."
    )]
    pub verbose: u8,
    #[arg(
        long = "fixpoint-cap",
        value_name = "N",
        default_value_t = 64,
        long_help = "Maximum rounds for each fixpoint stage. Defaults to 64."
    )]
    pub fixpoint_cap: usize,
}

impl Cli {
    pub fn options(&self) -> Options {
        Options {
            extensions: Extensions {
                undocumented: self.undocumented,
                c02: self.c02,
            },
            verbose: self.verbose,
            cap: self.fixpoint_cap,
        }
    }
}

fn usage_error(msg: &str, param: Option<&str>) -> AsmRunError {
    AsmRunError::new(AsmError::new(AsmErrorKind::Cli, msg, param), Vec::new())
}

/// Parse arguments, assemble the input, and write the image.
pub fn run() -> Result<(), AsmRunError> {
    let cli = Cli::parse();
    run_with(&cli)
}

pub fn run_with(cli: &Cli) -> Result<(), AsmRunError> {
    if cli.verbose > 4 {
        return Err(usage_error("-v/--verbose must be 0..=4", None));
    }
    if cli.fixpoint_cap == 0 {
        return Err(usage_error("--fixpoint-cap must be at least 1", None));
    }

    let source = fs::read_to_string(&cli.infile).map_err(|err| {
        usage_error(
            &format!("Unable to read input file: {err}"),
            Some(&cli.infile.to_string_lossy()),
        )
    })?;

    let opts = cli.options();
    let asm = pipeline::assemble(&source, &opts)?;

    fs::write(&cli.outfile, &asm.image).map_err(|err| {
        AsmRunError::new(
            AsmError::new(
                AsmErrorKind::IoWrite,
                &format!("Unable to write output file: {err}"),
                Some(&cli.outfile.to_string_lossy()),
            ),
            Vec::new(),
        )
    })?;

    if opts.verbose >= 1 {
        eprintln!(
            "{}: wrote {} bytes",
            cli.outfile.to_string_lossy(),
            asm.image.len()
        );
    }
    Ok(())
}
