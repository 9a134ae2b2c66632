// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// CLI entrypoint for asm6502.

fn main() {
    if let Err(err) = asm6502::cli::run() {
        for diag in err.diagnostics() {
            eprintln!("{}", diag.format(None));
        }
        eprintln!("{err}");
        std::process::exit(1);
    }
}
