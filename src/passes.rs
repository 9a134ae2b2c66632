// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Resolution passes and the fixpoint driver.
//!
//! Every pass reports a uniform [`PassStats`]; the driver's stop predicate
//! sees only that record. Collapse only ever shrinks a non-branch operand
//! and branch extension only ever grows a branch, and an extended branch is
//! never re-collapsed, so each instruction changes size a bounded number of
//! times and the instruction-selection fixpoint terminates.

use std::collections::{HashMap, HashSet};

use crate::env::Environment;
use crate::error::{AsmError, AsmErrorKind, ErrorSink};
use crate::expr::{eval, fits_byte, Expr};
use crate::ir::{MacroDef, Node, Program};
use crate::opcodes::OpcodeTable;

/// Uniform per-round result of a pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Symbol bindings or nodes changed this round.
    pub changed: u32,
    /// Operands collapsed to a zero-page encoding this round.
    pub collapsed: u32,
    /// Branches rewritten to the long form this round.
    pub expanded: u32,
}

impl PassStats {
    pub fn merge(&mut self, other: PassStats) {
        self.changed += other.changed;
        self.collapsed += other.collapsed;
        self.expanded += other.expanded;
    }
}

/// A transformation over the program and symbol environment.
pub trait Pass {
    fn name(&self) -> &'static str;

    fn run(
        &mut self,
        prog: &mut Program,
        env: &mut Environment,
        sink: &mut ErrorSink,
    ) -> PassStats;
}

/// Run `passes` repeatedly until `done` accepts a round's merged stats.
///
/// Iteration is capped; hitting the cap is a hard error rather than a
/// diagnostic, since it means the pass set itself failed to converge.
/// Returns the number of rounds run.
pub fn run_fixpoint(
    name: &str,
    passes: &mut [&mut dyn Pass],
    done: &dyn Fn(&PassStats) -> bool,
    cap: usize,
    prog: &mut Program,
    env: &mut Environment,
    sink: &mut ErrorSink,
    verbose: u8,
) -> Result<usize, AsmError> {
    for round in 1..=cap {
        let mut stats = PassStats::default();
        for pass in passes.iter_mut() {
            stats.merge(pass.run(prog, env, sink));
        }
        if verbose >= 3 {
            eprintln!(
                "{name}: round {round}: {} changed, {} collapsed, {} expanded",
                stats.changed, stats.collapsed, stats.expanded
            );
        }
        if done(&stats) {
            return Ok(round);
        }
    }
    Err(AsmError::new(
        AsmErrorKind::NonConvergence,
        "Fixpoint did not converge",
        Some(name),
    ))
}

/// Attach candidate encodings from the merged opcode table to every
/// instruction. Unencodable (mnemonic, shape) pairs become diagnostics.
pub struct BindOpcodes<'a> {
    pub table: &'a OpcodeTable,
}

impl Pass for BindOpcodes<'_> {
    fn name(&self) -> &'static str {
        "bind opcodes"
    }

    fn run(
        &mut self,
        prog: &mut Program,
        _env: &mut Environment,
        sink: &mut ErrorSink,
    ) -> PassStats {
        for node in &mut prog.nodes {
            if let Node::Instr(instr) = node {
                if !instr.bind(self.table) {
                    sink.record(
                        instr.span.line,
                        AsmErrorKind::UnknownOpcode,
                        "Unknown opcode or addressing mode",
                        Some(&instr.mnemonic),
                    );
                }
            }
        }
        PassStats::default()
    }
}

/// Move macro definitions out of the node stream into the program's
/// macro registry. Redefinition keeps the first definition.
#[derive(Default)]
pub struct DefineMacros;

impl Pass for DefineMacros {
    fn name(&self) -> &'static str {
        "define macros"
    }

    fn run(
        &mut self,
        prog: &mut Program,
        _env: &mut Environment,
        sink: &mut ErrorSink,
    ) -> PassStats {
        let mut kept = Vec::with_capacity(prog.nodes.len());
        for node in prog.nodes.drain(..) {
            match node {
                Node::MacroDef(def) => {
                    if prog.macros.contains_key(&def.name) {
                        sink.record(
                            def.span.line,
                            AsmErrorKind::DuplicateMacro,
                            "Macro already defined",
                            Some(&def.name),
                        );
                    } else {
                        prog.macros.insert(def.name.clone(), def);
                    }
                }
                other => kept.push(other),
            }
        }
        prog.nodes = kept;
        PassStats::default()
    }
}

/// Replace macro invocations with hygienic copies of their bodies.
///
/// Labels defined inside a body are renamed with a per-instance suffix
/// that user syntax cannot produce, so two expansions never collide and
/// body-local branches stay local. Nested invocations survive one level
/// per round; self-recursion therefore never converges and is caught by
/// the driver's iteration cap.
#[derive(Default)]
pub struct ExpandMacros {
    instances: u32,
}

impl ExpandMacros {
    fn instantiate(&mut self, def: &MacroDef, args: &[Expr]) -> Vec<Node> {
        self.instances += 1;
        let suffix = self.instances;

        let mut locals: HashSet<&str> = HashSet::new();
        for node in &def.body {
            match node {
                Node::Label { name, .. } | Node::Alias { name, .. } => {
                    locals.insert(name);
                }
                _ => {}
            }
        }

        let rename = |name: &str| format!("{name}@{suffix}");
        let subst = |name: &str| -> Option<Expr> {
            if let Some(pos) = def.params.iter().position(|p| p == name) {
                return Some(args[pos].clone());
            }
            if locals.contains(name) {
                // Span of the original body reference is kept by the caller.
                return Some(Expr::Symbol(rename(name), crate::expr::Span::default()));
            }
            None
        };

        def.body
            .iter()
            .map(|node| match node {
                Node::Label { name, span } => Node::Label {
                    name: rename(name),
                    span: *span,
                },
                Node::Alias { name, expr, span } => Node::Alias {
                    name: rename(name),
                    expr: expr.substitute(&subst),
                    span: *span,
                },
                Node::Instr(instr) => {
                    let mut instr = instr.clone();
                    instr.shape = match &instr.shape {
                        crate::ir::OperandShape::None => crate::ir::OperandShape::None,
                        crate::ir::OperandShape::Accumulator => {
                            crate::ir::OperandShape::Accumulator
                        }
                        crate::ir::OperandShape::Immediate(e) => {
                            crate::ir::OperandShape::Immediate(e.substitute(&subst))
                        }
                        crate::ir::OperandShape::Direct(e) => {
                            crate::ir::OperandShape::Direct(e.substitute(&subst))
                        }
                        crate::ir::OperandShape::DirectX(e) => {
                            crate::ir::OperandShape::DirectX(e.substitute(&subst))
                        }
                        crate::ir::OperandShape::DirectY(e) => {
                            crate::ir::OperandShape::DirectY(e.substitute(&subst))
                        }
                        crate::ir::OperandShape::Indirect(e) => {
                            crate::ir::OperandShape::Indirect(e.substitute(&subst))
                        }
                        crate::ir::OperandShape::IndirectX(e) => {
                            crate::ir::OperandShape::IndirectX(e.substitute(&subst))
                        }
                        crate::ir::OperandShape::IndirectY(e) => {
                            crate::ir::OperandShape::IndirectY(e.substitute(&subst))
                        }
                    };
                    Node::Instr(instr)
                }
                Node::MacroInvoke { name, args, span } => Node::MacroInvoke {
                    name: name.clone(),
                    args: args.iter().map(|a| a.substitute(&subst)).collect(),
                    span: *span,
                },
                Node::Org { expr, span } => Node::Org {
                    expr: expr.substitute(&subst),
                    span: *span,
                },
                Node::Advance { expr, pad, span } => Node::Advance {
                    expr: expr.substitute(&subst),
                    pad: *pad,
                    span: *span,
                },
                Node::Data { width, exprs, span } => Node::Data {
                    width: *width,
                    exprs: exprs.iter().map(|e| e.substitute(&subst)).collect(),
                    span: *span,
                },
                Node::MacroDef(def) => Node::MacroDef(def.clone()),
            })
            .collect()
    }
}

impl Pass for ExpandMacros {
    fn name(&self) -> &'static str {
        "macro expansion"
    }

    fn run(
        &mut self,
        prog: &mut Program,
        _env: &mut Environment,
        sink: &mut ErrorSink,
    ) -> PassStats {
        let mut stats = PassStats::default();
        let mut out = Vec::with_capacity(prog.nodes.len());
        for node in std::mem::take(&mut prog.nodes) {
            let Node::MacroInvoke { name, args, span } = node else {
                out.push(node);
                continue;
            };
            let Some(def) = prog.macros.get(&name) else {
                sink.record(
                    span.line,
                    AsmErrorKind::UndefinedSymbol,
                    "Undefined macro",
                    Some(&name),
                );
                continue;
            };
            if args.len() != def.params.len() {
                sink.record(
                    span.line,
                    AsmErrorKind::TypeMismatch,
                    "Macro argument count mismatch",
                    Some(&name),
                );
                continue;
            }
            let def = def.clone();
            out.extend(self.instantiate(&def, &args));
            stats.changed += 1;
        }
        prog.nodes = out;
        stats
    }
}

/// Assign addresses to every node and bind label and alias values.
///
/// One walk serves both the initialization fixpoint and the per-round
/// relayout inside instruction selection; only duplicate reporting
/// differs, and only the first initialization round reports them.
fn layout(
    prog: &mut Program,
    env: &mut Environment,
    sink: &mut ErrorSink,
    report_duplicates: bool,
) {
    let mut seen: HashSet<String> = HashSet::new();
    let mut pc: i64 = 0;

    for node in &mut prog.nodes {
        match node {
            Node::Label { name, span } => {
                // First definition wins on every walk, so a duplicate
                // cannot keep flapping a binding between two addresses.
                if !seen.insert(name.clone()) {
                    if report_duplicates {
                        sink.record(
                            span.line,
                            AsmErrorKind::DuplicateLabel,
                            "Label already defined",
                            Some(name),
                        );
                    }
                    continue;
                }
                env.update(name, pc);
            }
            Node::Alias { name, expr, span } => {
                if !seen.insert(name.clone()) {
                    if report_duplicates {
                        sink.record(
                            span.line,
                            AsmErrorKind::DuplicateLabel,
                            "Label already defined",
                            Some(name),
                        );
                    }
                    continue;
                }
                let value = {
                    let ctx = env.eval_ctx(Some(pc));
                    eval(expr, &ctx).ok()
                };
                if let Some(value) = value {
                    env.update(name, value);
                }
            }
            Node::Org { expr, .. } => {
                let value = {
                    let ctx = env.eval_ctx(Some(pc));
                    eval(expr, &ctx).ok()
                };
                if let Some(value) = value {
                    pc = value;
                }
            }
            Node::Advance { expr, pad, .. } => {
                let value = {
                    let ctx = env.eval_ctx(Some(pc));
                    eval(expr, &ctx).ok()
                };
                // Backward or oversized advance is reported at emission.
                *pad = match value {
                    Some(target) if target >= pc && target - pc <= 0xffff => {
                        (target - pc) as u16
                    }
                    _ => 0,
                };
                pc += i64::from(*pad);
            }
            Node::Instr(instr) => {
                instr.addr = pc as u16;
                pc += i64::from(instr.current_size());
            }
            other => pc += i64::from(other.size()),
        }
    }
}

/// First binding of labels and aliases, run to a fixpoint so aliases may
/// reference labels defined later in the file.
#[derive(Default)]
pub struct InitLabels {
    rounds: u32,
}

impl Pass for InitLabels {
    fn name(&self) -> &'static str {
        "label initialization"
    }

    fn run(
        &mut self,
        prog: &mut Program,
        env: &mut Environment,
        sink: &mut ErrorSink,
    ) -> PassStats {
        self.rounds += 1;
        env.reset_changed();
        layout(prog, env, sink, self.rounds == 1);
        PassStats {
            changed: env.changed(),
            ..PassStats::default()
        }
    }
}

/// Recompute addresses and symbol values after encoding sizes moved.
#[derive(Default)]
pub struct UpdateLabels;

impl Pass for UpdateLabels {
    fn name(&self) -> &'static str {
        "update labels"
    }

    fn run(
        &mut self,
        prog: &mut Program,
        env: &mut Environment,
        sink: &mut ErrorSink,
    ) -> PassStats {
        env.reset_changed();
        layout(prog, env, sink, false);
        PassStats {
            changed: env.changed(),
            ..PassStats::default()
        }
    }
}

/// Reject alias definitions that depend on themselves through other
/// aliases. Runs once, after label initialization.
#[derive(Default)]
pub struct CircularityCheck;

impl Pass for CircularityCheck {
    fn name(&self) -> &'static str {
        "circularity check"
    }

    fn run(
        &mut self,
        prog: &mut Program,
        _env: &mut Environment,
        sink: &mut ErrorSink,
    ) -> PassStats {
        let mut deps: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut lines: HashMap<&str, u32> = HashMap::new();
        for node in &prog.nodes {
            if let Node::Alias { name, expr, span } = node {
                let mut syms = Vec::new();
                expr.symbols(&mut syms);
                deps.insert(name, syms);
                lines.insert(name, span.line);
            }
        }

        let mut on_cycle: HashSet<&str> = HashSet::new();
        for &start in deps.keys() {
            if on_cycle.contains(start) {
                continue;
            }
            // DFS from each alias; reaching the start again is a cycle.
            let mut stack = vec![start];
            let mut visited: HashSet<&str> = HashSet::new();
            while let Some(name) = stack.pop() {
                let Some(next) = deps.get(name) else { continue };
                for &dep in next {
                    if dep == start {
                        on_cycle.insert(start);
                        stack.clear();
                        break;
                    }
                    if visited.insert(dep) {
                        stack.push(dep);
                    }
                }
            }
        }

        let mut names: Vec<&str> = on_cycle.into_iter().collect();
        names.sort_unstable();
        for name in names {
            sink.record(
                lines[name],
                AsmErrorKind::CircularDefinition,
                "Circular alias definition",
                Some(name),
            );
        }
        PassStats::default()
    }
}

/// Evaluate every operand expression once so undefined symbols and type
/// errors surface as diagnostics before instruction selection begins.
#[derive(Default)]
pub struct CheckExprs;

impl CheckExprs {
    fn check(
        expr: &Expr,
        pc: i64,
        env: &Environment,
        sink: &mut ErrorSink,
        line: u32,
    ) {
        let ctx = env.eval_ctx(Some(pc));
        if let Err(err) = eval(expr, &ctx) {
            sink.record(line, err.kind, &err.message, err.param.as_deref());
        }
    }
}

impl Pass for CheckExprs {
    fn name(&self) -> &'static str {
        "expression check"
    }

    fn run(
        &mut self,
        prog: &mut Program,
        env: &mut Environment,
        sink: &mut ErrorSink,
    ) -> PassStats {
        let mut pc: i64 = 0;
        for node in &mut prog.nodes {
            let line = node.span().line;
            match node {
                Node::Instr(instr) => {
                    pc = i64::from(instr.addr);
                    if let Some(expr) = instr.shape.expr() {
                        Self::check(expr, pc, env, sink, line);
                    }
                    pc += i64::from(instr.current_size());
                }
                Node::Org { expr, .. }
                | Node::Advance { expr, .. }
                | Node::Alias { expr, .. } => {
                    Self::check(expr, pc, env, sink, line);
                }
                Node::Data { width, exprs, .. } => {
                    for expr in exprs.iter() {
                        // Multi-byte strings are data, not arithmetic.
                        if matches!(
                            (expr, *width),
                            (Expr::Str(..), crate::ir::DataWidth::Byte)
                        ) {
                            continue;
                        }
                        Self::check(expr, pc, env, sink, line);
                    }
                }
                _ => {}
            }
        }
        PassStats::default()
    }
}

/// Commit every instruction whose mode needs no deliberation: a single
/// legal candidate leaves nothing for Collapse or extension to decide.
#[derive(Default)]
pub struct EasyModes;

impl Pass for EasyModes {
    fn name(&self) -> &'static str {
        "easy modes"
    }

    fn run(
        &mut self,
        prog: &mut Program,
        _env: &mut Environment,
        _sink: &mut ErrorSink,
    ) -> PassStats {
        for node in &mut prog.nodes {
            if let Node::Instr(instr) = node {
                if instr.candidates.len() == 1 && !instr.is_relative() {
                    instr.committed = true;
                }
            }
        }
        PassStats::default()
    }
}

/// Shrink uncommitted operands to the zero-page encoding when the value
/// provably fits in a byte under current symbol bindings.
#[derive(Default)]
pub struct Collapse;

impl Pass for Collapse {
    fn name(&self) -> &'static str {
        "collapse"
    }

    fn run(
        &mut self,
        prog: &mut Program,
        env: &mut Environment,
        _sink: &mut ErrorSink,
    ) -> PassStats {
        let mut stats = PassStats::default();
        for node in &mut prog.nodes {
            let Node::Instr(instr) = node else { continue };
            if instr.committed || instr.extended || instr.is_relative() {
                continue;
            }
            let Some(&smallest) = instr.candidates.first() else {
                continue;
            };
            if instr.selected == smallest {
                continue;
            }
            let Some(expr) = instr.shape.expr() else { continue };
            let ctx = env.eval_ctx(Some(i64::from(instr.addr)));
            if let Ok(value) = eval(expr, &ctx) {
                if fits_byte(value) {
                    instr.selected = smallest;
                    instr.size = smallest.encoded_size();
                    stats.collapsed += 1;
                }
            }
        }
        stats
    }
}

/// Rewrite relative branches whose target is out of reach as the long
/// form: an inverted branch over a JMP, or a plain JMP for branch-always.
/// The rewrite is never undone, so shrinking elsewhere cannot oscillate
/// a borderline branch.
#[derive(Default)]
pub struct ExtendBranches;

impl Pass for ExtendBranches {
    fn name(&self) -> &'static str {
        "extend branches"
    }

    fn run(
        &mut self,
        prog: &mut Program,
        env: &mut Environment,
        _sink: &mut ErrorSink,
    ) -> PassStats {
        let mut stats = PassStats::default();
        for node in &mut prog.nodes {
            let Node::Instr(instr) = node else { continue };
            if !instr.is_relative() || instr.extended {
                continue;
            }
            let Some(expr) = instr.shape.expr() else { continue };
            let ctx = env.eval_ctx(Some(i64::from(instr.addr)));
            let Ok(target) = eval(expr, &ctx) else { continue };
            // Offset is relative to the byte after the 2-byte short form.
            let offset = target - (i64::from(instr.addr) + 2);
            if !(-128..=127).contains(&offset) {
                instr.extended = true;
                instr.size = instr.extended_size();
                stats.expanded += 1;
            }
        }
        stats
    }
}

/// Commit every remaining selection; after this no pass may change an
/// encoding, and code generation can trust the node sizes.
#[derive(Default)]
pub struct NormalizeModes;

impl Pass for NormalizeModes {
    fn name(&self) -> &'static str {
        "normalize modes"
    }

    fn run(
        &mut self,
        prog: &mut Program,
        _env: &mut Environment,
        _sink: &mut ErrorSink,
    ) -> PassStats {
        for node in &mut prog.nodes {
            if let Node::Instr(instr) = node {
                instr.committed = true;
            }
        }
        PassStats::default()
    }
}
