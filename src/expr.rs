// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Operand expressions and their evaluation.
//!
//! Expressions reference symbols that may still be provisional while the
//! resolution passes run, so evaluation takes a context trait rather than
//! a concrete symbol table.

use crate::error::AsmErrorKind;

/// Source location of a token or expression.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Span {
    pub line: u32,
    pub col_start: usize,
    pub col_end: usize,
}

impl Span {
    pub fn at(line: u32, col_start: usize, col_end: usize) -> Self {
        Self {
            line,
            col_start,
            col_end,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Arithmetic negation.
    Minus,
    /// `<expr` - low byte.
    Low,
    /// `>expr` - high byte.
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    BitAnd,
    BitOr,
    Shl,
    Shr,
}

/// An operand expression.
#[derive(Debug, Clone)]
pub enum Expr {
    Number(i64, Span),
    Symbol(String, Span),
    /// String literal; only valid as `.byte` data, not in arithmetic.
    Str(Vec<u8>, Span),
    /// `^` - address of the instruction being assembled.
    Here(Span),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
        span: Span,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Number(_, span)
            | Expr::Symbol(_, span)
            | Expr::Str(_, span)
            | Expr::Here(span) => *span,
            Expr::Unary { span, .. } | Expr::Binary { span, .. } => *span,
        }
    }

    /// Collect every symbol name referenced by this expression.
    pub fn symbols<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Symbol(name, _) => out.push(name),
            Expr::Unary { expr, .. } => expr.symbols(out),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.symbols(out);
                rhs.symbols(out);
            }
            Expr::Number(..) | Expr::Str(..) | Expr::Here(_) => {}
        }
    }

    /// Replace symbol references using `subst`, leaving other nodes intact.
    /// Used for positional macro-parameter binding and label hygiene.
    pub fn substitute(&self, subst: &dyn Fn(&str) -> Option<Expr>) -> Expr {
        match self {
            Expr::Symbol(name, span) => match subst(name) {
                Some(replacement) => replacement,
                None => Expr::Symbol(name.clone(), *span),
            },
            Expr::Unary { op, expr, span } => Expr::Unary {
                op: *op,
                expr: Box::new(expr.substitute(subst)),
                span: *span,
            },
            Expr::Binary {
                op,
                lhs,
                rhs,
                span,
            } => Expr::Binary {
                op: *op,
                lhs: Box::new(lhs.substitute(subst)),
                rhs: Box::new(rhs.substitute(subst)),
                span: *span,
            },
            other => other.clone(),
        }
    }
}

/// Error returned from expression evaluation.
#[derive(Debug, Clone)]
pub struct EvalError {
    pub kind: AsmErrorKind,
    pub message: String,
    pub param: Option<String>,
    pub span: Span,
}

impl EvalError {
    fn new(kind: AsmErrorKind, message: &str, param: Option<&str>, span: Span) -> Self {
        Self {
            kind,
            message: message.to_string(),
            param: param.map(str::to_string),
            span,
        }
    }
}

/// Context for expression evaluation.
pub trait EvalContext {
    /// Look up a symbol's value by name.
    fn lookup(&self, name: &str) -> Option<i64>;

    /// Address of the node being evaluated (`^`), when known.
    fn here(&self) -> Option<i64>;
}

/// Evaluate an expression to a numeric value.
pub fn eval(expr: &Expr, ctx: &dyn EvalContext) -> Result<i64, EvalError> {
    match expr {
        Expr::Number(value, _) => Ok(*value),

        Expr::Symbol(name, span) => ctx.lookup(name).ok_or_else(|| {
            EvalError::new(
                AsmErrorKind::UndefinedSymbol,
                "Undefined symbol",
                Some(name),
                *span,
            )
        }),

        Expr::Str(bytes, span) => {
            if bytes.len() == 1 {
                Ok(bytes[0] as i64)
            } else {
                Err(EvalError::new(
                    AsmErrorKind::TypeMismatch,
                    "String not allowed in arithmetic",
                    None,
                    *span,
                ))
            }
        }

        Expr::Here(span) => ctx.here().ok_or_else(|| {
            EvalError::new(
                AsmErrorKind::UnresolvedSymbol,
                "Current address (^) not available here",
                None,
                *span,
            )
        }),

        Expr::Unary { op, expr, .. } => {
            let val = eval(expr, ctx)?;
            Ok(match op {
                UnaryOp::Minus => val.wrapping_neg(),
                UnaryOp::Low => val & 0xff,
                UnaryOp::High => (val >> 8) & 0xff,
            })
        }

        Expr::Binary {
            op,
            lhs,
            rhs,
            span,
        } => {
            let l = eval(lhs, ctx)?;
            let r = eval(rhs, ctx)?;
            Ok(match op {
                BinaryOp::Add => l.wrapping_add(r),
                BinaryOp::Sub => l.wrapping_sub(r),
                BinaryOp::Mul => l.wrapping_mul(r),
                BinaryOp::Div => {
                    if r == 0 {
                        return Err(EvalError::new(
                            AsmErrorKind::TypeMismatch,
                            "Division by zero",
                            None,
                            *span,
                        ));
                    }
                    l / r
                }
                BinaryOp::BitAnd => l & r,
                BinaryOp::BitOr => l | r,
                BinaryOp::Shl => l << (r & 0x3f),
                BinaryOp::Shr => ((l as u64) >> (r & 0x3f)) as i64,
            })
        }
    }
}

/// Returns true if the value fits in an unsigned 8-bit byte.
pub fn fits_byte(value: i64) -> bool {
    (0..=0xff).contains(&value)
}

/// Returns true if the value fits in an unsigned 16-bit word.
pub fn fits_word(value: i64) -> bool {
    (0..=0xffff).contains(&value)
}

/// Evaluation context backed by a lookup closure.
pub struct ClosureContext<F>
where
    F: Fn(&str) -> Option<i64>,
{
    lookup: F,
    here: Option<i64>,
}

impl<F> ClosureContext<F>
where
    F: Fn(&str) -> Option<i64>,
{
    pub fn new(lookup: F) -> Self {
        Self { lookup, here: None }
    }

    pub fn with_here(lookup: F, here: i64) -> Self {
        Self {
            lookup,
            here: Some(here),
        }
    }
}

impl<F> EvalContext for ClosureContext<F>
where
    F: Fn(&str) -> Option<i64>,
{
    fn lookup(&self, name: &str) -> Option<i64> {
        (self.lookup)(name)
    }

    fn here(&self) -> Option<i64> {
        self.here
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(v: i64) -> Expr {
        Expr::Number(v, Span::default())
    }

    fn sym(name: &str) -> Expr {
        Expr::Symbol(name.to_string(), Span::default())
    }

    fn bin(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            span: Span::default(),
        }
    }

    #[test]
    fn evaluates_arithmetic() {
        let ctx = ClosureContext::new(|_| None);
        let e = bin(BinaryOp::Add, num(2), bin(BinaryOp::Mul, num(3), num(4)));
        assert_eq!(eval(&e, &ctx).unwrap(), 14);
    }

    #[test]
    fn low_and_high_bytes() {
        let ctx = ClosureContext::new(|_| None);
        let low = Expr::Unary {
            op: UnaryOp::Low,
            expr: Box::new(num(0x1234)),
            span: Span::default(),
        };
        let high = Expr::Unary {
            op: UnaryOp::High,
            expr: Box::new(num(0x1234)),
            span: Span::default(),
        };
        assert_eq!(eval(&low, &ctx).unwrap(), 0x34);
        assert_eq!(eval(&high, &ctx).unwrap(), 0x12);
    }

    #[test]
    fn undefined_symbol_reports_kind() {
        let ctx = ClosureContext::new(|_| None);
        let err = eval(&sym("nowhere"), &ctx).unwrap_err();
        assert_eq!(err.kind, AsmErrorKind::UndefinedSymbol);
        assert_eq!(err.param.as_deref(), Some("nowhere"));
    }

    #[test]
    fn string_in_arithmetic_is_type_mismatch() {
        let ctx = ClosureContext::new(|_| None);
        let s = Expr::Str(b"hi".to_vec(), Span::default());
        let err = eval(&bin(BinaryOp::Add, s, num(1)), &ctx).unwrap_err();
        assert_eq!(err.kind, AsmErrorKind::TypeMismatch);
    }

    #[test]
    fn single_char_string_acts_as_byte() {
        let ctx = ClosureContext::new(|_| None);
        let s = Expr::Str(b"A".to_vec(), Span::default());
        assert_eq!(eval(&s, &ctx).unwrap(), 65);
    }

    #[test]
    fn here_resolves_when_available() {
        let ctx = ClosureContext::with_here(|_| None, 0x2000);
        assert_eq!(eval(&Expr::Here(Span::default()), &ctx).unwrap(), 0x2000);
        let ctx = ClosureContext::new(|_| None);
        let err = eval(&Expr::Here(Span::default()), &ctx).unwrap_err();
        assert_eq!(err.kind, AsmErrorKind::UnresolvedSymbol);
    }

    #[test]
    fn substitution_replaces_symbols() {
        let e = bin(BinaryOp::Add, sym("p1"), num(1));
        let replaced = e.substitute(&|name| (name == "p1").then(|| num(41)));
        let ctx = ClosureContext::new(|_| None);
        assert_eq!(eval(&replaced, &ctx).unwrap(), 42);
    }
}
