// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Line-oriented front end: source text to IR nodes.
//!
//! Syntax notes: `;` starts a comment, `[ ]` groups sub-expressions
//! (parentheses belong to indirect addressing), `^` is the current
//! address, `$`/`%` prefix hex/binary literals, and macros are invoked
//! with a leading backtick.

use crate::error::{AsmErrorKind, ErrorSink};
use crate::expr::{BinaryOp, Expr, Span, UnaryOp};
use crate::ir::{DataWidth, Instr, MacroDef, Node, OperandShape, Program};

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
    line: u32,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str, line: u32) -> Self {
        Self {
            bytes: input.as_bytes(),
            pos: 0,
            line,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ') | Some(b'\t')) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, c: u8) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn at_end(&mut self) -> bool {
        self.skip_ws();
        self.peek().is_none()
    }

    fn span_from(&self, start: usize) -> Span {
        Span::at(self.line, start + 1, self.pos + 1)
    }

    fn take_ident(&mut self) -> Option<String> {
        let start = self.pos;
        let first = self.peek()?;
        if !(first.is_ascii_alphabetic() || first == b'_') {
            return None;
        }
        self.pos += 1;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == b'_')
        {
            self.pos += 1;
        }
        Some(String::from_utf8_lossy(&self.bytes[start..self.pos]).to_string())
    }
}

#[derive(Debug)]
struct LineError {
    message: String,
    param: Option<String>,
}

impl LineError {
    fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
            param: None,
        }
    }

    fn with_param(message: &str, param: &str) -> Self {
        Self {
            message: message.to_string(),
            param: Some(param.to_string()),
        }
    }
}

type LineResult<T> = Result<T, LineError>;

/// Parse source text into a Program, recording parse failures in the sink
/// so that one run reports every malformed line.
pub fn parse_source(source: &str, sink: &mut ErrorSink) -> Program {
    let mut nodes = Vec::new();
    // In-progress .macro body, if any.
    let mut open_macro: Option<MacroDef> = None;

    for (idx, raw_line) in source.lines().enumerate() {
        let line_num = idx as u32 + 1;
        let code = strip_comment(raw_line);
        if code.trim().is_empty() {
            continue;
        }

        match parse_line(code, line_num, &mut open_macro) {
            Ok(line_nodes) => {
                let out = match &mut open_macro {
                    Some(def) => &mut def.body,
                    None => &mut nodes,
                };
                out.extend(line_nodes);
            }
            Err(err) => sink.record(
                line_num,
                AsmErrorKind::Parse,
                &err.message,
                err.param.as_deref(),
            ),
        }
    }

    if let Some(def) = open_macro {
        sink.record(
            def.span.line,
            AsmErrorKind::Parse,
            "Unterminated .macro",
            Some(&def.name),
        );
        nodes.push(Node::MacroDef(def));
    }

    Program::new(nodes)
}

fn strip_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    let mut in_string = false;
    let mut ix = 0;
    while ix < bytes.len() {
        match bytes[ix] {
            b'"' => in_string = !in_string,
            // Character literal: the next byte is data even when it is
            // a semicolon or a quote, and a closing quote is optional.
            b'\'' if !in_string => {
                ix += 2;
                if ix < bytes.len() && bytes[ix] == b'\'' {
                    ix += 1;
                }
                continue;
            }
            b';' if !in_string => return &line[..ix],
            _ => {}
        }
        ix += 1;
    }
    line
}

fn parse_line(
    code: &str,
    line_num: u32,
    open_macro: &mut Option<MacroDef>,
) -> LineResult<Vec<Node>> {
    let mut nodes = Vec::new();
    let mut cur = Cursor::new(code, line_num);
    cur.skip_ws();

    // Optional `label:` prefix; a statement may follow on the same line.
    let before = cur.pos;
    if let Some(name) = cur.take_ident() {
        if cur.eat(b':') {
            nodes.push(Node::Label {
                name,
                span: cur.span_from(before),
            });
            cur.skip_ws();
        } else {
            cur.pos = before;
        }
    }

    if cur.at_end() {
        return Ok(nodes);
    }

    match cur.peek() {
        Some(b'.') => {
            cur.pos += 1;
            parse_pragma(&mut cur, &mut nodes, open_macro)?;
        }
        Some(b'`') => {
            cur.pos += 1;
            let start = cur.pos;
            let name = cur
                .take_ident()
                .ok_or_else(|| LineError::new("Expected macro name after `"))?;
            let args = if cur.at_end() {
                Vec::new()
            } else {
                parse_expr_list(&mut cur)?
            };
            nodes.push(Node::MacroInvoke {
                name,
                args,
                span: cur.span_from(start),
            });
        }
        _ => {
            let start = cur.pos;
            let mnemonic = cur
                .take_ident()
                .ok_or_else(|| LineError::new("Expected mnemonic or directive"))?;
            let shape = parse_operand(&mut cur)?;
            let span = cur.span_from(start);
            nodes.push(Node::Instr(Instr::new(&mnemonic, shape, span)));
        }
    }

    if !cur.at_end() {
        return Err(LineError::new("Trailing characters on line"));
    }
    Ok(nodes)
}

fn parse_pragma(
    cur: &mut Cursor<'_>,
    nodes: &mut Vec<Node>,
    open_macro: &mut Option<MacroDef>,
) -> LineResult<()> {
    let start = cur.pos;
    let name = cur
        .take_ident()
        .ok_or_else(|| LineError::new("Expected pragma name after '.'"))?;
    cur.skip_ws();

    match name.to_ascii_lowercase().as_str() {
        "org" => {
            let expr = parse_expr(cur)?;
            nodes.push(Node::Org {
                expr,
                span: cur.span_from(start),
            });
        }
        "advance" => {
            let expr = parse_expr(cur)?;
            nodes.push(Node::Advance {
                expr,
                pad: 0,
                span: cur.span_from(start),
            });
        }
        "alias" => {
            let alias_name = cur
                .take_ident()
                .ok_or_else(|| LineError::new("Expected name after .alias"))?;
            cur.skip_ws();
            let expr = parse_expr(cur)?;
            nodes.push(Node::Alias {
                name: alias_name,
                expr,
                span: cur.span_from(start),
            });
        }
        "byte" => {
            let exprs = parse_expr_list(cur)?;
            nodes.push(Node::Data {
                width: DataWidth::Byte,
                exprs,
                span: cur.span_from(start),
            });
        }
        "word" => {
            let exprs = parse_expr_list(cur)?;
            nodes.push(Node::Data {
                width: DataWidth::Word,
                exprs,
                span: cur.span_from(start),
            });
        }
        "macro" => {
            if open_macro.is_some() {
                return Err(LineError::new("Nested .macro definitions are not supported"));
            }
            let macro_name = cur
                .take_ident()
                .ok_or_else(|| LineError::new("Expected name after .macro"))?;
            let mut params = Vec::new();
            cur.skip_ws();
            while !cur.at_end() {
                if !params.is_empty() && !cur.eat(b',') {
                    return Err(LineError::new("Expected ',' between macro parameters"));
                }
                cur.skip_ws();
                let param = cur
                    .take_ident()
                    .ok_or_else(|| LineError::new("Expected macro parameter name"))?;
                params.push(param);
                cur.skip_ws();
            }
            *open_macro = Some(MacroDef {
                name: macro_name,
                params,
                body: Vec::new(),
                span: cur.span_from(start),
            });
        }
        "macend" => match open_macro.take() {
            Some(def) => nodes.push(Node::MacroDef(def)),
            None => return Err(LineError::new(".macend without matching .macro")),
        },
        other => return Err(LineError::with_param("Unknown pragma", other)),
    }
    Ok(())
}

fn parse_operand(cur: &mut Cursor<'_>) -> LineResult<OperandShape> {
    cur.skip_ws();
    if cur.peek().is_none() {
        return Ok(OperandShape::None);
    }

    if cur.eat(b'#') {
        return Ok(OperandShape::Immediate(parse_expr(cur)?));
    }

    if cur.eat(b'(') {
        let expr = parse_expr(cur)?;
        cur.skip_ws();
        // (expr,X)  |  (expr)  |  (expr),Y
        if cur.eat(b',') {
            cur.skip_ws();
            if !matches!(cur.bump(), Some(b'X') | Some(b'x')) {
                return Err(LineError::new("Expected X after ',' in indirect operand"));
            }
            cur.skip_ws();
            if !cur.eat(b')') {
                return Err(LineError::new("Expected ')' in indirect operand"));
            }
            return Ok(OperandShape::IndirectX(expr));
        }
        if !cur.eat(b')') {
            return Err(LineError::new("Expected ')' in indirect operand"));
        }
        cur.skip_ws();
        if cur.eat(b',') {
            cur.skip_ws();
            if !matches!(cur.bump(), Some(b'Y') | Some(b'y')) {
                return Err(LineError::new("Expected Y after ') ,'"));
            }
            return Ok(OperandShape::IndirectY(expr));
        }
        return Ok(OperandShape::Indirect(expr));
    }

    // Bare accumulator operand.
    let mark = cur.pos;
    if let Some(ident) = cur.take_ident() {
        if ident.eq_ignore_ascii_case("a") && cur.at_end() {
            return Ok(OperandShape::Accumulator);
        }
        cur.pos = mark;
    }

    let expr = parse_expr(cur)?;
    cur.skip_ws();
    if cur.eat(b',') {
        cur.skip_ws();
        return match cur.bump() {
            Some(b'X') | Some(b'x') => Ok(OperandShape::DirectX(expr)),
            Some(b'Y') | Some(b'y') => Ok(OperandShape::DirectY(expr)),
            _ => Err(LineError::new("Expected X or Y after ','")),
        };
    }
    Ok(OperandShape::Direct(expr))
}

fn parse_expr_list(cur: &mut Cursor<'_>) -> LineResult<Vec<Expr>> {
    let mut exprs = vec![parse_expr(cur)?];
    loop {
        cur.skip_ws();
        if !cur.eat(b',') {
            break;
        }
        exprs.push(parse_expr(cur)?);
    }
    Ok(exprs)
}

// Precedence, loosest first: | then & then << >> then + - then * /.
fn parse_expr(cur: &mut Cursor<'_>) -> LineResult<Expr> {
    parse_bitor(cur)
}

fn parse_bitor(cur: &mut Cursor<'_>) -> LineResult<Expr> {
    let mut lhs = parse_bitand(cur)?;
    loop {
        cur.skip_ws();
        if cur.eat(b'|') {
            let rhs = parse_bitand(cur)?;
            lhs = binary(BinaryOp::BitOr, lhs, rhs);
        } else {
            return Ok(lhs);
        }
    }
}

fn parse_bitand(cur: &mut Cursor<'_>) -> LineResult<Expr> {
    let mut lhs = parse_shift(cur)?;
    loop {
        cur.skip_ws();
        if cur.eat(b'&') {
            let rhs = parse_shift(cur)?;
            lhs = binary(BinaryOp::BitAnd, lhs, rhs);
        } else {
            return Ok(lhs);
        }
    }
}

fn parse_shift(cur: &mut Cursor<'_>) -> LineResult<Expr> {
    let mut lhs = parse_addsub(cur)?;
    loop {
        cur.skip_ws();
        let op = if cur.bytes[cur.pos..].starts_with(b"<<") {
            BinaryOp::Shl
        } else if cur.bytes[cur.pos..].starts_with(b">>") {
            BinaryOp::Shr
        } else {
            return Ok(lhs);
        };
        cur.pos += 2;
        let rhs = parse_addsub(cur)?;
        lhs = binary(op, lhs, rhs);
    }
}

fn parse_addsub(cur: &mut Cursor<'_>) -> LineResult<Expr> {
    let mut lhs = parse_muldiv(cur)?;
    loop {
        cur.skip_ws();
        let op = match cur.peek() {
            Some(b'+') => BinaryOp::Add,
            Some(b'-') => BinaryOp::Sub,
            _ => return Ok(lhs),
        };
        cur.pos += 1;
        let rhs = parse_muldiv(cur)?;
        lhs = binary(op, lhs, rhs);
    }
}

fn parse_muldiv(cur: &mut Cursor<'_>) -> LineResult<Expr> {
    let mut lhs = parse_unary(cur)?;
    loop {
        cur.skip_ws();
        let op = match cur.peek() {
            Some(b'*') => BinaryOp::Mul,
            Some(b'/') => BinaryOp::Div,
            _ => return Ok(lhs),
        };
        cur.pos += 1;
        let rhs = parse_unary(cur)?;
        lhs = binary(op, lhs, rhs);
    }
}

fn parse_unary(cur: &mut Cursor<'_>) -> LineResult<Expr> {
    cur.skip_ws();
    let start = cur.pos;
    // `<<`/`>>` are shift operators and never reach here; a single
    // `<`/`>` prefix takes the low/high byte.
    let op = match cur.peek() {
        Some(b'-') => Some(UnaryOp::Minus),
        Some(b'<') => Some(UnaryOp::Low),
        Some(b'>') => Some(UnaryOp::High),
        _ => None,
    };
    if let Some(op) = op {
        cur.pos += 1;
        let expr = parse_unary(cur)?;
        return Ok(Expr::Unary {
            op,
            expr: Box::new(expr),
            span: cur.span_from(start),
        });
    }
    parse_primary(cur)
}

fn parse_primary(cur: &mut Cursor<'_>) -> LineResult<Expr> {
    cur.skip_ws();
    let start = cur.pos;
    match cur.peek() {
        Some(b'[') => {
            cur.pos += 1;
            let inner = parse_expr(cur)?;
            cur.skip_ws();
            if !cur.eat(b']') {
                return Err(LineError::new("Expected ']'"));
            }
            Ok(inner)
        }
        Some(b'^') => {
            cur.pos += 1;
            Ok(Expr::Here(cur.span_from(start)))
        }
        Some(b'$') => {
            cur.pos += 1;
            parse_radix_digits(cur, 16, start)
        }
        Some(b'%') => {
            cur.pos += 1;
            parse_radix_digits(cur, 2, start)
        }
        Some(b'\'') => {
            cur.pos += 1;
            let c = cur
                .bump()
                .ok_or_else(|| LineError::new("Expected character after '"))?;
            let _ = cur.eat(b'\'');
            Ok(Expr::Number(i64::from(c), cur.span_from(start)))
        }
        Some(b'"') => {
            cur.pos += 1;
            let str_start = cur.pos;
            while cur.peek().is_some_and(|c| c != b'"') {
                cur.pos += 1;
            }
            if !cur.eat(b'"') {
                return Err(LineError::new("Unterminated string literal"));
            }
            let bytes = cur.bytes[str_start..cur.pos - 1].to_vec();
            Ok(Expr::Str(bytes, cur.span_from(start)))
        }
        Some(c) if c.is_ascii_digit() => parse_radix_digits(cur, 10, start),
        _ => match cur.take_ident() {
            Some(name) => Ok(Expr::Symbol(name, cur.span_from(start))),
            None => Err(LineError::new("Expected expression")),
        },
    }
}

fn parse_radix_digits(cur: &mut Cursor<'_>, radix: u32, start: usize) -> LineResult<Expr> {
    let digits_start = cur.pos;
    while cur
        .peek()
        .is_some_and(|c| (c as char).is_digit(radix))
    {
        cur.pos += 1;
    }
    if cur.pos == digits_start {
        return Err(LineError::new("Expected digits in numeric literal"));
    }
    let text = String::from_utf8_lossy(&cur.bytes[digits_start..cur.pos]);
    let value = i64::from_str_radix(&text, radix)
        .map_err(|_| LineError::with_param("Numeric literal out of range", &text))?;
    Ok(Expr::Number(value, cur.span_from(start)))
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    let span = lhs.span();
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
        span,
    }
}
