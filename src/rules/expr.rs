//! Metric expression parser.
//!
//! # Grammar
//! ```text
//! expr       := or
//! or         := and ("or" and)*
//! and        := not ("and" not)*
//! not        := "not" not | comparison
//! comparison := additive (("==" | "!=" | "<" | "<=" | ">" | ">=") additive)?
//! additive   := term (("+" | "-") term)*
//! term       := unary (("*" | "/" | "//" | "%") unary)*
//! unary      := ("-" | "+") unary | postfix
//! postfix    := primary ("[" expr "]" | "." name | "(" args ")")*
//! primary    := number | string | name | "(" expr ")"
//! ```
//!
//! # Design Decisions
//! - Parsed once at construction; evaluation never re-reads the source
//! - Function calls are limited to a fixed set of pure builtins
//! - Names resolve only against the evaluation context

use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// Syntax errors, reported with the byte offset they occurred at.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    #[error("unexpected character '{ch}' at {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("unterminated string starting at {0}")]
    UnterminatedString(usize),

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("unexpected {found} at {pos}, expected {expected}")]
    Unexpected {
        found: String,
        expected: &'static str,
        pos: usize,
    },

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("only builtin functions can be called")]
    NotCallable,

    #[error("empty expression")]
    Empty,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

/// Arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Rem,
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        };
        f.write_str(s)
    }
}

/// Pure functions callable from expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Int,
    Float,
    Str,
    Len,
    Abs,
    Min,
    Max,
    Round,
}

impl Builtin {
    fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "int" => Builtin::Int,
            "float" => Builtin::Float,
            "str" => Builtin::Str,
            "len" => Builtin::Len,
            "abs" => Builtin::Abs,
            "min" => Builtin::Min,
            "max" => Builtin::Max,
            "round" => Builtin::Round,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Int => "int",
            Builtin::Float => "float",
            Builtin::Str => "str",
            Builtin::Len => "len",
            Builtin::Abs => "abs",
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::Round => "round",
        }
    }
}

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Name(String),
    Index(Box<Expr>, Box<Expr>),
    Attr(Box<Expr>, String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Compare(CmpOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Call(Builtin, Vec<Expr>),
}

impl Expr {
    /// Parse an expression from source text.
    pub fn parse(source: &str) -> Result<Expr, ExprError> {
        let tokens = lex(source)?;
        if tokens.len() == 1 {
            return Err(ExprError::Empty);
        }
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.expr()?;
        parser.expect(&Tok::Eof, "end of expression")?;
        Ok(expr)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    Sym(&'static str),
    Eof,
}

impl fmt::Display for Tok {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tok::Int(i) => write!(f, "number {}", i),
            Tok::Float(x) => write!(f, "number {}", x),
            Tok::Str(s) => write!(f, "string '{}'", s),
            Tok::Ident(s) => write!(f, "name '{}'", s),
            Tok::Sym(s) => write!(f, "'{}'", s),
            Tok::Eof => f.write_str("end of expression"),
        }
    }
}

// Longest symbols first so "//" wins over "/".
const SYMBOLS: &[&str] = &[
    "==", "!=", "<=", ">=", "//", "<", ">", "+", "-", "*", "/", "%", "(", ")", "[", "]", ".", ",",
];

fn lex(source: &str) -> Result<Vec<(Tok, usize)>, ExprError> {
    let mut tokens = Vec::new();
    let bytes = source.as_bytes();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        let start = pos;
        if c.is_ascii_digit() {
            while pos < bytes.len() && (bytes[pos].is_ascii_digit() || bytes[pos] == b'_') {
                pos += 1;
            }
            let mut is_float = false;
            if pos < bytes.len() && bytes[pos] == b'.' {
                is_float = true;
                pos += 1;
                while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                    pos += 1;
                }
            }
            if pos < bytes.len() && (bytes[pos] == b'e' || bytes[pos] == b'E') {
                is_float = true;
                pos += 1;
                if pos < bytes.len() && (bytes[pos] == b'+' || bytes[pos] == b'-') {
                    pos += 1;
                }
                while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                    pos += 1;
                }
            }
            let text = source[start..pos].replace('_', "");
            let tok = if is_float {
                text.parse::<f64>()
                    .map(Tok::Float)
                    .map_err(|_| ExprError::InvalidNumber(text.clone()))?
            } else {
                match text.parse::<i64>() {
                    Ok(i) => Tok::Int(i),
                    Err(_) => text
                        .parse::<f64>()
                        .map(Tok::Float)
                        .map_err(|_| ExprError::InvalidNumber(text.clone()))?,
                }
            };
            tokens.push((tok, start));
            continue;
        }

        if c.is_ascii_alphabetic() || c == b'_' {
            while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_') {
                pos += 1;
            }
            tokens.push((Tok::Ident(source[start..pos].to_string()), start));
            continue;
        }

        if c == b'\'' || c == b'"' {
            let (text, next) = lex_string(source, start)?;
            tokens.push((Tok::Str(text), start));
            pos = next;
            continue;
        }

        match SYMBOLS.iter().find(|s| source[pos..].starts_with(**s)) {
            Some(&sym) => {
                tokens.push((Tok::Sym(sym), start));
                pos += sym.len();
            }
            None => {
                let ch = source[pos..].chars().next().unwrap_or('?');
                return Err(ExprError::UnexpectedChar { ch, pos });
            }
        }
    }

    tokens.push((Tok::Eof, source.len()));
    Ok(tokens)
}

fn lex_string(source: &str, start: usize) -> Result<(String, usize), ExprError> {
    let mut chars = source[start..].char_indices();
    let quote = match chars.next() {
        Some((_, q)) => q,
        None => return Err(ExprError::UnterminatedString(start)),
    };
    let mut text = String::new();
    let mut escaped = false;

    for (offset, ch) in chars {
        if escaped {
            text.push(match ch {
                'n' => '\n',
                't' => '\t',
                other => other,
            });
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == quote {
            return Ok((text, start + offset + ch.len_utf8()));
        } else {
            text.push(ch);
        }
    }
    Err(ExprError::UnterminatedString(start))
}

struct Parser {
    tokens: Vec<(Tok, usize)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Tok {
        &self.tokens[self.pos].0
    }

    fn advance(&mut self) -> Tok {
        let tok = self.tokens[self.pos].0.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn eat_sym(&mut self, sym: &str) -> bool {
        if matches!(self.peek(), Tok::Sym(s) if *s == sym) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if matches!(self.peek(), Tok::Ident(s) if s == kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn unexpected(&self, expected: &'static str) -> ExprError {
        let (tok, pos) = &self.tokens[self.pos];
        ExprError::Unexpected {
            found: tok.to_string(),
            expected,
            pos: *pos,
        }
    }

    fn expect(&mut self, tok: &Tok, expected: &'static str) -> Result<(), ExprError> {
        if self.peek() == tok {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn expr(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.and()?;
        while self.eat_keyword("or") {
            let right = self.and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.not()?;
        while self.eat_keyword("and") {
            let right = self.not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not(&mut self) -> Result<Expr, ExprError> {
        if self.eat_keyword("not") {
            let inner = self.not()?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(inner)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, ExprError> {
        let left = self.additive()?;
        let op = match self.peek() {
            Tok::Sym("==") => CmpOp::Eq,
            Tok::Sym("!=") => CmpOp::Ne,
            Tok::Sym("<") => CmpOp::Lt,
            Tok::Sym("<=") => CmpOp::Le,
            Tok::Sym(">") => CmpOp::Gt,
            Tok::Sym(">=") => CmpOp::Ge,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.additive()?;
        Ok(Expr::Compare(op, Box::new(left), Box::new(right)))
    }

    fn additive(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.term()?;
        loop {
            let op = if self.eat_sym("+") {
                BinaryOp::Add
            } else if self.eat_sym("-") {
                BinaryOp::Sub
            } else {
                return Ok(left);
            };
            let right = self.term()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn term(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.unary()?;
        loop {
            let op = if self.eat_sym("*") {
                BinaryOp::Mul
            } else if self.eat_sym("//") {
                BinaryOp::FloorDiv
            } else if self.eat_sym("/") {
                BinaryOp::Div
            } else if self.eat_sym("%") {
                BinaryOp::Rem
            } else {
                return Ok(left);
            };
            let right = self.unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        if self.eat_sym("-") {
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.unary()?)));
        }
        if self.eat_sym("+") {
            return Ok(Expr::Unary(UnaryOp::Pos, Box::new(self.unary()?)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, ExprError> {
        let mut expr = self.primary()?;
        loop {
            if self.eat_sym("[") {
                let index = self.expr()?;
                self.expect(&Tok::Sym("]"), "']'")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else if self.eat_sym(".") {
                let attr = match self.peek() {
                    Tok::Ident(name) => name.clone(),
                    _ => return Err(self.unexpected("attribute name")),
                };
                self.advance();
                expr = Expr::Attr(Box::new(expr), attr);
            } else if self.eat_sym("(") {
                let func = match &expr {
                    Expr::Name(name) => Builtin::lookup(name)
                        .ok_or_else(|| ExprError::UnknownFunction(name.clone()))?,
                    _ => return Err(ExprError::NotCallable),
                };
                let mut args = Vec::new();
                if !self.eat_sym(")") {
                    loop {
                        args.push(self.expr()?);
                        if self.eat_sym(")") {
                            break;
                        }
                        self.expect(&Tok::Sym(","), "',' or ')'")?;
                    }
                }
                expr = Expr::Call(func, args);
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, ExprError> {
        match self.peek().clone() {
            Tok::Int(i) => {
                self.advance();
                Ok(Expr::Literal(Value::from(i)))
            }
            Tok::Float(x) => {
                self.advance();
                serde_json::Number::from_f64(x)
                    .map(|n| Expr::Literal(Value::Number(n)))
                    .ok_or_else(|| ExprError::InvalidNumber(x.to_string()))
            }
            Tok::Str(s) => {
                self.advance();
                Ok(Expr::Literal(Value::String(s)))
            }
            Tok::Ident(name) => {
                let literal = match name.as_str() {
                    "true" | "True" => Some(Value::Bool(true)),
                    "false" | "False" => Some(Value::Bool(false)),
                    "null" | "None" => Some(Value::Null),
                    "and" | "or" | "not" => return Err(self.unexpected("operand")),
                    _ => None,
                };
                self.advance();
                Ok(literal.map(Expr::Literal).unwrap_or(Expr::Name(name)))
            }
            Tok::Sym("(") => {
                self.advance();
                let inner = self.expr()?;
                self.expect(&Tok::Sym(")"), "')'")?;
                Ok(inner)
            }
            _ => Err(self.unexpected("operand")),
        }
    }
}
