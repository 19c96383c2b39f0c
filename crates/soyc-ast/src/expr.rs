//! Template expressions.
//!
//! `Expr` carries no source positions, so derived `Eq` and `Hash` compare
//! expressions structurally: `$a.b == 1` written twice in a template yields
//! two equal values. Analyses use this to recognise repeated conditions.

use std::fmt;

use serde::Serialize;
use soyc_source::Span;

use crate::parser::ParseError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Expr {
    Var(String),
    Field(Box<Expr>, String),
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

const UNARY_PRECEDENCE: u8 = 7;

impl BinaryOp {
    fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Eq | BinaryOp::NotEq => 3,
            BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => 4,
            BinaryOp::Add | BinaryOp::Sub => 5,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 6,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "or",
            BinaryOp::And => "and",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
        }
    }

    fn from_token(token: &Token) -> Option<Self> {
        let op = match token {
            Token::Word(word) if word == "or" => BinaryOp::Or,
            Token::Word(word) if word == "and" => BinaryOp::And,
            Token::Symbol(symbol) => match *symbol {
                "==" => BinaryOp::Eq,
                "!=" => BinaryOp::NotEq,
                "<" => BinaryOp::Lt,
                "<=" => BinaryOp::LtEq,
                ">" => BinaryOp::Gt,
                ">=" => BinaryOp::GtEq,
                "+" => BinaryOp::Add,
                "-" => BinaryOp::Sub,
                "*" => BinaryOp::Mul,
                "/" => BinaryOp::Div,
                "%" => BinaryOp::Mod,
                _ => return None,
            },
            _ => return None,
        };
        Some(op)
    }
}

impl Expr {
    #[must_use]
    pub fn var(name: &str) -> Self {
        Expr::Var(name.trim_start_matches('$').to_string())
    }

    #[must_use]
    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    #[must_use]
    pub fn not(expr: Expr) -> Self {
        Expr::Unary(UnaryOp::Not, Box::new(expr))
    }

    /// Parse an expression that starts at byte `offset` of the template.
    pub fn parse(text: &str, offset: u32) -> Result<Self, ParseError> {
        let span = Span::from_parts(offset as usize, text.len());
        let tokens = tokenize(text).map_err(|message| ParseError::InvalidExpression {
            message,
            span,
        })?;
        let mut parser = ExprParser { tokens, pos: 0 };
        let expr = parser
            .expression(0)
            .and_then(|expr| match parser.peek() {
                None => Ok(expr),
                Some(token) => Err(format!("unexpected trailing `{token}`")),
            })
            .map_err(|message| ParseError::InvalidExpression { message, span })?;
        Ok(expr)
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Binary(op, ..) => op.precedence(),
            Expr::Unary(..) => UNARY_PRECEDENCE,
            _ => u8::MAX,
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, min_precedence: u8) -> fmt::Result {
        if self.precedence() < min_precedence {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Var(name) => write!(f, "${name}"),
            Expr::Field(base, field) => {
                base.fmt_operand(f, u8::MAX)?;
                write!(f, ".{field}")
            }
            Expr::Null => f.write_str("null"),
            Expr::Bool(value) => write!(f, "{value}"),
            Expr::Int(value) => write!(f, "{value}"),
            Expr::Str(value) => write!(f, "'{value}'"),
            Expr::Unary(UnaryOp::Not, operand) => {
                f.write_str("not ")?;
                operand.fmt_operand(f, UNARY_PRECEDENCE)
            }
            Expr::Unary(UnaryOp::Neg, operand) => {
                f.write_str("-")?;
                operand.fmt_operand(f, UNARY_PRECEDENCE)
            }
            Expr::Binary(op, lhs, rhs) => {
                lhs.fmt_operand(f, op.precedence())?;
                write!(f, " {} ", op.symbol())?;
                rhs.fmt_operand(f, op.precedence() + 1)
            }
            Expr::Call(name, args) => {
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Var(String),
    Word(String),
    Int(i64),
    Str(String),
    Symbol(&'static str),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Var(name) => write!(f, "${name}"),
            Token::Word(word) => f.write_str(word),
            Token::Int(value) => write!(f, "{value}"),
            Token::Str(value) => write!(f, "'{value}'"),
            Token::Symbol(symbol) => f.write_str(symbol),
        }
    }
}

const SYMBOLS: &[&str] = &[
    "==", "!=", "<=", ">=", "<", ">", "+", "-", "*", "/", "%", "(", ")", ",", ".",
];

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn tokenize(text: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut rest = text;

    while let Some(c) = rest.chars().next() {
        if c.is_whitespace() {
            rest = &rest[c.len_utf8()..];
            continue;
        }

        if c == '$' || c.is_ascii_alphabetic() || c == '_' {
            let body = rest.strip_prefix('$').unwrap_or(rest);
            let len = body.find(|ch: char| !is_ident_char(ch)).unwrap_or(body.len());
            if len == 0 {
                return Err("expected a variable name after `$`".to_string());
            }
            let ident = body[..len].to_string();
            tokens.push(if c == '$' {
                Token::Var(ident)
            } else {
                Token::Word(ident)
            });
            rest = &body[len..];
        } else if c.is_ascii_digit() {
            let len = rest.find(|ch: char| !ch.is_ascii_digit()).unwrap_or(rest.len());
            let value = rest[..len]
                .parse()
                .map_err(|_| format!("integer literal `{}` is out of range", &rest[..len]))?;
            tokens.push(Token::Int(value));
            rest = &rest[len..];
        } else if c == '\'' || c == '"' {
            let body = &rest[1..];
            let Some(end) = body.find(c) else {
                return Err("unterminated string literal".to_string());
            };
            tokens.push(Token::Str(body[..end].to_string()));
            rest = &body[end + 1..];
        } else if let Some(symbol) = SYMBOLS.iter().copied().find(|symbol| rest.starts_with(*symbol)) {
            tokens.push(Token::Symbol(symbol));
            rest = &rest[symbol.len()..];
        } else {
            return Err(format!("unexpected character `{c}`"));
        }
    }

    Ok(tokens)
}

struct ExprParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat_symbol(&mut self, symbol: &str) -> bool {
        if matches!(self.peek(), Some(Token::Symbol(s)) if *s == symbol) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expression(&mut self, min_precedence: u8) -> Result<Expr, String> {
        let mut lhs = self.unary()?;

        while let Some(op) = self.peek().and_then(BinaryOp::from_token) {
            if op.precedence() < min_precedence {
                break;
            }
            self.pos += 1;
            let rhs = self.expression(op.precedence() + 1)?;
            lhs = Expr::binary(op, lhs, rhs);
        }

        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, String> {
        match self.peek() {
            Some(Token::Word(word)) if word == "not" => {
                self.pos += 1;
                Ok(Expr::not(self.unary()?))
            }
            Some(Token::Symbol("-")) => {
                self.pos += 1;
                Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.unary()?)))
            }
            _ => self.postfix(),
        }
    }

    fn postfix(&mut self) -> Result<Expr, String> {
        let mut expr = self.primary()?;
        while self.eat_symbol(".") {
            match self.next() {
                Some(Token::Word(field)) => expr = Expr::Field(Box::new(expr), field),
                Some(token) => return Err(format!("expected a field name, found `{token}`")),
                None => return Err("expected a field name".to_string()),
            }
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, String> {
        match self.next() {
            Some(Token::Var(name)) => Ok(Expr::Var(name)),
            Some(Token::Int(value)) => Ok(Expr::Int(value)),
            Some(Token::Str(value)) => Ok(Expr::Str(value)),
            Some(Token::Word(word)) => match word.as_str() {
                "null" => Ok(Expr::Null),
                "true" => Ok(Expr::Bool(true)),
                "false" => Ok(Expr::Bool(false)),
                _ if self.eat_symbol("(") => {
                    let mut args = Vec::new();
                    if !self.eat_symbol(")") {
                        loop {
                            args.push(self.expression(0)?);
                            if self.eat_symbol(")") {
                                break;
                            }
                            if !self.eat_symbol(",") {
                                return Err("expected `,` or `)` in call".to_string());
                            }
                        }
                    }
                    Ok(Expr::Call(word, args))
                }
                _ => Err(format!("unexpected `{word}`")),
            },
            Some(Token::Symbol("(")) => {
                let expr = self.expression(0)?;
                if self.eat_symbol(")") {
                    Ok(expr)
                } else {
                    Err("expected `)`".to_string())
                }
            }
            Some(token) => Err(format!("unexpected `{token}`")),
            None => Err("expected an expression".to_string()),
        }
    }
}
