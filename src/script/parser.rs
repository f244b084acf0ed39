//! Recursive-descent parser producing a resolved [`Program`].
//!
//! Grammar:
//!
//! ```text
//! chunk   := { call [";"] } [ "return" [exprlist] [";"] ] EOF
//! exprlist:= expr { "," expr }
//! expr    := "nil" | "true" | "false" | number | "-" number | string
//!          | table | call | "not" expr
//! call    := name { "." name } "(" [exprlist] ")"
//! table   := "{" [ field { ("," | ";") field } [ "," | ";" ] ] "}"
//! field   := name "=" expr | "[" string "]" "=" expr | expr
//! ```
//!
//! Every call target is resolved against the [`Builtins`] table while
//! parsing, so an unknown function is a compile error and nothing runs.
//! Expressions nest at most [`MAX_DEPTH`] levels deep.

use std::iter::Peekable;
use std::vec::IntoIter;

use serde_json::{Number, Value};

use super::builtins::{Builtin, Builtins};
use super::lexer::{Spanned, Token};
use crate::error::AgentError;

/// A parsed expression.
#[derive(Clone)]
pub enum Expr {
    /// Constant value.
    Literal(Value),
    /// Table constructor.
    Table(Vec<Field>),
    /// Builtin call.
    Call(Call),
    /// Logical negation.
    Not(Box<Expr>),
}

impl std::fmt::Debug for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Literal(v) => write!(f, "Literal({v})"),
            Self::Table(fields) => f.debug_tuple("Table").field(fields).finish(),
            Self::Call(call) => std::fmt::Debug::fmt(call, f),
            Self::Not(inner) => f.debug_tuple("Not").field(inner).finish(),
        }
    }
}

/// One table constructor entry.
#[derive(Debug, Clone)]
pub enum Field {
    /// `expr`
    Positional(Expr),
    /// `key = expr`
    Keyed(String, Expr),
}

/// A resolved call to a builtin.
#[derive(Clone)]
pub struct Call {
    /// Dotted name as written.
    pub name: String,
    /// Resolved function.
    pub function: Builtin,
    /// Argument expressions.
    pub args: Vec<Expr>,
}

impl std::fmt::Debug for Call {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Call")
            .field("name", &self.name)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

/// A compiled command: statements followed by an optional return list.
#[derive(Debug, Clone, Default)]
pub struct Program {
    /// Call statements, run in order for their side effects.
    pub statements: Vec<Call>,
    /// Expressions of the trailing `return`, if any.
    pub returns: Vec<Expr>,
}

/// Deepest expression nesting a command may use.
pub const MAX_DEPTH: usize = 200;

struct Parser<'a> {
    tokens: Peekable<IntoIter<Spanned>>,
    builtins: &'a Builtins,
    end: usize,
    depth: usize,
}

/// Parses `tokens` into a program, resolving calls against `builtins`.
///
/// # Errors
///
/// Returns [`AgentError::Compile`] on a syntax error or an unknown name.
pub fn parse(
    tokens: Vec<Spanned>,
    builtins: &Builtins,
    source_len: usize,
) -> Result<Program, AgentError> {
    let mut parser = Parser {
        tokens: tokens.into_iter().peekable(),
        builtins,
        end: source_len,
        depth: 0,
    };
    parser.chunk()
}

impl Parser<'_> {
    fn error(&mut self, message: impl std::fmt::Display) -> AgentError {
        let offset = self.tokens.peek().map_or(self.end, |s| s.offset);
        AgentError::Compile(format!("{message} at offset {offset}"))
    }

    fn peek(&mut self) -> Option<&Token> {
        self.tokens.peek().map(|s| &s.token)
    }

    fn next_token(&mut self) -> Option<Token> {
        self.tokens.next().map(|s| s.token)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.tokens.next();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token, what: &str) -> Result<(), AgentError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(format!("expected {what}")))
        }
    }

    fn chunk(&mut self) -> Result<Program, AgentError> {
        let mut program = Program::default();
        loop {
            match self.peek() {
                None => return Ok(program),
                Some(Token::Semi) => {
                    self.tokens.next();
                }
                Some(Token::Return) => {
                    self.tokens.next();
                    if !matches!(self.peek(), None | Some(Token::Semi)) {
                        program.returns = self.expr_list()?;
                    }
                    self.eat(&Token::Semi);
                    if self.peek().is_some() {
                        return Err(self.error("'return' must be the last statement"));
                    }
                    return Ok(program);
                }
                Some(Token::Name(_)) => {
                    let Expr::Call(call) = self.name_expr()? else {
                        return Err(self.error("syntax error"));
                    };
                    program.statements.push(call);
                }
                Some(_) => return Err(self.error("unexpected token")),
            }
        }
    }

    fn expr_list(&mut self) -> Result<Vec<Expr>, AgentError> {
        let mut exprs = vec![self.expr()?];
        while self.eat(&Token::Comma) {
            exprs.push(self.expr()?);
        }
        Ok(exprs)
    }

    fn expr(&mut self) -> Result<Expr, AgentError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("expression nested too deeply"));
        }
        self.depth += 1;
        let expr = self.nested_expr();
        self.depth -= 1;
        expr
    }

    fn nested_expr(&mut self) -> Result<Expr, AgentError> {
        match self.peek() {
            Some(Token::Name(_)) => return self.name_expr(),
            Some(Token::LBrace) => return self.table(),
            _ => {}
        }
        match self.next_token() {
            Some(Token::Nil) => Ok(Expr::Literal(Value::Null)),
            Some(Token::True) => Ok(Expr::Literal(Value::Bool(true))),
            Some(Token::False) => Ok(Expr::Literal(Value::Bool(false))),
            Some(Token::Number(n)) => Ok(Expr::Literal(Value::Number(n))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::Not) => Ok(Expr::Not(Box::new(self.expr()?))),
            Some(Token::Minus) => match self.next_token() {
                Some(Token::Number(n)) => negate(&n)
                    .map(|n| Expr::Literal(Value::Number(n)))
                    .ok_or_else(|| self.error("number out of range")),
                _ => Err(self.error("'-' only applies to number literals")),
            },
            Some(_) => Err(self.error("unexpected token in expression")),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn name_expr(&mut self) -> Result<Expr, AgentError> {
        let Some(Token::Name(first)) = self.next_token() else {
            return Err(self.error("expected name"));
        };
        let mut name = first;
        while self.eat(&Token::Dot) {
            match self.next_token() {
                Some(Token::Name(part)) => {
                    name.push('.');
                    name.push_str(&part);
                }
                _ => return Err(self.error("expected name after '.'")),
            }
        }
        if !self.eat(&Token::LParen) {
            return Err(self.error(format!("undefined variable '{name}'")));
        }
        let Some(function) = self.builtins.get(&name) else {
            return Err(self.error(format!("unknown function '{name}'")));
        };
        let args = if self.eat(&Token::RParen) {
            Vec::new()
        } else {
            let args = self.expr_list()?;
            self.expect(&Token::RParen, "')'")?;
            args
        };
        Ok(Expr::Call(Call {
            name,
            function,
            args,
        }))
    }

    fn table(&mut self) -> Result<Expr, AgentError> {
        self.expect(&Token::LBrace, "'{'")?;
        let mut fields = Vec::new();
        loop {
            if self.eat(&Token::RBrace) {
                return Ok(Expr::Table(fields));
            }
            fields.push(self.field()?);
            if !(self.eat(&Token::Comma) || self.eat(&Token::Semi)) {
                self.expect(&Token::RBrace, "'}'")?;
                return Ok(Expr::Table(fields));
            }
        }
    }

    fn field(&mut self) -> Result<Field, AgentError> {
        if self.eat(&Token::LBracket) {
            let Some(Token::Str(key)) = self.next_token() else {
                return Err(self.error("table keys must be strings"));
            };
            self.expect(&Token::RBracket, "']'")?;
            self.expect(&Token::Assign, "'='")?;
            return Ok(Field::Keyed(key, self.expr()?));
        }
        if let Some(Token::Name(key)) = self.peek().cloned() {
            // `name = expr` needs a second token of lookahead.
            let mut ahead = self.tokens.clone();
            ahead.next();
            if ahead.peek().map(|s| &s.token) == Some(&Token::Assign) {
                self.tokens.next();
                self.tokens.next();
                return Ok(Field::Keyed(key, self.expr()?));
            }
        }
        Ok(Field::Positional(self.expr()?))
    }
}

fn negate(n: &Number) -> Option<Number> {
    if let Some(i) = n.as_i64() {
        return i.checked_neg().map(Number::from);
    }
    n.as_f64().and_then(|f| Number::from_f64(-f))
}
