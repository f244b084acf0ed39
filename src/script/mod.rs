//! Restricted command language run by the worker agent.
//!
//! Commands are small Lua-flavoured chunks such as
//! `return turtle.forward()` or `return true, {x = 1}`. The language has
//! literals, tables, builtin calls and `not`; it has no variables, no
//! loops and no way to define functions. Values are `serde_json::Value`s,
//! with `nil` as `null`.
//!
//! A call in the last position of an expression list yields all of its
//! results; anywhere else only the first one (or `nil`).

pub mod builtins;
pub mod lexer;
pub mod parser;

use serde_json::{Map, Value};

pub use builtins::{Budget, Builtin, Builtins};
pub use parser::{Call, Expr, Field, Program};

use crate::error::AgentError;

/// Compiles `source` against `builtins`.
///
/// # Errors
///
/// Returns [`AgentError::Compile`] for syntax errors and unknown names.
pub fn compile(source: &str, builtins: &Builtins) -> Result<Program, AgentError> {
    let tokens = lexer::tokenize(source)?;
    parser::parse(tokens, builtins, source.len())
}

/// Lua truthiness: only `nil` and `false` are false.
#[must_use]
pub const fn truthy(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false))
}

impl Program {
    /// Runs the statements in order and returns the values of the
    /// trailing `return` (empty if there is none).
    ///
    /// No builtin is called once `budget` is spent, and a run that
    /// finishes past it counts as timed out.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Execution`] if any builtin raises, or
    /// [`AgentError::Timeout`] if the budget runs out first.
    pub fn run(&self, budget: Budget) -> Result<Vec<Value>, AgentError> {
        let run = Run { budget };
        for call in &self.statements {
            run.invoke(call)?;
        }
        let values = run.eval_list(&self.returns)?;
        run.check()?;
        Ok(values)
    }
}

struct Run {
    budget: Budget,
}

impl Run {
    fn check(&self) -> Result<(), AgentError> {
        if self.budget.is_spent() {
            let millis = u64::try_from(self.budget.limit().as_millis()).unwrap_or(u64::MAX);
            return Err(AgentError::Timeout(millis));
        }
        Ok(())
    }

    fn invoke(&self, call: &Call) -> Result<Vec<Value>, AgentError> {
        let args = self.eval_list(&call.args)?;
        self.check()?;
        (call.function)(&args, &self.budget)
            .map_err(|message| AgentError::Execution(format!("{}: {message}", call.name)))
    }

    fn eval_list(&self, exprs: &[Expr]) -> Result<Vec<Value>, AgentError> {
        let mut values = Vec::with_capacity(exprs.len());
        let last = exprs.len().saturating_sub(1);
        for (i, expr) in exprs.iter().enumerate() {
            match expr {
                Expr::Call(call) if i == last => values.extend(self.invoke(call)?),
                other => values.push(self.eval(other)?),
            }
        }
        Ok(values)
    }

    fn eval(&self, expr: &Expr) -> Result<Value, AgentError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Not(inner) => Ok(Value::Bool(!truthy(&self.eval(inner)?))),
            Expr::Call(call) => Ok(self.invoke(call)?.into_iter().next().unwrap_or(Value::Null)),
            Expr::Table(fields) => self.eval_table(fields),
        }
    }

    fn eval_table(&self, fields: &[Field]) -> Result<Value, AgentError> {
        let mut positional = Vec::new();
        let mut keyed = Map::new();
        let last = fields.len().saturating_sub(1);

        for (i, field) in fields.iter().enumerate() {
            match field {
                Field::Positional(Expr::Call(call)) if i == last => {
                    positional.extend(self.invoke(call)?);
                }
                Field::Positional(expr) => positional.push(self.eval(expr)?),
                Field::Keyed(key, expr) => {
                    let value = self.eval(expr)?;
                    if value.is_null() {
                        keyed.remove(key);
                    } else {
                        keyed.insert(key.clone(), value);
                    }
                }
            }
        }

        if keyed.is_empty() {
            return Ok(Value::Array(positional));
        }
        for (i, value) in positional.into_iter().enumerate() {
            if !value.is_null() {
                keyed.insert((i + 1).to_string(), value);
            }
        }
        Ok(Value::Object(keyed))
    }
}
