//! Pluggable command handling.
//!
//! A [`CommandHandler`] turns a command string into a [`ReturnShape`] in
//! two steps so a command that does not compile is never invoked. The
//! shipped implementation is [`ScriptHandler`], backed by the restricted
//! language in [`crate::script`].

use serde_json::Value;

use crate::error::AgentError;
use crate::protocol::ExecutionResult;
use crate::script::{self, Budget, Builtins, Program};

/// What a command returned, before normalization.
///
/// Commands choose their convention by return arity: one value is a plain
/// payload, two values are a pass/fail flag followed by a detail.
#[derive(Debug, Clone, PartialEq)]
pub enum ReturnShape {
    /// A single value (or none, as `null`).
    Value(Value),
    /// A truthiness flag plus a success payload or failure detail.
    Outcome {
        /// Whether the first returned value was truthy.
        ok: bool,
        /// The second returned value.
        detail: Value,
    },
}

impl ReturnShape {
    /// Classifies a list of returned values.
    ///
    /// Zero values → `Value(null)`; one → `Value(v)`; two or more →
    /// `Outcome` from the first two, extra values ignored.
    #[must_use]
    pub fn from_values(values: Vec<Value>) -> Self {
        let mut values = values.into_iter();
        match (values.next(), values.next()) {
            (None, _) => Self::Value(Value::Null),
            (Some(value), None) => Self::Value(value),
            (Some(flag), Some(detail)) => Self::Outcome {
                ok: script::truthy(&flag),
                detail,
            },
        }
    }

    /// Normalizes into the reported result.
    #[must_use]
    pub fn into_result(self) -> ExecutionResult {
        match self {
            Self::Value(value) | Self::Outcome { ok: true, detail: value } => {
                ExecutionResult::success(value)
            }
            Self::Outcome {
                ok: false,
                detail,
            } => ExecutionResult::failure(detail),
        }
    }
}

/// Compiles and runs command strings.
pub trait CommandHandler: Send + Sync + 'static {
    /// A compiled command, ready to run on a blocking thread.
    type Prepared: Send + 'static;

    /// Compiles `source` without running anything.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Compile`] if `source` is not a valid command.
    fn compile(&self, source: &str) -> Result<Self::Prepared, AgentError>;

    /// Runs a compiled command with no arguments.
    ///
    /// Implementations stop before any further side effect once `budget`
    /// is spent.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Execution`] if the command raises, or
    /// [`AgentError::Timeout`] if it runs out of budget.
    fn invoke(&self, prepared: Self::Prepared, budget: Budget) -> Result<ReturnShape, AgentError>;
}

/// [`CommandHandler`] running the restricted script language.
///
/// Capabilities are exactly the functions in its [`Builtins`] table.
#[derive(Debug, Clone)]
pub struct ScriptHandler {
    builtins: Builtins,
}

impl ScriptHandler {
    /// Creates a handler over `builtins`.
    #[must_use]
    pub const fn new(builtins: Builtins) -> Self {
        Self { builtins }
    }

    /// Returns the function table.
    #[must_use]
    pub const fn builtins(&self) -> &Builtins {
        &self.builtins
    }
}

impl CommandHandler for ScriptHandler {
    type Prepared = Program;

    fn compile(&self, source: &str) -> Result<Program, AgentError> {
        script::compile(source, &self.builtins)
    }

    fn invoke(&self, prepared: Program, budget: Budget) -> Result<ReturnShape, AgentError> {
        prepared.run(budget).map(ReturnShape::from_values)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use serde_json::json;

    use super::*;

    fn handler() -> ScriptHandler {
        ScriptHandler::new(Builtins::standard(json!(42)))
    }

    fn outcome(source: &str) -> ExecutionResult {
        let handler = handler();
        let Ok(program) = handler.compile(source) else {
            panic!("{source} should compile");
        };
        let Ok(shape) = handler.invoke(program, Budget::unlimited()) else {
            panic!("{source} should run");
        };
        shape.into_result()
    }

    #[test]
    fn true_with_extra_is_success_payload() {
        assert_eq!(
            outcome("return true, 7"),
            ExecutionResult::SuccessWithData(json!(7))
        );
    }

    #[test]
    fn false_with_extra_is_failure_detail() {
        assert_eq!(
            outcome("return false, 'blocked'"),
            ExecutionResult::Failure(Some(json!("blocked")))
        );
        assert_eq!(
            outcome("return nil, {reason = 'lava'}"),
            ExecutionResult::Failure(Some(json!({"reason": "lava"})))
        );
    }

    #[test]
    fn single_value_is_success_payload() {
        assert_eq!(
            outcome("return 'cobblestone'"),
            ExecutionResult::SuccessWithData(json!("cobblestone"))
        );
        assert_eq!(
            outcome("return false"),
            ExecutionResult::SuccessWithData(json!(false))
        );
        assert_eq!(outcome("return id()"), ExecutionResult::SuccessWithData(json!(42)));
    }

    #[test]
    fn no_value_is_success_without_data() {
        assert_eq!(outcome(""), ExecutionResult::Success);
        assert_eq!(outcome("return nil"), ExecutionResult::Success);
        assert_eq!(outcome("echo(1)"), ExecutionResult::Success);
        assert_eq!(outcome("return true, nil"), ExecutionResult::Success);
    }

    #[test]
    fn extra_values_beyond_two_are_ignored() {
        assert_eq!(
            ReturnShape::from_values(vec![json!(1), json!(2), json!(3)]),
            ReturnShape::Outcome {
                ok: true,
                detail: json!(2)
            }
        );
    }

    #[test]
    fn compile_errors_surface_from_compile() {
        let result = handler().compile("return io.open('/etc/passwd')");
        assert!(matches!(result, Err(AgentError::Compile(_))));
    }
}
