//! Function table available to command scripts.
//!
//! A command can only call what is registered here. The table is the
//! whole capability surface of the sandbox: nothing in the standard
//! library touches the filesystem, the network, or other processes.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;

/// A native function callable from a script.
///
/// Receives its evaluated arguments and the running command's [`Budget`],
/// and returns any number of values. An `Err` aborts the command as a
/// runtime error.
pub type Builtin = Arc<dyn Fn(&[Value], &Budget) -> Result<Vec<Value>, String> + Send + Sync>;

/// Time allowance of one command run.
///
/// The interpreter checks it before every call, and blocking builtins
/// must not wait past it.
#[derive(Debug, Clone, Copy)]
pub struct Budget {
    limit: Duration,
    deadline: Option<Instant>,
}

impl Budget {
    /// A budget that never runs out.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            limit: Duration::MAX,
            deadline: None,
        }
    }

    /// A budget of `limit`, starting now.
    #[must_use]
    pub fn starting_now(limit: Duration) -> Self {
        Self {
            limit,
            deadline: Instant::now().checked_add(limit),
        }
    }

    /// The total allowance.
    #[must_use]
    pub const fn limit(&self) -> Duration {
        self.limit
    }

    /// Time left, or `None` when unlimited.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Returns `true` once the deadline has passed.
    #[must_use]
    pub fn is_spent(&self) -> bool {
        self.remaining().is_some_and(|left| left.is_zero())
    }
}

impl Default for Budget {
    fn default() -> Self {
        Self::unlimited()
    }
}

/// Name → function table.
#[derive(Clone, Default)]
pub struct Builtins {
    functions: HashMap<String, Builtin>,
}

impl fmt::Debug for Builtins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("Builtins").field("functions", &names).finish()
    }
}

impl Builtins {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the standard library for a worker.
    ///
    /// `sleep(ms)` never waits past the command's [`Budget`].
    #[must_use]
    pub fn standard(identity: Value) -> Self {
        let mut builtins = Self::new();

        builtins.register("id", move |_, _| Ok(vec![identity.clone()]));
        builtins.register("echo", |args, _| Ok(args.to_vec()));
        builtins.register("error", |args, _| {
            Err(match args.first() {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => "error".to_string(),
                Some(other) => other.to_string(),
            })
        });
        builtins.register("sleep", |args, budget| {
            let millis = integer_arg(args, 0, "sleep")?;
            let millis = u64::try_from(millis).map_err(|_| "sleep: negative duration")?;
            let wanted = Duration::from_millis(millis);
            std::thread::sleep(budget.remaining().map_or(wanted, |left| wanted.min(left)));
            Ok(Vec::new())
        });
        builtins.register("os.time", |_, _| Ok(vec![Value::from(chrono::Utc::now().timestamp())]));
        builtins.register("os.version", |_, _| {
            Ok(vec![Value::from(format!(
                "{} {}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ))])
        });

        builtins
    }

    /// Registers (or replaces) a function under a dotted name.
    pub fn register<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: Fn(&[Value], &Budget) -> Result<Vec<Value>, String> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(function));
    }

    /// Looks up a function by its dotted name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Builtin> {
        self.functions.get(name).cloned()
    }

    /// Returns the number of registered functions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// Reads argument `index` as an integer.
///
/// # Errors
///
/// Returns a message naming `function` if the argument is missing or not
/// an integral number.
pub fn integer_arg(args: &[Value], index: usize, function: &str) -> Result<i64, String> {
    match args.get(index) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15)
                    .map(|f| f as i64)
            })
            .ok_or_else(|| format!("{function}: argument #{} must be an integer", index + 1)),
        Some(_) | None => Err(format!(
            "{function}: bad argument #{} (number expected)",
            index + 1
        )),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(builtins: &Builtins, name: &str, args: &[Value]) -> Result<Vec<Value>, String> {
        let Some(function) = builtins.get(name) else {
            panic!("{name} is not registered");
        };
        function(args, &Budget::unlimited())
    }

    #[test]
    fn standard_library_contents() {
        let builtins = Builtins::standard(json!(42));
        for name in ["id", "echo", "error", "sleep", "os.time", "os.version"] {
            assert!(builtins.get(name).is_some(), "{name} missing");
        }
        assert!(builtins.get("io.open").is_none());
    }

    #[test]
    fn id_returns_identity() {
        let builtins = Builtins::standard(json!("miner-1"));
        assert_eq!(call(&builtins, "id", &[]), Ok(vec![json!("miner-1")]));
    }

    #[test]
    fn echo_returns_all_arguments() {
        let builtins = Builtins::standard(json!(1));
        let args = [json!(true), json!("x"), Value::Null];
        assert_eq!(call(&builtins, "echo", &args), Ok(args.to_vec()));
    }

    #[test]
    fn error_raises_message() {
        let builtins = Builtins::standard(json!(1));
        assert_eq!(call(&builtins, "error", &[json!("boom")]), Err("boom".to_string()));
        assert_eq!(call(&builtins, "error", &[]), Err("error".to_string()));
    }

    #[test]
    fn sleep_validates_argument() {
        let builtins = Builtins::standard(json!(1));
        assert!(call(&builtins, "sleep", &[json!("soon")]).is_err());
        assert!(call(&builtins, "sleep", &[json!(-1)]).is_err());
        assert_eq!(call(&builtins, "sleep", &[json!(1)]), Ok(Vec::new()));
    }

    #[test]
    fn sleep_stops_at_budget() {
        let builtins = Builtins::standard(json!(1));
        let Some(sleep) = builtins.get("sleep") else {
            panic!("sleep is not registered");
        };
        let budget = Budget::starting_now(Duration::from_millis(20));
        let started = Instant::now();
        assert_eq!(sleep(&[json!(5_000)], &budget), Ok(Vec::new()));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(budget.is_spent());
    }

    #[test]
    fn unlimited_budget_is_never_spent() {
        let budget = Budget::unlimited();
        assert_eq!(budget.remaining(), None);
        assert!(!budget.is_spent());
    }

    #[test]
    fn integer_arg_accepts_integral_floats() {
        assert_eq!(integer_arg(&[json!(3.0)], 0, "f"), Ok(3));
        assert!(integer_arg(&[json!(3.5)], 0, "f").is_err());
        assert!(integer_arg(&[], 0, "f").is_err());
    }

    #[test]
    fn debug_lists_sorted_names() {
        let mut builtins = Builtins::new();
        builtins.register("b", |_, _| Ok(Vec::new()));
        builtins.register("a", |_, _| Ok(Vec::new()));
        assert_eq!(format!("{builtins:?}"), r#"Builtins { functions: ["a", "b"] }"#);
        assert_eq!(builtins.len(), 2);
    }
}
