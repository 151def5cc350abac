//! The builtin filter/test/function library registered by
//! [`Environment::new`](crate::environment::Environment::new).
//!
//! Bodies follow Jinja semantics for the common cases; faults go through the
//! [`EvalSink`](crate::environment::EvalSink) and return neutral values.

mod filters;
mod functions;
mod tests;

use crate::environment::Environment;

pub(crate) fn register(env: &mut Environment) {
    filters::register(env);
    tests::register(env);
    functions::register(env);
}
