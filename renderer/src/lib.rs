//! AST-walking template renderer.
//!
//! Evaluates parsed templates against a runtime context: scoped lookups,
//! macros and imports, template inheritance with cycle detection, and the
//! builtin filter/test/function library. Every runtime fault becomes a
//! diagnostic plus a neutral value; `render` never raises.

mod builtins;
mod environment;
mod eval;
mod render;
mod tests;
mod value;

pub use environment::{Environment, EvalSink, FilterFn, FunctionFn, TestFn};
pub use render::{render, render_str};
pub use value::{Kwargs, Num, Object, Value, format_float, html_escape, value_cmp, value_eq};
