//! Expression evaluation.
//!
//! `and`/`or` short-circuit and return the deciding operand. Arithmetic
//! coerces both sides to numbers, keeps integer math integral, and promotes
//! to `f64` when either side is a float; division by zero yields `null` plus
//! a diagnostic. Faults never abort the walk: the result is `Undefined`,
//! `null`, or the unmodified input, with a diagnostic on the node's span.

use analyzer::ast::{BinOp, BinOpKind, Expr, ExprKind, LitKind, UnOp, UnOpKind};
use analyzer::{Code, RendererCode, Severity, Span};

use crate::environment::EvalSink;
use crate::render::Renderer;
use crate::value::{Num, Value, value_cmp, value_eq};

impl<'env> Renderer<'env> {
    pub(crate) fn eval(&mut self, expr: &Expr) -> Value {
        match &expr.kind {
            ExprKind::Name(sym) => match self.lookup_value(&sym.text) {
                Some(value) => value,
                None => {
                    if self.env.strict_undefined() {
                        self.diagnostics.emit_with(
                            Code::Renderer(RendererCode::UnknownVariable),
                            Severity::Error,
                            expr.span,
                            format!("undefined variable `{}`", sym.text),
                        );
                    }
                    Value::Undefined(sym.text.clone())
                }
            },
            ExprKind::Lit(lit) => match lit {
                LitKind::Str(s) => Value::Str(s.clone()),
                LitKind::Int(v) => Value::Int(*v),
                LitKind::Float(v) => Value::Float(*v),
                LitKind::Bool(v) => Value::Bool(*v),
                LitKind::Null => Value::Null,
            },
            ExprKind::Group { inner } => self.eval(inner),
            ExprKind::Unary { op, expr: inner } => self.eval_unary(op, inner),
            ExprKind::Binary { op, left, right } => self.eval_binary(op, left, right),
            ExprKind::Call {
                callee,
                args,
                kwargs,
            } => {
                if let Some(def) = self.resolve_macro(callee) {
                    let arg_values: Vec<Value> = args.iter().map(|a| self.eval(a)).collect();
                    let kwarg_values = self.eval_kwargs(kwargs);
                    return Value::Str(self.expand_macro(&def, arg_values, kwarg_values));
                }
                match self.call_value(callee, args, kwargs, expr.span) {
                    Some(value) => value,
                    None => {
                        let name = match &callee.kind {
                            ExprKind::Name(sym) => sym.text.clone(),
                            _ => String::new(),
                        };
                        self.diagnostics.emit(
                            Code::Renderer(RendererCode::UnknownFunction),
                            callee.span,
                            if name.is_empty() {
                                "value is not callable".to_string()
                            } else {
                                format!("unknown function `{}`", name)
                            },
                        );
                        Value::Undefined(name)
                    }
                }
            }
            ExprKind::Filter {
                expr: inner,
                name,
                args,
                kwargs,
            } => {
                let value = self.eval(inner);
                let arg_values: Vec<Value> = args.iter().map(|a| self.eval(a)).collect();
                let kwarg_values = self.eval_kwargs(kwargs);
                match self.env.filter(&name.node.text) {
                    Some(filter) => {
                        let mut sink = EvalSink::new(&mut self.diagnostics, expr.span);
                        filter(&value, &arg_values, &kwarg_values, &mut sink)
                    }
                    None => {
                        self.diagnostics.emit(
                            Code::Renderer(RendererCode::UnknownFilter),
                            name.span,
                            format!("unknown filter `{}`", name.node.text),
                        );
                        // The value passes through unchanged.
                        value
                    }
                }
            }
            ExprKind::Test {
                expr: inner,
                name,
                args,
                kwargs,
                negated,
            } => {
                let value = self.eval(inner);
                let arg_values: Vec<Value> = args.iter().map(|a| self.eval(a)).collect();
                let kwarg_values = self.eval_kwargs(kwargs);
                let result = match self.env.test(&name.node.text) {
                    Some(test) => {
                        let mut sink = EvalSink::new(&mut self.diagnostics, expr.span);
                        test(&value, &arg_values, &kwarg_values, &mut sink)
                    }
                    None => {
                        self.diagnostics.emit(
                            Code::Renderer(RendererCode::UnknownTest),
                            name.span,
                            format!("unknown test `{}`", name.node.text),
                        );
                        false
                    }
                };
                Value::Bool(if *negated { !result } else { result })
            }
            ExprKind::GetAttr { target, name } => {
                let base = self.eval(target);
                get_attr_value(&base, &name.node.text)
            }
            ExprKind::GetItem { target, index } => {
                let base = self.eval(target);
                let key = self.eval(index);
                self.get_item(&base, &key, index.span)
            }
            ExprKind::List { items } | ExprKind::Tuple { items } => {
                Value::List(items.iter().map(|e| self.eval(e)).collect())
            }
            ExprKind::Dict { pairs } => {
                let mut map = std::collections::BTreeMap::new();
                for (key_expr, value_expr) in pairs {
                    let key = self.eval(key_expr);
                    let value = self.eval(value_expr);
                    map.insert(key_string(&key), value);
                }
                Value::Map(map)
            }
            ExprKind::Error => Value::undefined(),
        }
    }

    fn eval_unary(&mut self, op: &UnOp, inner: &Expr) -> Value {
        let value = self.eval(inner);
        match op.node {
            UnOpKind::Not => Value::Bool(!value.is_truthy()),
            UnOpKind::Neg => match value.as_number() {
                Some(Num::Int(v)) => v
                    .checked_neg()
                    .map(Value::Int)
                    .unwrap_or(Value::Float(-(v as f64))),
                Some(Num::Float(v)) => Value::Float(-v),
                None => {
                    self.diagnostics.emit(
                        Code::Renderer(RendererCode::InvalidOperand),
                        inner.span,
                        format!("cannot negate {}", value.kind_name()),
                    );
                    Value::Null
                }
            },
            UnOpKind::Pos => match value.as_number() {
                Some(Num::Int(v)) => Value::Int(v),
                Some(Num::Float(v)) => Value::Float(v),
                None => {
                    self.diagnostics.emit(
                        Code::Renderer(RendererCode::InvalidOperand),
                        inner.span,
                        format!("{} is not a number", value.kind_name()),
                    );
                    Value::Null
                }
            },
        }
    }

    fn eval_binary(&mut self, op: &BinOp, left: &Expr, right: &Expr) -> Value {
        // Boolean operators short-circuit and return the deciding operand.
        if op.node == BinOpKind::Or {
            let l = self.eval(left);
            return if l.is_truthy() { l } else { self.eval(right) };
        }
        if op.node == BinOpKind::And {
            let l = self.eval(left);
            return if l.is_truthy() { self.eval(right) } else { l };
        }

        let l = self.eval(left);
        let r = self.eval(right);
        match op.node {
            BinOpKind::Eq => Value::Bool(value_eq(&l, &r)),
            BinOpKind::Ne => Value::Bool(!value_eq(&l, &r)),
            BinOpKind::Lt | BinOpKind::Le | BinOpKind::Gt | BinOpKind::Ge => {
                match value_cmp(&l, &r) {
                    Some(ordering) => {
                        let result = match op.node {
                            BinOpKind::Lt => ordering.is_lt(),
                            BinOpKind::Le => ordering.is_le(),
                            BinOpKind::Gt => ordering.is_gt(),
                            _ => ordering.is_ge(),
                        };
                        Value::Bool(result)
                    }
                    None => {
                        self.diagnostics.emit(
                            Code::Renderer(RendererCode::InvalidOperand),
                            op.span,
                            format!(
                                "cannot compare {} with {}",
                                l.kind_name(),
                                r.kind_name()
                            ),
                        );
                        Value::Bool(false)
                    }
                }
            }
            BinOpKind::In => Value::Bool(self.contains(&r, &l, op.span)),
            BinOpKind::NotIn => Value::Bool(!self.contains(&r, &l, op.span)),
            BinOpKind::Concat => {
                let s = format!("{}{}", l.stringify(), r.stringify());
                match (&l, &r) {
                    (Value::Safe(_), Value::Safe(_)) => Value::Safe(s),
                    _ => Value::Str(s),
                }
            }
            BinOpKind::Add
            | BinOpKind::Sub
            | BinOpKind::Mul
            | BinOpKind::Div
            | BinOpKind::FloorDiv
            | BinOpKind::Rem
            | BinOpKind::Pow => self.arith(op.node, &l, &r, op.span),
            BinOpKind::Or | BinOpKind::And => Value::Null,
        }
    }

    fn contains(&mut self, container: &Value, needle: &Value, span: Span) -> bool {
        match container {
            Value::List(items) => items.iter().any(|v| value_eq(v, needle)),
            Value::Map(map) => map.contains_key(&key_string(needle)),
            Value::Str(s) | Value::Safe(s) => s.contains(&needle.stringify()),
            _ => {
                self.diagnostics.emit(
                    Code::Renderer(RendererCode::InvalidOperand),
                    span,
                    format!("`in` is not supported on {}", container.kind_name()),
                );
                false
            }
        }
    }

    fn arith(&mut self, op: BinOpKind, l: &Value, r: &Value, span: Span) -> Value {
        let (Some(x), Some(y)) = (l.as_number(), r.as_number()) else {
            self.diagnostics.emit(
                Code::Renderer(RendererCode::InvalidOperand),
                span,
                format!(
                    "cannot apply arithmetic to {} and {}",
                    l.kind_name(),
                    r.kind_name()
                ),
            );
            return Value::Null;
        };

        let divisor_is_zero = match y {
            Num::Int(v) => v == 0,
            Num::Float(v) => v == 0.0,
        };
        if divisor_is_zero
            && matches!(op, BinOpKind::Div | BinOpKind::FloorDiv | BinOpKind::Rem)
        {
            self.diagnostics.emit(
                Code::Renderer(RendererCode::InvalidOperand),
                span,
                "division by zero",
            );
            return Value::Null;
        }

        match (x, y) {
            (Num::Int(a), Num::Int(b)) => match op {
                BinOpKind::Add => a
                    .checked_add(b)
                    .map(Value::Int)
                    .unwrap_or(Value::Float(a as f64 + b as f64)),
                BinOpKind::Sub => a
                    .checked_sub(b)
                    .map(Value::Int)
                    .unwrap_or(Value::Float(a as f64 - b as f64)),
                BinOpKind::Mul => a
                    .checked_mul(b)
                    .map(Value::Int)
                    .unwrap_or(Value::Float(a as f64 * b as f64)),
                BinOpKind::Div => Value::Float(a as f64 / b as f64),
                BinOpKind::FloorDiv => Value::Int(a.div_euclid(b)),
                BinOpKind::Rem => Value::Int(a.rem_euclid(b)),
                BinOpKind::Pow => {
                    if (0..=u32::MAX as i64).contains(&b) {
                        a.checked_pow(b as u32)
                            .map(Value::Int)
                            .unwrap_or(Value::Float((a as f64).powf(b as f64)))
                    } else {
                        Value::Float((a as f64).powf(b as f64))
                    }
                }
                _ => Value::Null,
            },
            _ => {
                let a = x.as_f64();
                let b = y.as_f64();
                match op {
                    BinOpKind::Add => Value::Float(a + b),
                    BinOpKind::Sub => Value::Float(a - b),
                    BinOpKind::Mul => Value::Float(a * b),
                    BinOpKind::Div => Value::Float(a / b),
                    BinOpKind::FloorDiv => Value::Float((a / b).floor()),
                    BinOpKind::Rem => Value::Float(a.rem_euclid(b)),
                    BinOpKind::Pow => Value::Float(a.powf(b)),
                    _ => Value::Null,
                }
            }
        }
    }

    /// Item lookup: lists index by int (negative allowed), dicts by
    /// stringified key, strings by character. Out-of-range indexing is an
    /// info-level fault producing `Undefined`.
    pub(crate) fn get_item(&mut self, base: &Value, key: &Value, span: Span) -> Value {
        match base {
            Value::List(items) => {
                let index = match key.as_number() {
                    Some(Num::Int(i)) => i,
                    _ => {
                        self.diagnostics.emit_with(
                            Code::Renderer(RendererCode::InvalidOperand),
                            Severity::Info,
                            span,
                            format!("list index must be an integer, got {}", key.kind_name()),
                        );
                        return Value::undefined();
                    }
                };
                let len = items.len() as i64;
                let idx = if index < 0 { len + index } else { index };
                if idx >= 0 && idx < len {
                    items[idx as usize].clone()
                } else {
                    self.diagnostics.emit_with(
                        Code::Renderer(RendererCode::InvalidOperand),
                        Severity::Info,
                        span,
                        format!("index {} out of range", index),
                    );
                    Value::undefined()
                }
            }
            Value::Map(map) => {
                let k = key_string(key);
                map.get(&k).cloned().unwrap_or(Value::Undefined(k))
            }
            Value::Str(s) | Value::Safe(s) => {
                let index = match key.as_number() {
                    Some(Num::Int(i)) => i,
                    _ => return Value::undefined(),
                };
                let chars: Vec<char> = s.chars().collect();
                let len = chars.len() as i64;
                let idx = if index < 0 { len + index } else { index };
                if idx >= 0 && idx < len {
                    Value::Str(chars[idx as usize].to_string())
                } else {
                    self.diagnostics.emit_with(
                        Code::Renderer(RendererCode::InvalidOperand),
                        Severity::Info,
                        span,
                        format!("index {} out of range", index),
                    );
                    Value::undefined()
                }
            }
            Value::Undefined(_) => base.clone(),
            _ => {
                self.diagnostics.emit_with(
                    Code::Renderer(RendererCode::InvalidOperand),
                    Severity::Info,
                    span,
                    format!("cannot index into {}", base.kind_name()),
                );
                Value::undefined()
            }
        }
    }
}

/// Attribute lookup: dict key, object capability, otherwise `Undefined`.
pub(crate) fn get_attr_value(base: &Value, name: &str) -> Value {
    match base {
        Value::Map(map) => map
            .get(name)
            .cloned()
            .unwrap_or_else(|| Value::Undefined(name.to_string())),
        Value::Object(obj) => obj
            .attribute(name)
            .unwrap_or_else(|| Value::Undefined(name.to_string())),
        Value::Undefined(_) => base.clone(),
        _ => Value::Undefined(name.to_string()),
    }
}

/// Dict keys are strings; non-string keys are stringified.
pub(crate) fn key_string(key: &Value) -> String {
    match key {
        Value::Str(s) | Value::Safe(s) => s.clone(),
        other => other.stringify(),
    }
}
