//! Evaluator for the filter expression AST.
//!
//! Evaluation never fails: missing variables resolve to null and every type
//! mismatch makes the predicate false.

use regex::{Regex, RegexBuilder};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;

use super::ast::{BinaryOp, Expression, Operand, Predicate, UnaryOp};
use crate::context::Context;
use crate::value::Value;

const REGEX_CACHE_LIMIT: usize = 64;

thread_local! {
    // Patterns usually come from literals, so the same few are compiled over and over.
    static REGEX_CACHE: RefCell<HashMap<(String, bool), Option<Regex>>> =
        RefCell::new(HashMap::new());
}

/// Evaluate an expression against a context.
pub fn evaluate<C: Context + ?Sized>(expr: &Expression, ctx: &C) -> bool {
    match expr {
        Expression::Not(inner) => !evaluate(inner, ctx),
        Expression::And(left, right) => evaluate(left, ctx) && evaluate(right, ctx),
        Expression::Or(left, right) => evaluate(left, ctx) || evaluate(right, ctx),
        Expression::Predicate(predicate) => evaluate_predicate(predicate, ctx),
    }
}

impl Expression {
    /// Evaluate this expression against a context.
    pub fn evaluate<C: Context + ?Sized>(&self, ctx: &C) -> bool {
        evaluate(self, ctx)
    }
}

fn evaluate_predicate<C: Context + ?Sized>(predicate: &Predicate, ctx: &C) -> bool {
    match predicate {
        Predicate::Unary(op, operand) => {
            let is_null = resolve(operand, ctx).is_null();
            match op {
                UnaryOp::IsNull => is_null,
                UnaryOp::IsNotNull => !is_null,
            }
        }
        Predicate::Binary(op, left, right) => {
            let mut left = resolve(left, ctx);
            let mut right = resolve(right, ctx);
            if ctx.coerces_numeric_strings() {
                coerce_numeric_text(&mut left, &right);
                coerce_numeric_text(&mut right, &left);
            }
            apply(*op, &left, &right)
        }
    }
}

/// Resolve an operand to a value. Absent variables are null.
fn resolve<C: Context + ?Sized>(operand: &Operand, ctx: &C) -> Value {
    match operand {
        Operand::Const(value) => value.clone(),
        Operand::Variable {
            name,
            case_insensitive,
        } => match ctx.lookup(name) {
            Some(Value::String(s)) if *case_insensitive => Value::String(s.to_ascii_lowercase()),
            Some(value) => value,
            None => Value::Null,
        },
    }
}

/// Read `value` as a double when it is numeric text compared against a number.
/// Text that does not parse stays a string and so never orders against the number.
fn coerce_numeric_text(value: &mut Value, other: &Value) {
    if !matches!(other, Value::Int(_) | Value::Double(_)) {
        return;
    }
    if let Value::String(text) = value
        && let Ok(number) = text.parse::<f64>()
    {
        *value = Value::Double(number);
    }
}

fn apply(op: BinaryOp, left: &Value, right: &Value) -> bool {
    match op {
        BinaryOp::Eq => equals(left, right),
        BinaryOp::Ne => !left.is_null() && !right.is_null() && left != right,
        BinaryOp::Lt => compare(left, right) == Some(Ordering::Less),
        BinaryOp::Gt => compare(left, right) == Some(Ordering::Greater),
        BinaryOp::Le => equals(left, right) || compare(left, right) == Some(Ordering::Less),
        BinaryOp::Ge => equals(left, right) || compare(left, right) == Some(Ordering::Greater),
        BinaryOp::RegexpLike => regexp_match(left, right, false),
        BinaryOp::RegexpIlike => regexp_match(left, right, true),
    }
}

/// Structural equality; null is never equal to anything.
fn equals(left: &Value, right: &Value) -> bool {
    !left.is_null() && !right.is_null() && left == right
}

/// Ordering of two values, `None` when they are not comparable.
fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        // UTF-8 byte order is code point order
        (Value::String(a), Value::String(b)) => Some(a.as_str().cmp(b.as_str())),
        (a, b) => a.as_f64()?.partial_cmp(&b.as_f64()?),
    }
}

/// Full-string regular expression match of `value` against `pattern`.
fn regexp_match(value: &Value, pattern: &Value, case_insensitive: bool) -> bool {
    let (Some(text), Some(pattern)) = (value.as_text(), pattern.as_text()) else {
        return false;
    };

    REGEX_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();
        let key = (pattern.into_owned(), case_insensitive);
        if !cache.contains_key(&key) {
            if cache.len() >= REGEX_CACHE_LIMIT {
                cache.clear();
            }
            let compiled = compile_anchored(&key.0, case_insensitive);
            cache.insert(key.clone(), compiled);
        }
        cache
            .get(&key)
            .and_then(Option::as_ref)
            .is_some_and(|regex| regex.is_match(&text))
    })
}

fn compile_anchored(pattern: &str, case_insensitive: bool) -> Option<Regex> {
    match anchored_regex(pattern, case_insensitive) {
        Ok(regex) => Some(regex),
        Err(e) => {
            tracing::debug!("Invalid regular expression '{}' in filter: {}", pattern, e);
            None
        }
    }
}

/// Compile `pattern` so that it only matches whole strings.
///
/// The pattern is validated on its own first: an unbalanced `)` would
/// otherwise close the anchoring group and match substrings.
pub(crate) fn anchored_regex(
    pattern: &str,
    case_insensitive: bool,
) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .build()?;
    RegexBuilder::new(&format!("^(?:{pattern})$"))
        .case_insensitive(case_insensitive)
        .build()
}
