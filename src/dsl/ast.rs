//! AST types for the filter expression language.

use crate::value::Value;
use std::fmt;

/// Root filter expression. Immutable once parsed; share it behind an `Arc`
/// to evaluate from several threads.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// `NOT expr` / `!expr`
    Not(Box<Expression>),

    /// `expr AND expr` / `expr && expr`
    And(Box<Expression>, Box<Expression>),

    /// `expr OR expr` / `expr || expr`
    Or(Box<Expression>, Box<Expression>),

    /// A leaf test over one or two operands.
    Predicate(Predicate),
}

/// A predicate applied to operands.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `op IS NULL`, `op IS NOT NULL`
    Unary(UnaryOp, Operand),

    /// `a <op> b`, `REGEXP_LIKE(a, b)`, `REGEXP_ILIKE(a, b)`
    Binary(BinaryOp, Operand, Operand),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    IsNull,
    IsNotNull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq, // = ==
    Ne, // <> !=
    Lt, // <
    Le, // <=
    Gt, // >
    Ge, // >=
    RegexpLike,
    RegexpIlike,
}

/// A value source inside a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Literal value.
    Const(Value),

    /// Named variable resolved through the evaluation context. With
    /// `case_insensitive` (from `COLLATE nocase`) string values are ASCII lower-cased.
    Variable { name: String, case_insensitive: bool },
}

impl Operand {
    pub fn variable(name: impl Into<String>) -> Self {
        Operand::Variable {
            name: name.into(),
            case_insensitive: false,
        }
    }
}

impl Expression {
    pub fn not(expr: Expression) -> Self {
        Expression::Not(Box::new(expr))
    }

    pub fn and(left: Expression, right: Expression) -> Self {
        Expression::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Expression, right: Expression) -> Self {
        Expression::Or(Box::new(left), Box::new(right))
    }

    pub fn binary(op: BinaryOp, left: Operand, right: Operand) -> Self {
        Expression::Predicate(Predicate::Binary(op, left, right))
    }

    pub fn unary(op: UnaryOp, operand: Operand) -> Self {
        Expression::Predicate(Predicate::Unary(op, operand))
    }

    /// Names of all variables referenced by the expression, in order of appearance.
    pub fn variables(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_variables(&mut names);
        names
    }

    fn collect_variables<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Expression::Not(inner) => inner.collect_variables(names),
            Expression::And(left, right) | Expression::Or(left, right) => {
                left.collect_variables(names);
                right.collect_variables(names);
            }
            Expression::Predicate(Predicate::Unary(_, operand)) => push_variable(operand, names),
            Expression::Predicate(Predicate::Binary(_, left, right)) => {
                push_variable(left, names);
                push_variable(right, names);
            }
        }
    }
}

fn push_variable<'a>(operand: &'a Operand, names: &mut Vec<&'a str>) {
    if let Operand::Variable { name, .. } = operand
        && !names.contains(&name.as_str())
    {
        names.push(name);
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryOp::Eq => write!(f, "="),
            BinaryOp::Ne => write!(f, "<>"),
            BinaryOp::Lt => write!(f, "<"),
            BinaryOp::Le => write!(f, "<="),
            BinaryOp::Gt => write!(f, ">"),
            BinaryOp::Ge => write!(f, ">="),
            BinaryOp::RegexpLike => write!(f, "REGEXP_LIKE"),
            BinaryOp::RegexpIlike => write!(f, "REGEXP_ILIKE"),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Variable {
                name,
                case_insensitive,
            } => {
                write!(f, "{name}")?;
                if *case_insensitive {
                    write!(f, " COLLATE nocase")?;
                }
                Ok(())
            }
            Operand::Const(value) => match value {
                Value::Null => write!(f, "NULL"),
                Value::Bool(true) => write!(f, "TRUE"),
                Value::Bool(false) => write!(f, "FALSE"),
                Value::Int(i) => write!(f, "{i}"),
                // Out-of-range literals lex as infinities
                Value::Double(d) if d.is_infinite() => {
                    write!(f, "{}1e999", if d.is_sign_negative() { "-" } else { "" })
                }
                // Debug keeps a fraction or exponent so the literal re-lexes as a double
                Value::Double(d) => write!(f, "{d:?}"),
                Value::String(s) => write_quoted(f, s),
                // Composite constants never come out of the parser; print their text form.
                other => write_quoted(f, &other.canonical()),
            },
        }
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    write!(f, "'")?;
    for c in s.chars() {
        match c {
            '\'' => write!(f, "\\'")?,
            '\\' => write!(f, "\\\\")?,
            '\n' => write!(f, "\\n")?,
            '\r' => write!(f, "\\r")?,
            '\t' => write!(f, "\\t")?,
            c => write!(f, "{c}")?,
        }
    }
    write!(f, "'")
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Not(inner) => write!(f, "NOT ({inner})"),
            Expression::And(left, right) => write!(f, "({left}) AND ({right})"),
            Expression::Or(left, right) => write!(f, "({left}) OR ({right})"),
            Expression::Predicate(Predicate::Unary(UnaryOp::IsNull, operand)) => {
                write!(f, "{operand} IS NULL")
            }
            Expression::Predicate(Predicate::Unary(UnaryOp::IsNotNull, operand)) => {
                write!(f, "{operand} IS NOT NULL")
            }
            Expression::Predicate(Predicate::Binary(
                op @ (BinaryOp::RegexpLike | BinaryOp::RegexpIlike),
                left,
                right,
            )) => write!(f, "{op}({left}, {right})"),
            Expression::Predicate(Predicate::Binary(op, left, right)) => {
                write!(f, "{left} {op} {right}")
            }
        }
    }
}
