//! SQL-like filter expression language.
//!
//! Syntax:
//!   a = 1, a == 1            - equality (also <>, !=, <, <=, >, >=)
//!   a IS NULL, a IS NOT NULL - nullity test
//!   REGEXP_LIKE(a, 'p.*')    - full-string regular expression match
//!   REGEXP_ILIKE(a, 'p.*')   - same, case-insensitive
//!   name COLLATE nocase      - compare a string variable lower-cased
//!   NOT e, !e                - negation
//!   e AND e, e && e          - conjunction
//!   e OR e, e || e           - disjunction (lower precedence than AND)
//!   (e)                      - grouping
//!
//! Literals are NULL, TRUE, FALSE, integers, floats and 'single-quoted strings'.
//! Variables are identifiers, optionally namespaced with `::` (`geometry::type`).

mod ast;
mod eval;
mod lexer;
mod parser;

pub use ast::*;
pub use eval::evaluate;
pub(crate) use eval::anchored_regex;
pub use parser::parse_expression;
