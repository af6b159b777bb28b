//! Style rules for styling features.
//!
//! Rules are evaluated in order against a [`StyleContext`](crate::context::StyleContext);
//! the first matching rule selects the style.

mod rules;

pub use rules::{CompiledRule, StyleRule, StyleRules, StyleRulesConfig};
