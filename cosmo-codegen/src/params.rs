//! Parameter resolution
//!
//! Finds the free symbols of a potential expression, checks them against a
//! parameter table and substitutes their values as literals.

use std::collections::BTreeSet;

use cosmo_core::domain::model::ParameterTable;

use crate::lexer::{FIELD_ARRAY, Token, tokenize};

/// Intrinsic function names that are never parameters
pub const INTRINSICS: [&str; 16] = [
    "sin", "cos", "tan", "sinh", "cosh", "tanh", "asin", "acos", "atan", "atan2", "exp", "log",
    "log10", "ln", "sqrt", "abs",
];

fn is_intrinsic(name: &str) -> bool {
    INTRINSICS.iter().any(|f| f.eq_ignore_ascii_case(name))
}

/// Whether the identifier at `i` is a symbolic index, as in `x(i)`
fn is_field_index(tokens: &[Token<'_>], i: usize) -> bool {
    i >= 2 && tokens[i - 1].is_symbol("(") && tokens[i - 2].is_ident(FIELD_ARRAY)
}

/// Lowercased free symbols of `expr`
pub fn extract_symbols(expr: &str) -> BTreeSet<String> {
    let tokens = tokenize(expr);
    tokens
        .iter()
        .enumerate()
        .filter_map(|(i, token)| match token {
            Token::Ident(name) if name.starts_with(|c: char| c.is_ascii_alphabetic()) => {
                Some((i, *name))
            }
            _ => None,
        })
        .filter(|(i, name)| {
            !is_intrinsic(name)
                && !name.eq_ignore_ascii_case(FIELD_ARRAY)
                && !is_field_index(&tokens, *i)
        })
        .map(|(_, name)| name.to_ascii_lowercase())
        .collect()
}

/// Sorted symbols of `expr` that have no value in `table`
pub fn validate_parameters(expr: &str, table: &ParameterTable) -> Vec<String> {
    extract_symbols(expr)
        .into_iter()
        .filter(|symbol| !table.contains(symbol))
        .collect()
}

/// Replaces every known parameter with its value, 15 fractional digits
///
/// Matching is whole-identifier and case-insensitive, so a longer name is
/// never clobbered by a shorter one that happens to be its prefix.
pub fn substitute(expr: &str, table: &ParameterTable) -> String {
    let mut out = String::with_capacity(expr.len());
    for token in tokenize(expr) {
        match token {
            Token::Ident(name) if !is_intrinsic(name) => match table.get(name) {
                Some(value) => out.push_str(&format!("{:.15}", value)),
                None => out.push_str(name),
            },
            other => out.push_str(other.text()),
        }
    }
    out
}
