//! Expression transformer
//!
//! Rewrites a free-form potential expression into a fixed-form double
//! precision assignment to `VV`.

use tracing::debug;

use crate::fixed_form::LineBuilder;
use crate::lexer::{Exponent, NumberLit, Token, tokenize};

/// Potential used when the request carries none
pub const DEFAULT_POTENTIAL: &str = "      VV=(0.1d0*Tanh(x(1)/Sqrt(6.d0)))**2.d0";

/// First-line prefix of the potential statement
pub const POTENTIAL_PREFIX: &str = "      VV=       ";

/// First-line prefix of a metric function assignment
pub const METRIC_PREFIX: &str = "        lll=";

/// Transforms a potential expression into wrapped fixed-form lines
pub fn transform_potential(expr: Option<&str>) -> String {
    let Some(expr) = expr.filter(|e| !e.trim().is_empty()) else {
        return DEFAULT_POTENTIAL.to_string();
    };

    debug!("Transforming potential: {}", expr);

    let tagged = tag_literals(expr);
    let body = strip_assignment(tagged.trim());
    let rendered = LineBuilder::new(POTENTIAL_PREFIX).render(body);

    debug!("Transformed potential:\n{}", rendered);
    rendered
}

/// Tags the literals of a metric cell expression, without any prefix
pub fn transform_metric_expression(expr: &str) -> String {
    let expr = expr.trim();
    if expr.is_empty() {
        return "0.d0".to_string();
    }
    tag_literals(expr).trim().to_string()
}

/// Rewrites every bare numeric literal to double precision
///
/// Field references and identifier-glued digits pass through untouched.
pub fn tag_literals(expr: &str) -> String {
    let mut out = String::with_capacity(expr.len() + 16);
    for token in tokenize(expr) {
        match token {
            Token::Number(lit) => push_double(&mut out, lit),
            other => out.push_str(other.text()),
        }
    }
    out
}

fn push_double(out: &mut String, lit: NumberLit<'_>) {
    match lit.exponent {
        Some(Exponent::Double) => out.push_str(lit.text),
        Some(Exponent::Single) => out.extend(lit.text.chars().map(|c| match c {
            'e' | 'E' => 'd',
            c => c,
        })),
        None if lit.has_point => {
            out.push_str(lit.text);
            out.push_str("d0");
        }
        None => {
            out.push_str(lit.text);
            out.push_str(".d0");
        }
    }
}

/// Strips any leading `VV =` assignment targets
pub fn strip_assignment(expr: &str) -> &str {
    let mut rest = expr.trim_start();
    loop {
        let Some(head) = rest.get(..2) else {
            return rest;
        };
        if !head.eq_ignore_ascii_case("vv") {
            return rest;
        }
        let after = rest[2..].trim_start();
        match after.strip_prefix('=') {
            Some(tail) => rest = tail.trim_start(),
            None => return rest,
        }
    }
}
